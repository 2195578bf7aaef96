//! Report assembly and rendering.

pub mod assembler;
pub mod generator;

pub use assembler::assemble;
pub use generator::{
    generate_email_html, generate_json_report, generate_markdown_report, generate_print_report,
};
