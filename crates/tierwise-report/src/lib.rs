//! tierwise-report: Report rendering for evaluation batches.

pub mod html;

pub use html::{generate_html, write_html_report};
