pub mod markdown;
pub mod validate;

pub use markdown::{render_markdown, render_records, slug_for, write_meeting_page};
pub use validate::{ValidationReport, validate_dir};
