pub mod config;
pub mod error;
pub mod extract;
pub mod matching;
pub mod schema;
pub mod segment;
pub mod shortcode;
pub mod structured;
pub mod text;
pub mod wxr;

pub use error::{Error, Result};
