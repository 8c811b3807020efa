pub mod batch;
pub mod fetch;
pub mod images;
pub mod materials;
pub mod page;
pub mod record;
pub mod verify;

pub use fetch::{Fetch, HttpFetcher};
pub use page::Page;
