use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed xml attribute: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("post {0} has no encoded content")]
    MissingContent(String),
    #[error("invalid structured record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, Error>;
