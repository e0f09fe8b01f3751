use base64::{Engine, engine::general_purpose::STANDARD};
use odata_engine_core::{DomainError, DomainErrorKind};
use tracing::warn;

/// Position of the first element of the next page.
#[derive(Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, Debug)]
pub struct Cursor {
    pub offset: usize,
}

#[derive(displaydoc::Display, Debug)]
pub enum CursorError {
    /// invalid cursor encoding
    Encoding,
    /// invalid cursor format
    Format,
}

impl From<CursorError> for DomainError {
    fn from(value: CursorError) -> Self {
        warn!("cursor error: {value:?}");
        DomainErrorKind::DataStore(format!("{value}")).into_error()
    }
}

impl Cursor {
    pub fn encode(&self) -> String {
        // serializing a single varint into a Vec does not fail
        let bytes = postcard::to_allocvec(self).unwrap_or_default();
        STANDARD.encode(bytes)
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = STANDARD.decode(token).map_err(|_| CursorError::Encoding)?;
        postcard::from_bytes(&bytes).map_err(|_| CursorError::Format)
    }
}
