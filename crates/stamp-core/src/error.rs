use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StampError {
    /// Form values that cannot become an entry. Nothing was mutated.
    #[error("Invalid input: {0}")]
    Input(String),

    /// Imported or persisted data is not a well-formed entry sequence.
    #[error("Invalid entry data: {0}")]
    Validation(String),

    /// Neither the preferred nor the standard font could be embedded.
    #[error("No usable font: {0}")]
    RenderResource(String),

    #[error("Failed to process PDF: {0}")]
    Document(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Page render failed: {0}")]
    Raster(String),

    #[error("No document loaded")]
    NoDocument,
}

/// Failures reported by a document backend.
///
/// The reconciliation engine decides which of these are fatal; most are
/// recovered per entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Page index {0} does not exist")]
    MissingPage(u32),

    #[error("Resource could not be embedded: {0}")]
    Resource(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),
}

impl From<BackendError> for StampError {
    fn from(err: BackendError) -> Self {
        StampError::Document(err.to_string())
    }
}
