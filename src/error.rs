use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Malformed input in {origin}: {message}")]
    MalformedInput { origin: String, message: String },

    #[error("Unresolved reference in row {row}: no canonical course matches '{name}'")]
    UnresolvedReference { row: usize, name: String },
}

impl CatalogError {
    pub fn malformed(origin: impl Into<String>, message: impl ToString) -> Self {
        CatalogError::MalformedInput {
            origin: origin.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
