//! Error types shared across Heatreel crates.

use std::path::PathBuf;

/// Top-level error type for Heatreel operations.
#[derive(Debug, thiserror::Error)]
pub enum HeatreelError {
    /// Invalid or inconsistent input detected before rendering starts.
    #[error("Configuration error in `{field}`: {message}")]
    Config { field: String, message: String },

    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Sink error: {message}")]
    Sink { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using HeatreelError.
pub type HeatreelResult<T> = Result<T, HeatreelError>;

impl HeatreelError {
    pub fn config(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: msg.into(),
        }
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error was raised while validating inputs, before any
    /// frame could have been produced.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::FileNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_field() {
        let err = HeatreelError::config("scale.colormap", "unknown colormap `rainbowz`");
        let text = err.to_string();
        assert!(text.contains("scale.colormap"));
        assert!(text.contains("rainbowz"));
        assert!(err.is_config());
    }

    #[test]
    fn io_errors_are_not_config_errors() {
        let err: HeatreelError = std::io::Error::other("pipe closed").into();
        assert!(!err.is_config());
    }
}
