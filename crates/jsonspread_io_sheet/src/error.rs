//! Top-level error type for conversion calls.

use std::io;

use thiserror::Error;

use crate::spec::EnumSheetFormat;

/// Conversion failure. A call reports the first one it hits.
#[derive(Debug, Error)]
pub enum SpreadError {
    /// Input text is not valid JSON.
    #[error("Invalid JSON input: {0}")]
    Decode(#[from] serde_json::Error),

    /// A sheet with the same title (case-insensitive) already exists.
    #[error("Workbook already contains a worksheet named {0:?}")]
    DuplicateTitle(String),

    /// Sheet index past the end of the workbook.
    #[error("Sheet index {index} is out of range; workbook has {n_sheets} sheet(s)")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Current sheet count.
        n_sheets: usize,
    },

    /// No sheet carries the requested title.
    #[error("Sheet not found: {0:?}")]
    NotFound(String),

    /// A1-style reference that does not parse.
    #[error("Invalid cell reference: {0:?}")]
    InvalidCellRef(String),

    /// Format encoder rejected the workbook.
    #[error("{format} encode error: {message}")]
    Encode {
        /// Format being encoded.
        format: EnumSheetFormat,
        /// Encoder error text.
        message: String,
    },

    /// Writing the encoded payload failed.
    #[error("Failed to write {target}: {source}")]
    Io {
        /// Destination path or stream label.
        target: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl SpreadError {
    pub(crate) fn encode(format: EnumSheetFormat, message: impl ToString) -> Self {
        Self::Encode {
            format,
            message: message.to_string(),
        }
    }

    pub(crate) fn io(target: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            target: target.into(),
            source,
        }
    }
}
