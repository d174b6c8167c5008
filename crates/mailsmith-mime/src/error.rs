//! Error types for MIME operations.

use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No transcoder exists for the requested charset pair.
    #[error("Cannot convert from {from} to {to}")]
    Conversion {
        /// Source charset name.
        from: String,
        /// Destination charset name.
        to: String,
    },

    /// A transcoder stopped making progress on its input.
    #[error("Transcoder stalled converting from {0}")]
    Stalled(String),

    /// No header field with the given name.
    #[error("No such field: {0}")]
    NoSuchField(String),

    /// The field holds a value of a different kind.
    #[error("Field {name} does not hold a {expected} value")]
    FieldKind {
        /// Field name.
        name: String,
        /// The value kind that was requested.
        expected: &'static str,
    },

    /// The part handle does not belong to this tree.
    #[error("No such body part")]
    NoSuchPart,

    /// The root part cannot be detached from its own tree.
    #[error("The root part cannot be removed")]
    RootPart,

    /// Leaf contents cannot be set on a part that has children.
    #[error("Part has sub-parts and no leaf contents")]
    CompositePart,

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// I/O error while streaming a conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
