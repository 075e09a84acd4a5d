//! Error types for the docx-settings library.

use std::io;
use thiserror::Error;

/// Result type alias for docx-settings operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading, editing or writing a settings part.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file or stream operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reading or writing the ZIP archive.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error parsing XML content.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Well-formed XML that does not match the settings schema.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A required package component is missing.
    #[error("Missing component: {0}")]
    MissingComponent(String),

    /// Reading a part failed; the part must not be used any further.
    #[error("Failed to parse part {part}: {cause}")]
    PartParse {
        /// Name of the part that failed to parse
        part: String,
        /// Underlying failure
        #[source]
        cause: Box<Error>,
    },

    /// Writing a part failed during serialization or stream output.
    #[error("Failed to write part {part}: {cause}")]
    PartWrite {
        /// Name of the part that failed to write
        part: String,
        /// Underlying failure
        #[source]
        cause: Box<Error>,
    },

    /// An optional sub-node was read before it was created.
    #[error("Missing substructure: {0}")]
    MissingSubstructure(&'static str),

    /// An attribute value could not be converted to its expected type.
    #[error("Malformed value for {attribute}: {value:?}")]
    MalformedValue {
        /// Qualified attribute name (e.g., "w:percent")
        attribute: &'static str,
        /// Raw attribute text
        value: String,
    },

    /// The part has not been read yet.
    #[error("Part has not been read")]
    PartNotLoaded,

    /// A previous read of the part failed.
    #[error("Part is unusable after a failed read")]
    PartUnusable,

    /// The part has no package storage to read from or commit to.
    #[error("Part has no backing package storage")]
    NoBackingPart,
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlParse(err.to_string())
    }
}
