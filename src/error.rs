//! Error type shared by the demuxer, the converter and the reader.
use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CsqError>;

#[derive(Debug, Error)]
pub enum CsqError {
    /// The byte source could not be read or seeked. Terminal
    /// for the reader that hit it.
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream cannot be split into frames.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// A calibration parameter is absent from the frame
    /// metadata, or present but not a number.
    #[error("calibration field `{0}` is missing or not numeric")]
    MissingCalibrationField(&'static str),

    /// A term of the radiometric model left the domain of
    /// the operation computing it.
    #[error("numeric domain error in {term}: {detail}")]
    NumericDomain { term: &'static str, detail: String },

    /// Metadata extraction or raw grid decoding failed.
    #[error("external collaborator failed: {0:#}")]
    External(#[from] anyhow::Error),

    /// A configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The reader hit a stream I/O error earlier and refuses
    /// further reads.
    #[error("reader is unusable after an earlier stream I/O error")]
    Terminated,
}

impl CsqError {
    pub(crate) fn domain(term: &'static str, detail: impl Into<String>) -> Self {
        CsqError::NumericDomain {
            term,
            detail: detail.into(),
        }
    }

    /// Whether the reader that returned this error can still
    /// produce frames.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CsqError::Io(_) | CsqError::Terminated)
    }
}
