//! Reader configuration.
use std::{fs::File, io::BufReader, path::Path};

use serde_derive::*;

use crate::{error::Result, marker::MARKER_LEN};

/// Default number of bytes read from the stream at a time.
pub const DEFAULT_BLOCK_SIZE: usize = 1_000_000;

/// Default upper bound on the size of a single frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 << 20;

/// What to do with an unterminated frame at the end of the
/// stream.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrailingFrame {
    /// Drop the bytes after the last marker.
    Discard,
    /// Yield them as the final frame.
    Emit,
}

impl Default for TrailingFrame {
    fn default() -> Self {
        TrailingFrame::Discard
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "snake_case")]
pub struct ReaderConfig {
    pub block_size: usize,
    pub max_frame_size: usize,
    pub trailing_frame: TrailingFrame,
    pub exiftool_path: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            trailing_frame: TrailingFrame::default(),
            exiftool_path: "exiftool".into(),
        }
    }
}

impl ReaderConfig {
    /// Read a (possibly partial) configuration from a JSON
    /// file; absent keys keep their defaults.
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let rdr = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(rdr)?)
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn trailing_frame(mut self, trailing_frame: TrailingFrame) -> Self {
        self.trailing_frame = trailing_frame;
        self
    }

    pub fn exiftool_path<S: Into<String>>(mut self, path: S) -> Self {
        self.exiftool_path = path.into();
        self
    }

    /// Block size actually used for reads. A block must be
    /// able to hold at least one marker.
    pub(crate) fn effective_block_size(&self) -> usize {
        self.block_size.max(MARKER_LEN)
    }
}
