//! Split a CSQ byte stream into frames.
//!
//! A CSQ file is a plain concatenation of FFF records. The
//! stream is read in fixed-size blocks; every block is
//! scanned for [markers][crate::marker::MARKER] and the
//! bytes between consecutive markers are emitted as a
//! [`Frame`]. Bytes after the last marker of a block (the
//! *leftover*) belong to a frame that is not yet complete
//! and are carried over to the next block.
//!
//! # Boundaries
//!
//! - A marker split across two blocks is still found: the
//!   last `MARKER_LEN - 1` bytes of the leftover are scanned
//!   again together with the next block.
//! - A block without any marker extends the leftover. The
//!   batch returned for it is empty although the stream is
//!   not exhausted; check [`FrameAssembler::is_done`].
//! - Bytes before the first marker of the stream are not
//!   part of any frame and are skipped.
//! - At the end of the stream the leftover is dropped or
//!   emitted, per [`TrailingFrame`].
use std::{
    io::{Read, Seek, SeekFrom},
    mem,
    ops::Deref,
};

use log::{debug, trace, warn};

use crate::{
    config::{ReaderConfig, TrailingFrame},
    error::{CsqError, Result},
    marker::{find_markers, MARKER_LEN},
};

/// One complete FFF record cut out of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    offset: u64,
    data: Vec<u8>,
}

impl Frame {
    pub(crate) fn new(offset: u64, data: Vec<u8>) -> Self {
        Frame { offset, data }
    }

    /// Absolute position of the frame's marker in the stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Stateful block-wise frame splitter over a byte source.
#[derive(Debug)]
pub struct FrameAssembler<R> {
    source: R,
    block_size: usize,
    max_frame_size: usize,
    trailing: TrailingFrame,

    // Bytes not yet emitted. Starts at a marker once
    // `in_frame` is set, otherwise holds the tail of the
    // preamble.
    leftover: Vec<u8>,
    leftover_offset: u64,
    in_frame: bool,

    block: Vec<u8>,
    done: bool,
    terminated: bool,
}

impl<R> FrameAssembler<R> {
    pub fn new(source: R, config: &ReaderConfig) -> Self {
        let block_size = config.effective_block_size();
        FrameAssembler {
            source,
            block_size,
            max_frame_size: config.max_frame_size,
            trailing: config.trailing_frame,
            leftover: vec![],
            leftover_offset: 0,
            in_frame: false,
            block: Vec::with_capacity(block_size),
            done: false,
            terminated: false,
        }
    }

    /// Whether the source has been read to its end.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bytes carried over to the next block.
    pub fn leftover(&self) -> &[u8] {
        &self.leftover
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn clear(&mut self) {
        self.leftover.clear();
        self.leftover_offset = 0;
        self.in_frame = false;
        self.done = false;
    }

    fn finish(&mut self) -> Vec<Frame> {
        self.done = true;
        let data = mem::take(&mut self.leftover);
        let offset = self.leftover_offset + data.len() as u64;
        let in_frame = mem::replace(&mut self.in_frame, false);
        let start = mem::replace(&mut self.leftover_offset, offset);

        if !in_frame || data.is_empty() {
            return vec![];
        }
        match self.trailing {
            TrailingFrame::Emit => {
                debug!("emitting unterminated frame at {} ({} bytes)", start, data.len());
                vec![Frame::new(start, data)]
            }
            TrailingFrame::Discard => {
                warn!(
                    "discarding unterminated frame at {} ({} bytes)",
                    start,
                    data.len()
                );
                vec![]
            }
        }
    }
}

impl<R: Read> FrameAssembler<R> {
    fn read_block(&mut self) -> Result<usize> {
        self.block.clear();
        let read = (&mut self.source)
            .take(self.block_size as u64)
            .read_to_end(&mut self.block);
        match read {
            Ok(n) => Ok(n),
            Err(e) => {
                self.terminated = true;
                Err(e.into())
            }
        }
    }

    /// Read one block and return the frames it completes.
    ///
    /// Returns an empty batch at the end of the stream, and
    /// also for a block that contains no frame boundary; use
    /// [`is_done`][Self::is_done] to tell them apart.
    pub fn pull_batch(&mut self) -> Result<Vec<Frame>> {
        if self.terminated {
            return Err(CsqError::Terminated);
        }
        if self.done {
            return Ok(vec![]);
        }

        let n = self.read_block()?;
        trace!(
            "read block of {} bytes at {}",
            n,
            self.leftover_offset + self.leftover.len() as u64
        );
        if n == 0 {
            return Ok(self.finish());
        }

        // The already scanned part of the leftover may end
        // with the first bytes of a marker. When in a frame,
        // offset 0 is the frame's own marker.
        let scan_from = self
            .leftover
            .len()
            .saturating_sub(MARKER_LEN - 1)
            .max(self.in_frame as usize);
        self.leftover.extend_from_slice(&self.block);

        let mut bounds = Vec::new();
        if self.in_frame {
            bounds.push(0);
        }
        bounds.extend(
            find_markers(&self.leftover[scan_from..])
                .into_iter()
                .map(|m| m + scan_from),
        );

        if !self.in_frame {
            if let Some(&first) = bounds.first() {
                if first > 0 {
                    debug!("skipping {} bytes before the first marker", first);
                }
            }
        }

        let frames: Vec<Frame> = bounds
            .windows(2)
            .map(|w| {
                Frame::new(
                    self.leftover_offset + w[0] as u64,
                    self.leftover[w[0]..w[1]].to_vec(),
                )
            })
            .collect();

        let keep_from = match bounds.last() {
            Some(&last) => {
                self.in_frame = true;
                last
            }
            None => self.leftover.len().saturating_sub(MARKER_LEN - 1),
        };
        self.leftover.drain(..keep_from);
        self.leftover_offset += keep_from as u64;

        if frames.is_empty() && self.leftover.len() > self.max_frame_size {
            let offset = self.leftover_offset;
            let len = self.leftover.len();
            self.leftover.clear();
            self.in_frame = false;
            self.done = true;
            return Err(CsqError::MalformedContainer(format!(
                "no frame marker within {} bytes from offset {}",
                len, offset
            )));
        }

        debug!(
            "assembled {} frame(s), {} bytes left over",
            frames.len(),
            self.leftover.len()
        );
        Ok(frames)
    }
}

impl<R: Seek> FrameAssembler<R> {
    /// Seek the source back to its start and forget all
    /// buffered state.
    pub fn reset(&mut self) -> Result<()> {
        if self.terminated {
            return Err(CsqError::Terminated);
        }
        if let Err(e) = self.source.seek(SeekFrom::Start(0)) {
            self.terminated = true;
            return Err(e.into());
        }
        self.clear();
        Ok(())
    }
}
