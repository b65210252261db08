//! Frame-at-a-time access over a [`FrameAssembler`].
use std::{
    io::{Read, Seek},
    vec,
};

use log::debug;

use crate::{
    config::ReaderConfig,
    demux::{Frame, FrameAssembler},
    error::Result,
};

/// Pulls frames one by one, refilling from the assembler
/// whenever the current batch runs out.
#[derive(Debug)]
pub struct FrameCursor<R> {
    assembler: FrameAssembler<R>,
    batch: vec::IntoIter<Frame>,
}

impl<R> FrameCursor<R> {
    pub fn new(source: R, config: &ReaderConfig) -> Self {
        Self::from_assembler(FrameAssembler::new(source, config))
    }

    pub fn from_assembler(assembler: FrameAssembler<R>) -> Self {
        FrameCursor {
            assembler,
            batch: Vec::new().into_iter(),
        }
    }

    /// Frames already assembled but not yet returned.
    pub fn buffered(&self) -> usize {
        self.batch.len()
    }

    pub fn assembler(&self) -> &FrameAssembler<R> {
        &self.assembler
    }

    pub fn into_inner(self) -> R {
        self.assembler.into_inner()
    }
}

impl<R: Read> FrameCursor<R> {
    // Makes sure the batch holds a frame, unless the stream
    // is exhausted. Blocks without a boundary yield empty
    // batches; keep reading through them.
    fn refill(&mut self) -> Result<bool> {
        while self.batch.as_slice().is_empty() {
            if self.assembler.is_done() {
                return Ok(false);
            }
            self.batch = self.assembler.pull_batch()?.into_iter();
        }
        Ok(true)
    }

    /// The next frame, or `None` once the stream is exhausted.
    pub fn advance(&mut self) -> Result<Option<Frame>> {
        if !self.refill()? {
            return Ok(None);
        }
        Ok(self.batch.next())
    }

    /// Like [`advance`][Self::advance] but drops the frame.
    /// Returns whether a frame was available.
    pub fn skip(&mut self) -> Result<bool> {
        if !self.refill()? {
            return Ok(false);
        }
        Ok(self.batch.next().is_some())
    }
}

impl<R: Read + Seek> FrameCursor<R> {
    /// Skip to the end of the stream counting the frames
    /// passed, then rewind to the start.
    pub fn count(&mut self) -> Result<usize> {
        let mut frames = 0;
        while self.skip()? {
            frames += 1;
        }
        self.reset_source()?;
        debug!("counted {} frames", frames);
        Ok(frames)
    }

    /// Seek the source to its start. Pending frames and the
    /// leftover are dropped, so the next frame is the first
    /// frame of the stream.
    pub fn reset_source(&mut self) -> Result<()> {
        self.assembler.reset()?;
        self.batch = Vec::new().into_iter();
        Ok(())
    }
}

/// Iterator over the remaining frames of a [`FrameCursor`].
pub struct Frames<'a, R> {
    cursor: &'a mut FrameCursor<R>,
}

impl<R: Read> FrameCursor<R> {
    pub fn frames(&mut self) -> Frames<'_, R> {
        Frames { cursor: self }
    }
}

impl<'a, R: Read> Iterator for Frames<'a, R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.advance().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TrailingFrame, marker::MARKER};
    use std::io::Cursor;

    fn stream(frames: usize) -> Vec<u8> {
        let mut data = vec![];
        for i in 0..frames {
            data.extend_from_slice(MARKER);
            data.extend(std::iter::repeat(i as u8).take(7 + i));
        }
        data
    }

    fn cursor(data: Vec<u8>, block_size: usize) -> FrameCursor<Cursor<Vec<u8>>> {
        let config = ReaderConfig::default()
            .block_size(block_size)
            .trailing_frame(TrailingFrame::Emit);
        FrameCursor::new(Cursor::new(data), &config)
    }

    #[test]
    fn advance_until_exhausted() {
        let mut cur = cursor(stream(5), 9);
        let mut seen = vec![];
        while let Some(frame) = cur.advance().unwrap() {
            seen.push(frame[MARKER.len()]);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(cur.advance().unwrap(), None);
        assert!(!cur.skip().unwrap());
    }

    #[test]
    fn count_is_idempotent() {
        let mut cur = cursor(stream(7), 16);
        assert_eq!(cur.count().unwrap(), 7);
        assert_eq!(cur.count().unwrap(), 7);
    }

    #[test]
    fn count_resets_to_first_frame() {
        let mut cur = cursor(stream(3), 1000);
        cur.advance().unwrap();
        assert_eq!(cur.count().unwrap(), 2);
        let first = cur.advance().unwrap().unwrap();
        assert_eq!(first.offset(), 0);
    }

    #[test]
    fn skip_then_reset_matches_advance() {
        let data = stream(6);
        let mut direct = cursor(data.clone(), 11);
        let expected: Vec<_> = (0..4).map(|_| direct.advance().unwrap().unwrap()).collect();

        let mut cur = cursor(data, 11);
        for _ in 0..4 {
            assert!(cur.skip().unwrap());
        }
        cur.reset_source().unwrap();
        assert_eq!(cur.buffered(), 0);
        let visited: Vec<_> = (0..4).map(|_| cur.advance().unwrap().unwrap()).collect();
        assert_eq!(visited, expected);
    }

    #[test]
    fn iterator_yields_all_frames() {
        let mut cur = cursor(stream(4), 5);
        let frames: Result<Vec<_>> = cur.frames().collect();
        let offsets: Vec<_> = frames.unwrap().iter().map(Frame::offset).collect();
        assert_eq!(offsets, vec![0, 13, 27, 42]);
    }
}
