//! Turn a CSQ stream into temperature grids, one frame at a
//! time.
//!
//! [`FrameReader`] owns the byte source (through a
//! [`FrameCursor`]) and the [`FrameExtractor`] collaborator.
//! The extractor is started when the reader is built and
//! stopped exactly once: by [`close`][FrameReader::close],
//! or on drop if the reader was never closed.
//!
//! ```rust,no_run
//! # fn main() -> csq::Result<()> {
//! use csq::{FrameReader, ReaderConfig};
//!
//! let mut reader = FrameReader::open("video.csq", &ReaderConfig::default())?;
//! while let Some(temps) = reader.next_frame()? {
//!     println!("{:?}", temps.dim());
//! }
//! reader.close()?;
//! # Ok(())
//! # }
//! ```
use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use log::{debug, warn};

use crate::{
    config::ReaderConfig,
    cursor::FrameCursor,
    error::Result,
    exiftool::ExiftoolExtractor,
    extract::{Decoder, FrameExtractor, StillImageDecoder},
    flir::FffExtractor,
    image::ThermalImage,
    temperature::TemperatureGrid,
};

pub struct FrameReader<R, X = FffExtractor, D = StillImageDecoder>
where
    X: FrameExtractor,
{
    cursor: FrameCursor<R>,
    extractor: X,
    decoder: D,
    closed: bool,
}

impl FrameReader<BufReader<File>> {
    /// Open a CSQ file with the in-process FFF extractor.
    pub fn open<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(
            BufReader::new(file),
            FffExtractor,
            StillImageDecoder,
            config,
        )
    }
}

impl FrameReader<BufReader<File>, ExiftoolExtractor> {
    /// Open a CSQ file and extract frames with the ExifTool
    /// found at [`ReaderConfig::exiftool_path`].
    pub fn open_with_exiftool<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(
            BufReader::new(file),
            ExiftoolExtractor::new(config.exiftool_path.clone()),
            StillImageDecoder,
            config,
        )
    }
}

impl<R, X, D> FrameReader<R, X, D>
where
    X: FrameExtractor,
{
    /// Build a reader and start the extractor.
    pub fn new(source: R, mut extractor: X, decoder: D, config: &ReaderConfig) -> Result<Self> {
        extractor.start()?;
        Ok(FrameReader {
            cursor: FrameCursor::new(source, config),
            extractor,
            decoder,
            closed: false,
        })
    }

    pub fn cursor(&self) -> &FrameCursor<R> {
        &self.cursor
    }

    pub fn extractor_mut(&mut self) -> &mut X {
        &mut self.extractor
    }

    /// Stop the extractor and release the byte source.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.extractor.stop()?;
        debug!("reader closed");
        Ok(())
    }
}

impl<R, X, D> FrameReader<R, X, D>
where
    R: Read,
    X: FrameExtractor,
    D: Decoder,
{
    /// Raw grid and calibration of the next frame, or `None`
    /// at the end of the stream.
    pub fn next_image(&mut self) -> Result<Option<ThermalImage>> {
        let frame = match self.cursor.advance()? {
            Some(frame) => frame,
            None => return Ok(None),
        };
        debug!("frame at {} ({} bytes)", frame.offset(), frame.len());
        ThermalImage::from_frame(&frame, &mut self.extractor, &self.decoder).map(Some)
    }

    /// Temperatures of the next frame in celsius, or `None`
    /// at the end of the stream.
    pub fn next_frame(&mut self) -> Result<Option<TemperatureGrid>> {
        match self.next_image()? {
            Some(image) => image.temperatures().map(Some),
            None => Ok(None),
        }
    }

    /// Pass over the next frame without decoding it.
    pub fn skip_frame(&mut self) -> Result<bool> {
        self.cursor.skip()
    }
}

impl<R, X, D> FrameReader<R, X, D>
where
    R: Read + Seek,
    X: FrameExtractor,
{
    /// Number of frames from the current position to the end
    /// of the stream. The reader is reset afterwards.
    pub fn count_frames(&mut self) -> Result<usize> {
        self.cursor.count()
    }

    /// Go back to the first frame of the stream.
    pub fn reset(&mut self) -> Result<()> {
        self.cursor.reset_source()
    }
}

impl<R, X, D> Drop for FrameReader<R, X, D>
where
    X: FrameExtractor,
{
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.extractor.stop() {
            warn!("stopping frame extractor: {:#}", e);
        }
    }
}
