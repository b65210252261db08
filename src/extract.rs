//! Collaborators that turn frame bytes into metadata and a
//! raw sensor grid.
//!
//! A [`FrameExtractor`] pulls the calibration metadata and the
//! embedded raw thermal image out of a frame; a [`Decoder`]
//! turns that image into a [`RawGrid`]. The reader only sees
//! these traits, so either side can be swapped, e.g. for a
//! JPEG-LS capable decoder.
use std::io::Cursor;

use anyhow::{bail, ensure, Context, Result};
use image::{
    codecs::tiff::{TiffDecoder, TiffEncoder},
    ColorType, ImageDecoder,
};
use ndarray::Array2;

use crate::{calibration::Metadata, temperature::RawGrid};

/// Source of per-frame metadata and raw image payloads.
///
/// Implementations holding an external resource acquire it in
/// [`start`][Self::start] and release it in
/// [`stop`][Self::stop]; the reader calls both exactly once.
pub trait FrameExtractor {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Tag name to value map for one frame.
    fn extract_metadata(&mut self, frame: &[u8]) -> Result<Metadata>;

    /// The embedded raw thermal image, still encoded.
    fn extract_raw_binary(&mut self, frame: &[u8]) -> Result<Vec<u8>>;
}

impl<X: FrameExtractor + ?Sized> FrameExtractor for Box<X> {
    fn start(&mut self) -> Result<()> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }

    fn extract_metadata(&mut self, frame: &[u8]) -> Result<Metadata> {
        (**self).extract_metadata(frame)
    }

    fn extract_raw_binary(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        (**self).extract_raw_binary(frame)
    }
}

/// Decodes a raw image payload into sensor counts.
pub trait Decoder {
    fn decode(&self, payload: &[u8]) -> Result<RawGrid>;
}

impl<D: Decoder + ?Sized> Decoder for Box<D> {
    fn decode(&self, payload: &[u8]) -> Result<RawGrid> {
        (**self).decode(payload)
    }
}

/// Still image formats FLIR cameras embed raw data in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Tiff,
    Png,
    JpegLs,
}

impl PayloadKind {
    pub fn sniff(payload: &[u8]) -> Option<Self> {
        const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
        // SOI followed by SOF55
        const JPEG_LS: &[u8] = b"\xff\xd8\xff\xf7";

        if payload.starts_with(b"II*\0") || payload.starts_with(b"MM\0*") {
            Some(PayloadKind::Tiff)
        } else if payload.starts_with(PNG) {
            Some(PayloadKind::Png)
        } else if payload.starts_with(JPEG_LS) {
            Some(PayloadKind::JpegLs)
        } else {
            None
        }
    }
}

/// Decoder for the uncompressed formats: 8/16-bit grayscale
/// TIFF and PNG. JPEG-LS payloads are recognised but need a
/// dedicated [`Decoder`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StillImageDecoder;

impl Decoder for StillImageDecoder {
    fn decode(&self, payload: &[u8]) -> Result<RawGrid> {
        match PayloadKind::sniff(payload) {
            Some(PayloadKind::Tiff) => decode_tiff(payload),
            Some(PayloadKind::Png) => decode_png(payload),
            Some(PayloadKind::JpegLs) => {
                bail!("JPEG-LS raw image ({} bytes) needs a JPEG-LS decoder", payload.len())
            }
            None => bail!("unrecognised raw image format ({} bytes)", payload.len()),
        }
    }
}

fn decode_tiff(payload: &[u8]) -> Result<RawGrid> {
    let decoder = TiffDecoder::new(Cursor::new(payload)).context("reading TIFF header")?;
    let (width, height) = decoder.dimensions();
    let width = width as usize;
    let height = height as usize;

    use zerocopy::{AsBytes, FromBytes};
    fn read_pixels<'a, T, R>(decoder: R) -> Result<Vec<u16>>
    where
        u16: From<T>,
        T: AsBytes + FromBytes + Default + Copy,
        R: ImageDecoder<'a>,
    {
        let (width, height) = decoder.dimensions();
        let mut image: Vec<T> = vec![T::default(); width as usize * height as usize];
        decoder.read_image(image.as_bytes_mut())?;
        Ok(image.into_iter().map(u16::from).collect())
    }

    let pixels = match decoder.color_type() {
        ColorType::L8 => read_pixels::<u8, _>(decoder)?,
        ColorType::L16 => read_pixels::<u16, _>(decoder)?,
        other => bail!("unsupported TIFF color type: {:?}", other),
    };
    Ok(Array2::from_shape_vec((height, width), pixels)?)
}

fn decode_png(payload: &[u8]) -> Result<RawGrid> {
    let mut decoder = png::Decoder::new(payload);
    decoder.set_transformations(png::Transformations::IDENTITY);
    let (info, mut reader) = decoder.read_info().context("reading PNG header")?;
    ensure!(
        info.color_type == png::ColorType::Grayscale,
        "unsupported PNG color type: {:?}",
        info.color_type
    );

    let mut buf = vec![0; info.buffer_size()];
    reader.next_frame(&mut buf)?;

    let width = info.width as usize;
    let height = info.height as usize;
    let pixels: Vec<u16> = match info.bit_depth {
        png::BitDepth::Eight => buf.iter().map(|&v| v as u16).collect(),
        // FLIR writes the samples little-endian, against the
        // PNG convention.
        png::BitDepth::Sixteen => buf
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect(),
        other => bail!("unsupported PNG bit depth: {:?}", other),
    };
    Ok(Array2::from_shape_vec((height, width), pixels)?)
}

/// Wrap 16-bit sensor counts in a grayscale TIFF.
pub(crate) fn encode_tiff_u16(width: usize, height: usize, pixels: &[u16]) -> Result<Vec<u8>> {
    ensure!(
        pixels.len() == width * height,
        "expected {} pixels for {}x{}, found {}",
        width * height,
        width,
        height,
        pixels.len()
    );
    let bytes: Vec<u8> = pixels.iter().flat_map(|p| p.to_ne_bytes()).collect();

    let mut out = Cursor::new(Vec::new());
    TiffEncoder::new(&mut out).encode(&bytes, width as u32, height as u32, ColorType::L16)?;
    Ok(out.into_inner())
}
