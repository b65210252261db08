//! Parse FFF records, the frames of a CSQ stream.
//!
//! This is an incomplete port of relevant parts of the
//! excellent [ExifTool] by Phil Harvey and other authors. It
//! reads only enough of a record to compute
//! [`temperature`][crate::temperature] values: the camera
//! parameters and the raw sensor image.
//!
//! For a more complete extraction of FLIR metadata, use
//! [`ExiftoolExtractor`][crate::exiftool::ExiftoolExtractor].
//!
//! [ExifTool]: //exiftool.org
use anyhow::{anyhow, bail, ensure, Context, Result};
use byteordered::Endianness;
use serde_json::json;

use crate::{
    calibration::Metadata,
    extract::{encode_tiff_u16, FrameExtractor, PayloadKind},
};

const RECORD_RAW_DATA: u16 = 0x01;
const RECORD_CAMERA_INFO: u16 = 0x20;

const CAMERA_INFO_TEMPERATURES: usize = 0x20;
const CAMERA_INFO_PLANCK_O: usize = 0x308;
const CAMERA_INFO_MIN_LEN: usize = 0x310;
const RAW_DATA_IMAGE: usize = 0x20;

const KELVIN_OFFSET: f64 = 273.15;

declare_parseable_structs! {
    // # FLIR file header (ref 3), from 0x14
    // # 0x14 - int32u file format version = 100
    // # 0x18 - int32u offset to record directory
    // # 0x1c - int32u number of entries in record directory
    #[derive(Debug)]
    pub struct FffHeader {
        version => u32,
        dir_offset => u32 as usize,
        num_entries => u32 as usize,
    }

    // # FLIR record entry (ref 3):
    // # 0x00 - int16u record type
    // # 0x02 - int16u record subtype: RawData 1=BE, 2=LE, 3=PNG; 1 for other record types
    // # 0x04 - int32u record version: seen 0x64,0x66,0x67,0x68,0x6f,0x104
    // # 0x08 - int32u index id = 1
    // # 0x0c - int32u record offset from start of FLIR data
    // # 0x10 - int32u record length
    // # 0x14 - int32u parent = 0 (?)
    // # 0x18 - int32u object number = 0 (?)
    // # 0x1c - int32u checksum: 0 for no checksum
    #[derive(Debug, Clone)]
    pub struct FffRecordDirEntry {
        ty => u16,
        sub_type => u16,
        version => u32,
        id => u32,
        offset => u32 as usize,
        length => u32 as usize,
        parent => u32,
        obj_num => u32,
        checksum => u32,
    }

    #[derive(Debug)]
    pub struct FlirTemperatureParams {
        pub(crate) emissivity => f32 as f64,
        pub(crate) object_distance => f32 as f64,
        pub(crate) reflected_apparent_temperature => f32 as f64,
        pub(crate) atmospheric_temperature => f32 as f64,
        pub(crate) ir_window_temperature => f32 as f64,
        pub(crate) ir_window_transmission => f32 as f64,
        _dummy_ignore => u32,
        pub(crate) relative_humidity => f32 as f64,
        _dummy_ignore_1 => [u32; 6],
        pub(crate) planck_r1 => f32 as f64,
        pub(crate) planck_b => f32 as f64,
        pub(crate) planck_f => f32 as f64,
        _dummy_ignore_2 => [u32; 3],
        pub(crate) atmospheric_transmission_alpha_1 => f32 as f64,
        pub(crate) atmospheric_transmission_alpha_2 => f32 as f64,
        pub(crate) atmospheric_transmission_beta_1 => f32 as f64,
        pub(crate) atmospheric_transmission_beta_2 => f32 as f64,
        pub(crate) atmospheric_transmission_x => f32 as f64,
    }

    #[derive(Debug)]
    pub struct FlirExtraParams {
        pub(crate) planck_o => i32 as f64,
        pub(crate) planck_r2 => f32 as f64,
    }

    #[derive(Debug)]
    struct RawDataDims {
        width => u16 as usize,
        height => u16 as usize,
    }
}

impl FffRecordDirEntry {
    pub fn data<'a>(&self, record: &'a [u8]) -> Option<&'a [u8]> {
        record.get(self.offset..self.offset.checked_add(self.length)?)
    }
}

/// Record directory of one FFF record.
#[derive(Debug)]
pub struct FffFrame<'a> {
    data: &'a [u8],
    dir: Vec<FffRecordDirEntry>,
}

impl<'a> FffFrame<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        ensure!(
            data.starts_with(b"FFF\0"),
            "unexpected signature in FFF record"
        );

        let endianness = header_endianness(data)?;
        let hdr: FffHeader = crate::parse::parse_at(data, 0x14, endianness)?;
        let dir = (0..hdr.num_entries)
            .map(|idx| {
                crate::parse::parse_at(data, hdr.dir_offset + idx * 0x20, endianness)
                    .with_context(|| format!("reading record directory entry {}", idx))
            })
            .collect::<Result<Vec<FffRecordDirEntry>>>()?;

        Ok(FffFrame { data, dir })
    }

    fn record(&self, ty: u16) -> Result<Option<&'a [u8]>> {
        match self.dir.iter().find(|e| e.ty == ty) {
            None => Ok(None),
            Some(entry) => entry.data(self.data).map(Some).ok_or_else(|| {
                anyhow!("unexpected end of FFF record while reading record {:#x}", ty)
            }),
        }
    }

    /// Parse the camera parameters of the record.
    pub fn camera_params(&self) -> Result<FlirCameraParams> {
        let data = self
            .record(RECORD_CAMERA_INFO)?
            .ok_or_else(|| anyhow!("no camera info in FFF record"))?;
        ensure!(
            data.len() >= CAMERA_INFO_MIN_LEN,
            "camera info record size mismatch: expected at least {} bytes, found {}",
            CAMERA_INFO_MIN_LEN,
            data.len()
        );

        let endianness = record_endianness(data)?;
        Ok(FlirCameraParams {
            temperature_params: crate::parse::parse_at(data, CAMERA_INFO_TEMPERATURES, endianness)?,
            extra_params: crate::parse::parse_at(data, CAMERA_INFO_PLANCK_O, endianness)?,
        })
    }

    /// Find the raw sensor image of the record.
    pub fn raw_data(&self) -> Result<FlirRawData<'a>> {
        let data = self
            .record(RECORD_RAW_DATA)?
            .ok_or_else(|| anyhow!("no raw data in FFF record"))?;
        ensure!(
            data.len() > RAW_DATA_IMAGE,
            "raw data record size mismatch: expected more than {} bytes, found {}",
            RAW_DATA_IMAGE,
            data.len(),
        );

        let endianness = record_endianness(data)?;
        let dims: RawDataDims = crate::parse::parse_at(data, 2, endianness)?;
        Ok(FlirRawData {
            width: dims.width,
            height: dims.height,
            endianness,
            image: &data[RAW_DATA_IMAGE..],
        })
    }
}

// Version is 100-something when read in the record's byte
// order.
fn header_endianness(data: &[u8]) -> Result<Endianness> {
    let version: u32 = crate::parse::parse_at(data, 0x14, Endianness::Little)?;
    Ok(if (100..200).contains(&version) {
        Endianness::Little
    } else {
        Endianness::Big
    })
}

// Records start with a 16-bit 2 in their own byte order.
fn record_endianness(data: &[u8]) -> Result<Endianness> {
    let marker: u16 = crate::parse::parse_at(data, 0, Endianness::Little)?;
    Ok(if marker == 2 {
        Endianness::Little
    } else {
        Endianness::Big
    })
}

#[derive(Debug)]
pub struct FlirCameraParams {
    pub(crate) temperature_params: FlirTemperatureParams,
    pub(crate) extra_params: FlirExtraParams,
}

impl FlirCameraParams {
    /// Metadata in the units ExifTool reports: temperatures
    /// in celsius, relative humidity in percent.
    pub fn to_metadata(&self) -> Metadata {
        let t = &self.temperature_params;
        let x = &self.extra_params;

        // Stored as a fraction by most cameras, in percent
        // by some.
        let humidity = if t.relative_humidity > 2. {
            t.relative_humidity
        } else {
            t.relative_humidity * 100.
        };

        let entries = vec![
            ("Emissivity", t.emissivity),
            ("ObjectDistance", t.object_distance),
            ("ReflectedApparentTemperature", t.reflected_apparent_temperature - KELVIN_OFFSET),
            ("AtmosphericTemperature", t.atmospheric_temperature - KELVIN_OFFSET),
            ("IRWindowTemperature", t.ir_window_temperature - KELVIN_OFFSET),
            ("IRWindowTransmission", t.ir_window_transmission),
            ("RelativeHumidity", humidity),
            ("PlanckR1", t.planck_r1),
            ("PlanckB", t.planck_b),
            ("PlanckF", t.planck_f),
            ("PlanckO", x.planck_o),
            ("PlanckR2", x.planck_r2),
            ("AtmosphericTransAlpha1", t.atmospheric_transmission_alpha_1),
            ("AtmosphericTransAlpha2", t.atmospheric_transmission_alpha_2),
            ("AtmosphericTransBeta1", t.atmospheric_transmission_beta_1),
            ("AtmosphericTransBeta2", t.atmospheric_transmission_beta_2),
            ("AtmosphericTransX", t.atmospheric_transmission_x),
        ];
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }
}

/// Raw sensor image of an FFF record.
#[derive(Debug)]
pub struct FlirRawData<'a> {
    pub width: usize,
    pub height: usize,
    endianness: Endianness,
    image: &'a [u8],
}

impl FlirRawData<'_> {
    /// The image as a self-describing still image. Compressed
    /// images are returned as stored; uncompressed 16-bit
    /// images are wrapped in a TIFF.
    pub fn payload(&self) -> Result<Vec<u8>> {
        if PayloadKind::sniff(self.image).is_some() {
            return Ok(self.image.to_vec());
        }

        let num_pixels = self.width * self.height;
        ensure!(
            self.image.len() >= 2 * num_pixels,
            "raw data record size mismatch: expected {} bytes for {}x{}, found {}",
            2 * num_pixels,
            self.width,
            self.height,
            self.image.len()
        );
        let pixels: Vec<u16> = self.image[..2 * num_pixels]
            .chunks_exact(2)
            .map(|c| match self.endianness {
                Endianness::Little => u16::from_le_bytes([c[0], c[1]]),
                Endianness::Big => u16::from_be_bytes([c[0], c[1]]),
            })
            .collect();
        encode_tiff_u16(self.width, self.height, &pixels)
    }
}

/// In-process [`FrameExtractor`] reading the FFF record of
/// each frame directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct FffExtractor;

impl FrameExtractor for FffExtractor {
    fn extract_metadata(&mut self, frame: &[u8]) -> Result<Metadata> {
        let fff = FffFrame::parse(frame)?;
        let mut meta = fff.camera_params()?.to_metadata();
        if let Ok(raw) = fff.raw_data() {
            meta.insert("RawThermalImageWidth".into(), json!(raw.width));
            meta.insert("RawThermalImageHeight".into(), json!(raw.height));
        }
        Ok(meta)
    }

    fn extract_raw_binary(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        let raw = FffFrame::parse(frame)?.raw_data()?;
        if raw.width == 0 || raw.height == 0 {
            bail!("empty raw image ({}x{})", raw.width, raw.height);
        }
        raw.payload()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        calibration::CalibrationParameters,
        extract::{Decoder, StillImageDecoder},
    };

    fn put_u16(buf: &mut [u8], at: usize, v: u16) {
        buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn put_u32(buf: &mut [u8], at: usize, v: u32) {
        buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn put_f32(buf: &mut [u8], at: usize, v: f32) {
        buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// Little-endian FFF record with a camera info record and
    /// an uncompressed raw image.
    pub(crate) fn fff_frame(width: u16, height: u16, pixels: &[u16]) -> Vec<u8> {
        let dir_offset = 0x40;
        let camera_offset = dir_offset + 2 * 0x20;
        let camera_len = CAMERA_INFO_MIN_LEN;
        let raw_offset = camera_offset + camera_len;
        let raw_len = RAW_DATA_IMAGE + 2 * pixels.len();

        let mut buf = vec![0u8; raw_offset + raw_len];
        buf[..6].copy_from_slice(b"FFF\0RT");
        put_u32(&mut buf, 0x14, 100);
        put_u32(&mut buf, 0x18, dir_offset as u32);
        put_u32(&mut buf, 0x1c, 2);

        for (idx, (ty, offset, len)) in [
            (RECORD_CAMERA_INFO, camera_offset, camera_len),
            (RECORD_RAW_DATA, raw_offset, raw_len),
        ]
        .iter()
        .enumerate()
        {
            let at = dir_offset + idx * 0x20;
            put_u16(&mut buf, at, *ty);
            put_u16(&mut buf, at + 2, 2);
            put_u32(&mut buf, at + 0xc, *offset as u32);
            put_u32(&mut buf, at + 0x10, *len as u32);
        }

        let c = camera_offset;
        put_u16(&mut buf, c, 2);
        let t = c + CAMERA_INFO_TEMPERATURES;
        put_f32(&mut buf, t, 0.95);
        put_f32(&mut buf, t + 0x04, 1.0);
        put_f32(&mut buf, t + 0x08, 293.15);
        put_f32(&mut buf, t + 0x0c, 293.15);
        put_f32(&mut buf, t + 0x10, 293.15);
        put_f32(&mut buf, t + 0x14, 1.0);
        put_f32(&mut buf, t + 0x1c, 0.5);
        put_f32(&mut buf, t + 0x38, 21106.77);
        put_f32(&mut buf, t + 0x3c, 1501.0);
        put_f32(&mut buf, t + 0x40, 1.0);
        put_f32(&mut buf, t + 0x50, 0.006569);
        put_f32(&mut buf, t + 0x54, 0.01262);
        put_f32(&mut buf, t + 0x58, -0.002276);
        put_f32(&mut buf, t + 0x5c, -0.00667);
        put_f32(&mut buf, t + 0x60, 1.9);
        put_u32(&mut buf, c + CAMERA_INFO_PLANCK_O, (-7340i32) as u32);
        put_f32(&mut buf, c + CAMERA_INFO_PLANCK_O + 4, 0.012545258);

        let r = raw_offset;
        put_u16(&mut buf, r, 2);
        put_u16(&mut buf, r + 2, width);
        put_u16(&mut buf, r + 4, height);
        for (idx, px) in pixels.iter().enumerate() {
            put_u16(&mut buf, r + RAW_DATA_IMAGE + 2 * idx, *px);
        }
        buf
    }

    #[test]
    fn camera_params_in_exiftool_units() -> Result<()> {
        let frame = fff_frame(2, 1, &[9000, 9100]);
        let meta = FffExtractor.extract_metadata(&frame)?;
        let params = CalibrationParameters::from_metadata(&meta)?;

        assert!((params.reflected_apparent_temperature - 20.).abs() < 1e-4);
        assert!((params.relative_humidity_percentage - 50.).abs() < 1e-4);
        assert_eq!(params.planck_o, -7340.);
        assert!((params.planck_r2 - 0.012545258).abs() < 1e-9);
        assert_eq!(meta["RawThermalImageWidth"], json!(2));
        Ok(())
    }

    #[test]
    fn raw_image_round_trips_through_tiff() -> Result<()> {
        let pixels = [9000, 9100, 9200, 9300, 9400, 9500];
        let frame = fff_frame(3, 2, &pixels);
        let payload = FffExtractor.extract_raw_binary(&frame)?;
        assert_eq!(PayloadKind::sniff(&payload), Some(PayloadKind::Tiff));

        let grid = StillImageDecoder.decode(&payload)?;
        assert_eq!(grid.dim(), (2, 3));
        assert_eq!(grid[(1, 0)], 9300);
        Ok(())
    }

    #[test]
    fn truncated_record_is_an_error() {
        let frame = fff_frame(3, 2, &[1; 6]);
        let cut = &frame[..frame.len() - 4];
        assert!(FffExtractor.extract_raw_binary(cut).is_err());
        assert!(FffFrame::parse(b"JUNK and more junk").is_err());
    }
}
