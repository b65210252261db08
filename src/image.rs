use std::{fs::read, path::Path};

use crate::{
    calibration::CalibrationParameters,
    error::Result,
    extract::{Decoder, FrameExtractor, StillImageDecoder},
    flir::FffExtractor,
    temperature::{convert, RawGrid, TemperatureGrid},
};

/// Raw sensor values of one frame with the parameters needed
/// to convert them.
#[derive(Debug, Clone)]
pub struct ThermalImage {
    pub settings: CalibrationParameters,
    pub image: RawGrid,
}

impl ThermalImage {
    /// Extract the calibration and raw grid of a frame. The
    /// metadata is checked before the raw image is decoded.
    pub fn from_frame<X, D>(frame: &[u8], extractor: &mut X, decoder: &D) -> Result<Self>
    where
        X: FrameExtractor + ?Sized,
        D: Decoder + ?Sized,
    {
        let metadata = extractor.extract_metadata(frame)?;
        let settings = CalibrationParameters::from_metadata(&metadata)?;
        let payload = extractor.extract_raw_binary(frame)?;
        let image = decoder.decode(&payload)?;
        Ok(ThermalImage { settings, image })
    }

    /// Parse a single FFF record, e.g. one frame written out
    /// of a CSQ file.
    pub fn from_fff_bytes(frame: &[u8]) -> Result<Self> {
        Self::from_frame(frame, &mut FffExtractor, &StillImageDecoder)
    }

    pub fn from_fff_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_fff_bytes(&read(path)?)
    }

    pub fn temperatures(&self) -> Result<TemperatureGrid> {
        convert(&self.image, &self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::CsqError, flir::tests::fff_frame};

    #[test]
    fn temperatures_match_settings() {
        let frame = fff_frame(2, 2, &[9000, 10000, 11000, 12000]);
        let thermal = ThermalImage::from_fff_bytes(&frame).unwrap();
        let temps = thermal.temperatures().unwrap();
        assert_eq!(temps.dim(), (2, 2));
        let t = thermal.settings.raw_to_temp(11000.).unwrap();
        assert_eq!(temps[(1, 0)], t);
    }

    #[test]
    fn broken_frame_is_external_error() {
        let err = ThermalImage::from_fff_bytes(b"FFF\0RT").unwrap_err();
        assert!(matches!(err, CsqError::External(_)));
    }
}
