//! Library to read FLIR CSQ thermal videos.
//!
//! A CSQ file is a sequence of radiometric FFF records. This
//! crate provides:
//!
//! 1. A streaming [demuxer](demux) that splits the file into
//! [frames](demux::Frame) while reading it in fixed-size
//! blocks, with [frame-at-a-time access](cursor::FrameCursor).
//!
//! 2. Conversion of raw sensor values to [temperature] in
//! celsius using the calibration parameters stored with each
//! frame. The model is a port of the [Thermimage R library].
//!
//! 3. A [`FrameReader`] combining both with an extractor for
//! the frame metadata and raw image: the in-process
//! [FFF parser](flir::FffExtractor), or a long-lived
//! [ExifTool](exiftool::ExiftoolExtractor) process.
//!
//! # Usage
//!
//! ```rust,no_run
//! # fn main() -> csq::Result<()> {
//! use csq::{FrameReader, ReaderConfig, TrailingFrame};
//!
//! let config = ReaderConfig::default().trailing_frame(TrailingFrame::Emit);
//! let mut reader = FrameReader::open("video.csq", &config)?;
//! let frames = reader.count_frames()?;
//! for _ in 0..frames {
//!     if let Some(temps) = reader.next_frame()? {
//!         let max = temps.iter().cloned().fold(f64::MIN, f64::max);
//!         println!("max: {:.2} C", max);
//!     }
//! }
//! reader.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Frames can also be converted individually from the raw
//! grid and the calibration metadata:
//!
//! ```rust
//! # fn main() -> csq::Result<()> {
//! use csq::{calibration::Metadata, temperature::convert, CalibrationParameters};
//!
//! let metadata: Metadata = serde_json::from_str(r#"{
//!     "Emissivity": 0.95, "ObjectDistance": "1.00 m",
//!     "ReflectedApparentTemperature": "20.0 C", "AtmosphericTemperature": "20.0 C",
//!     "IRWindowTemperature": "20.0 C", "IRWindowTransmission": 1.0,
//!     "RelativeHumidity": "50.0 %", "PlanckR1": 21106.77, "PlanckB": 1501.0,
//!     "PlanckF": 1.0, "PlanckO": -7340, "PlanckR2": 0.012545258,
//!     "AtmosphericTransAlpha1": 0.006569, "AtmosphericTransAlpha2": 0.01262,
//!     "AtmosphericTransBeta1": -0.002276, "AtmosphericTransBeta2": -0.00667,
//!     "AtmosphericTransX": 1.9
//! }"#)?;
//! let params = CalibrationParameters::from_metadata(&metadata)?;
//! let temps = convert(&ndarray::array![[9000, 9500]], &params)?;
//! assert!(temps[(0, 1)] > temps[(0, 0)]);
//! # Ok(())
//! # }
//! ```
//!
//! [Thermimage R library]: //github.com/gtatters/Thermimage/blob/master/R/raw2temp.R

#[macro_use]
mod parse;
pub mod flir;

pub mod calibration;
pub mod config;
pub mod cursor;
pub mod demux;
pub mod error;
pub mod exiftool;
pub mod extract;
pub mod image;
pub mod marker;
pub mod reader;
pub mod stats;
pub mod temperature;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::calibration::CalibrationParameters;
pub use crate::config::{ReaderConfig, TrailingFrame};
pub use crate::demux::Frame;
pub use crate::error::{CsqError, Result};
pub use crate::image::ThermalImage;
pub use crate::reader::FrameReader;
