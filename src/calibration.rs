//! Per-frame calibration parameters.
//!
//! The parameters are read from the metadata of each frame,
//! as produced by a [`FrameExtractor`][crate::extract::FrameExtractor].
//! Tag names follow ExifTool's FLIR tag table. Every
//! parameter is required.
use std::collections::BTreeMap;

use serde_derive::*;
use serde_json::Value;

use crate::error::{CsqError, Result};

/// Frame metadata: tag name to value. Keys may carry an
/// ExifTool group prefix (`FLIR:Emissivity`).
pub type Metadata = BTreeMap<String, Value>;

/// Tags [`CalibrationParameters::from_metadata`] requires.
pub const REQUIRED_TAGS: [&str; 17] = [
    "Emissivity",
    "ObjectDistance",
    "ReflectedApparentTemperature",
    "AtmosphericTemperature",
    "IRWindowTemperature",
    "IRWindowTransmission",
    "RelativeHumidity",
    "PlanckR1",
    "PlanckB",
    "PlanckF",
    "PlanckO",
    "PlanckR2",
    "AtmosphericTransAlpha1",
    "AtmosphericTransAlpha2",
    "AtmosphericTransBeta1",
    "AtmosphericTransBeta2",
    "AtmosphericTransX",
];

/// Parameters to compute temperatures from raw sensor
/// values. Temperatures are in celsius, the object distance
/// in metres and the relative humidity in percent.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CalibrationParameters {
    pub emissivity: f64,
    pub object_distance: f64,

    pub reflected_apparent_temperature: f64,
    pub atmospheric_temperature: f64,
    #[serde(rename = "IRWindowTemperature")]
    pub ir_window_temperature: f64,
    #[serde(rename = "IRWindowTransmission")]
    pub ir_window_transmission: f64,

    #[serde(rename = "RelativeHumidity")]
    pub relative_humidity_percentage: f64,

    pub planck_r1: f64,
    pub planck_b: f64,
    pub planck_f: f64,
    pub planck_o: f64,
    pub planck_r2: f64,

    #[serde(rename = "AtmosphericTransAlpha1")]
    pub atmospheric_transmission_alpha_1: f64,
    #[serde(rename = "AtmosphericTransAlpha2")]
    pub atmospheric_transmission_alpha_2: f64,
    #[serde(rename = "AtmosphericTransBeta1")]
    pub atmospheric_transmission_beta_1: f64,
    #[serde(rename = "AtmosphericTransBeta2")]
    pub atmospheric_transmission_beta_2: f64,
    #[serde(rename = "AtmosphericTransX")]
    pub atmospheric_transmission_x: f64,
}

impl CalibrationParameters {
    /// Collect the parameters from frame metadata. Fails
    /// with [`CsqError::MissingCalibrationField`] on the first
    /// tag that is absent or does not hold a number.
    pub fn from_metadata(meta: &Metadata) -> Result<Self> {
        let get = |tag: &'static str| lookup(meta, tag);
        Ok(CalibrationParameters {
            emissivity: get("Emissivity")?,
            object_distance: get("ObjectDistance")?,
            reflected_apparent_temperature: get("ReflectedApparentTemperature")?,
            atmospheric_temperature: get("AtmosphericTemperature")?,
            ir_window_temperature: get("IRWindowTemperature")?,
            ir_window_transmission: get("IRWindowTransmission")?,
            relative_humidity_percentage: get("RelativeHumidity")?,
            planck_r1: get("PlanckR1")?,
            planck_b: get("PlanckB")?,
            planck_f: get("PlanckF")?,
            planck_o: get("PlanckO")?,
            planck_r2: get("PlanckR2")?,
            atmospheric_transmission_alpha_1: get("AtmosphericTransAlpha1")?,
            atmospheric_transmission_alpha_2: get("AtmosphericTransAlpha2")?,
            atmospheric_transmission_beta_1: get("AtmosphericTransBeta1")?,
            atmospheric_transmission_beta_2: get("AtmosphericTransBeta2")?,
            atmospheric_transmission_x: get("AtmosphericTransX")?,
        })
    }

    /// Same parameters with the object distance replaced.
    pub fn with_object_distance(self, object_distance: f64) -> Self {
        CalibrationParameters {
            object_distance,
            ..self
        }
    }
}

fn lookup(meta: &Metadata, tag: &'static str) -> Result<f64> {
    let value = meta.get(tag).or_else(|| {
        meta.iter()
            .find(|(k, _)| k.rsplit(':').next() == Some(tag))
            .map(|(_, v)| v)
    });
    value
        .and_then(number_from_value)
        .ok_or(CsqError::MissingCalibrationField(tag))
}

/// Numbers may arrive as JSON numbers or, from ExifTool's
/// print conversion, as strings with a unit suffix
/// (`"20.0 C"`, `"1.00 m"`, `"50.0 %"`).
fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => float_with_suffix(s),
        _ => None,
    }
}

fn float_with_suffix(s: &str) -> Option<f64> {
    use lazy_static::lazy_static;
    use regex::Regex;
    lazy_static! {
        static ref RE: Regex =
            Regex::new(r"^\s*[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?").unwrap();
    }

    RE.find(s)?.as_str().trim().parse().ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    /// Metadata of a camera with the window removed, as in
    /// the Thermimage reference values.
    pub(crate) fn reference_metadata() -> Metadata {
        let value = json!({
            "Emissivity": 0.95,
            "ObjectDistance": 1.0,
            "ReflectedApparentTemperature": 20.0,
            "AtmosphericTemperature": 20.0,
            "IRWindowTemperature": 20.0,
            "IRWindowTransmission": 1.0,
            "RelativeHumidity": 50.0,
            "PlanckR1": 21106.77,
            "PlanckB": 1501.0,
            "PlanckF": 1.0,
            "PlanckO": -7340.0,
            "PlanckR2": 0.012545258,
            "AtmosphericTransAlpha1": 0.006569,
            "AtmosphericTransAlpha2": 0.01262,
            "AtmosphericTransBeta1": -0.002276,
            "AtmosphericTransBeta2": -0.00667,
            "AtmosphericTransX": 1.9,
        });
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn reads_all_tags() {
        let params = CalibrationParameters::from_metadata(&reference_metadata()).unwrap();
        assert_eq!(params.emissivity, 0.95);
        assert_eq!(params.planck_o, -7340.0);
        assert_eq!(params.atmospheric_transmission_beta_2, -0.00667);
        assert_eq!(params.relative_humidity_percentage, 50.0);
    }

    #[test]
    fn every_tag_is_required() {
        for tag in REQUIRED_TAGS.iter() {
            let mut meta = reference_metadata();
            meta.remove(*tag);
            match CalibrationParameters::from_metadata(&meta) {
                Err(CsqError::MissingCalibrationField(missing)) => assert_eq!(missing, *tag),
                other => panic!("expected missing `{}`, got {:?}", tag, other),
            }
        }
    }

    #[test]
    fn non_numeric_is_missing() {
        let mut meta = reference_metadata();
        meta.insert("PlanckB".into(), json!("n/a"));
        assert!(matches!(
            CalibrationParameters::from_metadata(&meta),
            Err(CsqError::MissingCalibrationField("PlanckB"))
        ));
    }

    #[test]
    fn group_prefixed_tags() {
        let meta: Metadata = reference_metadata()
            .into_iter()
            .map(|(k, v)| (format!("FLIR:{}", k), v))
            .collect();
        let params = CalibrationParameters::from_metadata(&meta).unwrap();
        assert_eq!(params.planck_r2, 0.012545258);
    }

    #[rstest]
    #[case("20.0 C", Some(20.0))]
    #[case("-7340", Some(-7340.0))]
    #[case("1.00 m", Some(1.0))]
    #[case("50.0 %", Some(50.0))]
    #[case("1.2e-3", Some(0.0012))]
    #[case(".5", Some(0.5))]
    #[case("C 20", None)]
    #[case("", None)]
    fn parses_print_converted_numbers(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(float_with_suffix(input), expected);
    }
}
