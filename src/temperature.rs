//! Functions to compute temperature from raw sensor values.
//!
//! Ported from [read_thermal.py] which itself is ported from
//! [Thermimage R library]. The model accounts for reflected
//! radiation, two atmospheric paths and an infrared window;
//! the window is assumed to sit halfway (`OD/2`) between the
//! object and the sensor, so both atmospheric paths share the
//! same transmission.
//!
//! [read_thermal.py]: //github.com/Nervengift/read_thermal.py/blob/master/flir_image_extractor.py
//! [Thermimage R library]: //github.com/gtatters/Thermimage/blob/master/R/raw2temp.R
use ndarray::Array2;

use crate::{
    calibration::CalibrationParameters,
    error::{CsqError, Result},
};

/// Raw sensor counts of one frame, `(height, width)`.
pub type RawGrid = Array2<u16>;

/// Temperatures in celsius, same shape as the [`RawGrid`].
pub type TemperatureGrid = Array2<f64>;

const CELICIUS_OFFSET: f64 = 273.15;

// h2o<-(RH/100)*exp(1.5587+0.06939*(ATemp)-0.00027816*(ATemp)^2+0.00000068455*(ATemp)^3)
const ATMOSPHERIC_SERIES: [f64; 4] = [1.5587, 0.06939, -0.00027816, 0.00000068455];

impl CalibrationParameters {
    // raw = PR1/(PR2*(exp(PB/(temp+273.15))-PF))-PO
    fn planck_temp_to_raw(&self, temp: f64) -> f64 {
        self.planck_r1
            / (self.planck_r2 * ((self.planck_b / (temp + CELICIUS_OFFSET)).exp() - self.planck_f))
            - self.planck_o
    }

    // inverse of above; NaN where the log or either division
    // leaves its domain
    fn planck_raw_to_temp(&self, raw: f64) -> f64 {
        let denom = self.planck_r2 * (raw + self.planck_o);
        if denom == 0. {
            return f64::NAN;
        }
        let arg = self.planck_r1 / denom + self.planck_f;
        if !(arg > 0. && arg.is_finite()) {
            return f64::NAN;
        }
        self.planck_b / arg.ln() - CELICIUS_OFFSET
    }

    fn atmospheric_affine1(&self, val: f64) -> f64 {
        self.atmospheric_transmission_alpha_1 + self.atmospheric_transmission_beta_1 * val
    }

    fn atmospheric_affine2(&self, val: f64) -> f64 {
        self.atmospheric_transmission_alpha_2 + self.atmospheric_transmission_beta_2 * val
    }

    fn atmospheric_interpolate(&self, val1: f64, val2: f64) -> f64 {
        self.atmospheric_transmission_x * val1 + (1. - self.atmospheric_transmission_x) * val2
    }

    /// Water vapour pressure derived from the relative
    /// humidity and the atmospheric temperature.
    pub fn water_vapour_pressure(&self) -> f64 {
        (self.relative_humidity_percentage / 100.)
            * power_series_at(&ATMOSPHERIC_SERIES, self.atmospheric_temperature).exp()
    }

    /// Transmission of the atmosphere over half the object
    /// distance.
    ///
    /// tau<-ATX*exp(-sqrt(OD/2)*(ATA1+ATB1*sqrt(h2o)))+(1-ATX)*exp(-sqrt(OD/2)*(ATA2+ATB2*sqrt(h2o)))
    pub fn atmospheric_transmission(&self) -> Result<f64> {
        if !(self.object_distance >= 0.) {
            return Err(CsqError::domain(
                "atmospheric transmission",
                format!("sqrt of object distance {}", self.object_distance),
            ));
        }
        let h2o = self.water_vapour_pressure();
        if !(h2o >= 0.) {
            return Err(CsqError::domain(
                "atmospheric transmission",
                format!("sqrt of water vapour pressure {}", h2o),
            ));
        }

        let h2o_sqrt = h2o.sqrt();
        let dist_factor = (self.object_distance / 2.).sqrt();
        let tau = self.atmospheric_interpolate(
            (-dist_factor * self.atmospheric_affine1(h2o_sqrt)).exp(),
            (-dist_factor * self.atmospheric_affine2(h2o_sqrt)).exp(),
        );
        ensure_positive("atmospheric transmission", tau)?;
        Ok(tau)
    }

    /// Affine map from the raw sensor value to the raw value
    /// the object alone would have produced.
    ///
    /// Fails if a divisor of the model (emissivity, window
    /// transmission, atmospheric transmission) is not positive
    /// or a derived term is not finite.
    pub fn raw_transform(&self) -> Result<impl Fn(f64) -> f64> {
        ensure_positive("emissivity", self.emissivity)?;
        ensure_positive("IR window transmission", self.ir_window_transmission)?;

        let emiss_wind = 1. - self.ir_window_transmission;
        // anti-reflective coating on the window
        let refl_wind = 0.;

        let tau1 = self.atmospheric_transmission()?;
        let tau2 = tau1;
        let e = self.emissivity;
        let irt = self.ir_window_transmission;

        // radiance reflecting off the object before the window
        let refl1 = self.planck_temp_to_raw(self.reflected_apparent_temperature);
        let refl1_attn = (1. - e) / e * refl1;

        // radiance from the atmosphere (before the window)
        let atm1 = self.planck_temp_to_raw(self.atmospheric_temperature);
        let atm1_attn = (1. - tau1) / e / tau1 * atm1;

        let wind = self.planck_temp_to_raw(self.ir_window_temperature);
        let wind_attn = emiss_wind / e / tau1 / irt * wind;

        let refl2 = self.planck_temp_to_raw(self.reflected_apparent_temperature);
        let refl2_attn = refl_wind / e / tau1 / irt * refl2;

        // radiance from the atmosphere (after the window)
        let atm2 = self.planck_temp_to_raw(self.atmospheric_temperature);
        let atm2_attn = (1. - tau2) / e / tau1 / irt / tau2 * atm2;

        let coeffs = [
            -atm1_attn - atm2_attn - wind_attn - refl1_attn - refl2_attn,
            1. / e / tau1 / irt / tau2,
        ];
        for (term, val) in [("background radiance", coeffs[0]), ("object gain", coeffs[1])] {
            if !val.is_finite() {
                return Err(CsqError::domain(term, format!("evaluates to {}", val)));
            }
        }

        Ok(move |raw| power_series_at(&coeffs, raw))
    }

    /// Map from raw sensor value to temperature in celsius.
    pub fn temperature_transform(&self) -> Result<impl Fn(f64) -> f64 + '_> {
        let t = self.raw_transform()?;
        Ok(move |raw| self.planck_raw_to_temp(t(raw)))
    }

    /// Temperature of a single raw value.
    pub fn raw_to_temp(&self, raw: f64) -> Result<f64> {
        let temp = self.temperature_transform()?(raw);
        if !temp.is_finite() {
            return Err(CsqError::domain(
                "inverse Planck",
                format!("raw value {} maps to {}", raw, temp),
            ));
        }
        Ok(temp)
    }
}

/// Convert a grid of raw sensor values to temperatures.
///
/// Every pixel is converted independently with the same
/// parameters. A pixel whose temperature is not finite (the
/// inverse Planck logarithm left its domain) fails the whole
/// frame with [`CsqError::NumericDomain`].
pub fn convert(raw: &RawGrid, params: &CalibrationParameters) -> Result<TemperatureGrid> {
    let temp_t = params.temperature_transform()?;
    let temps = raw.mapv(|r| temp_t(r as f64));

    let bad = temps
        .indexed_iter()
        .zip(raw.iter())
        .find(|((_, t), _)| !t.is_finite());
    if let Some((((row, col), t), r)) = bad {
        return Err(CsqError::domain(
            "inverse Planck",
            format!("raw value {} at ({}, {}) maps to {}", r, row, col, t),
        ));
    }
    Ok(temps)
}

fn ensure_positive(term: &'static str, val: f64) -> Result<()> {
    if val > 0. && val.is_finite() {
        Ok(())
    } else {
        Err(CsqError::domain(term, format!("divisor {} is not positive", val)))
    }
}

#[inline]
fn power_series_at(coeffs: &[f64], x: f64) -> f64 {
    let mut pow = 1.;
    let mut sum = 0.;
    for coeff in coeffs.iter() {
        sum += pow * coeff;
        pow *= x;
    }
    sum
}
