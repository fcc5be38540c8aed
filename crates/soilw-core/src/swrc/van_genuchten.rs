//! van Genuchten (1980) retention curve.

use super::CM_TO_BAR_VG;
use crate::error::SoilwError;
use crate::numeric::{eq, gt, lt};

/// `theta -> psi` [bar]. Domain is `(theta_r, theta_s]`.
pub fn theta_to_psi_bar(theta: f64, values: &[f64; 6]) -> Result<f64, SoilwError> {
    let theta_r = values[0];
    let theta_s = values[1];
    let alpha = values[2];
    let n = values[3];

    if eq(theta, theta_s) {
        return Ok(0.0);
    }
    if lt(theta, theta_r) || eq(theta, theta_r) || gt(theta, theta_s) {
        return Err(SoilwError::OutOfDomain(format!(
            "van Genuchten theta {theta} outside ({theta_r}, {theta_s}]"
        )));
    }

    let se = (theta_s - theta_r) / (theta - theta_r);
    let m = 1.0 - 1.0 / n;
    let psi_cm = (se.powf(1.0 / m) - 1.0).powf(1.0 / n) / alpha;
    Ok(psi_cm / CM_TO_BAR_VG)
}

/// `psi` [bar] `-> theta`.
pub fn psi_bar_to_theta(psi_bar: f64, values: &[f64; 6]) -> Result<f64, SoilwError> {
    let theta_r = values[0];
    let theta_s = values[1];
    let alpha = values[2];
    let n = values[3];

    let psi_cm = psi_bar * CM_TO_BAR_VG;
    if psi_cm <= 0.0 {
        return Ok(theta_s);
    }
    let m = 1.0 - 1.0 / n;
    let se = (1.0 + (alpha * psi_cm).powf(n)).powf(-m);
    Ok(theta_r + (theta_s - theta_r) * se)
}

pub fn check_params(values: &[f64; 6]) -> Result<(), SoilwError> {
    let [theta_r, theta_s, alpha, n, k_s, ..] = *values;
    if !(0.0..1.0).contains(&theta_r) {
        return Err(SoilwError::InvalidInput(format!(
            "van Genuchten theta_r must be in [0,1): {theta_r}"
        )));
    }
    if !(theta_s > theta_r && theta_s <= 1.0) {
        return Err(SoilwError::InvalidInput(format!(
            "van Genuchten theta_s must be in (theta_r,1]: {theta_s}"
        )));
    }
    if !(alpha > 0.0) {
        return Err(SoilwError::InvalidInput(format!(
            "van Genuchten alpha must be > 0: {alpha}"
        )));
    }
    if !(n > 1.0) {
        return Err(SoilwError::InvalidInput(format!(
            "van Genuchten n must be > 1: {n}"
        )));
    }
    if !(k_s > 0.0) {
        return Err(SoilwError::InvalidInput(format!(
            "van Genuchten k_s must be > 0: {k_s}"
        )));
    }
    Ok(())
}
