//! Campbell (1974) retention curve: `psi = psi_s / (theta/theta_s)^b`.

use super::CM_TO_BAR_CAMPBELL;
use crate::error::SoilwError;
use crate::numeric::gt;

/// `theta -> psi` [bar]. Returns 0 for `theta > theta_s` instead of an
/// error — a legacy discontinuity preserved for backward
/// compatibility with PTF-derived `theta_s` that can disagree slightly
/// with the stored parameter (design notes, open question 1).
pub fn theta_to_psi_bar(theta: f64, values: &[f64; 6]) -> Result<f64, SoilwError> {
    let psi_s = values[0];
    let theta_s = values[1];
    let b = values[2];
    if gt(theta, theta_s) {
        return Ok(0.0);
    }
    let psi_cm = psi_s / (theta / theta_s).powf(b);
    Ok(psi_cm / CM_TO_BAR_CAMPBELL)
}

/// `psi` [bar] `-> theta`.
pub fn psi_bar_to_theta(psi_bar: f64, values: &[f64; 6]) -> Result<f64, SoilwError> {
    let psi_s = values[0];
    let theta_s = values[1];
    let b = values[2];
    let psi_cm = psi_bar * CM_TO_BAR_CAMPBELL;
    if psi_cm < psi_s {
        return Ok(theta_s);
    }
    Ok(theta_s * (psi_s / psi_cm).powf(1.0 / b))
}

/// Range checks used by site initialization; Campbell has no
/// published hard bounds beyond positivity/physical sense.
pub fn check_params(values: &[f64; 6]) -> Result<(), SoilwError> {
    let [psi_s, theta_s, b, k_s, ..] = *values;
    if !(psi_s > 0.0) {
        return Err(SoilwError::InvalidInput(format!(
            "Campbell psi_s must be > 0: {psi_s}"
        )));
    }
    if !(theta_s > 0.0 && theta_s <= 1.0) {
        return Err(SoilwError::InvalidInput(format!(
            "Campbell theta_s must be in (0,1]: {theta_s}"
        )));
    }
    if !(b > 0.0) {
        return Err(SoilwError::InvalidInput(format!(
            "Campbell b must be > 0: {b}"
        )));
    }
    if !(k_s > 0.0) {
        return Err(SoilwError::InvalidInput(format!(
            "Campbell k_s must be > 0: {k_s}"
        )));
    }
    Ok(())
}
