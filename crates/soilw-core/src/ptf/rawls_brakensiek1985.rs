//! Rawls & Brakensiek (1985) residual water content estimator, used
//! as the "legacy" floor on `theta_min` during site initialization.
//!
//! Valid over clay in [5,60]%, sand in [5,70]%, porosity in
//! [10,100)%; outside that range the estimate is still returned (the
//! caller decides whether to warn), matching the source, which only
//! warns rather than refusing.

use crate::error::SoilwError;

/// `sand_pct`, `clay_pct` in percent (0-100); `porosity` a fraction
/// (0-1).
pub fn rawls_brakensiek1985_theta_min(
    sand_pct: f64,
    clay_pct: f64,
    porosity: f64,
) -> Result<f64, SoilwError> {
    if !(5.0..=70.0).contains(&sand_pct) || !(5.0..=60.0).contains(&clay_pct) {
        return Err(SoilwError::OutOfDomain(format!(
            "Rawls-Brakensiek valid for sand in [5,70]%, clay in [5,60]%; got sand={sand_pct}, clay={clay_pct}"
        )));
    }
    if !(0.10..1.0).contains(&porosity) {
        return Err(SoilwError::OutOfDomain(format!(
            "Rawls-Brakensiek valid for porosity in [0.10,1.0); got {porosity}"
        )));
    }

    let theta_r = -0.0182482
        + 0.00087269 * sand_pct
        + 0.00513488 * clay_pct
        + 0.02939286 * porosity
        - 0.00015395 * clay_pct.powi(2)
        - 0.0010827 * sand_pct * porosity
        - 0.00018233 * clay_pct.powi(2) * porosity.powi(2)
        + 0.00030703 * clay_pct.powi(2) * porosity
        - 0.0023584 * porosity.powi(2) * clay_pct;

    Ok(theta_r.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_small_positive_residual() {
        let theta_r = rawls_brakensiek1985_theta_min(40.0, 20.0, 0.45).unwrap();
        assert!(theta_r >= 0.0 && theta_r < 0.3);
    }

    #[test]
    fn rejects_out_of_range_texture() {
        assert!(rawls_brakensiek1985_theta_min(2.0, 20.0, 0.45).is_err());
    }
}
