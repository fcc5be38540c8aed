//! Saxton & Rawls (2006) saturated water content estimator.
//!
//! Used in "legacy" Campbell-compatibility mode, where `theta_s` is
//! taken from this regression instead of the Cosby-1984 formula.
//! Organic matter is not part of this crate's layer data model, so
//! `om` is fixed at 0 — consistent with how sites lacking an organic
//! matter fraction are initialized upstream.

const OM: f64 = 0.0;

/// `sand`, `clay` are mass fractions in `(0, 1)`.
pub fn saxton2006_theta_sat(sand: f64, clay: f64) -> f64 {
    let theta_33t = -0.251 * sand + 0.195 * clay + 0.011 * OM
        + 0.006 * (sand * OM)
        - 0.027 * (clay * OM)
        + 0.452 * (sand * clay)
        + 0.299;
    let theta_33 = theta_33t + (1.283 * theta_33t.powi(2) - 0.374 * theta_33t - 0.015);

    let theta_s33t = 0.278 * sand + 0.034 * clay + 0.022 * OM
        - 0.018 * (sand * OM)
        - 0.027 * (clay * OM)
        - 0.584 * (sand * clay)
        + 0.078;
    let theta_s33 = theta_s33t + (0.636 * theta_s33t - 0.107);

    theta_33 + theta_s33 - 0.097 * sand + 0.043
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_plausible_porosity() {
        let theta_sat = saxton2006_theta_sat(0.4, 0.2);
        assert!(theta_sat > 0.3 && theta_sat < 0.6);
    }
}
