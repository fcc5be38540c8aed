//! Fredlund-Xing-Wang retention curve and its ITP (Interpolation
//! Truncation Projection) root-finder inverse.
//!
//! FXW has no closed-form `theta -> psi`; the source inverts
//! `phi_to_theta` numerically with a bisection-family root finder
//! (ITP, Oliveira & Takahashi 2020) rather than Newton's method,
//! because the curve's derivative can vanish near saturation.

use super::{FXW_H0, FXW_HR};
use crate::error::SoilwError;
use crate::numeric::{eq, gt, lt};

const ITP_K1: f64 = 2e-3;
const ITP_K2: f64 = 2.0;
const ITP_N0: u32 = 1;
const ITP_TOL: f64 = 2e-9;

/// `phi_to_theta`: tension `phi` [cm H2O] -> matric water content.
fn phi_to_theta(phi: f64, values: &[f64; 6]) -> f64 {
    let theta_s = values[0];
    let alpha = values[1];
    let n = values[2];
    let m = values[3];

    if phi >= FXW_H0 {
        return 0.0;
    }
    let se = (std::f64::consts::E + (alpha * phi.abs()).powf(n)).ln().powf(-m);
    let c_f = 1.0 - ((1.0 + phi / FXW_HR).ln()) / ((1.0 + FXW_H0 / FXW_HR).ln());
    theta_s * se * c_f
}

/// ITP root finder for `f(phi) = theta - phi_to_theta(phi) = 0` on
/// bracket `[0, FXW_H0]`.
fn itp_for_phi(theta: f64, values: &[f64; 6]) -> Result<f64, SoilwError> {
    let mut a = 0.0_f64;
    let mut b = FXW_H0;
    let f = |phi: f64| theta - phi_to_theta(phi, values);

    let mut fa = f(a);
    let mut fb = f(b);
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if fa.signum() == fb.signum() {
        return Err(SoilwError::Nonconvergence(
            "FXW ITP bracket does not change sign".into(),
        ));
    }

    let n_half = ((b - a) / (2.0 * ITP_TOL)).log2().ceil() as i64;
    let n_max = (n_half.max(0) as u32) + ITP_N0;

    for _ in 0..=n_max {
        if (b - a) / 2.0 <= ITP_TOL {
            break;
        }
        let x_half = (a + b) / 2.0;
        let r = ITP_K1 * (b - a).powf(ITP_K2);

        // Interpolation (regula falsi).
        let x_f = (fb * a - fa * b) / (fb - fa);

        // Truncation.
        let delta = r.min((x_half - x_f).abs());
        let sigma = (x_half - x_f).signum();
        let x_t = if delta > 0.0 {
            x_f + sigma * delta
        } else {
            x_f
        };

        // Projection onto the bisection interval.
        let radius = ITP_TOL * 2f64.powi(n_max as i32) - (b - a) / 2.0;
        let x_itp = if (x_t - x_half).abs() <= radius {
            x_t
        } else {
            x_half
        };

        let f_itp = f(x_itp);
        if f_itp.signum() == fa.signum() {
            a = x_itp;
            fa = f_itp;
        } else if f_itp == 0.0 {
            return Ok(x_itp);
        } else {
            b = x_itp;
            fb = f_itp;
        }
    }

    if (b - a).abs() <= ITP_TOL * 4.0 {
        Ok((a + b) / 2.0)
    } else {
        Err(SoilwError::Nonconvergence(
            "FXW ITP did not converge within its iteration budget".into(),
        ))
    }
}

/// `theta -> psi` [bar].
pub fn theta_to_psi_bar(theta: f64, values: &[f64; 6]) -> Result<f64, SoilwError> {
    let theta_s = values[0];
    if eq(theta, theta_s) {
        return Ok(0.0);
    }
    if lt(theta, 0.0) || gt(theta, theta_s) {
        return Err(SoilwError::OutOfDomain(format!(
            "FXW theta {theta} outside [0, {theta_s}]"
        )));
    }
    let phi_cm = itp_for_phi(theta, values)?;
    Ok(phi_cm / super::CM_TO_BAR_VG)
}

/// `psi` [bar] `-> theta`.
pub fn psi_bar_to_theta(psi_bar: f64, values: &[f64; 6]) -> Result<f64, SoilwError> {
    let phi_cm = psi_bar * super::CM_TO_BAR_VG;
    Ok(phi_to_theta(phi_cm, values))
}

pub fn check_params(values: &[f64; 6]) -> Result<(), SoilwError> {
    let [theta_s, alpha, n, m, k_s, l] = *values;
    if !(theta_s > 0.0 && theta_s <= 1.0) {
        return Err(SoilwError::InvalidInput(format!(
            "FXW theta_s must be in (0,1]: {theta_s}"
        )));
    }
    if !(alpha > 0.0) {
        return Err(SoilwError::InvalidInput(format!(
            "FXW alpha must be > 0: {alpha}"
        )));
    }
    if !(n > 1.0 && n <= 10.0) {
        return Err(SoilwError::InvalidInput(format!(
            "FXW n must be in (1,10]: {n}"
        )));
    }
    if !(m > 0.0 && m <= 1.5) {
        return Err(SoilwError::InvalidInput(format!(
            "FXW m must be in (0,1.5]: {m}"
        )));
    }
    if !(k_s > 0.0) {
        return Err(SoilwError::InvalidInput(format!(
            "FXW k_s must be > 0: {k_s}"
        )));
    }
    if !(l > 0.0) {
        return Err(SoilwError::InvalidInput(format!("FXW L must be > 0: {l}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn phi_to_theta_is_zero_at_h0() {
        let values = [0.45, 0.05, 2.0, 0.5, 10.0, 0.5];
        assert_eq!(phi_to_theta(FXW_H0, &values), 0.0);
    }

    #[test]
    fn itp_converges_for_midrange_theta() {
        let values = [0.45, 0.05, 2.0, 0.5, 10.0, 0.5];
        let phi = itp_for_phi(0.25, &values).unwrap();
        assert_abs_diff_eq!(phi_to_theta(phi, &values), 0.25, epsilon = 1e-6);
    }
}
