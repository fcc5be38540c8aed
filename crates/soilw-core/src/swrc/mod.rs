//! Soil water retention curves (SWRC): forward (`θ → ψ`) and inverse
//! (`ψ → θ`) transforms for the three supported parameter families.
//!
//! Every family first converts bulk soil water content to matric
//! water content, `θ = swc / ((1 − gravel) · width)`, then dispatches
//! on [`SwrcFamily`]. Matric values stay inside the kernels; bulk
//! values (`cm` of water) cross the module boundary.

mod campbell;
mod fxw;
mod van_genuchten;

use crate::error::SoilwError;

/// Anchor tension [cm H2O] where FXW residual water content is
/// defined to reach zero asymptotically; also used as the van
/// Genuchten / Campbell "very dry" probe point for `theta_min`.
pub const FXW_HR: f64 = 1500.0;
/// Tension [cm H2O] at which FXW water content is exactly zero.
pub const FXW_H0: f64 = 6.3e6;

/// cm H2O -> bar.
pub const CM_TO_BAR_CAMPBELL: f64 = 1024.0;
/// cm H2O -> bar (van Genuchten / FXW use the more precise factor).
pub const CM_TO_BAR_VG: f64 = 1019.716;

/// The closed set of supported retention-curve families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SwrcFamily {
    Campbell1974,
    VanGenuchten1980,
    Fxw,
}

impl SwrcFamily {
    /// Number of parameters a vector of this family carries.
    pub fn param_count(self) -> usize {
        match self {
            SwrcFamily::Campbell1974 => 4,
            SwrcFamily::VanGenuchten1980 => 5,
            SwrcFamily::Fxw => 6,
        }
    }
}

/// A parameter vector for one [`SwrcFamily`]. Unused trailing slots
/// are zero. Per-family layout:
///
/// - Campbell: `[psi_s, theta_s, b, k_s]`
/// - van Genuchten: `[theta_r, theta_s, alpha, n, k_s]`
/// - FXW: `[theta_s, alpha, n, m, k_s, l]`
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SwrcParams {
    pub family: SwrcFamily,
    pub values: [f64; 6],
}

impl SwrcParams {
    pub fn campbell(psi_s: f64, theta_s: f64, b: f64, k_s: f64) -> Self {
        Self {
            family: SwrcFamily::Campbell1974,
            values: [psi_s, theta_s, b, k_s, 0.0, 0.0],
        }
    }

    pub fn van_genuchten(theta_r: f64, theta_s: f64, alpha: f64, n: f64, k_s: f64) -> Self {
        Self {
            family: SwrcFamily::VanGenuchten1980,
            values: [theta_r, theta_s, alpha, n, k_s, 0.0],
        }
    }

    pub fn fxw(theta_s: f64, alpha: f64, n: f64, m: f64, k_s: f64, l: f64) -> Self {
        Self {
            family: SwrcFamily::Fxw,
            values: [theta_s, alpha, n, m, k_s, l],
        }
    }

    pub fn theta_s(&self) -> f64 {
        match self.family {
            SwrcFamily::Campbell1974 => self.values[1],
            SwrcFamily::VanGenuchten1980 => self.values[1],
            SwrcFamily::Fxw => self.values[0],
        }
    }

    /// Validate the parameter ranges documented per family; failures
    /// fail site initialization (never silently clamp).
    pub fn check(&self) -> Result<(), SoilwError> {
        match self.family {
            SwrcFamily::Campbell1974 => campbell::check_params(&self.values),
            SwrcFamily::VanGenuchten1980 => van_genuchten::check_params(&self.values),
            SwrcFamily::Fxw => fxw::check_params(&self.values),
        }
    }
}

fn to_matric(swc: f64, gravel: f64, width: f64) -> Result<f64, SoilwError> {
    if swc < 0.0 {
        return Err(SoilwError::InvalidInput(format!(
            "negative bulk SWC: {swc}"
        )));
    }
    if gravel >= 1.0 {
        return Err(SoilwError::InvalidInput(format!(
            "gravel fraction must be < 1: {gravel}"
        )));
    }
    if width <= 0.0 {
        return Err(SoilwError::InvalidInput(format!(
            "layer width must be positive: {width}"
        )));
    }
    Ok(swc / ((1.0 - gravel) * width))
}

/// Forward SWRC: bulk soil water content [cm] -> soil water potential
/// [bar].
pub fn swc_to_swp(
    swc: f64,
    params: &SwrcParams,
    gravel: f64,
    width: f64,
) -> Result<f64, SoilwError> {
    let theta = to_matric(swc, gravel, width)?;
    match params.family {
        SwrcFamily::Campbell1974 => campbell::theta_to_psi_bar(theta, &params.values),
        SwrcFamily::VanGenuchten1980 => van_genuchten::theta_to_psi_bar(theta, &params.values),
        SwrcFamily::Fxw => fxw::theta_to_psi_bar(theta, &params.values),
    }
}

/// Inverse SWRC: soil water potential [bar] -> bulk soil water
/// content [cm].
pub fn swp_to_swc(
    swp_bar: f64,
    params: &SwrcParams,
    gravel: f64,
    width: f64,
) -> Result<f64, SoilwError> {
    let theta = match params.family {
        SwrcFamily::Campbell1974 => campbell::psi_bar_to_theta(swp_bar, &params.values),
        SwrcFamily::VanGenuchten1980 => van_genuchten::psi_bar_to_theta(swp_bar, &params.values),
        SwrcFamily::Fxw => fxw::psi_bar_to_theta(swp_bar, &params.values),
    }?;
    Ok((1.0 - gravel) * width * theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn campbell_roundtrip_one_bar() {
        // Scenario 1: width=20, gravel=0, sand=0.4, clay=0.2, PTF-Cosby.
        let params = crate::ptf::cosby1984_for_campbell(0.4, 0.2);
        let swc = swp_to_swc(1.0, &params, 0.0, 20.0).unwrap();
        let swp = swc_to_swp(swc, &params, 0.0, 20.0).unwrap();
        assert_abs_diff_eq!(swp, 1.0, epsilon = 1e-8);
    }

    #[test]
    fn fxw_roundtrip_quarter_vwc() {
        // Scenario 2.
        let params = SwrcParams::fxw(0.45, 0.05, 2.0, 0.5, 10.0, 0.5);
        let width = 10.0;
        let gravel = 0.0;
        let target_theta = 0.25;
        let swc_in = target_theta * width;
        let swp = swc_to_swp(swc_in, &params, gravel, width).unwrap();
        let swc_out = swp_to_swc(swp, &params, gravel, width).unwrap();
        assert_abs_diff_eq!(swc_out / width, target_theta, epsilon = 1e-8);
    }

    #[test]
    fn monotonic_psi_increasing_theta_nonincreasing() {
        let params = crate::ptf::cosby1984_for_campbell(0.3, 0.25);
        let mut prev_theta = f64::INFINITY;
        for psi_tenth in 1..200 {
            let psi = psi_tenth as f64 * 0.1;
            let swc = swp_to_swc(psi, &params, 0.0, 10.0).unwrap();
            assert!(swc <= prev_theta + 1e-12);
            prev_theta = swc;
        }
    }
}
