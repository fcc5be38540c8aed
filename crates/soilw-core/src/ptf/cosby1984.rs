//! Cosby et al. (1984) pedotransfer function for the Campbell (1974)
//! family, fit from sand/clay mass fraction alone.

use crate::swrc::SwrcParams;

/// `sand`, `clay` are mass fractions in `(0, 1)`.
pub fn cosby1984_for_campbell(sand: f64, clay: f64) -> SwrcParams {
    let psi_s = 10f64.powf(-1.58 * sand - 0.63 * clay + 2.17);
    let theta_s = -0.142 * sand - 0.037 * clay + 0.505;
    let b = -0.3 * sand + 15.7 * clay + 3.10;
    let k_s = 2.54 * 24.0 * 10f64.powf(1.26 * sand - 6.4 * clay - 0.60);
    SwrcParams::campbell(psi_s, theta_s, b, k_s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_physically_sane_parameters() {
        let params = cosby1984_for_campbell(0.4, 0.2);
        assert!(params.values[0] > 0.0); // psi_s
        assert!(params.values[1] > 0.0 && params.values[1] < 1.0); // theta_s
        assert!(params.values[2] > 0.0); // b
        assert!(params.values[3] > 0.0); // k_s
    }
}
