//! First-order Markov weather generator: daily precipitation
//! occurrence/amount plus a weekly bivariate-normal temperature pair
//! with wet/dry correction.

use serde::{Deserialize, Serialize};

use crate::error::SoilwError;
use crate::rng::Pcg32;

/// One DOY's precipitation-occurrence table row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PrecipProbRow {
    pub wetprob: f64,
    pub dryprob: f64,
    pub avg_ppt_cm: f64,
    pub std_ppt_cm: f64,
}

/// One week's temperature covariance table row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeekCovRow {
    pub mean_tmax_c: f64,
    pub mean_tmin_c: f64,
    pub var_tmax: f64,
    pub covar: f64,
    pub var_tmin: f64,
    pub cfxw: f64,
    pub cfxd: f64,
    pub cfnw: f64,
    pub cfnd: f64,
}

impl PrecipProbRow {
    fn validate(&self) -> Result<(), SoilwError> {
        for (name, v) in [("wetprob", self.wetprob), ("dryprob", self.dryprob)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(SoilwError::InvalidInput(format!(
                    "Markov {name} out of [0,1]: {v}"
                )));
            }
        }
        if self.std_ppt_cm < 0.0 || !self.std_ppt_cm.is_finite() {
            return Err(SoilwError::InvalidInput(format!(
                "Markov std_ppt must be >= 0: {}",
                self.std_ppt_cm
            )));
        }
        Ok(())
    }
}

impl WeekCovRow {
    fn validate(&self) -> Result<(), SoilwError> {
        if self.var_tmax < 0.0 || self.var_tmin < 0.0 {
            return Err(SoilwError::BadCovariance(
                "variances must be non-negative".into(),
            ));
        }
        if !self.var_tmax.is_finite() || !self.var_tmin.is_finite() || !self.covar.is_finite() {
            return Err(SoilwError::BadCovariance("non-finite covariance entry".into()));
        }
        Ok(())
    }
}

/// The two input tables for the generator, indexed by `doy-1` and
/// `week-1` respectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkovTables {
    pub prob_by_doy: Vec<PrecipProbRow>,
    pub cov_by_week: Vec<WeekCovRow>,
}

impl MarkovTables {
    pub fn validate(&self) -> Result<(), SoilwError> {
        for row in &self.prob_by_doy {
            row.validate()?;
        }
        for row in &self.cov_by_week {
            row.validate()?;
        }
        Ok(())
    }
}

/// Draw the two independent standard normals and fold them through
/// the Cholesky-style bivariate-normal construction. Fails
/// `BadCovariance` when the conditional variance of Tmin given Tmax
/// would be negative.
pub fn mvnorm(cov: &WeekCovRow, rng: &mut Pcg32) -> Result<(f64, f64), SoilwError> {
    let sigma_max = cov.var_tmax.sqrt();
    if sigma_max <= 0.0 {
        return Err(SoilwError::BadCovariance(
            "var_tmax must be > 0 for mvnorm".into(),
        ));
    }
    let conditional_var = cov.var_tmin - cov.covar * cov.covar / cov.var_tmax;
    if conditional_var < 0.0 {
        return Err(SoilwError::BadCovariance(format!(
            "c^2/var_tmax ({}) exceeds var_tmin ({})",
            cov.covar * cov.covar / cov.var_tmax,
            cov.var_tmin
        )));
    }

    let z1 = rng.normal(0.0, 1.0);
    let z2 = rng.normal(0.0, 1.0);

    let tmax = cov.mean_tmax_c + sigma_max * z1;
    let tmin = cov.mean_tmin_c + (cov.covar / sigma_max) * z1 + conditional_var.sqrt() * z2;
    let tmin = tmin.min(tmax);
    Ok((tmax, tmin))
}

/// Wet/dry temperature correction, applied strictly after the
/// bivariate draw.
pub fn temp_correct_wetdry(tmax: f64, tmin: f64, cov: &WeekCovRow, is_wet: bool) -> (f64, f64) {
    if is_wet {
        let new_tmax = tmax + cov.cfxw;
        let new_tmin = (new_tmax).min(tmin + cov.cfnw);
        (new_tmax, new_tmin)
    } else {
        let new_tmax = tmax + cov.cfxd;
        let new_tmin = (new_tmax).min(tmin + cov.cfnd);
        (new_tmax, new_tmin)
    }
}

/// One day's result from the generator: Tmax, Tmin, PPT.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratedDay {
    pub tmax_c: f64,
    pub tmin_c: f64,
    pub ppt_cm: f64,
}

/// Generate one day given `doy` (1-based) and whether yesterday was
/// wet, drawing from `rng`. `week` is `((doy - 1) / 7) % cov_by_week.len()`.
pub fn generate_day(
    tables: &MarkovTables,
    doy: usize,
    yesterday_wet: bool,
    rng: &mut Pcg32,
) -> Result<GeneratedDay, SoilwError> {
    let prob = tables
        .prob_by_doy
        .get(doy - 1)
        .ok_or_else(|| SoilwError::InvalidInput(format!("no probability row for doy {doy}")))?;

    let p = if yesterday_wet { prob.wetprob } else { prob.dryprob };
    let u = rng.uniform();
    let (ppt_cm, is_wet) = if u <= p {
        let x = rng.normal(prob.avg_ppt_cm, prob.std_ppt_cm);
        (x.max(0.0), true)
    } else {
        (0.0, false)
    };

    let week = ((doy - 1) / 7) % tables.cov_by_week.len().max(1);
    let cov = tables
        .cov_by_week
        .get(week)
        .ok_or_else(|| SoilwError::InvalidInput(format!("no covariance row for week {week}")))?;

    let (tmax, tmin) = mvnorm(cov, rng)?;
    let (tmax, tmin) = temp_correct_wetdry(tmax, tmin, cov, is_wet);

    Ok(GeneratedDay {
        tmax_c: tmax,
        tmin_c: tmin,
        ppt_cm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tables() -> MarkovTables {
        let prob = PrecipProbRow {
            wetprob: 0.4,
            dryprob: 0.1,
            avg_ppt_cm: 0.5,
            std_ppt_cm: 0.2,
        };
        let cov = WeekCovRow {
            mean_tmax_c: 20.0,
            mean_tmin_c: 8.0,
            var_tmax: 9.0,
            covar: 4.0,
            var_tmin: 6.0,
            cfxw: -1.0,
            cfxd: 1.0,
            cfnw: -0.5,
            cfnd: 0.5,
        };
        MarkovTables {
            prob_by_doy: vec![prob; 366],
            cov_by_week: vec![cov; 53],
        }
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let tables = sample_tables();
        let mut rng_a = Pcg32::new(7, 1);
        let mut rng_b = Pcg32::new(7, 1);
        let mut wet = false;
        for doy in 1..=18 {
            let a = generate_day(&tables, doy, wet, &mut rng_a).unwrap();
            let b = generate_day(&tables, doy, wet, &mut rng_b).unwrap();
            assert_eq!(a.tmax_c, b.tmax_c);
            assert_eq!(a.tmin_c, b.tmin_c);
            assert_eq!(a.ppt_cm, b.ppt_cm);
            wet = a.ppt_cm > 0.0;
        }
    }

    #[test]
    fn different_seed_diverges() {
        let tables = sample_tables();
        let mut rng_a = Pcg32::new(7, 1);
        let mut rng_b = Pcg32::new(1, 1);
        let mut any_diff = false;
        let mut wet_a = false;
        let mut wet_b = false;
        for doy in 1..=18 {
            let a = generate_day(&tables, doy, wet_a, &mut rng_a).unwrap();
            let b = generate_day(&tables, doy, wet_b, &mut rng_b).unwrap();
            if a.tmax_c != b.tmax_c || a.ppt_cm != b.ppt_cm {
                any_diff = true;
            }
            wet_a = a.ppt_cm > 0.0;
            wet_b = b.ppt_cm > 0.0;
        }
        assert!(any_diff);
    }

    #[test]
    fn negative_radicand_reports_bad_covariance() {
        let bad_cov = WeekCovRow {
            mean_tmax_c: 20.0,
            mean_tmin_c: 8.0,
            var_tmax: 1.0,
            covar: 5.0,
            var_tmin: 1.0,
            cfxw: 0.0,
            cfxd: 0.0,
            cfnw: 0.0,
            cfnd: 0.0,
        };
        let mut rng = Pcg32::new(1, 1);
        assert!(mvnorm(&bad_cov, &mut rng).is_err());
    }
}
