//! Weather ingestion, imputation, scaling, and audit.
//!
//! This crate never opens a file: the reader contract is expressed
//! over anything implementing [`std::io::BufRead`]. The project
//! directory walk and `project_dir`/`first_file` resolution stay with
//! the external CLI that owns the on-disk layout.

pub mod markov;

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::error::SoilwError;
use crate::numeric::{missing, SW_MISSING};

/// Which daily fields a given weather setup selects, mirroring a
/// 14-flag bitset from the external config format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyInputFlags {
    pub tmax: bool,
    pub tmin: bool,
    pub ppt: bool,
    pub cloud: bool,
    pub wind_speed: bool,
    pub wind_east: bool,
    pub wind_north: bool,
    pub rel_humidity: bool,
    pub rh_max: bool,
    pub rh_min: bool,
    pub specific_humidity: bool,
    pub dewpoint: bool,
    pub actual_vp: bool,
    pub shortwave: bool,
}

impl DailyInputFlags {
    /// Fail-fast validation, not a warning, because
    /// the column layout itself depends on these flags being
    /// internally consistent before any file is read.
    pub fn validate(&self) -> Result<(), SoilwError> {
        if self.tmax != self.tmin {
            return Err(SoilwError::InvalidInput(
                "Tmax and Tmin must be jointly required".into(),
            ));
        }
        if !self.ppt {
            return Err(SoilwError::InvalidInput("PPT is required".into()));
        }
        if self.rh_max != self.rh_min {
            return Err(SoilwError::InvalidInput(
                "RHmax and RHmin must be jointly required".into(),
            ));
        }
        if self.wind_east != self.wind_north {
            return Err(SoilwError::InvalidInput(
                "wind-east and wind-north must be jointly required".into(),
            ));
        }
        Ok(())
    }
}

/// One day's weather forcing. Unset optional fields carry
/// [`SW_MISSING`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyWeather {
    pub tmax_c: f64,
    pub tmin_c: f64,
    pub ppt_cm: f64,
    pub cloud_cover_pct: f64,
    pub wind_speed_ms: f64,
    pub rel_humidity_pct: f64,
    pub shortwave_mj: f64,
    pub actual_vp_kpa: f64,
}

impl DailyWeather {
    pub fn missing() -> Self {
        DailyWeather {
            tmax_c: SW_MISSING,
            tmin_c: SW_MISSING,
            ppt_cm: SW_MISSING,
            cloud_cover_pct: SW_MISSING,
            wind_speed_ms: SW_MISSING,
            rel_humidity_pct: SW_MISSING,
            shortwave_mj: SW_MISSING,
            actual_vp_kpa: SW_MISSING,
        }
    }

    /// `(Tmax + Tmin) / 2`, or [`SW_MISSING`] if either is missing.
    pub fn tavg_c(&self) -> f64 {
        if missing(self.tmax_c) || missing(self.tmin_c) {
            SW_MISSING
        } else {
            (self.tmax_c + self.tmin_c) / 2.0
        }
    }
}

/// One calendar year of daily weather, 365 or 366 entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherYear {
    pub days: Vec<DailyWeather>,
}

/// Read one year's weather from whitespace-separated lines,
/// `doy <selected columns in flag order>`. Reports `MalformedInput`
/// with the 1-based line number on any parse failure.
pub fn read_weather_year(
    reader: impl BufRead,
    flags: &DailyInputFlags,
    file_label: &str,
    n_days: usize,
) -> Result<WeatherYear, SoilwError> {
    flags.validate()?;
    let mut days = vec![DailyWeather::missing(); n_days];

    for (line_no, line) in reader.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.map_err(|e| SoilwError::IOFailure(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let mut iter = fields.iter();

        let doy: u32 = iter
            .next()
            .ok_or_else(|| malformed(file_label, line_no, "missing DOY"))?
            .parse()
            .map_err(|_| malformed(file_label, line_no, "DOY not numeric"))?;
        if !(1..=366).contains(&doy) {
            return Err(malformed(file_label, line_no, "DOY out of range [1,366]"));
        }

        let mut day = DailyWeather::missing();
        if flags.tmax {
            day.tmax_c = next_field(&mut iter, file_label, line_no, "Tmax")?;
        }
        if flags.tmin {
            day.tmin_c = next_field(&mut iter, file_label, line_no, "Tmin")?;
        }
        if flags.ppt {
            day.ppt_cm = next_field(&mut iter, file_label, line_no, "PPT")?;
        }
        if flags.cloud {
            day.cloud_cover_pct = next_field(&mut iter, file_label, line_no, "cloud")?;
        }
        let wind_speed = if flags.wind_speed {
            Some(next_field(&mut iter, file_label, line_no, "wind")?)
        } else {
            None
        };
        let (wind_e, wind_n) = if flags.wind_east {
            (
                Some(next_field(&mut iter, file_label, line_no, "wind_e")?),
                Some(next_field(&mut iter, file_label, line_no, "wind_n")?),
            )
        } else {
            (None, None)
        };
        day.wind_speed_ms = match (wind_speed, wind_e, wind_n) {
            (Some(w), _, _) => w,
            (None, Some(e), Some(n)) => (e * e + n * n).sqrt(),
            _ => SW_MISSING,
        };

        let rh = if flags.rel_humidity {
            Some(next_field(&mut iter, file_label, line_no, "RH")?)
        } else {
            None
        };
        let (rh_max, rh_min) = if flags.rh_max {
            (
                Some(next_field(&mut iter, file_label, line_no, "RHmax")?),
                Some(next_field(&mut iter, file_label, line_no, "RHmin")?),
            )
        } else {
            (None, None)
        };
        day.rel_humidity_pct = match (rh, rh_max, rh_min) {
            (_, Some(max), Some(min)) => (max + min) / 2.0,
            (Some(v), _, _) => v,
            _ => SW_MISSING,
        };

        if flags.specific_humidity {
            let _q = next_field(&mut iter, file_label, line_no, "specific_humidity")?;
        }
        if flags.dewpoint {
            let _td = next_field(&mut iter, file_label, line_no, "dewpoint")?;
        }
        if flags.actual_vp {
            day.actual_vp_kpa = next_field(&mut iter, file_label, line_no, "actual_vp")?;
        }
        if flags.shortwave {
            day.shortwave_mj = next_field(&mut iter, file_label, line_no, "shortwave")?;
        }

        let idx = (doy - 1) as usize;
        if idx < days.len() {
            days[idx] = day;
        }
    }

    Ok(WeatherYear { days })
}

fn next_field(
    iter: &mut std::slice::Iter<&str>,
    file: &str,
    line: usize,
    field: &str,
) -> Result<f64, SoilwError> {
    let raw = iter
        .next()
        .ok_or_else(|| malformed(file, line, &format!("missing {field}")))?;
    raw.parse()
        .map_err(|_| malformed(file, line, &format!("{field} not numeric")))
}

fn malformed(file: &str, line: usize, message: &str) -> SoilwError {
    SoilwError::MalformedInput {
        file: file.to_string(),
        line,
        message: message.to_string(),
    }
}

/// Imputation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImputationPolicy {
    AsIs,
    Locf { max_missing_per_year: usize },
    MarkovGenerated,
}

/// LOCF (last observation carried forward) imputation for continuous
/// fields, with PPT imputed to zero.
pub fn impute_locf(year: &mut WeatherYear, max_missing: usize) -> Result<(), SoilwError> {
    let mut missing_count = 0usize;
    let mut last = DailyWeather::missing();
    for day in year.days.iter_mut() {
        if missing(day.tmax_c) || missing(day.tmin_c) || missing(day.ppt_cm) {
            missing_count += 1;
        }
        if missing(day.tmax_c) {
            day.tmax_c = last.tmax_c;
        }
        if missing(day.tmin_c) {
            day.tmin_c = last.tmin_c;
        }
        if missing(day.ppt_cm) {
            day.ppt_cm = 0.0;
        }
        if missing(day.cloud_cover_pct) {
            day.cloud_cover_pct = last.cloud_cover_pct;
        }
        if missing(day.wind_speed_ms) {
            day.wind_speed_ms = last.wind_speed_ms;
        }
        if missing(day.rel_humidity_pct) {
            day.rel_humidity_pct = last.rel_humidity_pct;
        }
        if missing(day.shortwave_mj) {
            day.shortwave_mj = last.shortwave_mj;
        }
        if missing(day.actual_vp_kpa) {
            day.actual_vp_kpa = last.actual_vp_kpa;
        }
        last = *day;
    }
    if missing_count > max_missing {
        return Err(SoilwError::InvalidInput(format!(
            "{missing_count} missing days exceeds optLOCF_nMax={max_missing}"
        )));
    }
    Ok(())
}

/// Twelve months of additive/multiplicative scale parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonthlyScale {
    pub temp_additive_c: [f64; 12],
    pub ppt_multiplicative: [f64; 12],
    pub cloud_additive: [f64; 12],
    pub wind_multiplicative: [f64; 12],
    pub rh_additive: [f64; 12],
    pub actual_vp_multiplicative: [f64; 12],
    pub shortwave_multiplicative: [f64; 12],
}

fn month_of_doy_1based(doy: usize, is_leap: bool) -> usize {
    crate::climate::month_of_doy(doy as u32, is_leap)
}

/// Apply monthly scaling in place; recomputes nothing about PPT
/// bounds other than the documented clamps, and skips missing values.
pub fn apply_monthly_scaling(year: &mut WeatherYear, scale: &MonthlyScale) {
    let is_leap = year.days.len() == 366;
    for (i, day) in year.days.iter_mut().enumerate() {
        let m = month_of_doy_1based(i + 1, is_leap);
        if !missing(day.tmax_c) {
            day.tmax_c += scale.temp_additive_c[m];
        }
        if !missing(day.tmin_c) {
            day.tmin_c += scale.temp_additive_c[m];
        }
        if !missing(day.ppt_cm) {
            day.ppt_cm = (day.ppt_cm * scale.ppt_multiplicative[m]).max(0.0);
        }
        if !missing(day.cloud_cover_pct) {
            day.cloud_cover_pct = (day.cloud_cover_pct + scale.cloud_additive[m]).clamp(0.0, 100.0);
        }
        if !missing(day.wind_speed_ms) {
            day.wind_speed_ms = (day.wind_speed_ms * scale.wind_multiplicative[m]).max(0.0);
        }
        if !missing(day.rel_humidity_pct) {
            day.rel_humidity_pct =
                (day.rel_humidity_pct + scale.rh_additive[m]).clamp(0.0, 100.0);
        }
        if !missing(day.actual_vp_kpa) {
            day.actual_vp_kpa = (day.actual_vp_kpa * scale.actual_vp_multiplicative[m]).max(0.0);
        }
        if !missing(day.shortwave_mj) {
            day.shortwave_mj = (day.shortwave_mj * scale.shortwave_multiplicative[m]).max(0.0);
        }
    }
}

/// Per-day, per-field audit. Any violation is fatal; the
/// message identifies `(doy, field)`.
pub fn check_all_weather(year: &WeatherYear, year_label: i32) -> Result<(), SoilwError> {
    for (i, day) in year.days.iter().enumerate() {
        let doy = i + 1;
        let fail = |field: &str, detail: String| {
            SoilwError::InvalidInput(format!(
                "weather audit failed at year {year_label} doy {doy} field {field}: {detail}"
            ))
        };
        if !missing(day.tmin_c) && !missing(day.tmax_c) && day.tmin_c > day.tmax_c {
            return Err(fail("Tmin/Tmax", format!("{} > {}", day.tmin_c, day.tmax_c)));
        }
        for (field, v) in [("Tmin", day.tmin_c), ("Tmax", day.tmax_c)] {
            if !missing(v) && !(-100.0..=100.0).contains(&v) {
                return Err(fail(field, v.to_string()));
            }
        }
        if !missing(day.ppt_cm) && day.ppt_cm < 0.0 {
            return Err(fail("PPT", day.ppt_cm.to_string()));
        }
        if !missing(day.rel_humidity_pct) && !(0.0..=100.0).contains(&day.rel_humidity_pct) {
            return Err(fail("RH", day.rel_humidity_pct.to_string()));
        }
        if !missing(day.cloud_cover_pct) && !(0.0..=100.0).contains(&day.cloud_cover_pct) {
            return Err(fail("cloud", day.cloud_cover_pct.to_string()));
        }
        if !missing(day.wind_speed_ms) && day.wind_speed_ms < 0.0 {
            return Err(fail("wind", day.wind_speed_ms.to_string()));
        }
        if !missing(day.shortwave_mj) && day.shortwave_mj < 0.0 {
            return Err(fail("shortwave", day.shortwave_mj.to_string()));
        }
        if !missing(day.actual_vp_kpa) && day.actual_vp_kpa < 0.0 {
            return Err(fail("actual_vp", day.actual_vp_kpa.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn flags() -> DailyInputFlags {
        DailyInputFlags {
            tmax: true,
            tmin: true,
            ppt: true,
            cloud: false,
            wind_speed: false,
            wind_east: false,
            wind_north: false,
            rel_humidity: false,
            rh_max: false,
            rh_min: false,
            specific_humidity: false,
            dewpoint: false,
            actual_vp: false,
            shortwave: false,
        }
    }

    #[test]
    fn reads_well_formed_lines() {
        let data = "1 10.0 2.0 0.5\n2 12.0 3.0 0.0\n";
        let year = read_weather_year(Cursor::new(data), &flags(), "test.txt", 365).unwrap();
        assert_eq!(year.days[0].tmax_c, 10.0);
        assert_eq!(year.days[1].ppt_cm, 0.0);
    }

    #[test]
    fn rejects_out_of_range_doy() {
        let data = "400 10.0 2.0 0.5\n";
        let err = read_weather_year(Cursor::new(data), &flags(), "test.txt", 365).unwrap_err();
        assert!(matches!(err, SoilwError::MalformedInput { .. }));
    }

    #[test]
    fn audit_rejects_inverted_tmin_tmax() {
        let mut year = WeatherYear {
            days: vec![DailyWeather::missing(); 1],
        };
        year.days[0].tmin_c = 20.0;
        year.days[0].tmax_c = 10.0;
        assert!(check_all_weather(&year, 2001).is_err());
    }
}
