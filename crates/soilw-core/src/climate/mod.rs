//! Climate summarizer: per-year MAT/MAP and derived quantities
//! used by the vegetation estimator, plus long-term averages and the
//! C4/cheatgrass standard deviations.

use serde::{Deserialize, Serialize};

use crate::weather::WeatherYear;

/// Per-year climate summary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct YearClimate {
    pub mat_c: f64,
    pub map_cm: f64,
    pub monthly_mean_t: [f64; 12],
    pub monthly_max_t: [f64; 12],
    pub monthly_min_t: [f64; 12],
    pub monthly_ppt: [f64; 12],
    /// PPT and Tmin of the "7th month" (July in N hemisphere, January
    /// in S).
    pub month7_ppt_cm: f64,
    pub month7_tmin_c: f64,
    pub driest_quarter_mean_t: f64,
    pub degree_days_above_65f: f64,
    pub longest_frost_free_run: u32,
}

/// Long-term climate: the average of [`YearClimate`] across years,
/// plus standard deviations for the C4 trio (July Tmin, degree-days
/// above 65F, frost-free days) and the cheatgrass trio (MAT, MAP,
/// driest-quarter mean T).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LongTermClimate {
    pub mean: YearClimateMeans,
    pub c4_trio_sd: [f64; 3],
    pub cheatgrass_trio_sd: [f64; 3],
}

/// The subset of [`YearClimate`] that is meaningfully averaged
/// long-term (monthly arrays included).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct YearClimateMeans {
    pub mat_c: f64,
    pub map_cm: f64,
    pub monthly_mean_t: [f64; 12],
    pub monthly_ppt: [f64; 12],
    pub month7_ppt_cm: f64,
    pub month7_tmin_c: f64,
    pub driest_quarter_mean_t: f64,
    pub degree_days_above_65f: f64,
    pub longest_frost_free_run: f64,
}

const MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

pub(crate) fn month_of_doy(doy: u32, is_leap: bool) -> usize {
    let mut days = MONTH_DAYS;
    if is_leap {
        days[1] = 29;
    }
    let mut acc = 0u32;
    for (m, &d) in days.iter().enumerate() {
        acc += d;
        if doy <= acc {
            return m;
        }
    }
    11
}

/// Compute one year's climate summary from its daily weather record.
/// `in_north_hemisphere` governs which month is "the 7th month" and
/// how the driest quarter window is anchored.
pub fn calc_site_climate(year: &WeatherYear, in_north_hemisphere: bool) -> YearClimate {
    let is_leap = year.days.len() == 366;
    let mut monthly_sum_t = [0.0f64; 12];
    let mut monthly_count_t = [0u32; 12];
    let mut monthly_max_t = [f64::MIN; 12];
    let mut monthly_min_t = [f64::MAX; 12];
    let mut monthly_ppt = [0.0f64; 12];

    let mut frost_free_run = 0u32;
    let mut longest_frost_free_run = 0u32;
    let mut dd65 = 0.0f64;

    for (i, day) in year.days.iter().enumerate() {
        let doy = (i + 1) as u32;
        let m = month_of_doy(doy, is_leap);
        if !crate::numeric::missing(day.tavg_c()) {
            monthly_sum_t[m] += day.tavg_c();
            monthly_count_t[m] += 1;
        }
        if !crate::numeric::missing(day.tmax_c) {
            monthly_max_t[m] = monthly_max_t[m].max(day.tmax_c);
        }
        if !crate::numeric::missing(day.tmin_c) {
            monthly_min_t[m] = monthly_min_t[m].min(day.tmin_c);
        }
        if !crate::numeric::missing(day.ppt_cm) {
            monthly_ppt[m] += day.ppt_cm;
        }

        if !crate::numeric::missing(day.tmin_c) && day.tmin_c > 0.0 {
            frost_free_run += 1;
            longest_frost_free_run = longest_frost_free_run.max(frost_free_run);
        } else {
            frost_free_run = 0;
        }

        let tavg_f = day.tavg_c() * 9.0 / 5.0 + 32.0;
        if !crate::numeric::missing(day.tavg_c()) && tavg_f > 65.0 {
            dd65 += tavg_f - 65.0;
        }
    }

    let mut monthly_mean_t = [0.0; 12];
    for m in 0..12 {
        monthly_mean_t[m] = if monthly_count_t[m] > 0 {
            monthly_sum_t[m] / monthly_count_t[m] as f64
        } else {
            crate::numeric::SW_MISSING
        };
    }

    let mat_c = monthly_mean_t.iter().copied().filter(|v| !crate::numeric::missing(*v)).sum::<f64>() / 12.0;
    let map_cm: f64 = monthly_ppt.iter().sum();

    let month7 = if in_north_hemisphere { 6 } else { 0 };
    let month7_ppt_cm = monthly_ppt[month7];
    let month7_tmin_c = monthly_min_t[month7];

    let driest_quarter_mean_t = driest_quarter(&monthly_ppt, &monthly_mean_t, in_north_hemisphere);

    YearClimate {
        mat_c,
        map_cm,
        monthly_mean_t,
        monthly_max_t,
        monthly_min_t,
        monthly_ppt,
        month7_ppt_cm,
        month7_tmin_c,
        driest_quarter_mean_t,
        degree_days_above_65f: dd65,
        longest_frost_free_run,
    }
}

/// Mean temperature over the driest rolling 3-month window.
/// Calendar-year anchored in the north; shifted July-June in the
/// south.
fn driest_quarter(monthly_ppt: &[f64; 12], monthly_mean_t: &[f64; 12], in_north: bool) -> f64 {
    let offset = if in_north { 0 } else { 6 };
    let mut best_sum = f64::MAX;
    let mut best_mean_t = crate::numeric::SW_MISSING;
    for start in 0..12 {
        let idx = |k: usize| (start + k + offset) % 12;
        let sum: f64 = (0..3).map(|k| monthly_ppt[idx(k)]).sum();
        if sum < best_sum {
            best_sum = sum;
            let t_sum: f64 = (0..3).map(|k| monthly_mean_t[idx(k)]).sum();
            best_mean_t = t_sum / 3.0;
        }
    }
    best_mean_t
}

/// Average per-year summaries into a long-term climate, with
/// standard deviations for the C4 and cheatgrass trios.
pub fn average_climate_across_years(years: &[YearClimate]) -> LongTermClimate {
    let n = years.len().max(1) as f64;
    let sum = |f: fn(&YearClimate) -> f64| years.iter().map(f).sum::<f64>() / n;

    let mut monthly_mean_t = [0.0; 12];
    let mut monthly_ppt = [0.0; 12];
    for m in 0..12 {
        monthly_mean_t[m] = years.iter().map(|y| y.monthly_mean_t[m]).sum::<f64>() / n;
        monthly_ppt[m] = years.iter().map(|y| y.monthly_ppt[m]).sum::<f64>() / n;
    }

    let mean = YearClimateMeans {
        mat_c: sum(|y| y.mat_c),
        map_cm: sum(|y| y.map_cm),
        monthly_mean_t,
        monthly_ppt,
        month7_ppt_cm: sum(|y| y.month7_ppt_cm),
        month7_tmin_c: sum(|y| y.month7_tmin_c),
        driest_quarter_mean_t: sum(|y| y.driest_quarter_mean_t),
        degree_days_above_65f: sum(|y| y.degree_days_above_65f),
        longest_frost_free_run: sum(|y| y.longest_frost_free_run as f64),
    };

    let stddev = |values: Vec<f64>| -> f64 {
        let m = values.iter().sum::<f64>() / values.len().max(1) as f64;
        (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len().max(1) as f64).sqrt()
    };

    let c4_trio_sd = [
        stddev(years.iter().map(|y| y.month7_tmin_c).collect()),
        stddev(years.iter().map(|y| y.degree_days_above_65f).collect()),
        stddev(years.iter().map(|y| y.longest_frost_free_run as f64).collect()),
    ];
    let cheatgrass_trio_sd = [
        stddev(years.iter().map(|y| y.mat_c).collect()),
        stddev(years.iter().map(|y| y.map_cm).collect()),
        stddev(years.iter().map(|y| y.driest_quarter_mean_t).collect()),
    ];

    LongTermClimate {
        mean,
        c4_trio_sd,
        cheatgrass_trio_sd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::{DailyWeather, WeatherYear};

    fn flat_year(tmax: f64, tmin: f64, ppt: f64, n_days: usize) -> WeatherYear {
        WeatherYear {
            days: (0..n_days)
                .map(|_| DailyWeather {
                    tmax_c: tmax,
                    tmin_c: tmin,
                    ppt_cm: ppt,
                    ..DailyWeather::missing()
                })
                .collect(),
        }
    }

    #[test]
    fn flat_regime_gives_constant_monthly_means() {
        let year = flat_year(20.0, 10.0, 0.1, 365);
        let climate = calc_site_climate(&year, true);
        for t in climate.monthly_mean_t {
            assert!((t - 15.0).abs() < 1e-9);
        }
        assert!((climate.mat_c - 15.0).abs() < 1e-9);
    }

    #[test]
    fn mountain_regime_degree_days_positive_in_summer() {
        let year = flat_year(35.0, 20.0, 0.0, 365);
        let climate = calc_site_climate(&year, true);
        assert!(climate.degree_days_above_65f > 0.0);
    }
}
