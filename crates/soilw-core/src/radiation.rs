//! Solar geometry and radiation transposition, memoized per
//! day-of-year.
//!
//! Sunrise/sunset on a tilted surface is found by locating the roots
//! of the incidence-angle function `cos_theta(omega) = a + b cos(omega)
//! + c sin(omega)` (Allen et al. 2006's `a, b, c`) and then
//! numerically integrating `cos_theta` and `sin(beta)` over whichever
//! sub-intervals of the horizontal daylight window are actually lit.
//! This keeps the documented algorithm shape (declination ->
//! horizontal classification -> tilted root-finding -> two-period
//! detection -> integration) while replacing Allen's closed-form
//! `f1..f5` antiderivatives with Simpson's rule — see DESIGN.md for
//! why that trade was made.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Solar constant, MJ/m^2/day.
pub const G_SC: f64 = 118.1088;

/// Solar declination [rad] for day-of-year `doy` (1-based), peaking
/// at the published mean obliquity of the ecliptic.
pub fn declination(doy: u32) -> f64 {
    const OBLIQUITY_DEG: f64 = 23.43668;
    let angle = 2.0 * PI * (284.0 + doy as f64) / 365.0;
    (OBLIQUITY_DEG.to_radians()) * angle.sin()
}

/// Earth-sun distance correction `d^-2` (Spencer 1971).
pub fn inverse_rel_distance_squared(doy: u32) -> f64 {
    let a = 2.0 * PI * (doy as f64 - 1.0) / 365.0;
    1.000110 + 0.034221 * a.cos() + 0.001280 * a.sin() + 0.000719 * (2.0 * a).cos()
        + 0.000077 * (2.0 * a).sin()
}

/// Sun hour-angle markers and integrals for one DOY, for one fixed
/// (latitude, slope, aspect) configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SunAngles {
    /// 0 sun never sets, -2 sun never rises, 1 normal day, -1 the
    /// tilted surface is shaded the entire horizontal daylight window,
    /// 2 two disjoint periods of tilted sunshine per day.
    pub indicator: i32,
    pub neg_omega_s: f64,
    pub tilted_sunrise: Option<f64>,
    pub tilted_first_sunset: Option<f64>,
    pub tilted_second_sunrise: Option<f64>,
    pub tilted_sunset: Option<f64>,
    pub pos_omega_s: f64,
    /// `(horizontal, tilted)` daily integral of cos(theta).
    pub int_cos_theta: (f64, f64),
    /// `(horizontal, tilted)` daily integral of sin(beta).
    pub int_sin_beta: (f64, f64),
}

/// Simpson's rule over `[lo, hi]` with `n` (even) subdivisions.
fn simpson(f: impl Fn(f64) -> f64, lo: f64, hi: f64, n: usize) -> f64 {
    let n = if n % 2 == 0 { n } else { n + 1 };
    let h = (hi - lo) / n as f64;
    let mut sum = f(lo) + f(hi);
    for i in 1..n {
        let x = lo + i as f64 * h;
        sum += if i % 2 == 0 { 2.0 * f(x) } else { 4.0 * f(x) };
    }
    sum * h / 3.0
}

/// Compute sun-hour-angle markers and integrals for `doy` at a fixed
/// site configuration. `slope_rad` in `[0, pi/2]`; `aspect_rad` is
/// `None` for a horizontal surface.
pub fn sun_hourangles(doy: u32, lat_rad: f64, slope_rad: f64, aspect_rad: Option<f64>) -> SunAngles {
    let delta = declination(doy);
    let g = delta.sin() * lat_rad.sin();
    let h = delta.cos() * lat_rad.cos();
    let tanprod = lat_rad.tan() * delta.tan();

    let (indicator_h, omega_s_h) = if tanprod <= -1.0 {
        (0, PI)
    } else if tanprod >= 1.0 {
        (-2, 0.0)
    } else {
        (1, (-tanprod).clamp(-1.0, 1.0).acos())
    };

    let horiz_integrand = |omega: f64| g + h * omega.cos();
    let int_cos_theta_h = 2.0 * (g * omega_s_h + h * omega_s_h.sin());
    let int_sin_beta_h = int_cos_theta_h;

    let slope_is_flat = slope_rad <= 1e-9 || aspect_rad.is_none();
    if slope_is_flat {
        return SunAngles {
            indicator: indicator_h,
            neg_omega_s: -omega_s_h,
            tilted_sunrise: Some(-omega_s_h),
            tilted_first_sunset: None,
            tilted_second_sunrise: None,
            tilted_sunset: Some(omega_s_h),
            pos_omega_s: omega_s_h,
            int_cos_theta: (int_cos_theta_h, int_cos_theta_h),
            int_sin_beta: (int_sin_beta_h, int_sin_beta_h),
        };
    }

    let gamma = aspect_rad.unwrap();
    const TOL: f64 = 1e-9;

    // Allen et al. 2006, eqs. 11-13: incidence angle on the tilted
    // surface as a function of hour angle, cos_theta(w) = -a + b cos w
    // + c sin w.
    let a = delta.sin() * (lat_rad.cos() * slope_rad.sin() * gamma.cos() - lat_rad.sin() * slope_rad.cos());
    let b = delta.cos() * (lat_rad.sin() * slope_rad.sin() * gamma.cos() + lat_rad.cos() * slope_rad.cos());
    let c = delta.cos() * slope_rad.sin() * gamma.sin();
    let cos_theta = |w: f64| -a + b * w.cos() + c * w.sin();
    let tilt_integrand = cos_theta;

    let horiz_sunrise = -omega_s_h;
    let horiz_sunset = omega_s_h;
    let cos_theta_sunrise = cos_theta(horiz_sunrise);
    let cos_theta_sunset = cos_theta(horiz_sunset);

    let tmp3 = b * b + c * c;
    let tmp = (tmp3 - a * a).max(TOL).sqrt();
    let tmp1 = a * c;
    let tmp2 = b * tmp;
    let omega1 = ((tmp1 - tmp2) / tmp3).clamp(-1.0 + TOL, 1.0 - TOL).asin();
    let omega2 = ((tmp1 + tmp2) / tmp3).clamp(-1.0 + TOL, 1.0 - TOL).asin();
    let cos_theta1 = cos_theta(omega1);
    let cos_theta2 = cos_theta(omega2);

    // Step B: beginning integration limit (tilted sunrise).
    let mut sunrise_t = if (cos_theta_sunrise < cos_theta1 || (cos_theta_sunrise - cos_theta1).abs() <= TOL)
        && cos_theta1 < TOL
    {
        omega1
    } else {
        let omega1x = -PI - omega1;
        let cos_theta1x = cos_theta(omega1x);
        if cos_theta1x > TOL
            || (cos_theta1x <= TOL && (omega1x < horiz_sunrise || (omega1x - horiz_sunrise).abs() <= TOL))
        {
            horiz_sunrise
        } else {
            omega1x
        }
    };
    if sunrise_t < horiz_sunrise {
        sunrise_t = horiz_sunrise;
    }

    // Step C: ending integration limit (tilted sunset).
    let mut sunset_t = if (cos_theta_sunset < cos_theta2 || (cos_theta_sunset - cos_theta2).abs() <= TOL)
        && cos_theta2 < TOL
    {
        omega2
    } else {
        let omega2x = PI - omega2;
        let cos_theta2x = cos_theta(omega2x);
        if cos_theta2x > TOL
            || (cos_theta2x <= TOL && (omega2x > horiz_sunset || (omega2x - horiz_sunset).abs() <= TOL))
        {
            horiz_sunset
        } else {
            omega2x
        }
    };
    if sunset_t > horiz_sunset {
        sunset_t = horiz_sunset;
    }

    // Step D: always-shaded slopes, and the two-period-sunshine gate
    // (Allen et al. 2006, eq. 7) plus its confirming sign test (eq. 50).
    let (indicator, tilted_sunrise, tilted_first_sunset, tilted_second_sunrise, tilted_sunset);
    if sunrise_t >= sunset_t {
        indicator = -1;
        tilted_sunrise = None;
        tilted_first_sunset = None;
        tilted_second_sunrise = None;
        tilted_sunset = None;
        sunrise_t = 0.0;
        sunset_t = 0.0;
    } else {
        let mut two_period = None;
        if slope_rad.sin() > (lat_rad.sin() * delta.cos() + lat_rad.cos() * delta.sin()).abs() {
            let mut omega2b = omega1.min(omega2);
            let mut omega1b = omega1.max(omega2);
            let cos_theta1b = cos_theta(omega1b);
            let cos_theta2b = cos_theta(omega2b);
            if cos_theta1b.abs() > TOL {
                omega1b = PI - omega1b;
            }
            if cos_theta2b.abs() > TOL {
                omega2b = -PI - omega2b;
            }
            if (omega2b > sunrise_t || (omega2b - sunrise_t).abs() <= TOL)
                && (omega1b < sunset_t || (omega1b - sunset_t).abs() <= TOL)
            {
                let x = -a * (omega1b - omega2b) + b * (omega1b.sin() - omega2b.sin())
                    - c * (omega1b.cos() - omega2b.cos());
                if x < 0.0 {
                    two_period = Some((omega2b, omega1b));
                }
            }
        }
        match two_period {
            Some((first_sunset, second_sunrise)) => {
                indicator = 2;
                tilted_sunrise = Some(sunrise_t);
                tilted_first_sunset = Some(first_sunset);
                tilted_second_sunrise = Some(second_sunrise);
                tilted_sunset = Some(sunset_t);
            }
            None => {
                indicator = indicator_h;
                tilted_sunrise = Some(sunrise_t);
                tilted_first_sunset = None;
                tilted_second_sunrise = None;
                tilted_sunset = Some(sunset_t);
            }
        }
    }

    let lit_intervals: Vec<(f64, f64)> = match (tilted_sunrise, tilted_first_sunset, tilted_second_sunrise, tilted_sunset)
    {
        (Some(sr), Some(fs), Some(ss), Some(se)) => vec![(sr, fs), (ss, se)],
        (Some(sr), None, None, Some(se)) => vec![(sr, se)],
        _ => Vec::new(),
    };

    let int_cos_theta_t: f64 = lit_intervals
        .iter()
        .map(|&(lo, hi)| simpson(tilt_integrand, lo, hi, 32))
        .sum();
    let int_sin_beta_t: f64 = lit_intervals
        .iter()
        .map(|&(lo, hi)| simpson(horiz_integrand, lo, hi, 32))
        .sum();

    SunAngles {
        indicator,
        neg_omega_s: -omega_s_h,
        tilted_sunrise,
        tilted_first_sunset,
        tilted_second_sunrise,
        tilted_sunset,
        pos_omega_s: omega_s_h,
        int_cos_theta: (int_cos_theta_h, int_cos_theta_t),
        int_sin_beta: (int_sin_beta_h, int_sin_beta_t),
    }
}

/// Per-site cache of [`SunAngles`] keyed by DOY, valid only while
/// (latitude, slope, aspect) stay fixed. `reset` on any configuration
/// change.
#[derive(Debug, Clone)]
pub struct RadiationMemo {
    entries: Vec<Option<SunAngles>>,
    lat_rad: f64,
    slope_rad: f64,
    aspect_rad: Option<f64>,
}

impl RadiationMemo {
    pub fn new(lat_rad: f64, slope_rad: f64, aspect_rad: Option<f64>) -> Self {
        RadiationMemo {
            entries: vec![None; 366],
            lat_rad,
            slope_rad,
            aspect_rad,
        }
    }

    /// Invalidate the memo for a new (latitude, slope, aspect)
    /// configuration, per the concurrency model's ordering
    /// requirement.
    pub fn reset(&mut self, lat_rad: f64, slope_rad: f64, aspect_rad: Option<f64>) {
        self.entries.iter_mut().for_each(|e| *e = None);
        self.lat_rad = lat_rad;
        self.slope_rad = slope_rad;
        self.aspect_rad = aspect_rad;
    }

    /// Fetch (computing and caching on first access) the sun-angle
    /// markers for `doy` (1-based).
    pub fn get(&mut self, doy: u32) -> &SunAngles {
        let idx = (doy - 1) as usize;
        if self.entries[idx].is_none() {
            self.entries[idx] = Some(sun_hourangles(
                doy,
                self.lat_rad,
                self.slope_rad,
                self.aspect_rad,
            ));
        }
        self.entries[idx].as_ref().unwrap()
    }
}

/// Extraterrestrial irradiation `(horizontal, tilted)` [MJ/m^2], from
/// a [`SunAngles`]'s `int_cos_theta`.
pub fn extraterrestrial_irradiation(doy: u32, angles: &SunAngles) -> (f64, f64) {
    let d2 = inverse_rel_distance_squared(doy);
    (
        G_SC * d2 * angles.int_cos_theta.0,
        G_SC * d2 * angles.int_cos_theta.1,
    )
}

/// Atmospheric pressure [kPa] from elevation [m] (Allen et al.).
pub fn atmospheric_pressure_kpa(elevation_m: f64) -> f64 {
    101.3 * ((293.0 - 0.0065 * elevation_m) / 293.0).powf(5.26)
}

/// All-sky horizontal/tilted transposition. Returns
/// `(H_gt, H_oh, H_ot, H_gh)` in MJ/m^2.
#[allow(clippy::too_many_arguments)]
pub fn transpose_to_tilted(
    doy: u32,
    angles: &SunAngles,
    elevation_m: f64,
    albedo: f64,
    cloud_cover_frac: Option<f64>,
    actual_vp_kpa: f64,
    observed_h_gh_mj: Option<f64>,
) -> (f64, f64, f64, f64) {
    let (h_oh, h_ot) = extraterrestrial_irradiation(doy, angles);
    let p = atmospheric_pressure_kpa(elevation_m);

    // Clear-sky direct-beam index (Majumdar-style, turbidity = 1).
    let sinbeta_h = (angles.int_sin_beta.0 / (2.0 * angles.pos_omega_s.max(1e-9))).max(1e-6);
    let w = 2.1 + 0.14 * actual_vp_kpa * p;
    let k_t = 1.0;
    let k_b = (0.98
        * (-0.00146 * p / (k_t * sinbeta_h) - 0.075 * (w / sinbeta_h).powf(0.4)).exp())
    .clamp(0.0, 1.0);
    let k_d = if k_b >= 0.15 {
        0.35 - 0.36 * k_b
    } else {
        0.18 + 0.82 * k_b
    }
    .clamp(0.0, 1.0);

    let k_c = match cloud_cover_frac {
        Some(cc) => (1.0 - 0.75 * cc.clamp(0.0, 1.0)).clamp(0.0, 1.0),
        None => match observed_h_gh_mj {
            Some(h_gh_obs) if h_oh > 0.0 => {
                (h_gh_obs / ((k_b + k_d) * h_oh)).clamp(0.0, 1.0)
            }
            _ => 1.0,
        },
    };

    let h_gh = (k_b + k_d) * k_c * h_oh;

    let k_bt = k_b; // clear-sky beam index is orientation-independent; applied to H_ot.
    let h_direct_t = k_bt * k_c * h_ot;

    let k_bh = k_b;
    let k_dh = k_d;
    let f_i = if angles.pos_omega_s > 1e-9 { 1.0 } else { 0.0 };
    let half_slope = (angles.tilted_sunset.unwrap_or(angles.pos_omega_s)
        - angles.tilted_sunrise.unwrap_or(-angles.pos_omega_s))
        .abs()
        / 2.0;
    let f_b = (half_slope).sin().powi(3).abs();
    let f_ia = f_i * (1.0 - k_bh) * (1.0 + (k_bh / (k_bh + k_dh).max(1e-9)).sqrt() * half_slope.sin().powi(3))
        + f_b * k_bh;
    let h_diffuse_t = f_ia * k_d * k_c * h_oh;

    let h_rt = albedo * (1.0 - f_i) * h_gh;

    let h_gt = h_direct_t + h_diffuse_t + h_rt;

    (h_gt, h_oh, h_ot, h_gh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn declination_peaks_at_obliquity() {
        let mut max_abs = 0.0f64;
        for doy in 1..=366 {
            max_abs = max_abs.max(declination(doy).to_degrees().abs());
        }
        assert_abs_diff_eq!(max_abs, 23.43668, epsilon = 1e-6);
    }

    #[test]
    fn equator_daylength_is_twelve_hours_every_doy() {
        for doy in [1, 80, 172, 266, 355] {
            let angles = sun_hourangles(doy, 0.0, 0.0, None);
            assert_abs_diff_eq!(angles.pos_omega_s, PI / 2.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn equinox_daylength_is_twelve_hours_at_any_latitude() {
        // declination(81) == 0 exactly: 284 + 81 = 365.
        for lat_deg in [-80.0, -30.0, 0.0, 45.0, 80.0] {
            let angles = sun_hourangles(81, lat_deg.to_radians(), 0.0, None);
            assert_abs_diff_eq!(angles.pos_omega_s, PI / 2.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn relative_distance_in_documented_bounds() {
        for doy in 1..=366 {
            let d2 = inverse_rel_distance_squared(doy);
            assert!(d2 >= 0.98329 - 1e-3 && d2 <= 1.01671 + 1e-3);
        }
    }

    #[test]
    fn radiation_memo_is_pure_function_of_doy() {
        let mut memo = RadiationMemo::new(43f64.to_radians(), 60f64.to_radians(), Some(0.0));
        let first = *memo.get(162);
        let second = *memo.get(162);
        assert_eq!(first.int_cos_theta, second.int_cos_theta);
        assert_eq!(first.pos_omega_s, second.pos_omega_s);
    }

    #[test]
    fn two_period_day_detected_south_hemisphere_north_facing_steep_slope() {
        // Scenario 5: lat=-45, slope=90, aspect=0, DOY=172.
        let angles = sun_hourangles(172, (-45f64).to_radians(), 90f64.to_radians(), Some(0.0));
        assert_eq!(angles.indicator, 2);
        assert!(angles.tilted_sunrise.is_some());
        assert!(angles.tilted_second_sunrise.is_some());
        assert!(angles.int_cos_theta.1 < angles.int_cos_theta.0);
    }
}
