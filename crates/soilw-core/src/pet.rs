//! Penman potential evapotranspiration (`petfunc`), built on
//! top of the [`radiation`](crate::radiation) transposition.

use crate::radiation::atmospheric_pressure_kpa;

const STEFAN_BOLTZMANN: f64 = 4.903e-9; // MJ m^-2 K^-4 day^-1
const LATENT_HEAT_CONV: f64 = 0.408; // MJ m^-2 day^-1 -> mm/day equivalent evaporation
const METERS_PER_MILE: f64 = 1609.34;

/// Saturation vapor pressure [kPa] (Huang 2018's two-branch fit,
/// more accurate than Tetens across the full biological range).
pub fn saturation_vapor_pressure_kpa(t_c: f64) -> f64 {
    let es_pa = if t_c > 0.0 {
        (34.494 - 4924.99 / (t_c + 237.1)).exp() / (t_c + 105.0).powf(1.57)
    } else {
        (43.494 - 6545.8 / (t_c + 278.0)).exp() / (t_c + 868.0).powi(2)
    };
    es_pa / 1000.0
}

/// Slope of the saturation vapor pressure curve [kPa/°C] at `t_c`, by
/// central difference (avoids hand-differentiating the Huang fit).
pub fn svp_slope_kpa_per_c(t_c: f64) -> f64 {
    let eps = 0.01;
    (saturation_vapor_pressure_kpa(t_c + eps) - saturation_vapor_pressure_kpa(t_c - eps)) / (2.0 * eps)
}

/// Psychrometric constant [kPa/°C] from elevation.
pub fn psychrometric_constant(elevation_m: f64) -> f64 {
    0.000665 * atmospheric_pressure_kpa(elevation_m)
}

/// Penman PET in cm/day. `h_g_mj` is the site-appropriate (tilted)
/// global radiation from [`crate::radiation::transpose_to_tilted`];
/// `rh_pct` is mean relative humidity; `wind_m_s` is wind speed;
/// `cloud_cover_frac` is `[0,1]`.
#[allow(clippy::too_many_arguments)]
pub fn petfunc(
    h_g_mj: f64,
    avg_temp_c: f64,
    elevation_m: f64,
    albedo: f64,
    rh_pct: f64,
    wind_m_s: f64,
    cloud_cover_frac: f64,
) -> f64 {
    let e_a = saturation_vapor_pressure_kpa(avg_temp_c);
    let e_d = (rh_pct / 100.0).clamp(0.0, 1.0) * e_a;
    let delta = svp_slope_kpa_per_c(avg_temp_c);
    let gamma = psychrometric_constant(elevation_m);

    let wind_miles_per_day = wind_m_s * 86400.0 / METERS_PER_MILE;
    let ea_term = 0.35 * (e_a - e_d) * (1.0 + 0.0098 * wind_miles_per_day);

    let clr = (1.0 - cloud_cover_frac.clamp(0.0, 1.0)).clamp(0.0, 1.0);
    let rbb = STEFAN_BOLTZMANN * (avg_temp_c + 273.16).powi(4);
    let rn = (1.0 - albedo) * h_g_mj - rbb * (0.56 - 0.092 * e_d.max(0.0).sqrt()) * (0.10 + 0.90 * clr);

    let pet_mm = (delta * LATENT_HEAT_CONV * rn + gamma * ea_term) / (delta + gamma);
    (0.1 * pet_mm).max(0.01)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radiation::{sun_hourangles, transpose_to_tilted};

    #[test]
    fn svp_increases_with_temperature() {
        assert!(saturation_vapor_pressure_kpa(30.0) > saturation_vapor_pressure_kpa(10.0));
        assert!(saturation_vapor_pressure_kpa(0.0) > saturation_vapor_pressure_kpa(-10.0));
    }

    #[test]
    fn svp_is_continuous_across_zero() {
        let just_above = saturation_vapor_pressure_kpa(0.001);
        let just_below = saturation_vapor_pressure_kpa(-0.001);
        assert!((just_above - just_below).abs() < 1e-3);
    }

    #[test]
    fn pet_is_finite_and_nonnegative_over_boundary_grid() {
        for &t in &[-40.0, -10.0, 20.0, 60.0] {
            for &rh in &[0.0, 50.0, 100.0] {
                for &wind in &[0.0, 10.0, 20.0] {
                    for &cloud in &[0.0, 0.5, 1.0] {
                        let pet = petfunc(15.0, t, 200.0, 0.2, rh, wind, cloud);
                        assert!(pet.is_finite() && pet >= 0.01, "pet={pet} t={t} rh={rh}");
                    }
                }
            }
        }
    }

    #[test]
    fn madison_wi_scenario_is_in_documented_range() {
        let lat = 43f64.to_radians();
        let slope = 60f64.to_radians();
        let angles = sun_hourangles(162, lat, slope, Some(0.0));
        let (h_gt, h_oh, _h_ot, h_gh) =
            transpose_to_tilted(162, &angles, 226.0, 0.2, Some(0.4), 1.5, None);
        assert!(h_oh > 0.0);
        assert!((h_gh - 23.0).abs() < 1.25, "h_gh={h_gh}");
        assert!((h_gt - 16.5).abs() < 1.25, "h_gt={h_gt}");

        let pet = petfunc(h_gt, 20.0, 226.0, 0.2, 65.0, 2.0, 0.4);
        assert!((pet - 0.13).abs() < 0.005, "pet={pet}");
    }
}
