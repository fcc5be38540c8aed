//! The top-level per-site orchestrator: one [`Run`] owns everything a
//! simulation touches, so nothing crosses the API boundary implicitly.

use crate::error::{RunLog, SoilwError};
use crate::flow::{self, DayState, WaterBalanceCounters};
use crate::numeric::missing;
use crate::output::{OutputAccumulator, OutputRow, Period};
use crate::pet::petfunc;
use crate::radiation::{transpose_to_tilted, RadiationMemo};
use crate::rng::Pcg32;
use crate::site::{Site, VegComposition};
use crate::weather::markov::{generate_day, MarkovTables};
use crate::weather::{DailyWeather, WeatherYear};

/// Bare-soil albedo used when blending with canopy albedo to drive
/// radiation transposition. The per-veg albedos live on
/// [`VegComposition`]; bare ground carries no per-site override in
/// the data model, so a single documented constant stands in for it.
const BARE_SOIL_ALBEDO: f64 = 0.1;

/// One simulator instance: site, vegetation, radiation memo, the
/// weather-generator RNG role, running day state, the water-balance
/// audit counters, error/warning log, and output accumulators.
#[derive(Debug, Clone)]
pub struct Run {
    pub site: Site,
    pub veg: VegComposition,
    pub radiation_memo: RadiationMemo,
    pub weather_rng: Pcg32,
    pub log: RunLog,
    pub day_state: DayState,
    pub counters: WaterBalanceCounters,
    pub daily_output: OutputAccumulator,
    pub in_north_hemisphere: bool,
}

impl Run {
    pub fn new(site: Site, veg: VegComposition, in_north_hemisphere: bool, weather_seed: (u64, u64)) -> Run {
        let lat_rad = site.latitude_deg.to_radians();
        let slope_rad = site.slope_deg.to_radians();
        let aspect_rad = site.aspect_deg.map(|a| a.to_radians());
        let day_state = DayState::from_site(&site);
        Run {
            radiation_memo: RadiationMemo::new(lat_rad, slope_rad, aspect_rad),
            weather_rng: Pcg32::new(weather_seed.0, weather_seed.1),
            log: RunLog::new(),
            day_state,
            counters: WaterBalanceCounters::default(),
            daily_output: OutputAccumulator::new(Period::Day),
            site,
            veg,
            in_north_hemisphere,
        }
    }

    /// Recompute the radiation memo for a new (latitude, slope,
    /// aspect); must be called before simulating any day under a
    /// changed site geometry.
    pub fn reset_radiation_for_current_site(&mut self) {
        let lat_rad = self.site.latitude_deg.to_radians();
        let slope_rad = self.site.slope_deg.to_radians();
        let aspect_rad = self.site.aspect_deg.map(|a| a.to_radians());
        self.radiation_memo.reset(lat_rad, slope_rad, aspect_rad);
    }

    fn weighted_albedo(&self) -> f64 {
        let veg_albedo: f64 = self
            .veg
            .cover
            .iter()
            .zip(self.veg.albedo.iter())
            .map(|(c, a)| c * a)
            .sum();
        veg_albedo + self.veg.cover_bare * BARE_SOIL_ALBEDO
    }

    /// Simulate one year's worth of already-ingested, imputed,
    /// scaled, and audited daily weather (ingestion and validation are
    /// the caller's responsibility before this is invoked).
    pub fn simulate_year(&mut self, year: i32, weather: &WeatherYear) -> Result<(), SoilwError> {
        for (i, day) in weather.days.iter().enumerate() {
            if self.log.stop_run() {
                break;
            }
            let doy = (i + 1) as u32;
            self.simulate_day(year, doy, day)?;
        }
        Ok(())
    }

    fn simulate_day(&mut self, year: i32, doy: u32, weather: &DailyWeather) -> Result<(), SoilwError> {
        let angles = *self.radiation_memo.get(doy);
        let albedo = self.weighted_albedo();
        let cloud_frac = if missing(weather.cloud_cover_pct) {
            None
        } else {
            Some(weather.cloud_cover_pct / 100.0)
        };
        let actual_vp = if missing(weather.actual_vp_kpa) {
            0.0
        } else {
            weather.actual_vp_kpa
        };
        let observed_h_gh = if cloud_frac.is_none() && !missing(weather.shortwave_mj) {
            Some(weather.shortwave_mj)
        } else {
            None
        };
        let (h_gt, _h_oh, _h_ot, h_gh) = transpose_to_tilted(
            doy,
            &angles,
            self.site.elevation_m,
            albedo,
            cloud_frac,
            actual_vp,
            observed_h_gh,
        );

        let pet_cm = petfunc(
            h_gt,
            weather.tavg_c(),
            self.site.elevation_m,
            albedo,
            weather.rel_humidity_pct,
            weather.wind_speed_ms,
            cloud_frac.unwrap_or(0.0),
        );

        let outputs = flow::simulate_day(
            &mut self.site,
            &self.veg,
            weather.tmax_c,
            weather.tmin_c,
            weather.ppt_cm,
            pet_cm,
            doy,
            &mut self.day_state,
            &mut self.counters,
            &mut self.log,
        )?;

        let aet = outputs.bare_soil_evap_cm + outputs.transpiration_cm.iter().sum::<f64>();
        self.daily_output.push_row(OutputRow {
            year,
            doy_or_week_or_month: Some(doy),
            columns: vec![
                ("PET_cm".to_string(), pet_cm),
                ("H_gh_MJ".to_string(), h_gh),
                ("H_gt_MJ".to_string(), h_gt),
                ("AET_cm".to_string(), aet),
                ("Runoff_cm".to_string(), outputs.runoff_cm),
                ("DeepDrainage_cm".to_string(), outputs.deep_drainage_cm),
                ("Snowmelt_cm".to_string(), outputs.snowmelt_cm),
                ("SnowLoss_cm".to_string(), outputs.snowloss_cm),
                ("Snowpack_cm".to_string(), self.day_state.snow.snowpack_cm),
            ],
            layer_columns: vec![("SWC_cm".to_string(), self.day_state.swc.clone())],
        });

        Ok(())
    }

    /// Generate one year of weather from the Markov tables using this
    /// run's dedicated weather-generator RNG role: one independent
    /// `Pcg32` instance per stochastic role, never shared.
    pub fn generate_weather_year(
        &mut self,
        tables: &MarkovTables,
        n_days: usize,
        start_wet: bool,
    ) -> Result<WeatherYear, SoilwError> {
        let mut days = Vec::with_capacity(n_days);
        let mut wet = start_wet;
        for doy in 1..=n_days {
            let generated = generate_day(tables, doy, wet, &mut self.weather_rng)?;
            wet = generated.ppt_cm > 0.0;
            days.push(DailyWeather {
                tmax_c: generated.tmax_c,
                tmin_c: generated.tmin_c,
                ppt_cm: generated.ppt_cm,
                ..DailyWeather::missing()
            });
        }
        Ok(WeatherYear { days })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptf;
    use crate::site::{Layer, SwcMinPolicy};

    fn sample_run() -> Run {
        let swrc = ptf::cosby1984_for_campbell(0.4, 0.2);
        let layer = Layer {
            width_cm: 20.0,
            gravel: 0.0,
            bulk_density: 0.0,
            matric_density: 1.4,
            sand: 0.4,
            clay: 0.2,
            impermeability: 0.0,
            evap_coeff: 1.0,
            transp_coeff: [0.0, 0.0, 0.0, 1.0],
            swrc,
            swc_sat: 0.0,
            swc_fc: 0.0,
            swc_wp: 0.0,
            swc_halfwp: 0.0,
            swc_min: 0.0,
            swc_wet: 0.0,
            swc_init: 0.0,
            swc_at_swpcrit: [0.0; 4],
            swc_today: 0.0,
        };
        let mut log = RunLog::new();
        let critical_swp_bar = [25.0, 30.0, 20.0, 15.0];
        let mut site = Site::initialize(
            vec![layer],
            SwcMinPolicy::Estimate { legacy: true },
            false,
            &[],
            &critical_swp_bar,
            &mut log,
        )
        .unwrap();
        site.latitude_deg = 43.0;
        site.slope_deg = 0.0;
        let veg = VegComposition {
            cover: [0.0, 0.0, 0.0, 0.5],
            cover_bare: 0.5,
            albedo: [0.15; 4],
            monthly_biomass: [[0.0; 12]; 4],
            monthly_litter: [[0.0; 12]; 4],
            monthly_pct_live: [[0.0; 12]; 4],
            monthly_lai_conv: [[0.0; 12]; 4],
            critical_swp_bar,
            max_cond_root: [1.0; 4],
            hydred_psi50: [-2.0; 4],
            hydred_shape: [5.0; 4],
        };
        Run::new(site, veg, true, (7, 1))
    }

    #[test]
    fn simulate_year_runs_without_stopping_and_fills_daily_output() {
        let mut run = sample_run();
        let weather = WeatherYear {
            days: (0..365)
                .map(|_| DailyWeather {
                    tmax_c: 22.0,
                    tmin_c: 10.0,
                    ppt_cm: 0.1,
                    rel_humidity_pct: 60.0,
                    wind_speed_ms: 2.0,
                    ..DailyWeather::missing()
                })
                .collect(),
        };
        run.simulate_year(1980, &weather).unwrap();
        assert!(!run.log.stop_run());
        assert_eq!(run.daily_output.rows.len(), 365);
        assert_eq!(run.counters.aet_exceeds_pet, 0);
    }

    #[test]
    fn generated_weather_is_reproducible_for_fixed_seed() {
        let tables = crate::weather::markov::MarkovTables {
            prob_by_doy: vec![
                crate::weather::markov::PrecipProbRow {
                    wetprob: 0.4,
                    dryprob: 0.1,
                    avg_ppt_cm: 0.5,
                    std_ppt_cm: 0.2,
                };
                366
            ],
            cov_by_week: vec![
                crate::weather::markov::WeekCovRow {
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
                53
            ],
        };
        let mut run_a = sample_run();
        let mut run_b = sample_run();
        let year_a = run_a.generate_weather_year(&tables, 18, false).unwrap();
        let year_b = run_b.generate_weather_year(&tables, 18, false).unwrap();
        for (a, b) in year_a.days.iter().zip(year_b.days.iter()) {
            assert_eq!(a.tmax_c, b.tmax_c);
            assert_eq!(a.ppt_cm, b.ppt_cm);
        }
    }
}
