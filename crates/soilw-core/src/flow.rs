//! Daily flow controller: snow, infiltration/percolation, ET,
//! hydraulic redistribution, soil temperature, and the water-balance
//! audit counters.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{RunLog, SoilwError};
use crate::numeric::{ge, le};
use crate::site::{Site, VegComposition, ALL_VEG_TYPES, MAX_ST_RGR};
use crate::swrc;

/// Snowpack state carried from one day to the next.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SnowState {
    pub snowpack_cm: f64,
    pub snow_temp_c: f64,
}

/// Per-layer and whole-profile state carried across days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayState {
    pub swc: Vec<f64>,
    pub snow: SnowState,
    pub soil_temp_profile: Vec<f64>,
}

impl DayState {
    pub fn from_site(site: &Site) -> Self {
        let swc = site.layers.iter().map(|l| l.swc_init).collect();
        let n_rgr = soil_temp_regression_layers(site);
        DayState {
            swc,
            snow: SnowState::default(),
            soil_temp_profile: vec![site.soil_temp.t_const; n_rgr],
        }
    }
}

fn soil_temp_regression_layers(site: &Site) -> usize {
    let n = (site.soil_temp.max_depth / site.soil_temp.delta_x.max(1e-9)) as usize;
    n.saturating_sub(1)
}

/// Tolerance for the mass-conservation identities below. Distinct
/// from `swc_bounds_violation`'s `eq`-based tolerance because these
/// compare sums of several independently-computed terms, where
/// floating-point error accumulates across more additions.
const BALANCE_TOL: f64 = 1e-8;

/// The ten named water-balance audit counters. Each
/// increments once per day a check is violated; none are fatal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WaterBalanceCounters {
    /// #0: AET > PET.
    pub aet_exceeds_pet: u32,
    /// #1: AET != an independently-measured ΣΔswc across the
    /// evaporation/transpiration pass.
    pub aet_component_mismatch: u32,
    /// #2: Etot (bare-soil evap + transpiration + snow sublimation)
    /// != the whole-system mass-balance residual for the day
    /// (Eponded and Elitter are not modeled and are taken as zero).
    pub etot_mismatch: u32,
    /// #3: water retained in the profile during infiltration/
    /// percolation != infiltration_in − runoff − deep_drainage.
    pub infiltration_mismatch: u32,
    /// #4: ΣT + Esoil != inf - (deepDrainage + ΣΔswc).
    pub profile_balance_mismatch: u32,
    /// #5: snowpack/snowmelt/snowloss mass conservation violated.
    pub snow_mass_mismatch: u32,
    /// #6: bare-soil evaporation or transpiration coefficients no
    /// longer summed to 1 ± 1e-4 (should only trip on a corrupted
    /// `Site`).
    pub coefficient_drift: u32,
    /// #7: per-layer Δswc = perc_in + hydred − perc_out − T − E_soil
    /// violated beyond tolerance for at least one layer.
    pub layer_balance_mismatch: u32,
    /// #8: swc_min ≤ swc ≤ swc_sat violated for some layer.
    pub swc_bounds_violation: u32,
    /// #9: non-fatal note — reserved for distinguishing an
    /// observed-weather day's audit slack from a generator-fallback
    /// day's. Nothing upstream of this controller yet threads a
    /// weather-provenance flag down to it, so this counter stays at
    /// zero until that plumbing exists; see DESIGN.md.
    pub observed_weather_slack: u32,
}

/// Everything the controller produced for one day, in addition to the
/// mutated [`DayState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayOutputs {
    pub snowmelt_cm: f64,
    pub snowloss_cm: f64,
    pub runoff_cm: f64,
    pub runon_cm: f64,
    pub deep_drainage_cm: f64,
    pub transpiration_cm: [f64; 4],
    pub bare_soil_evap_cm: f64,
    pub hydred_cm: Vec<f64>,
}

fn sinusoidal_rmelt(doy: u32, rmelt_min: f64, rmelt_max: f64) -> f64 {
    let phase = 2.0 * PI * (doy as f64 - 1.0) / 365.0 - PI / 2.0;
    rmelt_min + (rmelt_max - rmelt_min) * (0.5 + 0.5 * phase.sin())
}

struct SnowResult {
    rain_cm: f64,
    melt_cm: f64,
    loss_cm: f64,
}

/// Per-layer inflow/outflow during infiltration and percolation, for
/// the infiltration and per-layer water-balance identities. `perc_out`
/// for the bottom layer carries whatever leaves the profile there,
/// whether or not it is credited to `deep_drainage` (see
/// `infiltrate_and_percolate`'s doc comment); runoff lost from the top
/// layer is folded into `perc_out[0]` so that, for every layer,
/// `perc_in[i] - perc_out[i]` is exactly that layer's net percolation
/// flux.
struct PercolationFlux {
    perc_in: Vec<f64>,
    perc_out: Vec<f64>,
}

/// Infiltrate `infiltration_cm` into the top layer and percolate
/// excess-over-field-capacity water downward one layer at a time.
/// Water leaving the bottom layer is credited to `deep_drainage` only
/// when `site.deep_drain_layer` is configured; otherwise it still
/// leaves `swc` (there is nowhere lower to put it) but is not counted
/// as drainage — a site without a deep-drain layer configured will
/// trip the infiltration/profile/layer-balance counters if it ever
/// saturates its bottom layer, which is the audit doing its job.
fn infiltrate_and_percolate(site: &Site, swc: &mut [f64], infiltration_cm: f64) -> (f64, f64, PercolationFlux) {
    let n = site.layers.len();
    let mut perc_in = vec![0.0; n];
    let mut perc_out = vec![0.0; n];
    let mut runoff = 0.0;
    let mut carry = infiltration_cm;
    for (i, layer) in site.layers.iter().enumerate() {
        perc_in[i] = carry;
        swc[i] += carry;
        carry = 0.0;
        if i == 0 && swc[i] > layer.swc_sat {
            runoff = swc[i] - layer.swc_sat;
            swc[i] = layer.swc_sat;
        }
        let excess = (swc[i] - layer.swc_fc).max(0.0);
        let transmissible = excess * (1.0 - layer.impermeability).clamp(0.0, 1.0);
        swc[i] -= transmissible;
        perc_out[i] = transmissible;
        carry = transmissible;
    }
    perc_out[0] += runoff;
    let deep_drainage = if site.deep_drain_layer.is_some() { carry } else { 0.0 };
    (runoff, deep_drainage, PercolationFlux { perc_in, perc_out })
}

/// Per-layer bare-soil evaporation and transpiration (summed across
/// vegetation types), for the per-layer water-balance identity.
struct EtFlux {
    evap_layer: Vec<f64>,
    transp_layer: Vec<f64>,
}

fn evapotranspire(site: &Site, veg: &VegComposition, swc: &mut [f64], pet_cm: f64) -> (f64, [f64; 4], EtFlux) {
    let mut remaining_pet = pet_cm;
    let n = site.layers.len();
    let mut evap_layer = vec![0.0; n];
    let mut transp_layer = vec![0.0; n];

    let mut bare_evap = 0.0;
    for i in 0..site.n_evap_layers {
        if remaining_pet <= 0.0 {
            break;
        }
        let layer = &site.layers[i];
        let available = (swc[i] - layer.swc_min).max(0.0);
        let demand = remaining_pet * layer.evap_coeff * veg.cover_bare;
        let take = demand.min(available);
        swc[i] -= take;
        bare_evap += take;
        evap_layer[i] += take;
        remaining_pet -= take;
    }

    let mut transp = [0.0f64; 4];
    for &vt in &ALL_VEG_TYPES {
        let idx = vt as usize;
        let cover = veg.cover[idx];
        if cover <= 0.0 {
            continue;
        }
        let mut demand_left = pet_cm * cover;
        for i in 0..site.n_transp_layers[idx] {
            if demand_left <= 0.0 {
                break;
            }
            let layer = &site.layers[i];
            let crit = layer.swc_at_swpcrit[idx].max(layer.swc_min);
            let available = (swc[i] - crit).max(0.0);
            let demand = demand_left * layer.transp_coeff[idx];
            let take = demand.min(available);
            swc[i] -= take;
            transp[idx] += take;
            transp_layer[i] += take;
            demand_left -= take;
        }
    }

    (bare_evap, transp, EtFlux { evap_layer, transp_layer })
}

fn hydraulic_redistribute(site: &Site, veg: &VegComposition, swc: &mut [f64]) -> Vec<f64> {
    let mut flux = vec![0.0; site.layers.len()];
    if site.layers.len() < 2 {
        return flux;
    }
    let psi: Vec<f64> = site
        .layers
        .iter()
        .zip(swc.iter())
        .map(|(l, &s)| swrc::swc_to_swp(s, &l.swrc, l.gravel, l.width_cm).unwrap_or(0.0))
        .collect();

    for i in 0..site.layers.len() - 1 {
        let dpsi = psi[i] - psi[i + 1];
        if dpsi.abs() < 1e-9 {
            continue;
        }
        let mut conductance = 0.0;
        for &vt in &ALL_VEG_TYPES {
            let idx = vt as usize;
            if veg.cover[idx] <= 0.0 {
                continue;
            }
            let shape = veg.hydred_shape[idx].max(1e-6);
            let g = veg.max_cond_root[idx] / (1.0 + ((-dpsi - veg.hydred_psi50[idx]) / shape).exp());
            conductance += g * veg.cover[idx];
        }
        let move_cm = (0.01 * conductance * dpsi.abs()).min(swc[i].max(0.0)).min(swc[i + 1].max(0.0));
        if dpsi > 0.0 {
            swc[i] -= move_cm;
            swc[i + 1] += move_cm;
            flux[i] -= move_cm;
            flux[i + 1] += move_cm;
        } else {
            swc[i] += move_cm;
            swc[i + 1] -= move_cm;
            flux[i] += move_cm;
            flux[i + 1] -= move_cm;
        }
    }
    flux
}

fn update_soil_temperature(site: &mut Site, state: &mut DayState, tavg_c: f64, log: &mut RunLog) {
    let n_rgr = soil_temp_regression_layers(site);
    if n_rgr >= MAX_ST_RGR {
        log.warn(format!(
            "soil temperature regression layers ({n_rgr}) exceeds MAX_ST_RGR; resetting to defaults"
        ));
        site.soil_temp.max_depth = 180.0;
        site.soil_temp.delta_x = 15.0;
        state.soil_temp_profile = vec![site.soil_temp.t_const; 11];
        return;
    }
    if state.soil_temp_profile.len() != n_rgr {
        state.soil_temp_profile = vec![site.soil_temp.t_const; n_rgr];
    }
    if n_rgr == 0 {
        return;
    }
    const DIFFUSIVITY: f64 = 0.2;
    let old = state.soil_temp_profile.clone();
    for i in 0..n_rgr {
        let above = if i == 0 { tavg_c } else { old[i - 1] };
        let below = if i + 1 < n_rgr { old[i + 1] } else { site.soil_temp.t_const };
        state.soil_temp_profile[i] = old[i] + DIFFUSIVITY * (above + below - 2.0 * old[i]);
    }
}

/// Bare-soil evaporation coefficients across the evaporation layers,
/// and each vegetation type's transpiration coefficients across its
/// transpiration layers, should each sum to 1 — this only drifts if
/// `Site` was hand-built or mutated after `Site::initialize`.
fn coefficients_sum_to_one(site: &Site, counters: &mut WaterBalanceCounters) {
    if site.n_evap_layers > 0 {
        let evap_sum: f64 = site.layers[..site.n_evap_layers].iter().map(|l| l.evap_coeff).sum();
        if (evap_sum - 1.0).abs() > 1e-4 {
            counters.coefficient_drift += 1;
            return;
        }
    }
    for &vt in &ALL_VEG_TYPES {
        let idx = vt as usize;
        let n = site.n_transp_layers[idx];
        if n == 0 {
            continue;
        }
        let transp_sum: f64 = site.layers[..n].iter().map(|l| l.transp_coeff[idx]).sum();
        if (transp_sum - 1.0).abs() > 1e-4 {
            counters.coefficient_drift += 1;
            return;
        }
    }
}

/// Run one day of the flow controller end to end, mutating `state` in
/// place and returning the day's flux outputs.
#[allow(clippy::too_many_arguments)]
pub fn simulate_day(
    site: &mut Site,
    veg: &VegComposition,
    tmax_c: f64,
    tmin_c: f64,
    ppt_cm: f64,
    pet_cm: f64,
    doy: u32,
    state: &mut DayState,
    counters: &mut WaterBalanceCounters,
    log: &mut RunLog,
) -> Result<DayOutputs, SoilwError> {
    if log.stop_run() {
        return Err(SoilwError::InvalidInput("run already stopped".into()));
    }
    let tavg_c = (tmax_c + tmin_c) / 2.0;

    coefficients_sum_to_one(site, counters);

    let swc_total_before_day: f64 = state.swc.iter().sum();
    let snowpack_before_day = state.snow.snowpack_cm;

    let snow = {
        let rmelt = sinusoidal_rmelt(doy, site.snow.rmelt_min, site.snow.rmelt_max);
        let before = state.snow.snowpack_cm;
        if site.snow.use_snow {
            let (rain_cm, snowfall_cm) = if tavg_c <= site.snow.tmin_accu {
                (0.0, ppt_cm)
            } else {
                (ppt_cm, 0.0)
            };
            state.snow.snowpack_cm += snowfall_cm;
            state.snow.snow_temp_c =
                (1.0 - site.snow.lambda_snow) * state.snow.snow_temp_c + site.snow.lambda_snow * tavg_c;
            let canopy_cov = (1.0 - veg.cover_bare).clamp(0.0, 1.0).max(0.01);
            let melt_cm = if state.snow.snow_temp_c > site.snow.tmax_crit {
                state
                    .snow
                    .snowpack_cm
                    .min(rmelt * canopy_cov * ((state.snow.snow_temp_c + tmax_c) / 2.0 - site.snow.tmax_crit).max(0.0))
                    .max(0.0)
            } else {
                0.0
            };
            state.snow.snowpack_cm -= melt_cm;
            let loss_cm = state.snow.snowpack_cm.min(veg.cover_bare.clamp(0.0, 1.0) * pet_cm).max(0.0);
            state.snow.snowpack_cm -= loss_cm;

            if state.snow.snowpack_cm < -1e-9 || (before + snowfall_cm - melt_cm - loss_cm - state.snow.snowpack_cm).abs() > 1e-6 {
                counters.snow_mass_mismatch += 1;
            }

            SnowResult {
                rain_cm: rain_cm + melt_cm,
                melt_cm,
                loss_cm,
            }
        } else {
            SnowResult {
                rain_cm: ppt_cm,
                melt_cm: 0.0,
                loss_cm: 0.0,
            }
        }
    };

    let swc_before_infil = state.swc.clone();
    let swc_before_infil_total: f64 = swc_before_infil.iter().sum();
    let (runoff_cm, deep_drainage_cm, perc) = infiltrate_and_percolate(site, &mut state.swc, snow.rain_cm);

    let swc_after_infil_total: f64 = state.swc.iter().sum();
    let retained_in_profile = swc_after_infil_total - swc_before_infil_total;
    if (retained_in_profile - (snow.rain_cm - runoff_cm - deep_drainage_cm)).abs() > BALANCE_TOL {
        counters.infiltration_mismatch += 1;
    }

    let swc_before_et_total = swc_after_infil_total;
    let (bare_evap, transp, et_flux) = evapotranspire(site, veg, &mut state.swc, pet_cm);
    let aet = bare_evap + transp.iter().sum::<f64>();
    if aet > pet_cm + 1e-9 {
        counters.aet_exceeds_pet += 1;
    }
    let swc_after_et_total: f64 = state.swc.iter().sum();
    let measured_et = swc_before_et_total - swc_after_et_total;
    if (aet - measured_et).abs() > BALANCE_TOL {
        counters.aet_component_mismatch += 1;
    }

    let swc_before_hydred = state.swc.clone();
    let hydred = hydraulic_redistribute(site, veg, &mut state.swc);

    // Per-layer identity over the whole day's mutating passes
    // (snow never touches `swc`): Δswc[i] = perc_in[i] − perc_out[i]
    // − evap[i] − transp[i] + hydred[i].
    let mut any_layer_mismatch = false;
    for i in 0..site.layers.len() {
        let actual_delta = state.swc[i] - swc_before_infil[i];
        let expected_delta =
            perc.perc_in[i] - perc.perc_out[i] - et_flux.evap_layer[i] - et_flux.transp_layer[i] + hydred[i];
        if (actual_delta - expected_delta).abs() > BALANCE_TOL {
            any_layer_mismatch = true;
        }
    }
    if any_layer_mismatch {
        counters.layer_balance_mismatch += 1;
    }
    debug_assert_eq!(swc_before_hydred.len(), state.swc.len());

    // Whole-profile identity: ΣT + Esoil == net infiltration − deep
    // drainage − ΣΔswc, where net infiltration excludes runoff (it
    // never entered the profile).
    let swc_total_after_passes: f64 = state.swc.iter().sum();
    let delta_swc_total = swc_total_after_passes - swc_before_infil_total;
    let net_infiltration = snow.rain_cm - runoff_cm;
    let expected_et_from_profile = net_infiltration - deep_drainage_cm - delta_swc_total;
    if (aet - expected_et_from_profile).abs() > BALANCE_TOL {
        counters.profile_balance_mismatch += 1;
    }

    update_soil_temperature(site, state, tavg_c, log);

    for (layer, &swc) in site.layers.iter().zip(state.swc.iter()) {
        if !(ge(swc, layer.swc_min) && le(swc, layer.swc_sat)) {
            counters.swc_bounds_violation += 1;
        }
    }

    // Whole-system mass balance (soil profile + snowpack) for the day,
    // independent of the per-pass accounting above: total water in
    // minus total water out should equal the named evaporative terms.
    // Eponded and Elitter are not modeled (no canopy interception or
    // ponding store) and are taken as zero.
    let snowpack_after_day = state.snow.snowpack_cm;
    let water_before = swc_total_before_day + snowpack_before_day;
    let water_after = swc_total_after_passes + snowpack_after_day;
    let mass_balance_et = water_before + ppt_cm - water_after - runoff_cm - deep_drainage_cm;
    let named_et_sum = bare_evap + transp.iter().sum::<f64>() + snow.loss_cm;
    if (mass_balance_et - named_et_sum).abs() > BALANCE_TOL {
        counters.etot_mismatch += 1;
    }

    Ok(DayOutputs {
        snowmelt_cm: snow.melt_cm,
        snowloss_cm: snow.loss_cm,
        runoff_cm,
        runon_cm: 0.0,
        deep_drainage_cm,
        transpiration_cm: transp,
        bare_soil_evap_cm: bare_evap,
        hydred_cm: hydred,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptf;
    use crate::site::{Layer, SwcMinPolicy};

    fn one_layer_site() -> Site {
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
        Site::initialize(
            vec![layer],
            SwcMinPolicy::Estimate { legacy: true },
            false,
            &[],
            &[25.0, 30.0, 20.0, 15.0],
            &mut log,
        )
        .unwrap()
    }

    fn flat_veg() -> VegComposition {
        VegComposition {
            cover: [0.0, 0.0, 0.0, 0.5],
            cover_bare: 0.5,
            albedo: [0.15; 4],
            monthly_biomass: [[0.0; 12]; 4],
            monthly_litter: [[0.0; 12]; 4],
            monthly_pct_live: [[0.0; 12]; 4],
            monthly_lai_conv: [[0.0; 12]; 4],
            critical_swp_bar: [25.0, 30.0, 20.0, 15.0],
            max_cond_root: [1.0; 4],
            hydred_psi50: [-2.0; 4],
            hydred_shape: [5.0; 4],
        }
    }

    #[test]
    fn swc_stays_in_bounds_after_heavy_rain() {
        let mut site = one_layer_site();
        let veg = flat_veg();
        let mut state = DayState::from_site(&site);
        let mut counters = WaterBalanceCounters::default();
        let mut log = RunLog::new();
        simulate_day(&mut site, &veg, 20.0, 10.0, 50.0, 0.3, 172, &mut state, &mut counters, &mut log).unwrap();
        assert_eq!(counters.swc_bounds_violation, 0);
        assert!(state.swc[0] <= site.layers[0].swc_sat + 1e-9);
    }

    #[test]
    fn no_snowmelt_in_deep_freeze_with_zero_pet() {
        let mut site = one_layer_site();
        site.snow.use_snow = true;
        let veg = flat_veg();
        let mut state = DayState::from_site(&site);
        let mut counters = WaterBalanceCounters::default();
        let mut log = RunLog::new();
        let out = simulate_day(&mut site, &veg, -10.0, -20.0, 1.0, 0.0, 15, &mut state, &mut counters, &mut log).unwrap();
        assert_eq!(out.snowmelt_cm, 0.0);
        assert!(state.snow.snowpack_cm >= 1.0 - 1e-9);
    }

    #[test]
    fn aet_never_exceeds_pet() {
        let mut site = one_layer_site();
        let veg = flat_veg();
        let mut state = DayState::from_site(&site);
        let mut counters = WaterBalanceCounters::default();
        let mut log = RunLog::new();
        for doy in 1..=30u32 {
            simulate_day(&mut site, &veg, 25.0, 15.0, 0.0, 0.5, doy, &mut state, &mut counters, &mut log).unwrap();
        }
        assert_eq!(counters.aet_exceeds_pet, 0);
    }
}
