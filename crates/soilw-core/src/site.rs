//! Site data model: layers, vegetation composition, and the
//! initialization procedure that derives cached pore-water thresholds
//! and normalizes coefficients.

use serde::{Deserialize, Serialize};

use crate::error::{RunLog, SoilwError};
use crate::numeric::{ge, gt, le, D_DELTA};
use crate::ptf;
use crate::swrc::{self, SwrcParams};

/// Maximum number of transpiration regions a site may define.
pub const MAX_TRANSP_REGIONS: usize = 3;
/// Maximum soil-temperature profile layering before falling back to
/// the defaults (180 cm / 15 cm steps / 11 regression layers).
pub const MAX_ST_RGR: usize = 30;

/// The four vegetation types the engine partitions transpiration and
/// cover across. Order matches the critical-SWP ranking and the L1
/// aggregation column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VegType {
    Trees,
    Shrubs,
    Forbs,
    Grasses,
}

pub const ALL_VEG_TYPES: [VegType; 4] =
    [VegType::Trees, VegType::Shrubs, VegType::Forbs, VegType::Grasses];

/// One soil horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub width_cm: f64,
    pub gravel: f64,
    pub bulk_density: f64,
    pub matric_density: f64,
    pub sand: f64,
    pub clay: f64,
    pub impermeability: f64,
    pub evap_coeff: f64,
    pub transp_coeff: [f64; 4],
    pub swrc: SwrcParams,

    pub swc_sat: f64,
    pub swc_fc: f64,
    pub swc_wp: f64,
    pub swc_halfwp: f64,
    pub swc_min: f64,
    pub swc_wet: f64,
    pub swc_init: f64,
    pub swc_at_swpcrit: [f64; 4],

    pub swc_today: f64,
}

impl Layer {
    /// True when `swc` lies within `[swc_min, swc_sat]` (audit counter 8).
    pub fn swc_in_bounds(&self, swc: f64) -> bool {
        ge(swc, self.swc_min) && le(swc, self.swc_sat)
    }
}

/// How a theta_min (residual, below which no further extraction is
/// physically meaningful) should be derived at init time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SwcMinPolicy {
    FixedVwc(f64),
    FixedSwpBar(f64),
    /// Estimate as the SWP=300-bar inverse; `legacy` additionally
    /// floors it at the Rawls-Brakensiek residual estimate.
    Estimate { legacy: bool },
}

/// Snowpack parameters (site-level, not per-layer).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SnowParams {
    pub use_snow: bool,
    pub tmin_accu: f64,
    pub tmax_crit: f64,
    pub lambda_snow: f64,
    pub rmelt_min: f64,
    pub rmelt_max: f64,
}

/// Soil-temperature profile parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SoilTempParams {
    pub use_soil_temp: bool,
    pub delta_x: f64,
    pub max_depth: f64,
    pub t_const: f64,
}

impl Default for SoilTempParams {
    fn default() -> Self {
        SoilTempParams {
            use_soil_temp: true,
            delta_x: 15.0,
            max_depth: 180.0,
            t_const: 0.0,
        }
    }
}

/// Contiguous run of layers grouped for transpiration partitioning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TranspRegion {
    pub lower_layer: usize,
}

/// Site geometry, soil stack, and derived invariants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub layers: Vec<Layer>,
    pub n_evap_layers: usize,
    pub n_transp_layers: [usize; 4],
    pub transp_regions: [Vec<TranspRegion>; 4],
    pub deep_drain_layer: Option<usize>,
    pub snow: SnowParams,
    pub soil_temp: SoilTempParams,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub elevation_m: f64,
    pub slope_deg: f64,
    pub aspect_deg: Option<f64>,
}

/// Per-vegetation-type composition and phenology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegComposition {
    pub cover: [f64; 4],
    pub cover_bare: f64,
    pub albedo: [f64; 4],
    pub monthly_biomass: [[f64; 12]; 4],
    pub monthly_litter: [[f64; 12]; 4],
    pub monthly_pct_live: [[f64; 12]; 4],
    pub monthly_lai_conv: [[f64; 12]; 4],
    pub critical_swp_bar: [f64; 4],
    pub max_cond_root: [f64; 4],
    pub hydred_psi50: [f64; 4],
    pub hydred_shape: [f64; 4],
}

impl VegComposition {
    /// Sum of veg covers plus bare ground; should be 1 ± 1e-4 after
    /// [`normalize_cover`].
    pub fn total_cover(&self) -> f64 {
        self.cover.iter().sum::<f64>() + self.cover_bare
    }

    /// Renormalize if the total disagrees with 1 by more than 1e-4,
    /// warning with the observed sum.
    pub fn normalize_cover(&mut self, log: &mut RunLog) {
        let total = self.total_cover();
        if (total - 1.0).abs() > 1e-4 {
            log.warn(format!(
                "vegetation cover fractions summed to {total}, renormalizing to 1"
            ));
            if total > 0.0 {
                for c in &mut self.cover {
                    *c /= total;
                }
                self.cover_bare /= total;
            }
        }
    }

    /// Insertion-sort indices into `ALL_VEG_TYPES` by descending
    /// critical SWP, ties broken by index.
    pub fn critical_swp_rank(&self) -> [usize; 4] {
        let mut rank = [0usize, 1, 2, 3];
        for i in 1..4 {
            let mut j = i;
            while j > 0 && self.critical_swp_bar[rank[j - 1]] < self.critical_swp_bar[rank[j]] {
                rank.swap(j - 1, j);
                j -= 1;
            }
        }
        rank
    }
}

/// Normalize a slice of coefficients to sum to 1, warning if the
/// input sum deviated from 1 by more than 1e-4.
fn normalize_coeffs(values: &mut [f64], what: &str, log: &mut RunLog) {
    let sum: f64 = values.iter().sum();
    if (sum - 1.0).abs() > 1e-4 {
        log.warn(format!(
            "{what} coefficients summed to {sum}, renormalizing to 1"
        ));
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

/// Number of "active" layers in a coefficient prefix: layers up to
/// (and not including) the first zero coefficient.
fn active_prefix_len(coeffs: impl Iterator<Item = f64>) -> usize {
    let mut n = 0;
    for c in coeffs {
        if c <= 0.0 {
            break;
        }
        n += 1;
    }
    n
}

impl Site {
    /// Run the full site-initialization procedure over raw
    /// per-layer inputs that already carry an assigned SWRC family;
    /// parameters are estimated via PTF when a layer's `swrc.values`
    /// are uninitialized (all zero).
    pub fn initialize(
        mut layers: Vec<Layer>,
        swc_min_policy: SwcMinPolicy,
        deep_drain: bool,
        transp_region_bounds: &[usize],
        critical_swp_bar: &[f64; 4],
        log: &mut RunLog,
    ) -> Result<Site, SoilwError> {
        for (i, layer) in layers.iter().enumerate() {
            if layer.width_cm <= 0.0 {
                return Err(SoilwError::InvalidInput(format!(
                    "layer {i}: width must be > 0"
                )));
            }
            if layer.sand + layer.clay >= 1.0 {
                return Err(SoilwError::InvalidInput(format!(
                    "layer {i}: sand + clay must be < 1"
                )));
            }
        }

        for layer in layers.iter_mut() {
            if layer.bulk_density <= 0.0 && layer.matric_density > 0.0 {
                layer.bulk_density =
                    layer.matric_density * (1.0 - layer.gravel) + 2.65 * layer.gravel;
            } else if layer.matric_density <= 0.0 && layer.bulk_density > 0.0 {
                layer.matric_density =
                    (layer.bulk_density - 2.65 * layer.gravel) / (1.0 - layer.gravel);
            }

            if layer.swrc.values == [0.0; 6] {
                layer.swrc = ptf::cosby1984_for_campbell(layer.sand, layer.clay);
            }
            layer.swrc.check()?;

            let theta_s = layer.swrc.theta_s();
            layer.swc_sat = (1.0 - layer.gravel) * layer.width_cm * theta_s;
            layer.swc_fc = swrc::swp_to_swc(0.333, &layer.swrc, layer.gravel, layer.width_cm)?;
            layer.swc_wp = swrc::swp_to_swc(15.0, &layer.swrc, layer.gravel, layer.width_cm)?;
            let half_probe =
                swrc::swp_to_swc(100.0, &layer.swrc, layer.gravel, layer.width_cm)?;
            layer.swc_halfwp = (0.5 * layer.swc_wp).max(half_probe);

            let theoretical_min = match swc_min_policy {
                SwcMinPolicy::FixedVwc(vwc) => (1.0 - layer.gravel) * layer.width_cm * vwc,
                SwcMinPolicy::FixedSwpBar(swp) => {
                    swrc::swp_to_swc(swp, &layer.swrc, layer.gravel, layer.width_cm)?
                }
                SwcMinPolicy::Estimate { legacy } => {
                    let mut theta_min =
                        swrc::swp_to_swc(300.0, &layer.swrc, layer.gravel, layer.width_cm)?
                            / ((1.0 - layer.gravel) * layer.width_cm);
                    if legacy {
                        let porosity = 1.0 - layer.bulk_density / 2.65;
                        if let Ok(theta_r) = ptf::rawls_brakensiek1985_theta_min(
                            layer.sand * 100.0,
                            layer.clay * 100.0,
                            porosity,
                        ) {
                            theta_min = theta_min.max(theta_r);
                        }
                    }
                    (1.0 - layer.gravel) * layer.width_cm * theta_min
                }
            };
            layer.swc_min = theoretical_min + D_DELTA;

            if !gt(layer.swc_init, 0.0) {
                layer.swc_init = layer.swc_fc;
            }
            if !gt(layer.swc_wet, 0.0) {
                layer.swc_wet = layer.swc_fc;
            }
            layer.swc_today = layer.swc_init;

            for &vt in &ALL_VEG_TYPES {
                let idx = vt as usize;
                let crit = swrc::swp_to_swc(
                    critical_swp_bar[idx],
                    &layer.swrc,
                    layer.gravel,
                    layer.width_cm,
                )?;
                if gt(layer.swc_min, crit) {
                    log.warn(format!(
                        "layer critical SWC for {vt:?} below swc_min; lowering critical SWP"
                    ));
                }
                layer.swc_at_swpcrit[idx] = crit.max(layer.swc_min);
            }
        }

        let n_evap_layers =
            active_prefix_len(layers.iter().map(|l| l.evap_coeff));
        {
            let mut evap_coeffs: Vec<f64> =
                layers[..n_evap_layers].iter().map(|l| l.evap_coeff).collect();
            normalize_coeffs(&mut evap_coeffs, "bare-soil evaporation", log);
            for (layer, c) in layers[..n_evap_layers].iter_mut().zip(evap_coeffs) {
                layer.evap_coeff = c;
            }
        }

        let mut n_transp_layers = [0usize; 4];
        for &vt in &ALL_VEG_TYPES {
            let idx = vt as usize;
            let n = active_prefix_len(layers.iter().map(|l| l.transp_coeff[idx]));
            n_transp_layers[idx] = n;
            let mut coeffs: Vec<f64> =
                layers[..n].iter().map(|l| l.transp_coeff[idx]).collect();
            normalize_coeffs(&mut coeffs, "transpiration", log);
            for (layer, c) in layers[..n].iter_mut().zip(coeffs) {
                layer.transp_coeff[idx] = c;
            }
        }

        let deep_drain_layer = if deep_drain {
            Some(layers.len().saturating_sub(1))
        } else {
            None
        };

        let mut regions = Vec::new();
        let mut last = usize::MAX;
        for &bound in transp_region_bounds.iter().take(MAX_TRANSP_REGIONS) {
            if bound != last {
                regions.push(TranspRegion { lower_layer: bound });
                last = bound;
            }
        }
        let transp_regions = [regions.clone(), regions.clone(), regions.clone(), regions];

        Ok(Site {
            layers,
            n_evap_layers,
            n_transp_layers,
            transp_regions,
            deep_drain_layer,
            snow: SnowParams {
                use_snow: true,
                tmin_accu: 0.0,
                tmax_crit: 1.0,
                lambda_snow: 0.3,
                rmelt_min: 1.0,
                rmelt_max: 3.0,
            },
            soil_temp: SoilTempParams::default(),
            latitude_deg: 0.0,
            longitude_deg: 0.0,
            elevation_m: 0.0,
            slope_deg: 0.0,
            aspect_deg: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_layer() -> Layer {
        let swrc = ptf::cosby1984_for_campbell(0.4, 0.2);
        Layer {
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
        }
    }

    #[test]
    fn init_derives_ordered_thresholds() {
        let mut log = RunLog::new();
        let site = Site::initialize(
            vec![sample_layer()],
            SwcMinPolicy::Estimate { legacy: true },
            false,
            &[],
            &[25.0, 30.0, 20.0, 15.0],
            &mut log,
        )
        .unwrap();
        let layer = &site.layers[0];
        assert!(layer.swc_min < layer.swc_halfwp);
        assert!(layer.swc_halfwp <= layer.swc_wp + 1e-9);
        assert!(layer.swc_wp <= layer.swc_fc + 1e-9);
        assert!(layer.swc_fc <= layer.swc_sat + 1e-9);
        assert!(layer.swc_today > layer.swc_min);
    }

    #[test]
    fn swc_at_swpcrit_is_derived_from_critical_swp_not_caller_preset() {
        let mut log = RunLog::new();
        let critical_swp_bar = [25.0, 30.0, 20.0, 15.0];
        let site = Site::initialize(
            vec![sample_layer()],
            SwcMinPolicy::Estimate { legacy: true },
            false,
            &[],
            &critical_swp_bar,
            &mut log,
        )
        .unwrap();
        let layer = &site.layers[0];
        for (idx, &swp) in critical_swp_bar.iter().enumerate() {
            let expected =
                swrc::swp_to_swc(swp, &layer.swrc, layer.gravel, layer.width_cm).unwrap().max(layer.swc_min);
            assert!((layer.swc_at_swpcrit[idx] - expected).abs() < 1e-9);
        }
        // A lower critical SWP (bar 15, grasses) holds water less tightly
        // than a higher one (bar 30, shrubs), so its threshold is wetter.
        assert!(layer.swc_at_swpcrit[3] > layer.swc_at_swpcrit[1]);
    }

    #[test]
    fn cover_normalizes_when_off_by_more_than_tolerance() {
        let mut veg = VegComposition {
            cover: [0.1, 0.1, 0.1, 0.6],
            cover_bare: 0.2,
            albedo: [0.15; 4],
            monthly_biomass: [[0.0; 12]; 4],
            monthly_litter: [[0.0; 12]; 4],
            monthly_pct_live: [[0.0; 12]; 4],
            monthly_lai_conv: [[0.0; 12]; 4],
            critical_swp_bar: [25.0, 30.0, 20.0, 15.0],
            max_cond_root: [1.0; 4],
            hydred_psi50: [-2.0; 4],
            hydred_shape: [5.0; 4],
        };
        let mut log = RunLog::new();
        veg.normalize_cover(&mut log);
        assert!((veg.total_cover() - 1.0).abs() < 1e-9);
        assert!(!log.warnings().is_empty());
    }

    #[test]
    fn critical_swp_rank_sorts_descending() {
        let veg = VegComposition {
            cover: [0.25; 4],
            cover_bare: 0.0,
            albedo: [0.15; 4],
            monthly_biomass: [[0.0; 12]; 4],
            monthly_litter: [[0.0; 12]; 4],
            monthly_pct_live: [[0.0; 12]; 4],
            monthly_lai_conv: [[0.0; 12]; 4],
            critical_swp_bar: [25.0, 30.0, 20.0, 15.0],
            max_cond_root: [1.0; 4],
            hydred_psi50: [-2.0; 4],
            hydred_shape: [5.0; 4],
        };
        assert_eq!(veg.critical_swp_rank(), [1, 0, 2, 3]);
    }
}
