//! Pedotransfer functions: texture/density -> SWRC parameters, or
//! standalone saturated/residual water-content estimators used by
//! site initialization.

mod cosby1984;
mod rawls_brakensiek1985;
mod saxton2006;

pub use cosby1984::cosby1984_for_campbell;
pub use rawls_brakensiek1985::rawls_brakensiek1985_theta_min;
pub use saxton2006::saxton2006_theta_sat;

use crate::error::SoilwError;
use crate::swrc::SwrcFamily;

/// The closed set of supported pedotransfer estimators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Ptf {
    Cosby1984,
}

/// Returns `Ok(())` iff `swrc` may legally be parameterized by `ptf`.
/// Cosby (1984) only targets the Campbell family; every other
/// combination is rejected at site initialization.
pub fn check_compatibility(swrc: SwrcFamily, ptf: Ptf) -> Result<(), SoilwError> {
    match (swrc, ptf) {
        (SwrcFamily::Campbell1974, Ptf::Cosby1984) => Ok(()),
        (other_family, other_ptf) => Err(SoilwError::Incompatibility(format!(
            "SWRC family {other_family:?} has no implemented PTF for {other_ptf:?}"
        ))),
    }
}
