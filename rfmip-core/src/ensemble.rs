//! Realization averaging
//!
//! Several realizations (`r1i1p1f1`, `r2i1p1f1`, ...) of the same experiment are averaged
//! before any differencing, so forcing is computed from ensemble-mean fluxes.

use crate::errors::{RfmipError, RfmipResult};
use crate::flux::{FluxBundle, FluxVariable};
use crate::grid::{FloatValue, GriddedField, COORDINATE_TOLERANCE};
use log::{debug, warn};

/// Elementwise mean of co-registered fields
///
/// The result carries the grid of the first member. NaN in any member propagates.
pub fn ensemble_mean(members: &[GriddedField]) -> RfmipResult<GriddedField> {
    let (first, rest) = members
        .split_first()
        .ok_or_else(|| RfmipError::DegenerateInput("ensemble has no members".to_string()))?;

    let mut total = first.values().clone();
    for member in rest {
        first.check_co_registered(member, COORDINATE_TOLERANCE)?;
        total += member.values();
    }
    total /= members.len() as FloatValue;
    first.with_values(total)
}

impl FluxBundle {
    /// Per-variable ensemble mean over realizations
    ///
    /// Only variables present in every member are kept; dropped variables are logged.
    pub fn ensemble_mean(members: &[FluxBundle]) -> RfmipResult<FluxBundle> {
        let (first, rest) = members
            .split_first()
            .ok_or_else(|| RfmipError::DegenerateInput("ensemble has no members".to_string()))?;

        let mut result = FluxBundle::new();
        for variable in first.variables() {
            if !rest.iter().all(|m| m.contains(variable)) {
                warn!(
                    "Dropping '{}' from the ensemble mean: missing from some realizations",
                    variable
                );
                continue;
            }
            let fields = members
                .iter()
                .map(|m| m.get(variable).cloned())
                .collect::<RfmipResult<Vec<GriddedField>>>()?;
            result.insert(variable, ensemble_mean(&fields)?);
        }
        debug!(
            "Averaged {} realizations over variables {:?}",
            members.len(),
            result.variables().collect::<Vec<FluxVariable>>()
        );
        Ok(result)
    }
}
