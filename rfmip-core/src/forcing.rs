//! Top-of-atmosphere radiative forcing from paired simulations
//!
//! Forcing is the change in net TOA flux between a perturbed (aerosol) simulation and a
//! control simulation run with identical sea-surface conditions:
//!
//! $$ F_{SW} = (rsdt - rsut)_{aer} - (rsdt - rsut)_{ctl} $$
//! $$ F_{LW} = (rsdt - rsut - rlut)_{aer} - (rsdt - rsut - rlut)_{ctl} $$
//!
//! The clear-sky variant substitutes `rsutcs`/`rlutcs` for `rsut`/`rlut`.
//!
//! Note that the "longwave" quantity keeps the net-flux definition used throughout the RFMIP
//! analysis scripts, so `F_LW - F_SW` is the (negated) change in outgoing longwave radiation.
//!
//! # Examples
//!
//! ```rust
//! use ndarray::array;
//! use rfmip_core::flux::{FluxBundle, FluxVariable};
//! use rfmip_core::forcing::compute_forcings_allsky;
//! use rfmip_core::grid::GriddedField;
//!
//! let constant = |v: f64| {
//!     GriddedField::from_time_lat_lon(
//!         ndarray::Array3::from_elem((1, 1, 1), v),
//!         None,
//!         array![0.0],
//!         array![0.0],
//!     )
//!     .unwrap()
//! };
//!
//! let aerosol = FluxBundle::new()
//!     .with(FluxVariable::Rsdt, constant(340.0))
//!     .with(FluxVariable::Rsut, constant(100.0))
//!     .with(FluxVariable::Rlut, constant(240.0));
//! let control = FluxBundle::new()
//!     .with(FluxVariable::Rsdt, constant(340.0))
//!     .with(FluxVariable::Rsut, constant(95.0))
//!     .with(FluxVariable::Rlut, constant(238.0));
//!
//! let forcing = compute_forcings_allsky(&aerosol, &control).unwrap();
//! assert_eq!(forcing.shortwave.values().sum(), -5.0);
//! assert_eq!(forcing.longwave.values().sum(), -7.0);
//! ```

use crate::errors::RfmipResult;
use crate::flux::{FluxBundle, FluxVariable, ALL_SKY_VARIABLES, CLEAR_SKY_VARIABLES};
use crate::grid::GriddedField;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which outgoing fluxes enter the net balance
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkyCondition {
    /// Includes the radiative effect of clouds (`rsut`, `rlut`)
    AllSky,
    /// Hypothetical cloud-free fluxes (`rsutcs`, `rlutcs`)
    ClearSky,
}

impl SkyCondition {
    pub fn outgoing_shortwave(&self) -> FluxVariable {
        match self {
            SkyCondition::AllSky => FluxVariable::Rsut,
            SkyCondition::ClearSky => FluxVariable::Rsutcs,
        }
    }

    pub fn outgoing_longwave(&self) -> FluxVariable {
        match self {
            SkyCondition::AllSky => FluxVariable::Rlut,
            SkyCondition::ClearSky => FluxVariable::Rlutcs,
        }
    }

    /// Variables each bundle must provide
    pub fn required_variables(&self) -> &'static [FluxVariable; 3] {
        match self {
            SkyCondition::AllSky => &ALL_SKY_VARIABLES,
            SkyCondition::ClearSky => &CLEAR_SKY_VARIABLES,
        }
    }
}

impl fmt::Display for SkyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkyCondition::AllSky => write!(f, "all-sky"),
            SkyCondition::ClearSky => write!(f, "clear-sky"),
        }
    }
}

/// Shortwave and longwave forcing on the grid of the input fluxes
///
/// unit: W / m^2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiativeForcing {
    pub shortwave: GriddedField,
    pub longwave: GriddedField,
}

impl RadiativeForcing {
    /// Forcing attributable to the change in outgoing longwave radiation alone
    ///
    /// Equal to `-(rlut_aer - rlut_ctl)` for all-sky forcing.
    pub fn outgoing_longwave_component(&self) -> RfmipResult<GriddedField> {
        self.longwave.zip_with(&self.shortwave, |lw, sw| lw - sw)
    }
}

/// Net shortwave flux `rsdt - rsut` of one simulation
pub fn shortwave_balance(bundle: &FluxBundle, sky: SkyCondition) -> RfmipResult<GriddedField> {
    let incident = bundle.get(FluxVariable::Rsdt)?;
    let outgoing = bundle.get(sky.outgoing_shortwave())?;
    incident.zip_with(outgoing, |down, up| down - up)
}

/// Net flux `rsdt - rsut - rlut` of one simulation
pub fn longwave_balance(bundle: &FluxBundle, sky: SkyCondition) -> RfmipResult<GriddedField> {
    let shortwave = shortwave_balance(bundle, sky)?;
    let outgoing = bundle.get(sky.outgoing_longwave())?;
    shortwave.zip_with(outgoing, |net, up| net - up)
}

/// Forcing for either sky condition
///
/// # Errors
///
/// * [`RfmipError::MissingField`](crate::errors::RfmipError::MissingField) if either bundle lacks
///   a required variable
/// * [`RfmipError::ShapeMismatch`](crate::errors::RfmipError::ShapeMismatch) or
///   [`RfmipError::CoordinateMismatch`](crate::errors::RfmipError::CoordinateMismatch) if the
///   fields are not co-registered
pub fn compute_forcings(
    aerosol: &FluxBundle,
    control: &FluxBundle,
    sky: SkyCondition,
) -> RfmipResult<RadiativeForcing> {
    aerosol.check_co_registered(control, sky.required_variables())?;
    debug!(
        "Computing {} forcing on grid {:?}",
        sky,
        aerosol.get(FluxVariable::Rsdt)?.shape()
    );

    let shortwave = shortwave_balance(aerosol, sky)?
        .zip_with(&shortwave_balance(control, sky)?, |aer, ctl| aer - ctl)?;
    let longwave = longwave_balance(aerosol, sky)?
        .zip_with(&longwave_balance(control, sky)?, |aer, ctl| aer - ctl)?;

    Ok(RadiativeForcing {
        shortwave,
        longwave,
    })
}

/// All-sky forcing from `rsdt`, `rsut` and `rlut`
pub fn compute_forcings_allsky(
    aerosol: &FluxBundle,
    control: &FluxBundle,
) -> RfmipResult<RadiativeForcing> {
    compute_forcings(aerosol, control, SkyCondition::AllSky)
}

/// Clear-sky forcing from `rsdt`, `rsutcs` and `rlutcs`
pub fn compute_forcings_clearsky(
    aerosol: &FluxBundle,
    control: &FluxBundle,
) -> RfmipResult<RadiativeForcing> {
    compute_forcings(aerosol, control, SkyCondition::ClearSky)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RfmipError;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};

    fn grid_field(values: Array3<f64>) -> GriddedField {
        GriddedField::from_time_lat_lon(
            values,
            None,
            array![-45.0, 45.0],
            array![0.0, 120.0, 240.0],
        )
        .unwrap()
    }

    fn varying(offset: f64) -> GriddedField {
        grid_field(Array3::from_shape_fn((4, 2, 3), |(t, i, j)| {
            offset + (t as f64) * 1.5 - (i as f64) * 3.25 + (j as f64) * 0.75
        }))
    }

    fn bundle(rsdt: f64, rsut: f64, rlut: f64, rsutcs: f64, rlutcs: f64) -> FluxBundle {
        FluxBundle::new()
            .with(FluxVariable::Rsdt, varying(rsdt))
            .with(FluxVariable::Rsut, varying(rsut))
            .with(FluxVariable::Rlut, varying(rlut))
            .with(FluxVariable::Rsutcs, varying(rsutcs))
            .with(FluxVariable::Rlutcs, varying(rlutcs))
    }

    #[test]
    fn test_identical_runs_give_zero_forcing() {
        let run = bundle(340.0, 100.0, 240.0, 50.0, 260.0);
        for sky in [SkyCondition::AllSky, SkyCondition::ClearSky] {
            let forcing = compute_forcings(&run, &run, sky).unwrap();
            assert!(forcing.shortwave.values().iter().all(|v| *v == 0.0));
            assert!(forcing.longwave.values().iter().all(|v| *v == 0.0));
        }
    }

    #[test]
    fn test_longwave_minus_shortwave_is_outgoing_longwave_change() {
        let aerosol = bundle(340.0, 102.5, 239.0, 51.0, 259.5);
        let control = bundle(340.0, 100.0, 240.0, 50.0, 260.0);
        let forcing = compute_forcings_allsky(&aerosol, &control).unwrap();

        let component = forcing.outgoing_longwave_component().unwrap();
        let rlut_change = aerosol
            .get(FluxVariable::Rlut)
            .unwrap()
            .zip_with(control.get(FluxVariable::Rlut).unwrap(), |a, c| -(a - c))
            .unwrap();

        for (got, expected) in component.values().iter().zip(rlut_change.values().iter()) {
            assert_abs_diff_eq!(*got, *expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_clear_sky_uses_clear_sky_fluxes() {
        let aerosol = bundle(340.0, 0.0, 0.0, 52.0, 258.0);
        let control = bundle(340.0, 0.0, 0.0, 50.0, 260.0);
        let forcing = compute_forcings_clearsky(&aerosol, &control).unwrap();

        // (340 - 52) - (340 - 50) = -2; (340 - 52 - 258) - (340 - 50 - 260) = 0
        for v in forcing.shortwave.values() {
            assert_abs_diff_eq!(*v, -2.0, epsilon = 1e-12);
        }
        for v in forcing.longwave.values() {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_output_keeps_input_shape() {
        let aerosol = bundle(340.0, 101.0, 241.0, 51.0, 261.0);
        let control = bundle(340.0, 100.0, 240.0, 50.0, 260.0);
        let forcing = compute_forcings_allsky(&aerosol, &control).unwrap();
        assert_eq!(forcing.shortwave.shape(), &[4, 2, 3]);
        assert_eq!(
            forcing.longwave.latitudes(),
            aerosol.get(FluxVariable::Rsdt).unwrap().latitudes()
        );
    }

    #[test]
    fn test_missing_clear_sky_field() {
        let aerosol = bundle(340.0, 101.0, 241.0, 51.0, 261.0);
        let control = aerosol.clone();
        let partial: FluxBundle = aerosol
            .variables()
            .filter(|v| *v != FluxVariable::Rlutcs)
            .map(|v| (v, aerosol.get(v).unwrap().clone()))
            .collect();

        assert!(compute_forcings_allsky(&partial, &control).is_ok());
        match compute_forcings_clearsky(&partial, &control) {
            Err(RfmipError::MissingField { variable }) => assert_eq!(variable, "rlutcs"),
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_shape_mismatch_between_runs() {
        let aerosol = bundle(340.0, 101.0, 241.0, 51.0, 261.0);
        let smaller = grid_field(Array3::zeros((3, 2, 3)));
        let control: FluxBundle = ALL_SKY_VARIABLES
            .iter()
            .map(|v| (*v, smaller.clone()))
            .collect();

        assert!(matches!(
            compute_forcings_allsky(&aerosol, &control),
            Err(RfmipError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_inputs_are_not_modified() {
        let aerosol = bundle(340.0, 101.0, 241.0, 51.0, 261.0);
        let control = bundle(340.0, 100.0, 240.0, 50.0, 260.0);
        let (aerosol_before, control_before) = (aerosol.clone(), control.clone());

        compute_forcings_allsky(&aerosol, &control).unwrap();
        assert_eq!(aerosol, aerosol_before);
        assert_eq!(control, control_before);
    }
}
