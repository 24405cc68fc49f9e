//! Top-of-atmosphere flux variables and bundles of co-registered fields.
//!
//! Variable identifiers follow the CMIP6 short names:
//!
//! | Variable | Description | Unit |
//! |----------|-------------|------|
//! | `rsdt`   | TOA incident shortwave radiation | W m-2 |
//! | `rsut`   | TOA outgoing shortwave radiation | W m-2 |
//! | `rlut`   | TOA outgoing longwave radiation | W m-2 |
//! | `rsutcs` | TOA outgoing clear-sky shortwave radiation | W m-2 |
//! | `rlutcs` | TOA outgoing clear-sky longwave radiation | W m-2 |
//! | `clt`    | Total cloud cover percentage | % |
//!
//! A [`FluxBundle`] holds the fields for one simulation (after any realization averaging).
//! Forcing is always computed from two bundles, one for the aerosol run and one for the control
//! run, which must share their grid.

use crate::errors::{RfmipError, RfmipResult};
use crate::grid::{GriddedField, COORDINATE_TOLERANCE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Flux or cloud variable identifier
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FluxVariable {
    Rsdt,
    Rsut,
    Rlut,
    Rsutcs,
    Rlutcs,
    Clt,
}

/// Variables needed for all-sky forcing
pub const ALL_SKY_VARIABLES: [FluxVariable; 3] =
    [FluxVariable::Rsdt, FluxVariable::Rsut, FluxVariable::Rlut];

/// Variables needed for clear-sky forcing
pub const CLEAR_SKY_VARIABLES: [FluxVariable; 3] = [
    FluxVariable::Rsdt,
    FluxVariable::Rsutcs,
    FluxVariable::Rlutcs,
];

impl FluxVariable {
    pub const ALL: [FluxVariable; 6] = [
        FluxVariable::Rsdt,
        FluxVariable::Rsut,
        FluxVariable::Rlut,
        FluxVariable::Rsutcs,
        FluxVariable::Rlutcs,
        FluxVariable::Clt,
    ];

    /// CMIP6 short name, also used in file names
    pub fn short_name(&self) -> &'static str {
        match self {
            FluxVariable::Rsdt => "rsdt",
            FluxVariable::Rsut => "rsut",
            FluxVariable::Rlut => "rlut",
            FluxVariable::Rsutcs => "rsutcs",
            FluxVariable::Rlutcs => "rlutcs",
            FluxVariable::Clt => "clt",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            FluxVariable::Rsdt => "TOA Incident Shortwave Radiation",
            FluxVariable::Rsut => "TOA Outgoing Shortwave Radiation",
            FluxVariable::Rlut => "TOA Outgoing Longwave Radiation",
            FluxVariable::Rsutcs => "TOA Outgoing Clear-Sky Shortwave Radiation",
            FluxVariable::Rlutcs => "TOA Outgoing Clear-Sky Longwave Radiation",
            FluxVariable::Clt => "Total Cloud Cover Percentage",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            FluxVariable::Clt => "%",
            _ => "W m-2",
        }
    }
}

impl fmt::Display for FluxVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl FromStr for FluxVariable {
    type Err = RfmipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FluxVariable::ALL
            .iter()
            .copied()
            .find(|v| v.short_name() == s)
            .ok_or_else(|| RfmipError::Error(format!("Unknown flux variable '{}'", s)))
    }
}

/// Fields of one simulation keyed by flux variable
///
/// Callers are expected to hand over bundles whose fields share a grid. The forcing functions
/// verify this through [`FluxBundle::check_co_registered`] before doing any arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluxBundle {
    fields: BTreeMap<FluxVariable, GriddedField>,
}

impl FluxBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field, returning the previous one if any
    pub fn insert(&mut self, variable: FluxVariable, field: GriddedField) -> Option<GriddedField> {
        self.fields.insert(variable, field)
    }

    /// Builder-style [`FluxBundle::insert`]
    pub fn with(mut self, variable: FluxVariable, field: GriddedField) -> Self {
        self.insert(variable, field);
        self
    }

    /// Look up a field
    ///
    /// # Errors
    /// [`RfmipError::MissingField`] if the bundle has no field for `variable`.
    pub fn get(&self, variable: FluxVariable) -> RfmipResult<&GriddedField> {
        self.fields
            .get(&variable)
            .ok_or_else(|| RfmipError::MissingField {
                variable: variable.to_string(),
            })
    }

    pub fn contains(&self, variable: FluxVariable) -> bool {
        self.fields.contains_key(&variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = FluxVariable> + '_ {
        self.fields.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Ensure all of `variables` are present
    pub fn require(&self, variables: &[FluxVariable]) -> RfmipResult<()> {
        for variable in variables {
            self.get(*variable)?;
        }
        Ok(())
    }

    /// Check that `self` and `other` both contain `variables` on one shared grid
    ///
    /// Every named field in both bundles is compared against the first named field of `self`,
    /// so a mismatch inside a single bundle is reported as well as one between bundles.
    pub fn check_co_registered(
        &self,
        other: &FluxBundle,
        variables: &[FluxVariable],
    ) -> RfmipResult<()> {
        self.require(variables)?;
        other.require(variables)?;

        let Some(first) = variables.first() else {
            return Ok(());
        };
        let reference = self.get(*first)?;
        for variable in variables {
            reference.check_co_registered(self.get(*variable)?, COORDINATE_TOLERANCE)?;
            reference.check_co_registered(other.get(*variable)?, COORDINATE_TOLERANCE)?;
        }
        Ok(())
    }
}

impl FromIterator<(FluxVariable, GriddedField)> for FluxBundle {
    fn from_iter<I: IntoIterator<Item = (FluxVariable, GriddedField)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn field(value: f64) -> GriddedField {
        GriddedField::from_lat_lon(
            Array2::from_elem((2, 2), value),
            array![-30.0, 30.0],
            array![0.0, 180.0],
        )
        .unwrap()
    }

    #[test]
    fn variable_names_roundtrip() {
        for variable in FluxVariable::ALL {
            assert_eq!(variable.short_name().parse::<FluxVariable>().unwrap(), variable);
        }
        assert!("tas".parse::<FluxVariable>().is_err());
    }

    #[test]
    fn variable_units() {
        assert_eq!(FluxVariable::Clt.unit(), "%");
        assert_eq!(FluxVariable::Rlutcs.unit(), "W m-2");
    }

    #[test]
    fn missing_field() {
        let bundle = FluxBundle::new().with(FluxVariable::Rsdt, field(340.0));
        match bundle.require(&ALL_SKY_VARIABLES) {
            Err(RfmipError::MissingField { variable }) => assert_eq!(variable, "rsut"),
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn co_registration_across_bundles() {
        let a: FluxBundle = ALL_SKY_VARIABLES.iter().map(|v| (*v, field(1.0))).collect();
        let mut b = a.clone();
        assert!(a.check_co_registered(&b, &ALL_SKY_VARIABLES).is_ok());

        let shifted = GriddedField::from_lat_lon(
            Array2::from_elem((2, 2), 1.0),
            array![-30.0, 31.0],
            array![0.0, 180.0],
        )
        .unwrap();
        b.insert(FluxVariable::Rlut, shifted);
        assert!(matches!(
            a.check_co_registered(&b, &ALL_SKY_VARIABLES),
            Err(RfmipError::CoordinateMismatch { .. })
        ));
    }

    #[test]
    fn serialization_uses_short_names() {
        let bundle = FluxBundle::new().with(FluxVariable::Clt, field(50.0));
        let json = serde_json::to_string(&bundle).unwrap();
        assert!(json.contains("\"clt\""));
        let restored: FluxBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(bundle, restored);
    }
}
