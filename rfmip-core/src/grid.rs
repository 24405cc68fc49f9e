//! Gridded climate fields with labelled axes and coordinate metadata
//!
//! A [`GriddedField`] is an n-dimensional array whose axes are drawn from
//! [`Axis::Time`], [`Axis::Latitude`] and [`Axis::Longitude`], in any order and any subset.
//! Typical layouts are:
//!
//! - `(time, lat, lon)`: monthly or annual mean model output
//! - `(lat, lon)`: a climatological mean map
//! - `(time)`: a derived series such as a global mean
//!
//! Spatial axes always carry a coordinate vector in degrees. The time coordinate is optional
//! because many model calendars are only meaningful to the ingestion layer.
//!
//! Every operation returns a new field; inputs are never mutated.
//!
//! # Examples
//!
//! ```rust
//! use ndarray::{array, Array3};
//! use rfmip_core::grid::{Axis, GriddedField};
//!
//! let values = Array3::from_elem((2, 3, 4), 1.5);
//! let field = GriddedField::from_time_lat_lon(
//!     values,
//!     None,
//!     array![-60.0, 0.0, 60.0],
//!     array![0.0, 90.0, 180.0, 270.0],
//! )
//! .unwrap();
//!
//! assert_eq!(field.shape(), &[2, 3, 4]);
//! assert_eq!(field.axis_index(Axis::Latitude).unwrap(), 1);
//!
//! let climatology = field.mean_over(Axis::Time).unwrap();
//! assert_eq!(climatology.axes(), &[Axis::Latitude, Axis::Longitude]);
//! ```

use crate::errors::{RfmipError, RfmipResult};
use ndarray::{Array1, Array2, Array3, ArrayD, Axis as NdAxis, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type FloatValue = f64;

/// Largest absolute coordinate difference (degrees) for two grids to count as co-registered
pub const COORDINATE_TOLERANCE: FloatValue = 1e-6;

/// Named axis of a gridded field
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Time (or any sample dimension such as years of a climatology)
    Time,
    /// Latitude in degrees north, within [-90, 90]
    Latitude,
    /// Longitude in degrees east
    Longitude,
}

impl Axis {
    /// Short name as used in CMIP6 files
    pub fn name(&self) -> &'static str {
        match self {
            Axis::Time => "time",
            Axis::Latitude => "lat",
            Axis::Longitude => "lon",
        }
    }

    /// Whether the axis is horizontal (requires a coordinate vector)
    pub fn is_spatial(&self) -> bool {
        matches!(self, Axis::Latitude | Axis::Longitude)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Axis {
    type Err = RfmipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" => Ok(Axis::Time),
            "lat" | "latitude" => Ok(Axis::Latitude),
            "lon" | "longitude" => Ok(Axis::Longitude),
            other => Err(RfmipError::InvalidGrid(format!("Unknown axis name '{}'", other))),
        }
    }
}

/// Coordinate vectors attached to a field
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub time: Option<Array1<FloatValue>>,
    pub latitude: Option<Array1<FloatValue>>,
    pub longitude: Option<Array1<FloatValue>>,
}

impl Coordinates {
    pub fn get(&self, axis: Axis) -> Option<&Array1<FloatValue>> {
        match axis {
            Axis::Time => self.time.as_ref(),
            Axis::Latitude => self.latitude.as_ref(),
            Axis::Longitude => self.longitude.as_ref(),
        }
    }

    fn slot(&mut self, axis: Axis) -> &mut Option<Array1<FloatValue>> {
        match axis {
            Axis::Time => &mut self.time,
            Axis::Latitude => &mut self.latitude,
            Axis::Longitude => &mut self.longitude,
        }
    }

    /// Copy of these coordinates with one axis removed
    pub fn without(&self, axis: Axis) -> Self {
        let mut coords = self.clone();
        *coords.slot(axis) = None;
        coords
    }

    /// Copy of these coordinates with one axis replaced
    pub fn with(&self, axis: Axis, values: Array1<FloatValue>) -> Self {
        let mut coords = self.clone();
        *coords.slot(axis) = Some(values);
        coords
    }
}

/// Numeric array with named axes and attached coordinates
///
/// Deserialisation goes through [`GriddedField::new`], so serialised fields are validated the
/// same way as constructed ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGriddedField")]
pub struct GriddedField {
    values: ArrayD<FloatValue>,
    axes: Vec<Axis>,
    coords: Coordinates,
}

/// Unvalidated serialised form of a [`GriddedField`]
#[derive(Deserialize)]
struct RawGriddedField {
    values: ArrayD<FloatValue>,
    axes: Vec<Axis>,
    coords: Coordinates,
}

impl TryFrom<RawGriddedField> for GriddedField {
    type Error = RfmipError;

    fn try_from(raw: RawGriddedField) -> Result<Self, Self::Error> {
        GriddedField::new(raw.values, raw.axes, raw.coords)
    }
}

impl GriddedField {
    /// Create a field, validating the axes against the array and the coordinates
    ///
    /// # Errors
    ///
    /// * [`RfmipError::InvalidGrid`] if the axis list is inconsistent with the array, contains
    ///   duplicates, a spatial axis has no coordinates, a coordinate is given for an absent axis
    ///   or a latitude lies outside [-90, 90]
    /// * [`RfmipError::ShapeMismatch`] if a coordinate vector length disagrees with its axis
    pub fn new(
        values: ArrayD<FloatValue>,
        axes: Vec<Axis>,
        coords: Coordinates,
    ) -> RfmipResult<Self> {
        if axes.len() != values.ndim() {
            return Err(RfmipError::InvalidGrid(format!(
                "{} axes were named for an array with {} dimensions",
                axes.len(),
                values.ndim()
            )));
        }
        for (i, axis) in axes.iter().enumerate() {
            if axes[..i].contains(axis) {
                return Err(RfmipError::InvalidGrid(format!(
                    "Axis '{}' appears more than once",
                    axis
                )));
            }
        }

        for axis in [Axis::Time, Axis::Latitude, Axis::Longitude] {
            let position = axes.iter().position(|a| *a == axis);
            match (position, coords.get(axis)) {
                (Some(i), Some(c)) => {
                    if c.len() != values.shape()[i] {
                        return Err(RfmipError::ShapeMismatch {
                            context: format!("'{}' coordinate", axis),
                            expected: vec![values.shape()[i]],
                            found: vec![c.len()],
                        });
                    }
                }
                (Some(_), None) if axis.is_spatial() => {
                    return Err(RfmipError::InvalidGrid(format!(
                        "Axis '{}' requires a coordinate vector",
                        axis
                    )));
                }
                (None, Some(_)) => {
                    return Err(RfmipError::InvalidGrid(format!(
                        "Coordinate given for '{}' but the field has no such axis",
                        axis
                    )));
                }
                _ => {}
            }
        }

        if let Some(lat) = &coords.latitude {
            if let Some(bad) = lat.iter().find(|v| !(-90.0..=90.0).contains(*v)) {
                return Err(RfmipError::InvalidGrid(format!(
                    "Latitude {} is outside [-90, 90]",
                    bad
                )));
            }
        }

        Ok(Self {
            values,
            axes,
            coords,
        })
    }

    /// Field with `(time, lat, lon)` layout
    pub fn from_time_lat_lon(
        values: Array3<FloatValue>,
        time: Option<Array1<FloatValue>>,
        latitude: Array1<FloatValue>,
        longitude: Array1<FloatValue>,
    ) -> RfmipResult<Self> {
        Self::new(
            values.into_dyn(),
            vec![Axis::Time, Axis::Latitude, Axis::Longitude],
            Coordinates {
                time,
                latitude: Some(latitude),
                longitude: Some(longitude),
            },
        )
    }

    /// Field with `(lat, lon)` layout
    pub fn from_lat_lon(
        values: Array2<FloatValue>,
        latitude: Array1<FloatValue>,
        longitude: Array1<FloatValue>,
    ) -> RfmipResult<Self> {
        Self::new(
            values.into_dyn(),
            vec![Axis::Latitude, Axis::Longitude],
            Coordinates {
                time: None,
                latitude: Some(latitude),
                longitude: Some(longitude),
            },
        )
    }

    /// Field with a single `(time)` axis
    pub fn from_time_series(
        values: Array1<FloatValue>,
        time: Option<Array1<FloatValue>>,
    ) -> RfmipResult<Self> {
        Self::new(
            values.into_dyn(),
            vec![Axis::Time],
            Coordinates {
                time,
                ..Coordinates::default()
            },
        )
    }

    pub fn values(&self) -> &ArrayD<FloatValue> {
        &self.values
    }

    pub fn into_values(self) -> ArrayD<FloatValue> {
        self.values
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn coords(&self) -> &Coordinates {
        &self.coords
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn latitudes(&self) -> Option<&Array1<FloatValue>> {
        self.coords.latitude.as_ref()
    }

    pub fn longitudes(&self) -> Option<&Array1<FloatValue>> {
        self.coords.longitude.as_ref()
    }

    pub fn times(&self) -> Option<&Array1<FloatValue>> {
        self.coords.time.as_ref()
    }

    pub fn has_axis(&self, axis: Axis) -> bool {
        self.axes.contains(&axis)
    }

    /// Position of `axis` in the array dimensions
    pub fn axis_index(&self, axis: Axis) -> RfmipResult<usize> {
        self.axes
            .iter()
            .position(|a| *a == axis)
            .ok_or_else(|| RfmipError::MissingAxis {
                axis: axis.to_string(),
            })
    }

    /// Length of `axis`
    pub fn axis_len(&self, axis: Axis) -> RfmipResult<usize> {
        Ok(self.shape()[self.axis_index(axis)?])
    }

    /// Verify that `other` lives on the same grid as `self`
    ///
    /// Both fields must have the same axes in the same order and the same shape. Coordinate
    /// vectors present on both sides must agree to within `tolerance`. Exact floating-point
    /// equality is not required because coordinates read from different files routinely differ
    /// in the last bits.
    pub fn check_co_registered(&self, other: &GriddedField, tolerance: FloatValue) -> RfmipResult<()> {
        if self.axes != other.axes || self.shape() != other.shape() {
            return Err(RfmipError::ShapeMismatch {
                context: format!(
                    "co-registration of {} and {} fields",
                    describe_axes(&self.axes),
                    describe_axes(&other.axes)
                ),
                expected: self.shape().to_vec(),
                found: other.shape().to_vec(),
            });
        }

        for axis in &self.axes {
            if let (Some(a), Some(b)) = (self.coords.get(*axis), other.coords.get(*axis)) {
                let max_difference = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| {
                        let d = (x - y).abs();
                        if d.is_nan() {
                            FloatValue::INFINITY
                        } else {
                            d
                        }
                    })
                    .fold(0.0, FloatValue::max);
                if max_difference > tolerance {
                    return Err(RfmipError::CoordinateMismatch {
                        axis: axis.to_string(),
                        max_difference,
                        tolerance,
                    });
                }
            }
        }
        Ok(())
    }

    /// Elementwise combination with a co-registered field
    ///
    /// The result carries the coordinates of `self`.
    pub fn zip_with<F>(&self, other: &GriddedField, f: F) -> RfmipResult<Self>
    where
        F: Fn(FloatValue, FloatValue) -> FloatValue,
    {
        self.check_co_registered(other, COORDINATE_TOLERANCE)?;
        let values = Zip::from(&self.values)
            .and(&other.values)
            .map_collect(|&a, &b| f(a, b));
        Ok(self.with_values_unchecked(values))
    }

    /// Elementwise transformation
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(FloatValue) -> FloatValue,
    {
        self.with_values_unchecked(self.values.mapv(f))
    }

    /// Same grid, new values
    pub fn with_values(&self, values: ArrayD<FloatValue>) -> RfmipResult<Self> {
        if values.shape() != self.shape() {
            return Err(RfmipError::ShapeMismatch {
                context: "replacement values".to_string(),
                expected: self.shape().to_vec(),
                found: values.shape().to_vec(),
            });
        }
        Ok(self.with_values_unchecked(values))
    }

    fn with_values_unchecked(&self, values: ArrayD<FloatValue>) -> Self {
        Self {
            values,
            axes: self.axes.clone(),
            coords: self.coords.clone(),
        }
    }

    /// Replace the array and drop `axis` from the metadata
    pub(crate) fn reduced(&self, axis: Axis, values: ArrayD<FloatValue>) -> Self {
        Self {
            values,
            axes: self.axes.iter().copied().filter(|a| *a != axis).collect(),
            coords: self.coords.without(axis),
        }
    }

    /// Arithmetic mean over one axis, dropping it
    pub fn mean_over(&self, axis: Axis) -> RfmipResult<Self> {
        let index = self.axis_index(axis)?;
        let values = self.values.mean_axis(NdAxis(index)).ok_or_else(|| {
            RfmipError::DegenerateInput(format!("cannot average over empty '{}' axis", axis))
        })?;
        Ok(self.reduced(axis, values))
    }

    /// The sub-field at `index` along `axis`, with that axis removed
    pub fn slice_at(&self, axis: Axis, index: usize) -> RfmipResult<Self> {
        let position = self.axis_index(axis)?;
        let len = self.shape()[position];
        if index >= len {
            return Err(RfmipError::Error(format!(
                "Index {} is out of bounds for '{}' axis of length {}",
                index, axis, len
            )));
        }
        let values = self.values.index_axis(NdAxis(position), index).to_owned();
        Ok(self.reduced(axis, values))
    }
}

fn describe_axes(axes: &[Axis]) -> String {
    let names: Vec<&str> = axes.iter().map(|a| a.name()).collect();
    format!("({})", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3, IxDyn};

    fn sample_field() -> GriddedField {
        let values = Array3::from_shape_fn((2, 3, 2), |(t, i, j)| (t * 100 + i * 10 + j) as f64);
        GriddedField::from_time_lat_lon(
            values,
            Some(array![0.5, 1.5]),
            array![-45.0, 0.0, 45.0],
            array![90.0, 270.0],
        )
        .unwrap()
    }

    #[test]
    fn axis_parsing() {
        assert_eq!("lat".parse::<Axis>().unwrap(), Axis::Latitude);
        assert_eq!("Longitude".parse::<Axis>().unwrap(), Axis::Longitude);
        assert_eq!("time".parse::<Axis>().unwrap(), Axis::Time);
        assert!("depth".parse::<Axis>().is_err());
    }

    #[test]
    fn construction_validates_dimensions() {
        let result = GriddedField::new(
            ArrayD::zeros(IxDyn(&[2, 3])),
            vec![Axis::Latitude],
            Coordinates::default(),
        );
        assert!(matches!(result, Err(RfmipError::InvalidGrid(_))));
    }

    #[test]
    fn construction_rejects_duplicate_axes() {
        let result = GriddedField::new(
            ArrayD::zeros(IxDyn(&[2, 2])),
            vec![Axis::Time, Axis::Time],
            Coordinates::default(),
        );
        assert!(matches!(result, Err(RfmipError::InvalidGrid(_))));
    }

    #[test]
    fn construction_requires_spatial_coordinates() {
        let result = GriddedField::new(
            ArrayD::zeros(IxDyn(&[3])),
            vec![Axis::Latitude],
            Coordinates::default(),
        );
        assert!(matches!(result, Err(RfmipError::InvalidGrid(_))));
    }

    #[test]
    fn construction_checks_coordinate_length() {
        let result = GriddedField::from_lat_lon(
            Array2::zeros((3, 2)),
            array![-45.0, 0.0],
            array![0.0, 180.0],
        );
        match result {
            Err(RfmipError::ShapeMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, vec![3]);
                assert_eq!(found, vec![2]);
            }
            other => panic!("Expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn construction_rejects_out_of_range_latitude() {
        let result =
            GriddedField::from_lat_lon(Array2::zeros((2, 1)), array![0.0, 91.0], array![0.0]);
        assert!(matches!(result, Err(RfmipError::InvalidGrid(_))));
    }

    #[test]
    fn axis_lookup() {
        let field = sample_field();
        assert_eq!(field.axis_index(Axis::Longitude).unwrap(), 2);
        assert_eq!(field.axis_len(Axis::Latitude).unwrap(), 3);

        let map = field.mean_over(Axis::Time).unwrap();
        assert!(matches!(
            map.axis_index(Axis::Time),
            Err(RfmipError::MissingAxis { .. })
        ));
    }

    #[test]
    fn co_registration_tolerates_rounding() {
        let field = sample_field();
        let shifted = GriddedField::from_time_lat_lon(
            Array3::zeros((2, 3, 2)),
            Some(array![0.5, 1.5]),
            array![-45.0 + 1e-9, 0.0, 45.0],
            array![90.0, 270.0 - 1e-9],
        )
        .unwrap();
        assert!(field.check_co_registered(&shifted, COORDINATE_TOLERANCE).is_ok());
    }

    #[test]
    fn co_registration_detects_coordinate_offsets() {
        let field = sample_field();
        let shifted = GriddedField::from_time_lat_lon(
            Array3::zeros((2, 3, 2)),
            None,
            array![-44.0, 0.0, 45.0],
            array![90.0, 270.0],
        )
        .unwrap();
        match field.check_co_registered(&shifted, COORDINATE_TOLERANCE) {
            Err(RfmipError::CoordinateMismatch {
                axis,
                max_difference,
                ..
            }) => {
                assert_eq!(axis, "lat");
                assert!((max_difference - 1.0).abs() < 1e-12);
            }
            other => panic!("Expected CoordinateMismatch, got {:?}", other),
        }
    }

    #[test]
    fn co_registration_detects_shape_differences() {
        let field = sample_field();
        let other = GriddedField::from_time_lat_lon(
            Array3::zeros((3, 3, 2)),
            None,
            array![-45.0, 0.0, 45.0],
            array![90.0, 270.0],
        )
        .unwrap();
        assert!(matches!(
            field.check_co_registered(&other, COORDINATE_TOLERANCE),
            Err(RfmipError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn zip_with_does_not_mutate_inputs() {
        let a = sample_field();
        let b = a.map(|v| v * 2.0);
        let before = a.clone();

        let diff = b.zip_with(&a, |x, y| x - y).unwrap();
        assert_eq!(diff, a);
        assert_eq!(a, before);
    }

    #[test]
    fn mean_over_time() {
        let field = sample_field();
        let map = field.mean_over(Axis::Time).unwrap();
        assert_eq!(map.shape(), &[3, 2]);
        assert_eq!(map.values()[&[1usize, 1][..]], 61.0);
        assert!(map.times().is_none());
        assert_eq!(map.latitudes(), field.latitudes());
    }

    #[test]
    fn slice_at_bounds() {
        let field = sample_field();
        let first = field.slice_at(Axis::Time, 0).unwrap();
        assert_eq!(first.axes(), &[Axis::Latitude, Axis::Longitude]);
        assert_eq!(first.values()[&[2usize, 1][..]], 21.0);
        assert!(field.slice_at(Axis::Time, 2).is_err());
    }

    #[test]
    fn serialization_roundtrip() {
        let field = sample_field();
        let json = serde_json::to_string(&field).unwrap();
        let restored: GriddedField = serde_json::from_str(&json).unwrap();
        assert_eq!(field, restored);
    }

    #[test]
    fn deserialization_validates() {
        let map = sample_field().slice_at(Axis::Time, 0).unwrap();
        let mut payload = serde_json::to_value(&map).unwrap();
        payload["axes"] = serde_json::json!(["Time", "Latitude", "Longitude"]);

        let err = serde_json::from_value::<GriddedField>(payload).unwrap_err();
        assert!(err.to_string().contains("3 axes"), "{}", err);

        let mut payload = serde_json::to_value(&map).unwrap();
        payload["coords"]["latitude"]["data"] = serde_json::json!([-45.0, 0.0, 95.0]);
        assert!(serde_json::from_value::<GriddedField>(payload).is_err());
    }
}
