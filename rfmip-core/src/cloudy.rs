//! Cloudy-sky forcing decomposition
//!
//! All-sky forcing mixes a clear-sky contribution, weighted by the cloud-free fraction of each
//! grid cell, with a contribution from the cloudy part of the cell:
//!
//! $$ F_{all} = (1 - c) \cdot F_{clear} + c \cdot F_{cloudy} $$
//!
//! where $c$ is the cloud fraction (`clt / 100`). Solving for the cloudy part gives
//!
//! $$ F_{cloudy} = \frac{F_{all} - (1 - c) \cdot F_{clear}}{c} $$
//!
//! which is evaluated separately with the aerosol run's and the control run's own cloud
//! fraction. Cells with $c < 0.01$ (less than 1 % cloud cover) are defined to have zero cloudy
//! forcing, as dividing by such small fractions only amplifies noise.

use crate::errors::RfmipResult;
use crate::flux::{FluxBundle, FluxVariable};
use crate::forcing::{compute_forcings_allsky, compute_forcings_clearsky};
use crate::grid::{FloatValue, GriddedField, COORDINATE_TOLERANCE};
use crate::utils::guarded_division::guarded_divide;
use log::debug;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Cloud fractions below this value are treated as cloud free
pub const CLOUD_FRACTION_THRESHOLD: FloatValue = 0.01;

/// Conversion from `clt` (percent) to a fraction
pub const PERCENT_TO_FRACTION: FloatValue = 0.01;

/// Variables each bundle must provide for the decomposition
pub const CLOUDY_SKY_VARIABLES: [FluxVariable; 6] = [
    FluxVariable::Rsdt,
    FluxVariable::Rsut,
    FluxVariable::Rlut,
    FluxVariable::Rsutcs,
    FluxVariable::Rlutcs,
    FluxVariable::Clt,
];

/// Cloud-attributable forcing for both runs and both bands
///
/// unit: W / m^2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudySkyForcing {
    pub sw_control: GriddedField,
    pub sw_aerosol: GriddedField,
    pub lw_control: GriddedField,
    pub lw_aerosol: GriddedField,
}

impl CloudySkyForcing {
    /// `(sw_control, sw_aerosol, lw_control, lw_aerosol)`
    pub fn into_tuple(self) -> (GriddedField, GriddedField, GriddedField, GriddedField) {
        (
            self.sw_control,
            self.sw_aerosol,
            self.lw_control,
            self.lw_aerosol,
        )
    }
}

/// Isolate the cloudy part of `all_sky` forcing given a cloud cover field in percent
///
/// Cells whose cloud fraction is below [`CLOUD_FRACTION_THRESHOLD`] (negative fill values
/// included) are set to exactly zero,
/// whatever the all-sky and clear-sky values are (including NaN or infinite values).
pub fn decompose_cloudy(
    all_sky: &GriddedField,
    clear_sky: &GriddedField,
    cloud_cover: &GriddedField,
) -> RfmipResult<GriddedField> {
    all_sky.check_co_registered(clear_sky, COORDINATE_TOLERANCE)?;
    all_sky.check_co_registered(cloud_cover, COORDINATE_TOLERANCE)?;

    let values = Zip::from(all_sky.values())
        .and(clear_sky.values())
        .and(cloud_cover.values())
        .map_collect(|&all, &clear, &clt| {
            let fraction = cloud_fraction(clt);
            let residual = all - (1.0 - fraction) * clear;
            guarded_divide(residual, fraction, CLOUD_FRACTION_THRESHOLD, 0.0)
        });
    all_sky.with_values(values)
}

/// Cloudy-sky forcing from the all-sky and clear-sky forcing of two runs
///
/// The aerosol and control cloud covers are applied independently; a cell masked in one run is
/// not masked in the other.
///
/// # Errors
///
/// * [`RfmipError::MissingField`](crate::errors::RfmipError::MissingField) if either bundle lacks
///   any of [`CLOUDY_SKY_VARIABLES`]
/// * [`RfmipError::ShapeMismatch`](crate::errors::RfmipError::ShapeMismatch) or
///   [`RfmipError::CoordinateMismatch`](crate::errors::RfmipError::CoordinateMismatch) if the
///   bundles are not co-registered
pub fn compute_cloudy_sky(
    aerosol: &FluxBundle,
    control: &FluxBundle,
) -> RfmipResult<CloudySkyForcing> {
    aerosol.check_co_registered(control, &CLOUDY_SKY_VARIABLES)?;

    let all_sky = compute_forcings_allsky(aerosol, control)?;
    let clear_sky = compute_forcings_clearsky(aerosol, control)?;

    let clt_aerosol = aerosol.get(FluxVariable::Clt)?;
    let clt_control = control.get(FluxVariable::Clt)?;
    debug!(
        "Decomposing cloudy-sky forcing; cells below {} cloud fraction: aerosol={}, control={}",
        CLOUD_FRACTION_THRESHOLD,
        count_cloud_free(clt_aerosol),
        count_cloud_free(clt_control)
    );

    Ok(CloudySkyForcing {
        sw_control: decompose_cloudy(&all_sky.shortwave, &clear_sky.shortwave, clt_control)?,
        sw_aerosol: decompose_cloudy(&all_sky.shortwave, &clear_sky.shortwave, clt_aerosol)?,
        lw_control: decompose_cloudy(&all_sky.longwave, &clear_sky.longwave, clt_control)?,
        lw_aerosol: decompose_cloudy(&all_sky.longwave, &clear_sky.longwave, clt_aerosol)?,
    })
}

/// Cloud fraction from `clt`, zeroed below the threshold
fn cloud_fraction(clt: FloatValue) -> FloatValue {
    let fraction = clt * PERCENT_TO_FRACTION;
    if fraction < CLOUD_FRACTION_THRESHOLD {
        0.0
    } else {
        fraction
    }
}

fn count_cloud_free(cloud_cover: &GriddedField) -> usize {
    cloud_cover
        .values()
        .iter()
        .filter(|clt| cloud_fraction(**clt) == 0.0)
        .count()
}
