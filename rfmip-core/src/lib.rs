//! Top-of-atmosphere radiative forcing from paired aerosol and control simulations
//!
//! The crate follows the RFMIP effective radiative forcing workflow:
//!
//! 1. [`flux`]: gather the TOA flux fields of an aerosol and a control run
//!    (optionally averaged over realizations with [`ensemble`])
//! 2. [`forcing`] / [`cloudy`]: difference the runs into shortwave and longwave forcing,
//!    and isolate the cloudy-sky part
//! 3. [`aggregate`]: reduce to global means and time series
//! 4. [`stats`]: test where the forcing is significant
//!
//! Where the data lives is described by [`config`]; [`map`] prepares fields for plotting.

pub mod aggregate;
pub mod cloudy;
pub mod config;
pub mod ensemble;
pub mod flux;
pub mod forcing;
pub mod grid;
pub mod map;
pub mod python;
pub mod stats;
pub mod utils;

pub mod errors;
