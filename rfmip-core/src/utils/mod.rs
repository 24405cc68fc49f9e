//! Numerical utilities shared by the forcing and aggregation modules.

pub mod guarded_division;
