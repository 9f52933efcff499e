//! The FMM driver, and the expansion storage it hands to wranglers.
pub mod constants;
mod driver;
mod expansions;
pub mod helpers;
pub mod types;

pub use driver::{drive_fmm, drive_fmm_timed};
