//! Crate wide constants

/// Largest truncation order accepted by the supplied wranglers.
pub const MAX_EXPANSION_ORDER: usize = 64;

/// Default truncation order of the Laplace wrangler.
pub const DEFAULT_EXPANSION_ORDER: usize = 10;

/// Minimum number of boxes per rayon task when processing the boxes of a level.
pub(crate) const MIN_BOXES_PER_TASK: usize = 4;
