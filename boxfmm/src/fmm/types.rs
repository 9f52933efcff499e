//! Data structures for running an FMM.
use crate::traits::types::PassTime;

/// Callback invoked once a pass of the driver completes.
pub type PassCallback<'a> = Box<dyn FnMut(&PassTime) + 'a>;

/// Configuration of a single FMM run, set up with a builder pattern.
///
/// # Example
/// ```
/// use boxfmm::FmmConfig;
///
/// let mut npasses = 0;
/// let config = FmmConfig::new()
///     .expansion_order(12)
///     .timed(true)
///     .on_pass(|_| npasses += 1);
/// ```
#[derive(Default)]
pub struct FmmConfig<'a> {
    /// Truncation order, the wrangler's default when unset.
    pub(crate) expansion_order: Option<usize>,

    /// Whether to collect the time spent in each pass.
    pub(crate) timed: bool,

    /// Observer of pass boundaries.
    pub(crate) on_pass: Option<PassCallback<'a>>,
}

/// Potentials computed by an FMM run, with the time spent in each pass when timed.
#[derive(Debug, Clone)]
pub struct FmmEvaluation<P> {
    /// One potential per target, in user order.
    pub potentials: Vec<P>,

    /// Time spent in each pass, in the order the passes ran. Empty unless timed.
    pub pass_times: Vec<PassTime>,
}

/// Flat storage of one expansion per box of a tree.
///
/// The `ncoeffs` coefficients of box `i` occupy `data[i * ncoeffs..(i + 1) * ncoeffs]`. Since
/// boxes are numbered level by level, the expansions of a level are contiguous.
#[derive(Debug, Clone)]
pub struct ExpansionBuffer<C> {
    pub(crate) data: Vec<C>,
    pub(crate) level_start_box_nrs: Vec<usize>,
    pub(crate) ncoeffs: usize,
}

/// Read only view of the expansions of a contiguous run of boxes.
#[derive(Debug, Clone, Copy)]
pub struct Expansions<'a, C> {
    pub(crate) first_box: usize,
    pub(crate) ncoeffs: usize,
    pub(crate) data: &'a [C],
}

/// Mutable view of the expansions of a contiguous run of boxes.
#[derive(Debug)]
pub struct ExpansionsMut<'a, C> {
    pub(crate) first_box: usize,
    pub(crate) ncoeffs: usize,
    pub(crate) data: &'a mut [C],
}
