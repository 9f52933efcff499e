//! Crate wide types: errors, scalar bounds and pass records.
use std::{
    fmt::{Debug, Display},
    time::Duration,
};

use num::{
    traits::{FloatConst, NumAssign},
    Float,
};

/// Real scalar type over which trees, traversals and the supplied wranglers are defined.
pub trait FmmScalar:
    Float + FloatConst + NumAssign + Default + Debug + Display + Send + Sync + 'static
{
}

impl<T> FmmScalar for T where
    T: Float + FloatConst + NumAssign + Default + Debug + Display + Send + Sync + 'static
{
}

/// Errors raised while building trees and traversals, or while driving an FMM.
#[derive(thiserror::Error, Debug)]
pub enum FmmError {
    /// The requested truncation order can't be honoured by a wrangler.
    #[error("Invalid expansion order {order}: {reason}")]
    InvalidExpansionOrder {
        /// Requested truncation order.
        order: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// A box referenced by a traversal is inconsistent with the data handed to an operator.
    #[error("Malformed traversal at box {ibox}: {reason}")]
    MalformedTraversal {
        /// Offending box number.
        ibox: usize,
        /// What was inconsistent.
        reason: String,
    },

    /// Kernel specific failure inside a wrangler operation.
    #[error("Wrangler operation failed at box {ibox}: {reason}")]
    WranglerOperationFailure {
        /// Box being processed when the operation failed.
        ibox: usize,
        /// Failure description.
        reason: String,
    },

    /// Invalid user input, e.g. mismatched array lengths.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An error raised during a pass of the driver, annotated with that pass.
    #[error("{pass} failed: {source}")]
    PassFailed {
        /// Pass in which the error was raised.
        pass: PassType,
        /// Underlying error.
        #[source]
        source: Box<FmmError>,
    },
}

impl FmmError {
    /// Annotate an error with the pass in which it was raised.
    pub fn in_pass(self, pass: PassType) -> Self {
        FmmError::PassFailed {
            pass,
            source: Box::new(self),
        }
    }

    /// The error raised at the origin, with any pass annotation removed.
    pub fn root_cause(&self) -> &FmmError {
        match self {
            FmmError::PassFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result alias used throughout the crate.
pub type FmmResult<T> = Result<T, FmmError>;

/// The passes of an FMM run, with the tree level where a pass is level local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassType {
    /// Permute source weights into tree order.
    ReorderSources,
    /// Particle to multipole at a level.
    FormMultipoles(u64),
    /// Multipole to multipole, from `level + 1` into `level`.
    CoarsenMultipoles(u64),
    /// Multipole to local at a level.
    MultipolesToLocals(u64),
    /// Particle to local at a level.
    FormLocals(u64),
    /// Local to local, from `level - 1` into `level`.
    RefineLocals(u64),
    /// Local to particle at a level.
    EvalLocals(u64),
    /// Multipole to particle at a level.
    EvalMultipoles(u64),
    /// Particle to particle.
    EvalDirect,
    /// Sum of near and far field potentials.
    Combine,
    /// Permute potentials back into user order.
    ReorderPotentials,
    /// Post processing of user ordered potentials.
    FinalizePotentials,
}

impl Display for PassType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassType::ReorderSources => write!(f, "reorder_sources"),
            PassType::FormMultipoles(level) => write!(f, "form_multipoles (level {level})"),
            PassType::CoarsenMultipoles(level) => write!(f, "coarsen_multipoles (level {level})"),
            PassType::MultipolesToLocals(level) => {
                write!(f, "translate_box_multipoles_to_local (level {level})")
            }
            PassType::FormLocals(level) => write!(f, "form_locals (level {level})"),
            PassType::RefineLocals(level) => write!(f, "refine_locals (level {level})"),
            PassType::EvalLocals(level) => write!(f, "eval_locals (level {level})"),
            PassType::EvalMultipoles(level) => write!(f, "eval_multipoles (level {level})"),
            PassType::EvalDirect => write!(f, "eval_direct"),
            PassType::Combine => write!(f, "combine"),
            PassType::ReorderPotentials => write!(f, "reorder_potentials"),
            PassType::FinalizePotentials => write!(f, "finalize_potentials"),
        }
    }
}

/// Wall clock time spent in a single pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassTime {
    /// The pass.
    pub pass: PassType,
    /// Elapsed time.
    pub time: Duration,
}

impl PassTime {
    /// Constructor
    pub fn from_duration(pass: PassType, time: Duration) -> Self {
        Self { pass, time }
    }

    /// Elapsed time in milliseconds.
    pub fn millis(&self) -> u128 {
        self.time.as_millis()
    }
}
