//! # Box Fast Multipole Method (boxfmm)
//!
//! A kernel agnostic driver for the multilevel Fast Multipole Method, based on the adaptive
//! algorithm of \[1\] as formulated with interaction lists in \[2\].
//!
//! The driver only orchestrates the passes of the method: the upward pass, the far field
//! translations, the downward pass and the evaluation at targets. All kernel specific
//! mathematics is delegated to an [`ExpansionWrangler`], a trait that a caller implements
//! for the kernel of their choice.
//!
//! Notable features of this library are:
//! * A trait based contract for kernel specific expansion operators.
//! * A 2D quadtree with Morton keys, and a traversal deriving the four interaction lists of the adaptive method.
//! * A Laplace wrangler in two dimensions, and a constant kernel wrangler for checking interaction completeness.
//!
//! ## Example
//!
//! ```
//! use boxfmm::{drive_fmm, FmmConfig, Laplace2dWrangler, Traversal, TreeBuilder};
//! use boxfmm::tree::helpers::points_fixture;
//!
//! let sources = points_fixture::<f64>(200, None, None, Some(0));
//! let weights = vec![1.0; 200];
//!
//! let tree = TreeBuilder::new().adaptive(20, 10).build(&sources, None).unwrap();
//! let traversal = Traversal::new(tree).unwrap();
//! let wrangler = Laplace2dWrangler::new(&traversal.tree, 10).unwrap();
//!
//! let potentials = drive_fmm(&traversal, &wrangler, &weights, FmmConfig::new()).unwrap();
//! assert_eq!(potentials.len(), 200);
//! ```
//!
//! ## References
//! \[1\] Carrier, J., Greengard, L., & Rokhlin, V. (1988). A fast adaptive multipole algorithm for particle simulations. SIAM Journal on Scientific and Statistical Computing, 9(4), 669-686.
//!
//! \[2\] Greengard, L., & Rokhlin, V. (1987). A fast algorithm for particle simulations. Journal of Computational Physics, 73(2), 325-348.
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod fmm;
pub mod traits;
pub mod traversal;
pub mod tree;
pub mod wrangler;

// Public API
#[doc(inline)]
pub use fmm::{drive_fmm, drive_fmm_timed, types::FmmConfig};
#[doc(inline)]
pub use traits::types::{FmmError, FmmResult};
#[doc(inline)]
pub use traits::wrangler::ExpansionWrangler;
#[doc(inline)]
pub use traversal::types::Traversal;
#[doc(inline)]
pub use tree::types::{Tree, TreeBuilder};
#[doc(inline)]
pub use wrangler::{ConstantOneWrangler, Laplace2dWrangler};
