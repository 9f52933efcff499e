//! Expansion wranglers for concrete kernels.
pub mod cache;
mod constant_one;
mod laplace_2d;

pub use constant_one::ConstantOneWrangler;
pub use laplace_2d::{direct_potentials, Laplace2dWrangler};

use std::ops::{AddAssign, Range};

use crate::{
    traits::types::{FmmError, FmmResult},
    traversal::types::ListSlice,
};

/// Permute `values` so that entry `i` of the result is `values[indices[i]]`.
pub(crate) fn permute<V: Copy>(values: &[V], indices: &[usize], what: &str) -> FmmResult<Vec<V>> {
    if values.len() != indices.len() {
        return Err(FmmError::InvalidInput(format!(
            "Expected {} {what}, found {}",
            indices.len(),
            values.len()
        )));
    }
    Ok(indices.iter().map(|&i| values[i]).collect())
}

/// Check that a list view holds one list per box.
pub(crate) fn check_lists(boxes: &[usize], lists: &ListSlice<'_>) -> FmmResult<()> {
    if boxes.len() != lists.len() {
        return Err(FmmError::MalformedTraversal {
            ibox: boxes.first().copied().unwrap_or_default(),
            reason: format!(
                "{} boxes handed over with {} interaction lists",
                boxes.len(),
                lists.len()
            ),
        });
    }
    Ok(())
}

/// Add per box results to the potentials of the targets in each box.
pub(crate) fn scatter_potentials<P: Copy + AddAssign>(
    results: impl IntoIterator<Item = (usize, Range<usize>, Vec<P>)>,
    potentials: &mut [P],
) -> FmmResult<()> {
    for (ibox, targets, values) in results {
        let slot = potentials
            .get_mut(targets)
            .ok_or_else(|| FmmError::MalformedTraversal {
                ibox,
                reason: "target range exceeds the potentials".to_string(),
            })?;
        for (p, v) in slot.iter_mut().zip(values) {
            *p += v;
        }
    }
    Ok(())
}

/// Sources and their weights inside a range of tree ordered sources.
pub(crate) fn source_slices<'a, T, W>(
    ibox: usize,
    coordinates: &'a [T],
    weights: &'a [W],
    sources: Range<usize>,
) -> FmmResult<(&'a [T], &'a [W])> {
    match (
        coordinates.get(2 * sources.start..2 * sources.end),
        weights.get(sources),
    ) {
        (Some(coordinates), Some(weights)) => Ok((coordinates, weights)),
        _ => Err(FmmError::MalformedTraversal {
            ibox,
            reason: "source range exceeds the sources".to_string(),
        }),
    }
}
