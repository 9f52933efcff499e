//! The expansion wrangler contract.
//!
//! A wrangler bundles the kernel specific operators of an FMM. The driver only ever sees a
//! wrangler through this trait, so the same pass sequence evaluates any kernel for which
//! multipole and local expansions can be formed, translated and evaluated.
use std::ops::AddAssign;

use crate::{
    fmm::types::{Expansions, ExpansionsMut},
    traits::types::FmmResult,
    traversal::types::ListSlice,
};

/// Kernel specific expansion operators called by the FMM driver.
///
/// Box numbers passed to an operator refer to the tree the traversal was built from. Expansion
/// views are indexed by those box numbers, and potentials are indexed by targets in tree order.
/// Operators accumulate into their outputs, the driver hands over zero initialised buffers.
///
/// Operators at one level are independent across boxes, implementations are free to process
/// boxes of a level in parallel as long as each box's output is written by exactly one worker.
pub trait ExpansionWrangler {
    /// Per source strength, e.g. a charge.
    type Weight: Copy + Send + Sync;

    /// Per target result of the evaluation.
    type Potential: Copy + Default + AddAssign + Send + Sync;

    /// Expansion coefficient.
    type Coefficient: Copy + Default + AddAssign + Send + Sync;

    /// Default truncation order, used unless a run overrides it.
    fn expansion_order(&self) -> usize;

    /// Number of coefficients in an expansion of a given truncation order.
    fn ncoeffs(&self, expansion_order: usize) -> usize;

    /// Permute weights given in user order into tree order.
    fn reorder_sources(&self, source_weights: &[Self::Weight]) -> FmmResult<Vec<Self::Weight>>;

    /// Permute potentials computed in tree order into user order, the exact inverse of the
    /// target permutation of the tree.
    fn reorder_potentials(
        &self,
        potentials: &[Self::Potential],
    ) -> FmmResult<Vec<Self::Potential>>;

    /// Particle to multipole (P2M), for each source leaf at `level`.
    ///
    /// # Arguments
    /// * `level` - Tree level of `source_boxes`.
    /// * `expansion_order` - Truncation order of the run.
    /// * `source_boxes` - Leaf boxes at `level` containing sources.
    /// * `source_weights` - Weights in tree order.
    /// * `multipoles` - Multipole expansions of the boxes at `level`.
    fn form_multipoles(
        &self,
        level: u64,
        expansion_order: usize,
        source_boxes: &[usize],
        source_weights: &[Self::Weight],
        multipoles: &mut ExpansionsMut<'_, Self::Coefficient>,
    ) -> FmmResult<()>;

    /// Multipole to multipole (M2M), translate the expansions of the children of each parent
    /// box at `level` to that parent, and add them.
    ///
    /// # Arguments
    /// * `level` - Tree level of `parent_boxes`.
    /// * `expansion_order` - Truncation order of the run.
    /// * `parent_boxes` - Non leaf boxes at `level` containing sources.
    /// * `child_multipoles` - Completed multipole expansions at `level + 1`.
    /// * `parent_multipoles` - Multipole expansions of the boxes at `level`.
    fn coarsen_multipoles(
        &self,
        level: u64,
        expansion_order: usize,
        parent_boxes: &[usize],
        child_multipoles: &Expansions<'_, Self::Coefficient>,
        parent_multipoles: &mut ExpansionsMut<'_, Self::Coefficient>,
    ) -> FmmResult<()>;

    /// Multipole to local (M2L), translate the multipoles of each target box's separated
    /// siblings (list 2) into the target's local expansion.
    ///
    /// # Arguments
    /// * `level` - Tree level of `target_boxes`.
    /// * `expansion_order` - Truncation order of the run.
    /// * `target_boxes` - Boxes at `level` containing targets.
    /// * `source_lists` - For each target box, the source boxes of its list 2.
    /// * `multipoles` - Multipole expansions of the boxes at `level`.
    /// * `locals` - Local expansions of the boxes at `level`.
    fn translate_box_multipoles_to_local(
        &self,
        level: u64,
        expansion_order: usize,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        multipoles: &Expansions<'_, Self::Coefficient>,
        locals: &mut ExpansionsMut<'_, Self::Coefficient>,
    ) -> FmmResult<()>;

    /// Particle to local (P2L), add the sources of each target box's bigger separated leaves
    /// (list 4) into the target's local expansion.
    ///
    /// # Arguments
    /// * `level` - Tree level of `target_boxes`.
    /// * `expansion_order` - Truncation order of the run.
    /// * `target_boxes` - Boxes at `level` containing targets.
    /// * `source_lists` - For each target box, the source leaves of its list 4.
    /// * `source_weights` - Weights in tree order.
    /// * `locals` - Local expansions of the boxes at `level`.
    fn form_locals(
        &self,
        level: u64,
        expansion_order: usize,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        source_weights: &[Self::Weight],
        locals: &mut ExpansionsMut<'_, Self::Coefficient>,
    ) -> FmmResult<()>;

    /// Local to local (L2L), shift the local expansion of each box's parent into the box and
    /// add it to what the box already holds.
    ///
    /// # Arguments
    /// * `level` - Tree level of `child_boxes`.
    /// * `expansion_order` - Truncation order of the run.
    /// * `child_boxes` - Boxes at `level` containing targets.
    /// * `parent_locals` - Completed local expansions at `level - 1`.
    /// * `child_locals` - Local expansions of the boxes at `level`.
    fn refine_locals(
        &self,
        level: u64,
        expansion_order: usize,
        child_boxes: &[usize],
        parent_locals: &Expansions<'_, Self::Coefficient>,
        child_locals: &mut ExpansionsMut<'_, Self::Coefficient>,
    ) -> FmmResult<()>;

    /// Local to particle (L2P), evaluate the local expansion of each target leaf at its targets.
    ///
    /// # Arguments
    /// * `level` - Tree level of `target_boxes`.
    /// * `expansion_order` - Truncation order of the run.
    /// * `target_boxes` - Leaf boxes at `level` containing targets.
    /// * `locals` - Completed local expansions of the boxes at `level`.
    /// * `potentials` - Potentials of all targets, in tree order.
    fn eval_locals(
        &self,
        level: u64,
        expansion_order: usize,
        target_boxes: &[usize],
        locals: &Expansions<'_, Self::Coefficient>,
        potentials: &mut [Self::Potential],
    ) -> FmmResult<()>;

    /// Multipole to particle (M2P), evaluate the multipoles of each target leaf's smaller
    /// separated boxes (list 3) at its targets.
    ///
    /// # Arguments
    /// * `level` - Tree level of `target_boxes`.
    /// * `expansion_order` - Truncation order of the run.
    /// * `target_boxes` - Leaf boxes at `level` containing targets.
    /// * `source_lists` - For each target leaf, the boxes of its list 3.
    /// * `multipoles` - Completed multipole expansions of every box in the tree.
    /// * `potentials` - Potentials of all targets, in tree order.
    fn eval_multipoles(
        &self,
        level: u64,
        expansion_order: usize,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        multipoles: &Expansions<'_, Self::Coefficient>,
        potentials: &mut [Self::Potential],
    ) -> FmmResult<()>;

    /// Particle to particle (P2P), direct interactions between each target leaf and its
    /// neighbouring source leaves (list 1), including itself.
    ///
    /// # Arguments
    /// * `target_boxes` - Leaf boxes containing targets, at all levels.
    /// * `source_lists` - For each target leaf, the source leaves of its list 1.
    /// * `source_weights` - Weights in tree order.
    /// * `potentials` - Potentials of all targets, in tree order.
    fn eval_direct(
        &self,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        source_weights: &[Self::Weight],
        potentials: &mut [Self::Potential],
    ) -> FmmResult<()>;

    /// Post processing applied to potentials once they are in user order, e.g. a global scale.
    fn finalize_potentials(
        &self,
        potentials: Vec<Self::Potential>,
    ) -> FmmResult<Vec<Self::Potential>> {
        Ok(potentials)
    }
}
