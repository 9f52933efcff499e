//! Expansion wrangler for the kernel that is identically one.
//!
//! Every target's potential is the sum of all source weights, whichever route through the
//! interaction lists the sources take, which makes this wrangler a check of traversals: a
//! source reached twice or never shows up directly in the potentials.
use crate::{
    fmm::types::{Expansions, ExpansionsMut},
    traits::{
        types::{FmmError, FmmResult, FmmScalar},
        wrangler::ExpansionWrangler,
    },
    traversal::types::ListSlice,
    tree::types::Tree,
    wrangler::{check_lists, permute, scatter_potentials, source_slices},
};

/// Wrangler for `G(x, y) = 1`, its expansions are a single coefficient holding the total weight.
pub struct ConstantOneWrangler<'a, T> {
    tree: &'a Tree<T>,
}

impl<'a, T> ConstantOneWrangler<'a, T>
where
    T: FmmScalar,
{
    /// Constructor
    pub fn new(tree: &'a Tree<T>) -> Self {
        Self { tree }
    }

    fn weight_sum(&self, ibox: usize, source_weights: &[T]) -> FmmResult<T> {
        let sources = self.tree.box_sources(ibox)?;
        let (_, weights) = source_slices(ibox, &self.tree.sources, source_weights, sources)?;
        Ok(weights.iter().fold(T::zero(), |acc, &w| acc + w))
    }

    fn expansion_sum(
        &self,
        boxes: &[usize],
        expansions: &Expansions<'_, T>,
    ) -> FmmResult<T> {
        boxes.iter().try_fold(T::zero(), |acc, &ibox| {
            Ok(acc + expansions.try_get(ibox)?[0])
        })
    }

    fn add_to_targets(&self, ibox: usize, value: T, potentials: &mut [T]) -> FmmResult<()> {
        let targets = self.tree.box_targets(ibox)?;
        let values = vec![value; targets.len()];
        scatter_potentials([(ibox, targets, values)], potentials)
    }
}

impl<T> ExpansionWrangler for ConstantOneWrangler<'_, T>
where
    T: FmmScalar,
{
    type Weight = T;
    type Potential = T;
    type Coefficient = T;

    fn expansion_order(&self) -> usize {
        0
    }

    fn ncoeffs(&self, _expansion_order: usize) -> usize {
        1
    }

    fn reorder_sources(&self, source_weights: &[T]) -> FmmResult<Vec<T>> {
        permute(source_weights, &self.tree.user_source_ids, "source weights")
    }

    fn reorder_potentials(&self, potentials: &[T]) -> FmmResult<Vec<T>> {
        permute(potentials, &self.tree.sorted_target_ids, "potentials")
    }

    fn form_multipoles(
        &self,
        _level: u64,
        _expansion_order: usize,
        source_boxes: &[usize],
        source_weights: &[T],
        multipoles: &mut ExpansionsMut<'_, T>,
    ) -> FmmResult<()> {
        for &ibox in source_boxes {
            let total = self.weight_sum(ibox, source_weights)?;
            multipoles.accumulate(ibox, &[total])?;
        }
        Ok(())
    }

    fn coarsen_multipoles(
        &self,
        _level: u64,
        _expansion_order: usize,
        parent_boxes: &[usize],
        child_multipoles: &Expansions<'_, T>,
        parent_multipoles: &mut ExpansionsMut<'_, T>,
    ) -> FmmResult<()> {
        for &ibox in parent_boxes {
            let children: Vec<usize> = self.tree.box_children(ibox)?.collect();
            let total = self.expansion_sum(&children, child_multipoles)?;
            parent_multipoles.accumulate(ibox, &[total])?;
        }
        Ok(())
    }

    fn translate_box_multipoles_to_local(
        &self,
        _level: u64,
        _expansion_order: usize,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        multipoles: &Expansions<'_, T>,
        locals: &mut ExpansionsMut<'_, T>,
    ) -> FmmResult<()> {
        check_lists(target_boxes, source_lists)?;
        for (&ibox, sources) in target_boxes.iter().zip(source_lists.iter()) {
            let total = self.expansion_sum(sources, multipoles)?;
            locals.accumulate(ibox, &[total])?;
        }
        Ok(())
    }

    fn form_locals(
        &self,
        _level: u64,
        _expansion_order: usize,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        source_weights: &[T],
        locals: &mut ExpansionsMut<'_, T>,
    ) -> FmmResult<()> {
        check_lists(target_boxes, source_lists)?;
        for (&ibox, sources) in target_boxes.iter().zip(source_lists.iter()) {
            let total = sources.iter().try_fold(T::zero(), |acc, &source| {
                Ok::<_, FmmError>(acc + self.weight_sum(source, source_weights)?)
            })?;
            locals.accumulate(ibox, &[total])?;
        }
        Ok(())
    }

    fn refine_locals(
        &self,
        _level: u64,
        _expansion_order: usize,
        child_boxes: &[usize],
        parent_locals: &Expansions<'_, T>,
        child_locals: &mut ExpansionsMut<'_, T>,
    ) -> FmmResult<()> {
        for &ibox in child_boxes {
            let parent = self.tree.box_parent(ibox)?;
            let value = parent_locals.try_get(parent)?[0];
            child_locals.accumulate(ibox, &[value])?;
        }
        Ok(())
    }

    fn eval_locals(
        &self,
        _level: u64,
        _expansion_order: usize,
        target_boxes: &[usize],
        locals: &Expansions<'_, T>,
        potentials: &mut [T],
    ) -> FmmResult<()> {
        for &ibox in target_boxes {
            let value = locals.try_get(ibox)?[0];
            self.add_to_targets(ibox, value, potentials)?;
        }
        Ok(())
    }

    fn eval_multipoles(
        &self,
        _level: u64,
        _expansion_order: usize,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        multipoles: &Expansions<'_, T>,
        potentials: &mut [T],
    ) -> FmmResult<()> {
        check_lists(target_boxes, source_lists)?;
        for (&ibox, sources) in target_boxes.iter().zip(source_lists.iter()) {
            let total = self.expansion_sum(sources, multipoles)?;
            self.add_to_targets(ibox, total, potentials)?;
        }
        Ok(())
    }

    fn eval_direct(
        &self,
        target_boxes: &[usize],
        source_lists: &ListSlice<'_>,
        source_weights: &[T],
        potentials: &mut [T],
    ) -> FmmResult<()> {
        check_lists(target_boxes, source_lists)?;
        for (&ibox, sources) in target_boxes.iter().zip(source_lists.iter()) {
            let total = sources.iter().try_fold(T::zero(), |acc, &source| {
                Ok::<_, FmmError>(acc + self.weight_sum(source, source_weights)?)
            })?;
            self.add_to_targets(ibox, total, potentials)?;
        }
        Ok(())
    }
}
