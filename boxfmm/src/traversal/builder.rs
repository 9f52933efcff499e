//! Construction of the interaction lists of a traversal.
use itertools::Itertools;
use log::debug;
use rayon::prelude::*;

use crate::{
    traits::types::{FmmResult, FmmScalar},
    traversal::types::{InteractionLists, LevelBoxes, Traversal},
    tree::types::Tree,
};

/// Lists 1 and 3 of a target leaf.
///
/// Descends from the leaf's colleagues: adjacent source leaves join list 1, adjacent non leaves
/// are opened, and the first non adjacent box on each path joins list 3. Coarser adjacent
/// leaves are found among the colleagues of the leaf's ancestors.
fn near_and_smaller<T: FmmScalar>(
    tree: &Tree<T>,
    colleagues: &[Vec<usize>],
    target: usize,
) -> (Vec<usize>, Vec<usize>) {
    let key = tree.keys[target];
    let mut near = Vec::new();
    let mut smaller = Vec::new();

    if tree.has_sources(target) {
        near.push(target);
    }

    let mut stack = colleagues[target].clone();
    while let Some(ibox) = stack.pop() {
        if !tree.has_sources(ibox) {
            continue;
        }

        if tree.keys[ibox].is_adjacent(&key) {
            if tree.is_leaf(ibox) {
                near.push(ibox);
            } else {
                stack.extend(tree.children(ibox));
            }
        } else {
            smaller.push(ibox);
        }
    }

    let mut ancestor = tree.box_parent_ids[target];
    while let Some(iancestor) = ancestor {
        near.extend(colleagues[iancestor].iter().copied().filter(|&ibox| {
            tree.is_leaf(ibox) && tree.has_sources(ibox) && tree.keys[ibox].is_adjacent(&key)
        }));
        ancestor = tree.box_parent_ids[iancestor];
    }

    near.sort_unstable();
    smaller.sort_unstable();
    (near, smaller)
}

/// Lists 2 and 4 of a box containing targets.
fn separated_siblings_and_bigger<T: FmmScalar>(
    tree: &Tree<T>,
    colleagues: &[Vec<usize>],
    target: usize,
) -> (Vec<usize>, Vec<usize>) {
    let Some(parent) = tree.box_parent_ids[target] else {
        return (Vec::new(), Vec::new());
    };

    let key = tree.keys[target];
    let parent_key = tree.keys[parent];

    let mut siblings = colleagues[parent]
        .iter()
        .flat_map(|&colleague| tree.children(colleague))
        .filter(|&ibox| tree.has_sources(ibox) && !tree.keys[ibox].is_adjacent(&key))
        .collect_vec();

    let mut bigger = Vec::new();
    let mut ancestor = Some(parent);
    while let Some(iancestor) = ancestor {
        bigger.extend(colleagues[iancestor].iter().copied().filter(|&ibox| {
            let source_key = tree.keys[ibox];
            tree.is_leaf(ibox)
                && tree.has_sources(ibox)
                && source_key.is_adjacent(&parent_key)
                && !source_key.is_adjacent(&key)
        }));
        ancestor = tree.box_parent_ids[iancestor];
    }

    siblings.sort_unstable();
    bigger.sort_unstable();
    (siblings, bigger)
}

impl<T> Traversal<T>
where
    T: FmmScalar,
{
    /// Derive the box sets and interaction lists of a tree.
    pub fn new(tree: Tree<T>) -> FmmResult<Self> {
        let nboxes = tree.nboxes();

        // Same level adjacent boxes present in the tree
        let colleagues = (0..nboxes)
            .into_par_iter()
            .map(|ibox| {
                tree.keys[ibox]
                    .neighbors()
                    .iter()
                    .filter_map(|key| tree.index(key))
                    .collect_vec()
            })
            .collect::<Vec<_>>();

        let select = |predicate: &dyn Fn(usize) -> bool| {
            LevelBoxes::from_sorted(&tree, (0..nboxes).filter(|&i| predicate(i)).collect())
        };

        let source_boxes = select(&|ibox: usize| tree.is_leaf(ibox) && tree.has_sources(ibox));
        let source_parent_boxes =
            select(&|ibox: usize| !tree.is_leaf(ibox) && tree.has_sources(ibox));
        let target_boxes = select(&|ibox: usize| tree.is_leaf(ibox) && tree.has_targets(ibox));
        let target_or_target_parent_boxes = select(&|ibox: usize| tree.has_targets(ibox));

        let (near, smaller): (Vec<_>, Vec<_>) = target_boxes
            .boxes
            .par_iter()
            .map(|&ibox| near_and_smaller(&tree, &colleagues, ibox))
            .unzip();

        let (siblings, bigger): (Vec<_>, Vec<_>) = target_or_target_parent_boxes
            .boxes
            .par_iter()
            .map(|&ibox| separated_siblings_and_bigger(&tree, &colleagues, ibox))
            .unzip();

        let traversal = Traversal {
            source_boxes,
            source_parent_boxes,
            target_boxes,
            target_or_target_parent_boxes,
            neighbor_source_boxes: InteractionLists::from_lists(near),
            from_sep_siblings: InteractionLists::from_lists(siblings),
            from_sep_smaller: InteractionLists::from_lists(smaller),
            from_sep_bigger: InteractionLists::from_lists(bigger),
            tree,
        };

        debug!(
            "built traversal: list 1 {} entries, list 2 {} entries, list 3 {} entries, list 4 {} entries",
            traversal.neighbor_source_boxes.lists.len(),
            traversal.from_sep_siblings.lists.len(),
            traversal.from_sep_smaller.lists.len(),
            traversal.from_sep_bigger.lists.len()
        );

        Ok(traversal)
    }

    /// Number of levels of the underlying tree.
    pub fn nlevels(&self) -> usize {
        self.tree.nlevels()
    }
}
