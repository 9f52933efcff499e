//! Type definitions for traversals.
use std::ops::Range;

use crate::tree::types::Tree;

/// Box numbers grouped by level, in increasing level order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelBoxes {
    /// Box numbers.
    pub boxes: Vec<usize>,

    /// Start of each level in `boxes`, with a final entry equal to `boxes.len()`.
    pub level_starts: Vec<usize>,
}

/// Interaction lists in compressed sparse row form.
///
/// The lists of the `i`-th box of the associated [`LevelBoxes`] are
/// `lists[starts[i]..starts[i + 1]]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionLists {
    /// Offsets into `lists`, one more than the number of boxes.
    pub starts: Vec<usize>,

    /// Concatenated lists of box numbers.
    pub lists: Vec<usize>,
}

/// A borrowed view of the interaction lists of a contiguous run of boxes.
#[derive(Debug, Clone, Copy)]
pub struct ListSlice<'a> {
    pub(crate) starts: &'a [usize],
    pub(crate) lists: &'a [usize],
}

/// Everything the FMM driver needs to know about a tree.
///
/// Box sets and their lists:
/// * `source_boxes` - leaves containing sources, formed into multipoles.
/// * `source_parent_boxes` - non leaves containing sources, coarsened from their children.
/// * `target_boxes` - leaves containing targets, evaluated at. Indexes `neighbor_source_boxes`
///   (list 1) and `from_sep_smaller` (list 3).
/// * `target_or_target_parent_boxes` - all boxes containing targets, receiving local
///   expansions. Indexes `from_sep_siblings` (list 2) and `from_sep_bigger` (list 4).
///
/// Together the four lists account for every source and target pair exactly once.
#[derive(Debug, Clone)]
pub struct Traversal<T> {
    /// The tree being traversed.
    pub tree: Tree<T>,

    /// Leaves containing sources.
    pub source_boxes: LevelBoxes,

    /// Non leaf boxes containing sources.
    pub source_parent_boxes: LevelBoxes,

    /// Leaves containing targets.
    pub target_boxes: LevelBoxes,

    /// Boxes containing targets.
    pub target_or_target_parent_boxes: LevelBoxes,

    /// List 1, source leaves adjacent to each target leaf, including the leaf itself.
    pub neighbor_source_boxes: InteractionLists,

    /// List 2, children of the colleagues of each box's parent that aren't adjacent to the box.
    pub from_sep_siblings: InteractionLists,

    /// List 3, boxes not adjacent to a target leaf whose parents are adjacent to it.
    pub from_sep_smaller: InteractionLists,

    /// List 4, coarser source leaves adjacent to each box's parent but not to the box.
    pub from_sep_bigger: InteractionLists,
}

impl LevelBoxes {
    /// Group boxes, already sorted by level, with the levels of a tree.
    pub(crate) fn from_sorted<T>(tree: &Tree<T>, boxes: Vec<usize>) -> Self {
        let nlevels = tree.level_start_box_nrs.len() - 1;
        let level_starts = (0..=nlevels)
            .map(|level| boxes.partition_point(|&ibox| ibox < tree.level_start_box_nrs[level]))
            .collect();
        LevelBoxes {
            boxes,
            level_starts,
        }
    }

    /// Number of levels.
    pub fn nlevels(&self) -> usize {
        self.level_starts.len().saturating_sub(1)
    }

    /// Number of boxes over all levels.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Whether there are no boxes.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Positions in `boxes` of the boxes at a level.
    pub fn level_range(&self, level: u64) -> Range<usize> {
        let level = level as usize;
        match (
            self.level_starts.get(level),
            self.level_starts.get(level + 1),
        ) {
            (Some(&start), Some(&end)) => start..end,
            _ => 0..0,
        }
    }

    /// Box numbers at a level.
    pub fn level(&self, level: u64) -> &[usize] {
        &self.boxes[self.level_range(level)]
    }
}

impl InteractionLists {
    /// Build from one list per box.
    pub(crate) fn from_lists(per_box: Vec<Vec<usize>>) -> Self {
        let mut starts = Vec::with_capacity(per_box.len() + 1);
        let mut lists = Vec::new();
        starts.push(0);
        for list in per_box {
            lists.extend(list);
            starts.push(lists.len());
        }
        InteractionLists { starts, lists }
    }

    /// Number of boxes the lists are indexed by.
    pub fn nboxes(&self) -> usize {
        self.starts.len().saturating_sub(1)
    }

    /// List of the `i`-th box.
    pub fn list(&self, i: usize) -> &[usize] {
        &self.lists[self.starts[i]..self.starts[i + 1]]
    }

    /// View of the lists of the boxes at positions `range`.
    pub fn slice(&self, range: Range<usize>) -> ListSlice<'_> {
        ListSlice {
            starts: &self.starts[range.start..range.end + 1],
            lists: &self.lists,
        }
    }

    /// View of all lists.
    pub fn all(&self) -> ListSlice<'_> {
        self.slice(0..self.nboxes())
    }
}

impl<'a> ListSlice<'a> {
    /// Number of boxes in the view.
    pub fn len(&self) -> usize {
        self.starts.len().saturating_sub(1)
    }

    /// Whether the view holds no boxes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// List of the `i`-th box of the view.
    pub fn list(&self, i: usize) -> &'a [usize] {
        &self.lists[self.starts[i]..self.starts[i + 1]]
    }

    /// Total number of entries over the lists in the view.
    pub fn nentries(&self) -> usize {
        match (self.starts.first(), self.starts.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        }
    }

    /// Iterate over the lists in the view.
    pub fn iter(&self) -> impl Iterator<Item = &'a [usize]> + '_ {
        (0..self.len()).map(move |i| self.list(i))
    }
}
