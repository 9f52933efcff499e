//! Type definitions for quadtrees.
use std::{collections::HashMap, ops::Range};

use crate::tree::constants::NCHILDREN;

/// A square domain in 2D, defined by its lower left corner and the lengths of its sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain<T> {
    /// The lower left corner of the domain, defined by the point distribution.
    pub origin: [T; 2],

    /// The side length along each axis.
    pub side_length: [T; 2],
}

/// A Morton key identifies a box of the quadtree.
///
/// The key interleaves the bits of the box's anchor, its lower left corner in units of the
/// deepest level, and stores the level of the box in its lowest bits. Sorting keys therefore
/// places every box directly before its descendants.
#[derive(Clone, Copy, Debug, Default)]
pub struct MortonKey {
    /// The anchor is the index coordinate of the key, with respect to the origin of the Domain.
    pub anchor: [u64; 2],

    /// The Morton encoded anchor, with the level in its lowest bits.
    pub morton: u64,
}

/// A point in tree order, tagged with the deepest level key of the box containing it.
#[derive(Clone, Copy, Debug)]
pub struct Point<T> {
    /// Physical coordinate.
    pub coordinate: [T; 2],

    /// Key at the deepest level containing the point.
    pub base_key: MortonKey,

    /// Index of the point in the user supplied ordering.
    pub global_index: usize,
}

/// A pruned quadtree over a set of sources and targets.
///
/// Boxes are numbered level by level and in Morton order within a level, so the boxes of level
/// `l` are `level_start_box_nrs[l]..level_start_box_nrs[l + 1]`. Boxes containing neither
/// sources nor targets are never created.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    /// The domain the tree subdivides.
    pub domain: Domain<T>,

    /// Morton key of each box.
    pub keys: Vec<MortonKey>,

    /// Box number of each key.
    pub key_to_index: HashMap<MortonKey, usize>,

    /// First box number of each level, with a final entry equal to the number of boxes.
    pub level_start_box_nrs: Vec<usize>,

    /// Parent of each box, `None` for the root.
    pub box_parent_ids: Vec<Option<usize>>,

    /// Children of each box, indexed by their position within the parent.
    pub box_child_ids: Vec<[Option<usize>; NCHILDREN]>,

    /// Physical centre of each box.
    pub box_centres: Vec<[T; 2]>,

    /// Range of sources, in tree order, contained in each box and its descendants.
    pub box_source_ranges: Vec<Range<usize>>,

    /// Range of targets, in tree order, contained in each box and its descendants.
    pub box_target_ranges: Vec<Range<usize>>,

    /// Source coordinates in tree order, row major `[x_0, y_0, x_1, y_1, ...]`.
    pub sources: Vec<T>,

    /// Target coordinates in tree order, row major `[x_0, y_0, x_1, y_1, ...]`.
    pub targets: Vec<T>,

    /// User index of each source in tree order.
    pub user_source_ids: Vec<usize>,

    /// Tree index of each target in user order.
    pub sorted_target_ids: Vec<usize>,

    /// Whether targets were taken to be the sources.
    pub targets_are_sources: bool,
}

/// Builder for quadtrees.
///
/// A tree is either refined uniformly to a given depth, or adaptively until no leaf holds more
/// than a given number of points. Adaptive refinement is the default.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder<T> {
    /// Domain to subdivide, computed from the points when not set.
    pub domain: Option<Domain<T>>,

    /// Depth of a uniform tree.
    pub depth: Option<u64>,

    /// Maximum number of sources and targets in a leaf of an adaptive tree.
    pub max_particles_in_box: Option<usize>,

    /// Maximum level of an adaptive tree.
    pub max_level: Option<u64>,
}
