//! Construction of quadtrees, and accessors for the boxes of a built tree.
use std::{collections::HashMap, ops::Range};

use itertools::Itertools;
use log::debug;

use crate::{
    traits::types::{FmmError, FmmResult, FmmScalar},
    tree::{
        constants::{DEEPEST_LEVEL, DEFAULT_MAX_LEVEL, DEFAULT_MAX_PARTICLES_IN_BOX, NCHILDREN},
        types::{Domain, MortonKey, Point, Tree, TreeBuilder},
    },
};

/// Range of sorted points whose deepest level key lies inside `key`.
fn key_range<T>(key: &MortonKey, points: &[Point<T>]) -> Range<usize> {
    let (first, last) = key.finest_range();
    let start = points.partition_point(|p| p.base_key.interleaved() < first);
    let end = points.partition_point(|p| p.base_key.interleaved() <= last);
    start..end
}

/// Tag coordinates with their deepest level keys, and sort them into Morton order.
fn sorted_points<T: FmmScalar>(coordinates: &[T], domain: &Domain<T>) -> FmmResult<Vec<Point<T>>> {
    let mut points = coordinates
        .chunks_exact(2)
        .enumerate()
        .map(|(global_index, c)| {
            let coordinate = [c[0], c[1]];
            let base_key = MortonKey::from_point(&coordinate, domain, DEEPEST_LEVEL)?;
            Ok(Point {
                coordinate,
                base_key,
                global_index,
            })
        })
        .collect::<FmmResult<Vec<_>>>()?;

    points.sort();
    Ok(points)
}

fn check_coordinates<T>(coordinates: &[T], name: &str) -> FmmResult<()> {
    if coordinates.is_empty() || coordinates.len() % 2 != 0 {
        return Err(FmmError::InvalidInput(format!(
            "Expected a non-empty list of 2D {name} coordinates, found {} values",
            coordinates.len()
        )));
    }
    Ok(())
}

impl<T> TreeBuilder<T>
where
    T: FmmScalar,
{
    /// Initialise an adaptive builder with default parameters.
    pub fn new() -> Self {
        Self {
            domain: None,
            depth: None,
            max_particles_in_box: None,
            max_level: None,
        }
    }

    /// Refine every box containing points down to `depth`.
    pub fn uniform(mut self, depth: u64) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Refine boxes holding more than `max_particles_in_box` sources and targets, down to at
    /// most `max_level`.
    pub fn adaptive(mut self, max_particles_in_box: usize, max_level: u64) -> Self {
        self.depth = None;
        self.max_particles_in_box = Some(max_particles_in_box);
        self.max_level = Some(max_level);
        self
    }

    /// Subdivide a given domain instead of the bounding box of the points.
    pub fn domain(mut self, domain: Domain<T>) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Build the tree.
    ///
    /// # Arguments
    /// * `sources` - Source coordinates, row major `[x_0, y_0, x_1, y_1, ...]`.
    /// * `targets` - Target coordinates, row major. When `None` the sources are the targets.
    pub fn build(self, sources: &[T], targets: Option<&[T]>) -> FmmResult<Tree<T>> {
        check_coordinates(sources, "source")?;
        if let Some(targets) = targets {
            check_coordinates(targets, "target")?;
        }

        let (max_level, max_particles_in_box) = match self.depth {
            Some(depth) => (depth, None),
            None => (
                self.max_level.unwrap_or(DEFAULT_MAX_LEVEL),
                Some(
                    self.max_particles_in_box
                        .unwrap_or(DEFAULT_MAX_PARTICLES_IN_BOX),
                ),
            ),
        };

        if max_level > DEEPEST_LEVEL {
            return Err(FmmError::InvalidInput(format!(
                "Tree level {max_level} exceeds the deepest supported level {DEEPEST_LEVEL}"
            )));
        }
        if max_particles_in_box == Some(0) {
            return Err(FmmError::InvalidInput(
                "Leaves must be allowed to hold at least one particle".to_string(),
            ));
        }

        let domain = match self.domain {
            Some(domain) => {
                domain.validate()?;
                domain
            }
            None => {
                let mut all = sources.to_vec();
                if let Some(targets) = targets {
                    all.extend_from_slice(targets);
                }
                Domain::from_local_points(&all)?
            }
        };

        let source_points = sorted_points(sources, &domain)?;
        let target_points = match targets {
            Some(targets) => Some(sorted_points(targets, &domain)?),
            None => None,
        };

        // Number of distinct sources and targets inside a box
        let count = |key: &MortonKey| {
            key_range(key, &source_points).len()
                + target_points
                    .as_ref()
                    .map_or(0, |points| key_range(key, points).len())
        };

        // Refine level by level, children of sorted parents are themselves sorted
        let mut levels = vec![vec![MortonKey::root()]];
        for level in 0..max_level {
            let next = levels[level as usize]
                .iter()
                .filter(|key| max_particles_in_box.map_or(true, |max| count(key) > max))
                .flat_map(|key| key.children())
                .filter(|child| count(child) > 0)
                .collect_vec();

            if next.is_empty() {
                break;
            }
            levels.push(next);
        }

        let mut level_start_box_nrs = Vec::with_capacity(levels.len() + 1);
        let mut keys = Vec::new();
        for level_keys in levels.iter() {
            level_start_box_nrs.push(keys.len());
            keys.extend_from_slice(level_keys);
        }
        level_start_box_nrs.push(keys.len());

        let key_to_index: HashMap<MortonKey, usize> = keys
            .iter()
            .enumerate()
            .map(|(index, &key)| (key, index))
            .collect();

        let nboxes = keys.len();
        let mut box_parent_ids = vec![None; nboxes];
        let mut box_child_ids = vec![[None; NCHILDREN]; nboxes];
        for (index, key) in keys.iter().enumerate().skip(1) {
            let parent = key_to_index.get(&key.parent()).copied().ok_or_else(|| {
                FmmError::MalformedTraversal {
                    ibox: index,
                    reason: "parent box missing from tree".to_string(),
                }
            })?;
            box_parent_ids[index] = Some(parent);
            box_child_ids[parent][key.child_index()] = Some(index);
        }

        let box_centres = keys.iter().map(|key| key.centre(&domain)).collect_vec();
        let box_source_ranges = keys
            .iter()
            .map(|key| key_range(key, &source_points))
            .collect_vec();

        let sorted_sources = source_points
            .iter()
            .flat_map(|p| p.coordinate)
            .collect_vec();
        let user_source_ids = source_points.iter().map(|p| p.global_index).collect_vec();

        let (targets, box_target_ranges, sorted_target_ids) = match target_points.as_ref() {
            Some(points) => {
                let mut sorted_target_ids = vec![0; points.len()];
                for (tree_index, point) in points.iter().enumerate() {
                    sorted_target_ids[point.global_index] = tree_index;
                }
                (
                    points.iter().flat_map(|p| p.coordinate).collect_vec(),
                    keys.iter().map(|key| key_range(key, points)).collect_vec(),
                    sorted_target_ids,
                )
            }
            None => {
                let mut sorted_target_ids = vec![0; user_source_ids.len()];
                for (tree_index, &user_index) in user_source_ids.iter().enumerate() {
                    sorted_target_ids[user_index] = tree_index;
                }
                (
                    sorted_sources.clone(),
                    box_source_ranges.clone(),
                    sorted_target_ids,
                )
            }
        };

        let tree = Tree {
            domain,
            keys,
            key_to_index,
            level_start_box_nrs,
            box_parent_ids,
            box_child_ids,
            box_centres,
            box_source_ranges,
            box_target_ranges,
            sources: sorted_sources,
            targets,
            user_source_ids,
            sorted_target_ids,
            targets_are_sources: target_points.is_none(),
        };

        debug!(
            "built tree with {} boxes on {} levels, {} sources and {} targets",
            tree.nboxes(),
            tree.nlevels(),
            tree.nsources(),
            tree.ntargets()
        );

        Ok(tree)
    }
}

impl<T> Tree<T>
where
    T: FmmScalar,
{
    /// Total number of boxes.
    pub fn nboxes(&self) -> usize {
        self.keys.len()
    }

    /// Number of levels, including the root level.
    pub fn nlevels(&self) -> usize {
        self.level_start_box_nrs.len() - 1
    }

    /// Level of the deepest boxes.
    pub fn depth(&self) -> u64 {
        (self.nlevels() - 1) as u64
    }

    /// Number of sources.
    pub fn nsources(&self) -> usize {
        self.user_source_ids.len()
    }

    /// Number of targets.
    pub fn ntargets(&self) -> usize {
        self.sorted_target_ids.len()
    }

    /// Box numbers of a level.
    pub fn level_boxes(&self, level: u64) -> Range<usize> {
        let level = level as usize;
        match (
            self.level_start_box_nrs.get(level),
            self.level_start_box_nrs.get(level + 1),
        ) {
            (Some(&start), Some(&end)) => start..end,
            _ => 0..0,
        }
    }

    /// Level of a box.
    pub fn box_level(&self, ibox: usize) -> u64 {
        self.keys[ibox].level()
    }

    /// Whether a box has no children.
    pub fn is_leaf(&self, ibox: usize) -> bool {
        self.box_child_ids[ibox].iter().all(|c| c.is_none())
    }

    /// Children of a box.
    pub fn children(&self, ibox: usize) -> impl Iterator<Item = usize> + '_ {
        self.box_child_ids[ibox].iter().flatten().copied()
    }

    /// Box number of a key, if the key is in the tree.
    pub fn index(&self, key: &MortonKey) -> Option<usize> {
        self.key_to_index.get(key).copied()
    }

    /// Physical side length of the boxes at a level.
    pub fn box_side(&self, level: u64) -> T {
        let scale = T::from(1u64 << level).unwrap_or_else(T::one);
        self.domain.side_length[0] / scale
    }

    /// Range of tree ordered sources inside a box.
    pub fn box_sources(&self, ibox: usize) -> FmmResult<Range<usize>> {
        self.box_source_ranges
            .get(ibox)
            .cloned()
            .ok_or_else(|| FmmError::MalformedTraversal {
                ibox,
                reason: format!("box not in tree of {} boxes", self.nboxes()),
            })
    }

    /// Range of tree ordered targets inside a box.
    pub fn box_targets(&self, ibox: usize) -> FmmResult<Range<usize>> {
        self.box_target_ranges
            .get(ibox)
            .cloned()
            .ok_or_else(|| FmmError::MalformedTraversal {
                ibox,
                reason: format!("box not in tree of {} boxes", self.nboxes()),
            })
    }

    /// Centre of a box.
    pub fn box_centre(&self, ibox: usize) -> FmmResult<[T; 2]> {
        self.box_centres
            .get(ibox)
            .copied()
            .ok_or_else(|| FmmError::MalformedTraversal {
                ibox,
                reason: format!("box not in tree of {} boxes", self.nboxes()),
            })
    }

    /// Parent of a box, an error for the root or boxes outside of the tree.
    pub fn box_parent(&self, ibox: usize) -> FmmResult<usize> {
        self.box_parent_ids
            .get(ibox)
            .copied()
            .flatten()
            .ok_or_else(|| FmmError::MalformedTraversal {
                ibox,
                reason: "box has no parent".to_string(),
            })
    }

    /// Children of a box, an error for boxes outside of the tree.
    pub fn box_children(&self, ibox: usize) -> FmmResult<impl Iterator<Item = usize> + '_> {
        self.box_child_ids
            .get(ibox)
            .map(|children| children.iter().flatten().copied())
            .ok_or_else(|| FmmError::MalformedTraversal {
                ibox,
                reason: format!("box not in tree of {} boxes", self.nboxes()),
            })
    }

    /// Whether a box contains any sources.
    pub fn has_sources(&self, ibox: usize) -> bool {
        !self.box_source_ranges[ibox].is_empty()
    }

    /// Whether a box contains any targets.
    pub fn has_targets(&self, ibox: usize) -> bool {
        !self.box_target_ranges[ibox].is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::helpers::{points_fixture, points_fixture_clustered};

    fn check_invariants(tree: &Tree<f64>) {
        // Levels are contiguous and each non root box's parent is one level up
        for level in 0..tree.nlevels() as u64 {
            for ibox in tree.level_boxes(level) {
                assert_eq!(tree.box_level(ibox), level);
            }
        }
        assert_eq!(tree.box_parent_ids[0], None);
        for ibox in 1..tree.nboxes() {
            let parent = tree.box_parent_ids[ibox].unwrap();
            assert_eq!(tree.box_level(parent) + 1, tree.box_level(ibox));
            assert!(tree.children(parent).any(|c| c == ibox));
        }

        // No empty boxes survive
        for ibox in 0..tree.nboxes() {
            assert!(tree.has_sources(ibox) || tree.has_targets(ibox));
        }

        // Leaves partition the points
        let mut covered = vec![0; tree.nsources()];
        for ibox in (0..tree.nboxes()).filter(|&ibox| tree.is_leaf(ibox)) {
            for i in tree.box_source_ranges[ibox].clone() {
                covered[i] += 1;
            }
        }
        assert!(covered.iter().all(|&c| c == 1));

        // Points lie inside their boxes
        for ibox in (0..tree.nboxes()).filter(|&ibox| tree.is_leaf(ibox)) {
            let centre = tree.box_centres[ibox];
            let half = tree.box_side(tree.box_level(ibox)) / 2.0 * (1.0 + 1e-12);
            for i in tree.box_source_ranges[ibox].clone() {
                assert!((tree.sources[2 * i] - centre[0]).abs() <= half);
                assert!((tree.sources[2 * i + 1] - centre[1]).abs() <= half);
            }
        }
    }

    #[test]
    fn test_uniform_tree() {
        let sources = points_fixture::<f64>(1000, None, None, Some(0));
        let tree = TreeBuilder::new().uniform(3).build(&sources, None).unwrap();

        assert_eq!(tree.nlevels(), 4);
        assert_eq!(tree.depth(), 3);
        // Dense enough that no box is empty
        assert_eq!(tree.level_boxes(3).len(), 64);
        assert_eq!(tree.nboxes(), 1 + 4 + 16 + 64);
        assert!(tree.targets_are_sources);
        assert_eq!(tree.sources, tree.targets);
        check_invariants(&tree);
    }

    #[test]
    fn test_adaptive_tree() {
        let sources = points_fixture_clustered::<f64>(200, 300, 0.05, Some(0));
        let targets = points_fixture::<f64>(150, None, None, Some(3));
        let max_particles = 10;
        let tree = TreeBuilder::new()
            .adaptive(max_particles, 10)
            .build(&sources, Some(&targets))
            .unwrap();

        assert_eq!(tree.nsources(), 500);
        assert_eq!(tree.ntargets(), 150);
        assert!(!tree.targets_are_sources);
        check_invariants(&tree);

        // Leaves above the maximum level respect the particle limit
        for ibox in (0..tree.nboxes()).filter(|&ibox| tree.is_leaf(ibox)) {
            if tree.box_level(ibox) < 10 {
                let n = tree.box_source_ranges[ibox].len() + tree.box_target_ranges[ibox].len();
                assert!(n <= max_particles);
            }
        }

        // Leaves have different levels
        let leaf_levels = (0..tree.nboxes())
            .filter(|&ibox| tree.is_leaf(ibox))
            .map(|ibox| tree.box_level(ibox))
            .unique()
            .count();
        assert!(leaf_levels > 1);
    }

    #[test]
    fn test_orderings() {
        let sources = points_fixture::<f64>(300, None, None, Some(5));
        let targets = points_fixture::<f64>(200, None, None, Some(6));
        let tree = TreeBuilder::new()
            .adaptive(15, 8)
            .build(&sources, Some(&targets))
            .unwrap();

        for (tree_index, &user_index) in tree.user_source_ids.iter().enumerate() {
            assert_eq!(tree.sources[2 * tree_index], sources[2 * user_index]);
            assert_eq!(tree.sources[2 * tree_index + 1], sources[2 * user_index + 1]);
        }
        for (user_index, &tree_index) in tree.sorted_target_ids.iter().enumerate() {
            assert_eq!(tree.targets[2 * tree_index], targets[2 * user_index]);
            assert_eq!(tree.targets[2 * tree_index + 1], targets[2 * user_index + 1]);
        }
    }

    #[test]
    fn test_invalid_input() {
        let builder = TreeBuilder::<f64>::new();
        assert!(matches!(
            builder.clone().build(&[], None),
            Err(FmmError::InvalidInput(_))
        ));
        assert!(matches!(
            builder.clone().build(&[0.0, 1.0, 2.0], None),
            Err(FmmError::InvalidInput(_))
        ));
        assert!(matches!(
            builder.clone().uniform(DEEPEST_LEVEL + 1).build(&[0.0, 1.0], None),
            Err(FmmError::InvalidInput(_))
        ));

        let domain = Domain::new([0.0, 0.0], [1.0, 1.0]).unwrap();
        assert!(matches!(
            builder.clone().domain(domain).build(&[0.5, 2.0], None),
            Err(FmmError::InvalidInput(_))
        ));

        // Rectangular domains bypassing the constructor are rejected too
        let rectangle = Domain {
            origin: [0.0, 0.0],
            side_length: [1.0, 8.0],
        };
        assert!(matches!(
            builder.domain(rectangle).build(&[0.5, 2.0, 0.5, 7.0], None),
            Err(FmmError::InvalidInput(_))
        ));
    }
}
