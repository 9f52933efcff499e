//! Constructors and transformation methods for Morton keys of a quadtree.
use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
};

use itertools::izip;

use crate::{
    traits::types::{FmmError, FmmResult, FmmScalar},
    tree::{
        constants::{DEEPEST_LEVEL, DIRECTIONS, LEVEL_DISPLACEMENT, LEVEL_MASK, LEVEL_SIZE},
        types::{Domain, MortonKey},
    },
};

/// Spread the lowest 32 bits of `x` so that bit `i` moves to bit `2i`.
fn spread_bits(x: u64) -> u64 {
    let mut x = x & 0xFFFF_FFFF;
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    (x | (x << 1)) & 0x5555_5555_5555_5555
}

/// Encode an anchor.
/// Returns the Morton key associated with the given anchor.
///
/// # Arguments
/// * `anchor` - Integer coordinates of the box's lower left corner, in units of the deepest level.
/// * `level` - The level of the tree the anchor is encoded to.
pub fn encode_anchor(anchor: &[u64; 2], level: u64) -> u64 {
    let key = spread_bits(anchor[0]) | (spread_bits(anchor[1]) << 1);
    (key << LEVEL_DISPLACEMENT) | level
}

/// Map a point to the anchor of the box containing it at a given level.
///
/// # Arguments
/// * `point` - The (x, y) coordinates of the point to map.
/// * `level` - The level of the tree at which the point will be mapped.
/// * `domain` - The computational domain.
fn point_to_anchor<T: FmmScalar>(
    point: &[T; 2],
    level: u64,
    domain: &Domain<T>,
) -> FmmResult<[u64; 2]> {
    if !domain.contains(point) {
        return Err(FmmError::InvalidInput(format!(
            "Point {:?} not in domain {:?}",
            point, domain
        )));
    }

    let nboxes = 1u64 << level;
    let scaling_factor = 1u64 << (DEEPEST_LEVEL - level);
    let mut anchor = [0u64; 2];

    for (a, &p, &o, &s) in izip!(&mut anchor, point, &domain.origin, &domain.side_length) {
        let scaled = ((p - o) / s) * T::from(nboxes).unwrap_or_else(T::one);
        let index = scaled.floor().to_u64().ok_or_else(|| {
            FmmError::InvalidInput(format!("Point {:?} can't be mapped to a box", point))
        })?;
        // Points on the upper boundary belong to the last box
        *a = index.min(nboxes - 1) * scaling_factor;
    }

    Ok(anchor)
}

impl MortonKey {
    /// Constructor for Morton key
    pub fn new(anchor: &[u64; 2], morton: u64) -> Self {
        Self {
            anchor: *anchor,
            morton,
        }
    }

    /// The Morton key corresponding to the root of a quadtree.
    pub fn root() -> Self {
        Self::new(&[0, 0], 0)
    }

    /// Construct a `MortonKey` from the anchor at a given level.
    pub fn from_anchor(anchor: &[u64; 2], level: u64) -> Self {
        let morton = encode_anchor(anchor, level);
        Self::new(anchor, morton)
    }

    /// Construct the `MortonKey` of the box at `level` that encloses a point.
    ///
    /// # Arguments
    /// * `point` - Cartesian coordinate for a given point.
    /// * `domain` - Domain associated with a given tree encoding.
    /// * `level` - level of quadtree on which to find the encoding.
    pub fn from_point<T: FmmScalar>(
        point: &[T; 2],
        domain: &Domain<T>,
        level: u64,
    ) -> FmmResult<Self> {
        if level > DEEPEST_LEVEL {
            return Err(FmmError::InvalidInput(format!(
                "Level {level} is deeper than the deepest level {DEEPEST_LEVEL}"
            )));
        }
        let anchor = point_to_anchor(point, level, domain)?;
        Ok(MortonKey::from_anchor(&anchor, level))
    }

    /// The anchor corresponding to this key.
    pub fn anchor(&self) -> &[u64; 2] {
        &self.anchor
    }

    /// The Morton Key in index form.
    pub fn morton(&self) -> u64 {
        self.morton
    }

    /// The level of this key.
    pub fn level(&self) -> u64 {
        self.morton & LEVEL_MASK
    }

    /// The interleaved anchor bits, without the level.
    pub fn interleaved(&self) -> u64 {
        self.morton >> LEVEL_DISPLACEMENT
    }

    /// Side length of the box in units of the deepest level.
    pub fn side(&self) -> u64 {
        1 << (DEEPEST_LEVEL - self.level())
    }

    /// Inclusive range of interleaved anchors of the deepest level boxes inside this box.
    pub fn finest_range(&self) -> (u64, u64) {
        let first = self.interleaved();
        let count = 1u64 << (2 * (DEEPEST_LEVEL - self.level()));
        (first, first + count - 1)
    }

    /// Return the parent of a Morton Key, the root is its own parent.
    pub fn parent(&self) -> Self {
        let level = self.level();
        if level == 0 {
            return *self;
        }

        let parent_level = level - 1;
        let parent_side = 1u64 << (DEEPEST_LEVEL - parent_level);
        let anchor = self.anchor.map(|a| a - a % parent_side);

        MortonKey::from_anchor(&anchor, parent_level)
    }

    /// Position of this key among its siblings, in Morton order.
    pub fn child_index(&self) -> usize {
        if self.level() == 0 {
            return 0;
        }
        let side = self.side();
        let bit = |a: u64| ((a / side) & 1) as usize;
        bit(self.anchor[0]) | (bit(self.anchor[1]) << 1)
    }

    /// Return all children of a Morton Key in sorted order.
    pub fn children(&self) -> Vec<MortonKey> {
        let level = self.level() + 1;
        let half = 1u64 << (DEEPEST_LEVEL - level);

        (0..4u64)
            .map(|index| {
                let anchor = [
                    self.anchor[0] + (index & 1) * half,
                    self.anchor[1] + ((index >> 1) & 1) * half,
                ];
                MortonKey::from_anchor(&anchor, level)
            })
            .collect()
    }

    /// Return all children of the parent of this Morton Key.
    pub fn siblings(&self) -> Vec<MortonKey> {
        self.parent().children()
    }

    /// Check if the key is a strict ancestor of `other`.
    pub fn is_ancestor(&self, other: &MortonKey) -> bool {
        if self.level() >= other.level() {
            return false;
        }
        let side = self.side();
        self.anchor
            .iter()
            .zip(other.anchor.iter())
            .all(|(&a, &b)| a <= b && b < a + side)
    }

    /// Check if key is a strict descendant of another key.
    pub fn is_descendant(&self, other: &MortonKey) -> bool {
        other.is_ancestor(self)
    }

    /// Return all strict ancestors of this Morton Key, from its parent up to the root.
    pub fn ancestors(&self) -> Vec<MortonKey> {
        let mut ancestors = Vec::with_capacity(self.level() as usize);
        let mut current = *self;

        while current.level() > 0 {
            current = current.parent();
            ancestors.push(current);
        }

        ancestors
    }

    /// Return the coordinates of the anchor for this Morton Key.
    ///
    /// # Arguments
    /// * `domain` - The domain with which we are calculating with respect to.
    pub fn to_coordinates<T: FmmScalar>(&self, domain: &Domain<T>) -> [T; 2] {
        let mut coord = [T::zero(); 2];
        let level_size = T::from(LEVEL_SIZE).unwrap_or_else(T::one);

        for (&anchor_value, coord_ref, &origin_value, &side) in
            izip!(&self.anchor, &mut coord, &domain.origin, &domain.side_length)
        {
            let anchor_value = T::from(anchor_value).unwrap_or_else(T::zero);
            *coord_ref = origin_value + side * anchor_value / level_size;
        }

        coord
    }

    /// The physical side lengths of the box specified by this key.
    ///
    /// # Arguments
    /// `domain` - The physical domain with which we calculate the diameter with respect to.
    pub fn diameter<T: FmmScalar>(&self, domain: &Domain<T>) -> [T; 2] {
        let scale = T::from(self.side()).unwrap_or_else(T::one)
            / T::from(LEVEL_SIZE).unwrap_or_else(T::one);
        domain.side_length.map(|s| s * scale)
    }

    /// The physical centre of the box specified by this key.
    ///
    /// # Arguments
    /// * `domain` - The physical domain with which we calculate the centre with respect to.
    pub fn centre<T: FmmScalar>(&self, domain: &Domain<T>) -> [T; 2] {
        let anchor_coordinate = self.to_coordinates(domain);
        let diameter = self.diameter(domain);
        let two = T::one() + T::one();

        [
            anchor_coordinate[0] + diameter[0] / two,
            anchor_coordinate[1] + diameter[1] / two,
        ]
    }

    /// Find the transfer vector from `other` to this key in units of boxes at their level.
    ///
    /// # Arguments
    /// * `other` - A Morton Key on the same level.
    pub fn find_transfer_vector_components(&self, other: &MortonKey) -> FmmResult<[i64; 2]> {
        if self.level() != other.level() {
            return Err(FmmError::InvalidInput(format!(
                "Transfer vectors are only defined between keys on the same level, found levels {} and {}",
                self.level(),
                other.level()
            )));
        }

        let side = self.side() as i64;
        Ok([
            (self.anchor[0] as i64 - other.anchor[0] as i64) / side,
            (self.anchor[1] as i64 - other.anchor[1] as i64) / side,
        ])
    }

    /// Find key in a given direction.
    ///
    /// Returns the key obtained by moving direction\[j\] boxes along axis j starting from this
    /// key, or `None` if the result lies outside of the domain.
    ///
    /// # Arguments
    /// * `direction` - Number of boxes to move along each axis, may be negative.
    pub fn find_key_in_direction(&self, direction: &[i64; 2]) -> Option<MortonKey> {
        let level = self.level();
        let max_number_of_boxes = LEVEL_SIZE as i64;
        let step = self.side() as i64;

        let x = self.anchor[0] as i64 + step * direction[0];
        let y = self.anchor[1] as i64 + step * direction[1];

        if (0..max_number_of_boxes).contains(&x) && (0..max_number_of_boxes).contains(&y) {
            Some(MortonKey::from_anchor(&[x as u64, y as u64], level))
        } else {
            None
        }
    }

    /// Find all keys on the same level that share an edge or a corner with this key.
    pub fn neighbors(&self) -> Vec<MortonKey> {
        DIRECTIONS
            .iter()
            .filter_map(|d| self.find_key_in_direction(d))
            .collect()
    }

    /// Check if two keys are adjacent, i.e. their closed boxes touch without overlapping.
    /// The keys may be on different levels.
    pub fn is_adjacent(&self, other: &MortonKey) -> bool {
        if self == other || self.is_ancestor(other) || other.is_ancestor(self) {
            return false;
        }

        let (sa, sb) = (self.side(), other.side());
        self.anchor
            .iter()
            .zip(other.anchor.iter())
            .all(|(&a, &b)| a <= b + sb && b <= a + sa)
    }
}

impl PartialEq for MortonKey {
    fn eq(&self, other: &Self) -> bool {
        self.morton == other.morton
    }
}

impl Eq for MortonKey {}

impl Ord for MortonKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.morton.cmp(&other.morton)
    }
}

impl PartialOrd for MortonKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for MortonKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.morton.hash(state);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::helpers::points_fixture;

    #[test]
    fn test_encoding() {
        // Bits of x land on even positions, bits of y on odd positions
        assert_eq!(encode_anchor(&[1, 0], 0) >> LEVEL_DISPLACEMENT, 0b01);
        assert_eq!(encode_anchor(&[0, 1], 0) >> LEVEL_DISPLACEMENT, 0b10);
        assert_eq!(encode_anchor(&[3, 3], 0) >> LEVEL_DISPLACEMENT, 0b1111);
        assert_eq!(encode_anchor(&[0, 0], 7) & LEVEL_MASK, 7);
    }

    #[test]
    fn test_parent_children() {
        let domain = Domain::new([0.0, 0.0], [1.0, 1.0]).unwrap();
        let key = MortonKey::from_point(&[0.3, 0.8], &domain, 5).unwrap();

        let children = key.children();
        assert_eq!(children.len(), 4);
        for (i, child) in children.iter().enumerate() {
            assert_eq!(child.parent(), key);
            assert_eq!(child.child_index(), i);
            assert!(key.is_ancestor(child));
            assert!(child.is_descendant(&key));
        }

        // Children are returned in sorted order, directly after their parent
        let mut sorted = children.clone();
        sorted.sort();
        assert_eq!(sorted, children);
        assert!(key < children[0]);

        let ancestors = key.ancestors();
        assert_eq!(ancestors.len(), 5);
        assert_eq!(*ancestors.last().unwrap(), MortonKey::root());
        assert!(ancestors.iter().all(|a| a.is_ancestor(&key)));
        assert!(!key.is_ancestor(&key));
    }

    #[test]
    fn test_from_point() {
        let domain = Domain::new([0.0, 0.0], [1.0, 1.0]).unwrap();
        let points = points_fixture::<f64>(100, None, None, Some(1));

        for point in points.chunks_exact(2) {
            let point = [point[0], point[1]];
            let key = MortonKey::from_point(&point, &domain, 4).unwrap();
            let centre = key.centre(&domain);
            let diameter = key.diameter(&domain);
            assert!((point[0] - centre[0]).abs() <= diameter[0] / 2.0);
            assert!((point[1] - centre[1]).abs() <= diameter[1] / 2.0);
        }

        // Upper boundary belongs to the last box
        let key = MortonKey::from_point(&[1.0, 1.0], &domain, 2).unwrap();
        assert_eq!(key.anchor, [3 * (LEVEL_SIZE / 4), 3 * (LEVEL_SIZE / 4)]);

        assert!(MortonKey::from_point(&[1.5, 0.5], &domain, 2).is_err());
    }

    #[test]
    fn test_neighbors() {
        let corner = MortonKey::from_anchor(&[0, 0], 2);
        assert_eq!(corner.neighbors().len(), 3);

        let side = LEVEL_SIZE / 4;
        let interior = MortonKey::from_anchor(&[side, side], 2);
        let neighbors = interior.neighbors();
        assert_eq!(neighbors.len(), 8);
        assert!(neighbors.iter().all(|n| n.is_adjacent(&interior)));
        assert!(neighbors.iter().all(|n| n.level() == 2));
    }

    #[test]
    fn test_is_adjacent() {
        let side = LEVEL_SIZE / 4;
        let a = MortonKey::from_anchor(&[0, 0], 2);
        let b = MortonKey::from_anchor(&[side, side], 2);
        let c = MortonKey::from_anchor(&[2 * side, 0], 2);

        // Corner contact is adjacency
        assert!(a.is_adjacent(&b));
        assert!(!a.is_adjacent(&c));

        // Keys on different levels
        let big = MortonKey::from_anchor(&[2 * side, 2 * side], 1);
        assert!(b.is_adjacent(&big));
        assert!(!a.is_adjacent(&big));

        // Overlapping keys are never adjacent
        assert!(!a.is_adjacent(&a));
        assert!(!a.is_adjacent(&a.parent()));
    }

    #[test]
    fn test_transfer_vector() {
        let side = LEVEL_SIZE / 8;
        let a = MortonKey::from_anchor(&[3 * side, side], 3);
        let b = MortonKey::from_anchor(&[side, 4 * side], 3);

        assert_eq!(a.find_transfer_vector_components(&b).unwrap(), [2, -3]);
        assert_eq!(b.find_transfer_vector_components(&a).unwrap(), [-2, 3]);
        assert!(a.find_transfer_vector_components(&a.parent()).is_err());
    }
}
