//! Crate wide constants for tree construction.

/// Deepest level of the quadtree that a Morton key can encode.
pub const DEEPEST_LEVEL: u64 = 16;

/// Number of boxes along each axis at the deepest level.
pub const LEVEL_SIZE: u64 = 1 << DEEPEST_LEVEL;

/// Number of bits used to store the level in a Morton key.
pub const LEVEL_DISPLACEMENT: usize = 5;

/// Mask for the level bits of a Morton key.
pub const LEVEL_MASK: u64 = 0x1F;

/// Number of children of a box.
pub const NCHILDREN: usize = 4;

/// Number of siblings, including itself, of a box.
pub const NSIBLINGS: usize = 4;

/// Maximum number of boxes adjacent to a box on the same level.
pub const NNEIGHBOURS: usize = 8;

/// Unit steps towards all boxes on the same level that share an edge or a corner.
pub const DIRECTIONS: [[i64; 2]; NNEIGHBOURS] = [
    [-1, -1],
    [0, -1],
    [1, -1],
    [-1, 0],
    [1, 0],
    [-1, 1],
    [0, 1],
    [1, 1],
];

/// Default maximum number of points in a leaf of an adaptive tree.
pub const DEFAULT_MAX_PARTICLES_IN_BOX: usize = 30;

/// Default maximum level of an adaptive tree.
pub const DEFAULT_MAX_LEVEL: u64 = 12;

/// Fraction of the bounding box side added on each side of a domain computed from points.
pub const DOMAIN_PADDING: f64 = 0.005;
