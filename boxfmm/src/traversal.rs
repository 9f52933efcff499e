//! Traversals of a quadtree: the boxes taking part in each pass of an FMM, and their
//! interaction lists.
mod builder;
pub mod types;
