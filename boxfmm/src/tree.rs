//! A 2D quadtree with Morton key indexing, built either to a uniform depth or adaptively.
pub mod constants;
mod builder;
mod domain;
pub mod helpers;
pub mod morton;
mod point;
pub mod types;
