//! Trait definitions and the shared types they exchange.
pub mod types;
pub mod wrangler;
