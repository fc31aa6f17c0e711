//! Markup-to-snapshot extraction.

mod engine;
pub mod sanitize;

pub use engine::extract;
