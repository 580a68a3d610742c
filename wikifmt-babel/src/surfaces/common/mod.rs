//! Shared pieces of the HTML-based surfaces

pub mod dom;
pub mod normalize;
pub mod placeholder;
