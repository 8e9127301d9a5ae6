//! Report rendering.

pub mod generator;
pub mod templating;

pub use generator::{compose, render, render_html};
