//! Detection rules.
//!
//! Both rules are pure functions over the same fetched snapshot and can be
//! applied in any order.

pub mod duration;
pub mod frequency;

pub use duration::*;
pub use frequency::*;
