//! Data models for the history scanner.

mod outcome;
mod project;
mod tag;

pub use outcome::*;
pub use project::*;
pub use tag::*;
