//! GitHub client and Git operations module.

mod git;
mod github;

pub use git::*;
pub use github::*;
