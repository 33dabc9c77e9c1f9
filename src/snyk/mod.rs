//! Snyk API client and CLI wrapper.

mod api;
mod cli;

pub use api::*;
pub use cli::*;
