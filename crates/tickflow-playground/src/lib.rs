#![forbid(unsafe_code)]

//! Command-line playground for tickflow streams.

pub mod cli;
pub mod demo;
pub mod error;

pub use cli::{run, run_from_env};
pub use error::{PlaygroundError, Result};
