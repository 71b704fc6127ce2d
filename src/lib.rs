//! boson — data-driven API test executor.
//!
//! Scenarios are declared in YAML: each step issues one HTTP call,
//! optionally captures response values into named variables for
//! later steps, and validates the response against a declarative
//! assertion set. One bearer credential is tracked across steps and
//! refreshed through a designated login step.

pub mod assertions;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod model;
pub mod path;
pub mod resolver;
pub mod store;
pub mod token;

pub use config::*;
pub use executor::*;
pub use model::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
