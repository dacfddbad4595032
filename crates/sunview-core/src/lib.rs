pub mod config;
pub mod constants;
pub mod diag;

pub use config::{Resolved, Scenario};
