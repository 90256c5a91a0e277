//! CLI command implementations

pub mod cleanup;
pub mod diff;
pub mod doctor;
pub mod list;
pub mod order;
pub mod preload;
pub mod report;
pub mod run;
pub mod validate;

mod inputs;
mod reporting;
