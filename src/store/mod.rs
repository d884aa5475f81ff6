//! Plan storage module.
//!
//! This module provides the sources plans are read from:
//! - A local archive of ingested plans
//! - The remote drift API

mod local;
mod remote;
mod source;

pub use local::{LocalPlanStore, ARCHIVE_DIR};
pub use remote::RemotePlanSource;
pub use source::{PlanFilter, PlanSource};

#[cfg(test)]
pub use source::MockPlanSource;
