// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # driftscope
//!
//! Terraform drift classification, aggregation and dependency graph layout
//! for projects split into components and environments.
//!
//! ## Overview
//!
//! driftscope ingests Terraform JSON plans and answers, per component and
//! environment, how far the deployed infrastructure has drifted:
//!
//! - Classify every resource change as create, update, delete, replace or no-op
//! - Summarize changes with an alignment percentage, optionally grouped
//! - Resolve the latest plan per component and environment
//! - Build trend series over the plan history
//! - Lay out a two-level component and resource dependency graph
//!
//! ## Modules
//!
//! - [`config`]: Project configuration parsing and validation
//! - [`plan`]: Plan types, classification and ingestion
//! - [`drift`]: Summaries, grouping, latest state, trends and the drift matrix
//! - [`graph`]: Layered dependency graph layout
//! - [`store`]: Local plan archive and remote API source
//! - [`dashboard`]: Report views over a plan source
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: platform
//!   environments: [dev, production-uks-1]
//!   environments_config:
//!     production-uks-1: { group: Production, region: UK South }
//!
//! components:
//!   - name: network
//!   - name: app
//!     depends_on: [network]
//!
//! store:
//!   backend: local
//!   path: .driftscope
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod drift;
pub mod error;
pub mod graph;
pub mod plan;
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, DriftConfig};
pub use dashboard::Dashboard;
pub use drift::{aggregate, aggregate_grouped, DriftSummary, GroupKey, LatestIndex};
pub use error::{DriftError, Result};
pub use graph::{GraphLayout, LayeredGraph};
pub use plan::{classify, ChangeCategory, Plan, PlanIngestor, ResourceChange};
pub use store::{LocalPlanStore, PlanSource, RemotePlanSource};
