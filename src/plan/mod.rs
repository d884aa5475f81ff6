//! Terraform plan module.
//!
//! This module provides:
//! - Plan and resource change types
//! - Change classification and listing filters
//! - Ingestion of raw Terraform JSON plans
//! - Plan fingerprinting

mod classify;
mod filter;
mod fingerprint;
mod ingest;
mod types;

pub use classify::{classify, ChangeCategory};
pub use filter::ChangeFilter;
pub use fingerprint::PlanHasher;
pub use ingest::{IngestRequest, PlanIngestor};
pub use types::{
    parse_timestamp, ChangeDetail, CloudPlatform, Plan, PlanDocument, ResourceChange,
    ResourceEdge, ResourceGraph, ResourceNode, RESOURCE_GROUP_FIELD,
};
