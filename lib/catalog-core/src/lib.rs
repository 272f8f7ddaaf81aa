//! Core catalog synchronization logic
//!
//! This library provides:
//! - Tag filtering and constraint expressions for service selection
//! - Health reconciliation of catalog registrations into service instances
//! - The dynamic configuration model and its builder

pub mod builder;
pub mod bundle;
pub mod constraints;
pub mod dynamic;
pub mod error;
pub mod filter;
pub mod health;
pub mod instance;
pub mod labels;
pub mod rule;

pub use builder::ConfigurationBuilder;
pub use bundle::{ConnectCertBundle, KeyPair};
pub use dynamic::{Configuration, ConfigurationMessage};
pub use error::{CoreError, Result};
pub use filter::{FilterDecision, TagFilter};
pub use health::{index_statuses, merge_instances, MergeOptions};
pub use instance::ServiceInstance;
pub use labels::{tags_to_labels, ExtraConfiguration};
pub use rule::{normalize, DefaultRuleTemplate, DEFAULT_TEMPLATE_RULE};
