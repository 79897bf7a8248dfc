//! Kubernetes Resource Checks
//!
//! Health checks declared on Kubernetes resources through an annotation and
//! executed against snapshots of those resources.
//!
//! # Example
//!
//! ```no_run
//! use checks::{CheckParser, CheckPluginRegistry, ResourceKind};
//! use std::sync::Arc;
//!
//! let parser = CheckParser::new(Arc::new(CheckPluginRegistry::with_builtin_checks()));
//! let (checks, errors) = parser.parse(
//!     r#"[{"name": "deploy", "command": "deployment_status -w 0.8", "interval": 60}]"#,
//!     "web.deployment.default",
//!     ResourceKind::Deployment,
//! );
//! assert_eq!(checks.len(), 1);
//! assert!(errors.is_empty());
//! ```
//!
//! # Features
//!
//! - **Declarations**: defaults merge, validation, shell-style tokenization
//! - **Identity**: a content hash over the fully resolved declaration
//! - **Plugins**: registry of check types with resource compatibility
//! - **Built-in checks**: `deployment_status`, `daemonset_status`, `http`, `hs_healthcheck_v2`,
//!   plus the older `deployment_health` and `hs_healthcheck`

pub mod check;
pub mod config;
pub mod docs;
pub mod error;
pub mod plugin;
pub mod plugins;
pub mod resource;
pub mod result;

pub use check::{Check, CheckUsage};
pub use config::{CheckConfig, CheckParser};
pub use error::CheckError;
pub use plugin::{CheckDocs, CheckFactory, CheckPluginRegistry};
pub use resource::{Resource, ResourceKind};
pub use result::{CheckEnvelope, CheckResult, CheckStatus, MAX_OUTPUT_BYTES};

/// Annotation holding a resource's check declarations
pub const CHECKS_ANNOTATION: &str = "hootsuite.com/sensu-checks";
