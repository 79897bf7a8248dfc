//! Command line and environment configuration.

use checks::ResourceKind;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Runs health checks declared on Kubernetes resources and reports them to Sensu
#[derive(Debug, Parser)]
#[command(name = "check-bridge", version)]
pub struct Cli {
    /// Sensu client config file
    #[arg(long, env = "SENSU_CONFIG_FILE", default_value = "/etc/sensu/conf.json")]
    pub config_file: String,

    /// Print check command documentation and exit
    #[arg(long)]
    pub check_docs: bool,

    /// Print check command documentation in markdown and exit
    #[arg(long)]
    pub check_docs_md: bool,

    /// Resource kinds to watch
    #[arg(
        long,
        env = "WATCH_RESOURCES",
        value_delimiter = ',',
        default_value = "deployment,pod,daemonset,service"
    )]
    pub resources: Vec<ResourceKind>,

    /// Namespace to watch (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Address for /healthz, /readyz and /metrics
    #[arg(long, env = "PROBE_ADDR", default_value = "0.0.0.0:8080")]
    pub probe_addr: SocketAddr,

    /// Seconds to wait for in-flight checks on shutdown
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Upper bound in seconds for a single check execution
    #[arg(long, env = "EXECUTE_TIMEOUT_SECS", default_value_t = 30)]
    pub execute_timeout_secs: u64,
}

impl Cli {
    /// Shutdown grace period
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Check execution timeout
    pub fn execute_timeout(&self) -> Duration {
        Duration::from_secs(self.execute_timeout_secs.max(1))
    }

    /// Watched kinds without duplicates, in the order given
    pub fn resource_kinds(&self) -> Vec<ResourceKind> {
        let mut kinds = Vec::new();
        for kind in &self.resources {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }
}
