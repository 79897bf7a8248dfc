//! Prometheus metrics for the check bridge.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Process metrics, exported on `/metrics`
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    /// Running check loops
    pub active_checks: IntGauge,
    /// Check executions by outcome (`ok`, `error`, `timeout`)
    pub check_executions: IntCounterVec,
    /// Result posts by outcome (`ok`, `error`)
    pub result_posts: IntCounterVec,
    /// Rejected check declarations by resource kind
    pub parse_errors: IntCounterVec,
    /// Deregistrations by outcome (`ok`, `error`)
    pub deregistrations: IntCounterVec,
    /// Watch events by resource kind and event (`add`, `update`, `delete`)
    pub resource_events: IntCounterVec,
}

impl Metrics {
    /// Creates and registers all metrics
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("check_bridge".to_string()), None)?;

        let active_checks = IntGauge::new("active_checks", "Number of running check loops")?;
        let check_executions = IntCounterVec::new(
            Opts::new("check_executions_total", "Check executions by outcome"),
            &["outcome"],
        )?;
        let result_posts = IntCounterVec::new(
            Opts::new("result_posts_total", "Check results sent to Sensu by outcome"),
            &["outcome"],
        )?;
        let parse_errors = IntCounterVec::new(
            Opts::new("parse_errors_total", "Rejected check declarations by resource kind"),
            &["kind"],
        )?;
        let deregistrations = IntCounterVec::new(
            Opts::new("deregistrations_total", "Check source deregistrations by outcome"),
            &["outcome"],
        )?;
        let resource_events = IntCounterVec::new(
            Opts::new("resource_events_total", "Resource watch events by kind and event"),
            &["kind", "event"],
        )?;

        registry.register(Box::new(active_checks.clone()))?;
        registry.register(Box::new(check_executions.clone()))?;
        registry.register(Box::new(result_posts.clone()))?;
        registry.register(Box::new(parse_errors.clone()))?;
        registry.register(Box::new(deregistrations.clone()))?;
        registry.register(Box::new(resource_events.clone()))?;

        Ok(Self {
            registry,
            active_checks,
            check_executions,
            result_posts,
            parse_errors,
            deregistrations,
            resource_events,
        })
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_prefix() {
        let metrics = Metrics::new().unwrap();
        metrics.active_checks.set(3);
        metrics.check_executions.with_label_values(&["ok"]).inc();

        let text = metrics.render();
        assert!(text.contains("check_bridge_active_checks 3"));
        assert!(text.contains("check_bridge_check_executions_total{outcome=\"ok\"} 1"));
    }
}
