use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::logging::{LogLevel, Logger, event_with_fields};
use crate::metrics::LifecycleMetrics;

use super::FrameworkConfig;
use super::audit::{LifecycleAudit, LifecycleAuditEventBuilder, LifecycleAuditStage};

/// Logging, metrics and audit sinks for one registry or subsystem, bound to
/// a fixed log target.
#[derive(Clone)]
pub struct Diagnostics {
    target: &'static str,
    logger: Option<Logger>,
    metrics: Option<Arc<Mutex<LifecycleMetrics>>>,
    audit: Arc<dyn LifecycleAudit>,
}

impl Diagnostics {
    pub fn new(config: &FrameworkConfig, target: &'static str) -> Self {
        Self {
            target,
            logger: config.logger.clone(),
            metrics: config.metrics_handle(),
            audit: Arc::clone(&config.audit),
        }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            if !logger.enabled(level) {
                return;
            }
            let event = event_with_fields(level, self.target, message, fields);
            let _ = logger.log_event(event);
        }
    }

    pub fn record_metrics(&self, update: impl FnOnce(&mut LifecycleMetrics)) {
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                update(&mut guard);
            }
        }
    }

    /// Records an audit event and mirrors it as a debug log line.
    pub fn lifecycle<I>(&self, stage: LifecycleAuditStage, message: &str, details: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let details: Vec<(String, Value)> = details.into_iter().collect();
        self.log(LogLevel::Debug, message, details.iter().cloned());
        let event = details
            .into_iter()
            .fold(LifecycleAuditEventBuilder::new(stage), |builder, (key, value)| {
                builder.detail(key, value)
            })
            .finish();
        self.audit.record(event);
    }
}
