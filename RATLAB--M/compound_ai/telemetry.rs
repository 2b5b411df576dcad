use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord, LogSink};
use tokio::runtime::{Handle, Runtime};

/// Builder configuring compound telemetry sinks.
pub struct EvolutionTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    sinks: Vec<Arc<dyn LogSink>>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl EvolutionTelemetryBuilder {
    /// Creates a new builder for the given module label.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Debug,
            sinks: Vec::new(),
            event_publisher: None,
        }
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Minimum level written to the JSON log file.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Adds an extra sink (e.g. a `MemoryLogSink`).
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Registers the event publisher for analysis events.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Finalizes the builder, opening the log file if one was requested.
    pub fn build(self) -> Result<EvolutionTelemetry> {
        let mut sinks = self.sinks;
        if let Some(path) = self.log_path {
            sinks.push(Arc::new(JsonLogger::new(path)?.with_min_level(self.min_level)));
        }
        let event = match self.event_publisher {
            Some(publisher) => Some(EventHandle::new(publisher)?),
            None => None,
        };
        Ok(EvolutionTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                sinks,
                event,
            }),
        })
    }
}

/// Telemetry handle shared by the orchestrator and its callers.
#[derive(Clone)]
pub struct EvolutionTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for EvolutionTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvolutionTelemetry")
            .field("module", &self.inner.module)
            .field("sinks", &self.inner.sinks.len())
            .field("events", &self.inner.event.is_some())
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    sinks: Vec<Arc<dyn LogSink>>,
    event: Option<EventHandle>,
}

struct EventHandle {
    runtime: Option<Runtime>,
    publisher: Arc<dyn EventPublisher>,
}

impl EventHandle {
    fn new(publisher: Arc<dyn EventPublisher>) -> Result<Self> {
        Ok(Self {
            runtime: Some(tokio::runtime::Builder::new_current_thread().build()?),
            publisher,
        })
    }

    fn publish(&self, record: EventRecord) -> Result<()> {
        if let Ok(handle) = Handle::try_current() {
            let publisher = Arc::clone(&self.publisher);
            handle.spawn(async move {
                if let Err(err) = publisher.publish(record).await {
                    eprintln!("compound telemetry publish failed: {err:?}");
                }
            });
            Ok(())
        } else if let Some(runtime) = &self.runtime {
            runtime.block_on(self.publisher.publish(record))
        } else {
            Ok(())
        }
    }
}

impl Drop for EventHandle {
    // The owner may be dropped on a runtime worker, where a blocking shutdown panics.
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl EvolutionTelemetry {
    /// Returns a builder for this telemetry helper.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> EvolutionTelemetryBuilder {
        EvolutionTelemetryBuilder::new(module)
    }

    /// Module label stamped on every record.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Writes a structured record to every sink that accepts `level`.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if !self.inner.sinks.iter().any(|sink| sink.enabled(level)) {
            return Ok(());
        }
        let record = LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
        for sink in &self.inner.sinks {
            sink.log(&record)?;
        }
        Ok(())
    }

    /// Emits an event on the configured bus.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        if let Some(handle) = &self.inner.event {
            handle.publish(EventRecord::new(&self.inner.module, event_type, payload))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_event_bus::MemoryEventBus;
    use shared_logging::MemoryLogSink;
    use tempfile::tempdir;

    #[test]
    fn telemetry_logs_and_emits() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("compound.log");
        let bus = Arc::new(MemoryEventBus::new(8));
        let memory = Arc::new(MemoryLogSink::new(8));
        let telemetry = EvolutionTelemetry::builder("compound-ai")
            .log_path(&log_path)
            .sink(memory.clone())
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "compound.test", json!({ "compound": "COMPOUND_V" }))
            .unwrap();
        telemetry
            .event("compound.test", json!({ "confidence": 0.3 }))
            .unwrap();
        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("compound.test"));
        assert_eq!(memory.find("compound.test").len(), 1);
        assert_eq!(bus.snapshot().len(), 1);
        assert_eq!(bus.snapshot()[0].source, "compound-ai");
    }

    #[tokio::test]
    async fn publishes_and_drops_inside_a_runtime() {
        let bus = Arc::new(MemoryEventBus::new(4));
        let telemetry = EvolutionTelemetry::builder("compound-ai")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .event("compound.test", json!({ "confidence": 0.1 }))
            .unwrap();
        for _ in 0..8 {
            if !bus.snapshot().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(bus.snapshot().len(), 1);
        drop(telemetry);
    }

    #[test]
    fn file_sink_respects_min_level() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("compound.log");
        let telemetry = EvolutionTelemetry::builder("compound-ai")
            .log_path(&log_path)
            .min_level(LogLevel::Warn)
            .build()
            .unwrap();
        telemetry.log(LogLevel::Debug, "skipped", json!({})).unwrap();
        telemetry.log(LogLevel::Warn, "kept", json!({})).unwrap();
        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(!content.contains("skipped"));
        assert!(content.contains("kept"));
    }
}
