use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Security-relevant request outcomes worth an audit trail, beyond the
/// per-request trace spans.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    RequestRejected {
        stage: &'static str,
        code: &'static str,
        agent_id: Option<String>,
    },
    MessageSent {
        tenant_id: String,
        sender: String,
        recipient: String,
        channel_id: String,
    },
    ChannelRead {
        tenant_id: String,
        agent_id: String,
        channel_id: String,
        updated: u64,
    },
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Emits audit events through tracing and, when configured, a pluggable
/// sink. The default has no sink; tests attach a recording one.
#[derive(Clone, Default)]
pub struct Observability {
    sink: Option<Arc<dyn AuditSink>>,
}

impl Observability {
    pub fn with_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn record(&self, event: AuditEvent) {
        match &event {
            AuditEvent::RequestRejected {
                stage,
                code,
                agent_id,
            } => {
                tracing::info!(stage, code, agent_id = agent_id.as_deref(), "request rejected");
            }
            AuditEvent::MessageSent {
                tenant_id,
                sender,
                recipient,
                channel_id,
            } => {
                tracing::info!(tenant_id, sender, recipient, channel_id, "message sent");
            }
            AuditEvent::ChannelRead {
                tenant_id,
                agent_id,
                channel_id,
                updated,
            } => {
                tracing::info!(tenant_id, agent_id, channel_id, updated, "channel read");
            }
        }

        if let Some(sink) = &self.sink {
            sink.record(&event);
        }
    }
}

#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn recorded(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_captures_events() {
        let sink = Arc::new(RecordingAuditSink::default());
        let observability = Observability::with_sink(sink.clone());

        observability.record(AuditEvent::MessageSent {
            tenant_id: "tenant-1".to_string(),
            sender: "alice".to_string(),
            recipient: "bob".to_string(),
            channel_id: "chan".to_string(),
        });

        let events = sink.recorded();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AuditEvent::MessageSent { .. }));
    }
}
