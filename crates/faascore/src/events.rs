use crate::RuntimeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted while a function executes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    ExecutionStarted {
        execution_id: ExecutionId,
        function: String,
        runtime: RuntimeKind,
        timestamp: DateTime<Utc>,
    },
    ExecutionCompleted {
        execution_id: ExecutionId,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    ExecutionFailed {
        execution_id: ExecutionId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    ExecutionLog {
        execution_id: ExecutionId,
        event: LogEvent,
        timestamp: DateTime<Utc>,
    },
}

/// Log lines attached to a running execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum LogEvent {
    Info { message: String },
    Warning { message: String },
}

/// Event emitter scoped to one execution
#[derive(Clone)]
pub struct EventEmitter {
    execution_id: ExecutionId,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn new(execution_id: ExecutionId, sender: broadcast::Sender<ExecutionEvent>) -> Self {
        Self {
            execution_id,
            sender,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Emit a log event for this execution
    pub fn emit(&self, event: LogEvent) {
        let _ = self.sender.send(ExecutionEvent::ExecutionLog {
            execution_id: self.execution_id,
            event,
            timestamp: Utc::now(),
        });
    }

    /// Emit info message
    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogEvent::Info {
            message: message.into(),
        });
    }

    /// Emit warning message
    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogEvent::Warning {
            message: message.into(),
        });
    }
}

/// Global event bus
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, execution_id: ExecutionId) -> EventEmitter {
        EventEmitter::new(execution_id, self.sender.clone())
    }
}
