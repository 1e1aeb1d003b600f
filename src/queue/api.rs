//! Public API for the queue engine
//!
//! External modules should import from here rather than directly from the
//! component modules.

// Engine
pub use crate::queue::orchestrator::{DrainReport, QueueOrchestrator};
pub use crate::queue::settings::QueueSettings;

// Building blocks
pub use crate::queue::correlator::{Correlator, TickOutcome};
pub use crate::queue::ledger::{PendingCall, PendingLedger, PendingRequest, StaleCall};
pub use crate::queue::pool::{CollectorPool, CollectorTask, ConcurrencyControl, PoolHandle, PoolLimits};
pub use crate::queue::retry::RetryTicker;

// Backend contract and the in-memory backend
pub use crate::queue::backend::{ControlKind, QueueBackend, QueueMessage, ReceivedBatch};
pub use crate::queue::memory::{
    MemoryBackend, MemoryMessage, MemoryQueue, DEFAULT_BATCH_SIZE, DEFAULT_MAX_QUEUE_SIZE,
    DEFAULT_RECEIVE_WAIT,
};

// Wire types
pub use crate::queue::types::{
    call_id_attributes, CallEnvelope, CallRequest, CallResult, CorrelationId, MessageAttributes,
    ResultBody, CALL_ID_ATTRIBUTE, CONTROL_ATTRIBUTE,
};

// Error handling
pub use crate::queue::error::{BackendError, ConfigError, QueueError, QueueResult};
