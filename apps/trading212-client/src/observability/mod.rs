//! Structured logging for the client.
//!
//! Log lines are single `key=value` records tagged with the correlation id of
//! the operation that produced them.

mod context;
mod correlation;
mod format;
mod init;
mod macros;
mod timing;

pub use context::{ContextLogger, FieldValue, Fields, LogsWithContext};
pub use correlation::{
    Correlated, CorrelationExt, CorrelationGuard, CorrelationId, clear_correlation_id,
    correlation_scope, current_correlation_id, set_correlation_id,
};
pub use format::{KeyValueFields, KeyValueFormat, error_chain, escape_value, key_value_layer};
pub use init::{LoggingConfig, LoggingError, build_filter, init_logging};
pub use timing::{timed, timed_blocking};

/// Support for the logging macros. Not part of the public API.
#[doc(hidden)]
pub mod __private {
    pub use super::context::{Rendered, type_label};
}
