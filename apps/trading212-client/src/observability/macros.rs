//! Logging macros for [`LogsWithContext`](crate::observability::LogsWithContext)
//! sources.
//!
//! The macros expand to `tracing::event!` where they are written, so the
//! record's `logger`, `module` and `line` tokens point at the caller. The level
//! must be a constant such as `Level::INFO`.

/// Log `message` at `level` with the default context of `source` merged with
/// `context`. Per-call context wins on key collisions.
///
/// With a trailing `error = &err` the record also carries `error_type`,
/// `error_message` and the error's source chain as `exception`.
///
/// ```no_run
/// use tracing::Level;
/// use trading212_client::log_with_context;
/// use trading212_client::observability::{ContextLogger, Fields};
///
/// let logger = ContextLogger::new("rebalancer", Fields::new().with("portfolio", "core"));
/// let context = Fields::new().with("orders", 4_u64);
/// log_with_context!(logger, Level::INFO, "Rebalance started", context);
/// ```
#[macro_export]
macro_rules! log_with_context {
    ($source:expr, $level:expr, $message:expr, $context:expr, error = $error:expr $(,)?) => {{
        let context = {
            use $crate::observability::LogsWithContext as _;
            ($source).context_with($context)
        };
        let rendered = $crate::observability::__private::Rendered::with_error(context, $error);
        $crate::__emit_rendered!($level, $message, rendered)
    }};
    ($source:expr, $level:expr, $message:expr, $context:expr $(,)?) => {{
        let context = {
            use $crate::observability::LogsWithContext as _;
            ($source).context_with($context)
        };
        let rendered = $crate::observability::__private::Rendered::new(&context);
        $crate::__emit_rendered!($level, $message, rendered)
    }};
}

/// Log `error` at ERROR as `"Error occurred: <type>"` with `error_type`,
/// `error_message`, the source chain as `exception` and `context`.
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr $(,)?) => {{
        let error = $error;
        let message = ::std::format!(
            "Error occurred: {}",
            $crate::observability::__private::type_label(error)
        );
        let rendered = $crate::observability::__private::Rendered::with_error($context, error);
        $crate::__emit_rendered!($crate::__tracing::Level::ERROR, message, rendered)
    }};
    ($error:expr $(,)?) => {
        $crate::log_error_with_context!($error, $crate::observability::Fields::new())
    };
}

/// Emit a pre-rendered record at the caller's site.
#[doc(hidden)]
#[macro_export]
macro_rules! __emit_rendered {
    ($level:expr, $message:expr, $rendered:expr) => {{
        let rendered: $crate::observability::__private::Rendered = $rendered;
        match rendered.exception {
            ::std::option::Option::Some(ref exception) => $crate::__tracing::event!(
                $level,
                exception = %exception,
                __t212_ctx = %rendered.context,
                "{}",
                $message
            ),
            ::std::option::Option::None => $crate::__tracing::event!(
                $level,
                __t212_ctx = %rendered.context,
                "{}",
                $message
            ),
        }
    }};
}
