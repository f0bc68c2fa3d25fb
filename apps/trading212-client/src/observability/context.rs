//! Structured context attached to log records.
//!
//! [`Fields`] is an ordered key/value list. [`LogsWithContext`] is the
//! capability of carrying a default context that is merged into every record;
//! [`ContextLogger`] is the stand-alone implementation bound to a component
//! name. Records are emitted with [`log_with_context!`](crate::log_with_context)
//! and [`log_error_with_context!`](crate::log_error_with_context), which expand
//! at the call site so `logger`, `module` and `line` are the caller's.

use std::any::type_name;
use std::error::Error;
use std::fmt;

use super::format::{display_best_effort, error_chain, escape_value, sanitize_key};

/// A single context value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Quoted when rendered.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// Boolean.
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "\"{}\"", escape_value(s)),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        Self::UInt(value as u64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered structured context. Keys are unique; re-inserting a key replaces
/// its value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fields(Vec<(String, FieldValue)>);

impl Fields {
    /// Empty context.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert any `Display` value as a string, best effort.
    #[must_use]
    pub fn with_display(mut self, key: impl Into<String>, value: &dyn fmt::Display) -> Self {
        self.insert(key, display_best_effort(value));
        self
    }

    /// Insert or replace a value, keeping the key's original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    /// Value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Merge `overrides` into these fields; overrides win on collisions.
    #[must_use]
    pub fn merged(mut self, overrides: Self) -> Self {
        for (key, value) in overrides.0 {
            self.insert(key, value);
        }
        self
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Render as space separated `key=value` tokens.
    #[must_use]
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{}={}", sanitize_key(key), value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

/// Capability: a default context merged into every record logged for `self`.
pub trait LogsWithContext {
    /// Context attached to every record logged through this value.
    fn log_context(&self) -> Fields;

    /// Default context merged with `context`; `context` wins on collisions.
    fn context_with(&self, context: Fields) -> Fields {
        self.log_context().merged(context)
    }
}

/// Logger bound to a component name and default context.
#[derive(Debug, Clone)]
pub struct ContextLogger {
    defaults: Fields,
}

impl ContextLogger {
    /// Create a logger for `component`. The component name is rendered first.
    pub fn new(component: impl Into<String>, defaults: Fields) -> Self {
        let defaults = Fields::new().with("component", component.into()).merged(defaults);
        Self { defaults }
    }

    /// Default context of this logger.
    #[must_use]
    pub const fn defaults(&self) -> &Fields {
        &self.defaults
    }
}

impl LogsWithContext for ContextLogger {
    fn log_context(&self) -> Fields {
        self.defaults.clone()
    }
}

/// Short name of `E`, e.g. `BrokerError` for `trading212_client::error::BrokerError`.
#[doc(hidden)]
#[must_use]
pub fn type_label<E: ?Sized>(_: &E) -> &'static str {
    let name = type_name::<E>();
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base)
}

/// Pre-rendered parts of one record, built by the logging macros.
#[doc(hidden)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Context tokens.
    pub context: String,
    /// Error text with its source chain.
    pub exception: Option<String>,
}

impl Rendered {
    /// Record without an error.
    #[must_use]
    pub fn new(context: &Fields) -> Self {
        Self {
            context: context.render(),
            exception: None,
        }
    }

    /// Record for `error`: adds `error_type` and `error_message` to `context`
    /// and carries the source chain as the exception.
    #[must_use]
    pub fn with_error<E>(mut context: Fields, error: &E) -> Self
    where
        E: Error + 'static,
    {
        context.insert("error_type", type_label(error));
        context.insert("error_message", display_best_effort(error));
        Self {
            context: context.render(),
            exception: Some(error_chain(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_position() {
        let fields = Fields::new()
            .with("a", 1_i64)
            .with("b", "two")
            .with("a", 3_i64);
        assert_eq!(fields.render(), "a=3 b=\"two\"");
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn merged_prefers_overrides() {
        let defaults = Fields::new().with("env", "demo").with("component", "x");
        let merged = defaults.merged(Fields::new().with("env", "live").with("extra", true));
        assert_eq!(merged.get("env"), Some(&FieldValue::Str("live".to_string())));
        assert_eq!(merged.render(), "env=\"live\" component=\"x\" extra=true");
    }

    #[test]
    fn render_escapes_strings_and_keys() {
        let fields = Fields::new()
            .with("note", "line1\n\"two\"")
            .with("bad key", 1.5);
        assert_eq!(fields.render(), r#"note="line1\n\"two\"" bad_key=1.5"#);
    }

    #[test]
    fn from_iterator_builds_fields() {
        let fields: Fields = [("ticker", "AAPL"), ("side", "buy")].into_iter().collect();
        assert_eq!(fields.iter().count(), 2);
        assert!(!fields.is_empty());
    }

    #[derive(Debug, thiserror::Error)]
    #[error("fill rejected")]
    struct FillRejected(#[source] std::io::Error);

    #[test]
    fn type_label_strips_path_and_generics() {
        assert_eq!(type_label(&Fields::new()), "Fields");
        assert_eq!(type_label(&Vec::<u8>::new()), "Vec");
    }

    #[test]
    fn rendered_error_carries_type_message_and_chain() {
        let err = FillRejected(std::io::Error::other("venue closed"));
        let rendered = Rendered::with_error(Fields::new().with("ticker", "AAPL"), &err);
        assert_eq!(
            rendered.context,
            r#"ticker="AAPL" error_type="FillRejected" error_message="fill rejected""#
        );
        assert_eq!(rendered.exception.as_deref(), Some("fill rejected: venue closed"));
    }

    #[test]
    fn context_with_prefers_call_context() {
        let logger = ContextLogger::new("sync", Fields::new().with("env", "demo"));
        let merged = logger.context_with(Fields::new().with("env", "live"));
        assert_eq!(merged.render(), r#"component="sync" env="live""#);
    }

    #[test]
    fn context_logger_puts_component_first() {
        let logger = ContextLogger::new("rebalancer", Fields::new().with("portfolio", "core"));
        assert_eq!(
            logger.defaults().render(),
            "component=\"rebalancer\" portfolio=\"core\""
        );
    }

    #[test]
    fn display_value_is_best_effort() {
        struct Broken;
        impl fmt::Display for Broken {
            fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
                Err(fmt::Error)
            }
        }
        let fields = Fields::new().with_display("value", &Broken);
        assert_eq!(fields.render(), "value=\"<unprintable>\"");
    }
}
