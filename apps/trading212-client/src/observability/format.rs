//! Single-line `key=value` log formatting.
//!
//! Every event renders as one line of space separated tokens (wrapped here):
//!
//! ```text
//! timestamp="2026-10-18T09:30:00.000000Z" level=INFO logger=app::orders
//!     message="Order placed" module=app::orders line=42 correlation_id=abc-123
//!     ticker="AAPL" quantity=10
//! ```
//!
//! Strings are quoted and escaped so embedded quotes or newlines never split a
//! record across lines. Integers, floats and booleans are bare.

use std::error::Error;
use std::fmt::{self, Write as _};

use chrono::{SecondsFormat, Utc};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::field::RecordFields;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{
    self as subscriber_fmt, FmtContext, FormatEvent, FormatFields, FormattedFields, MakeWriter,
};
use tracing_subscriber::registry::LookupSpan;

use super::correlation::current_correlation_id;

/// Field carrying pre-rendered tokens from [`super::Fields`]. Only the logging
/// macros set it; its control characters are escaped like any other value.
pub(crate) const CONTEXT_FIELD: &str = "__t212_ctx";

/// Field rendered as the record's exception text.
pub(crate) const EXCEPTION_FIELD: &str = "exception";

/// Placeholder for values whose formatting implementation failed.
pub(crate) const UNPRINTABLE: &str = "<unprintable>";

/// Escape a value for use inside double quotes.
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.extend(c.escape_default()),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Escape control characters only; quotes are left alone.
fn escape_controls(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() => escaped.extend(c.escape_default()),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Whether `value` can be written bare without changing how it tokenizes.
fn is_bare_safe(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && !matches!(c, '"' | '=' | '\\'))
}

/// Split rendered tokens on spaces outside double quotes.
fn split_tokens(rendered: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in rendered.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ' ' if !quoted => {
                if let Some(begin) = start.take() {
                    tokens.push(&rendered[begin..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(begin) = start {
        tokens.push(&rendered[begin..]);
    }
    tokens
}

/// Key of a `key=value` token.
fn token_key(token: &str) -> &str {
    token.split_once('=').map_or(token, |(key, _)| key)
}

/// Make a field name safe to use as a token key.
#[must_use]
pub fn sanitize_key(key: &str) -> String {
    if key.is_empty() {
        return "_".to_string();
    }
    key.chars()
        .map(|c| {
            if c.is_whitespace() || c == '=' || c == '"' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Format with `Debug`, falling back to a placeholder if the impl errors.
pub(crate) fn debug_best_effort(value: &dyn fmt::Debug) -> String {
    let mut out = String::new();
    if write!(out, "{value:?}").is_err() {
        return UNPRINTABLE.to_string();
    }
    out
}

/// Format with `Display`, falling back to a placeholder if the impl errors.
pub(crate) fn display_best_effort(value: &dyn fmt::Display) -> String {
    let mut out = String::new();
    if write!(out, "{value}").is_err() {
        return UNPRINTABLE.to_string();
    }
    out
}

/// Render an error with its `source()` chain joined by `: `.
#[must_use]
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut rendered = display_best_effort(error);
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&display_best_effort(cause));
        source = cause.source();
    }
    rendered
}

/// A rendered field value.
#[derive(Debug, Clone, PartialEq)]
enum TokenValue {
    Quoted(String),
    Bare(String),
    Raw(String),
}

impl TokenValue {
    fn text(self) -> String {
        match self {
            Self::Quoted(s) | Self::Bare(s) | Self::Raw(s) => s,
        }
    }

    fn push_tokens(&self, key: &str, tokens: &mut Vec<String>) {
        match self {
            Self::Quoted(s) => {
                tokens.push(format!("{}=\"{}\"", sanitize_key(key), escape_value(s)));
            }
            Self::Bare(s) => {
                tokens.push(format!("{}={}", sanitize_key(key), escape_controls(s)));
            }
            Self::Raw(s) => {
                let escaped = escape_controls(s);
                tokens.extend(split_tokens(&escaped).into_iter().map(str::to_string));
            }
        }
    }
}

/// Appends `key=value` tokens separated by single spaces.
#[derive(Debug, Default)]
struct Line(String);

impl Line {
    fn sep(&mut self) {
        if !self.0.is_empty() {
            self.0.push(' ');
        }
    }

    fn quoted(&mut self, key: &str, value: &str) {
        self.sep();
        let _ = write!(self.0, "{}=\"{}\"", sanitize_key(key), escape_value(value));
    }

    fn bare(&mut self, key: &str, value: &dyn fmt::Display) {
        self.sep();
        let _ = write!(self.0, "{}={}", sanitize_key(key), display_best_effort(value));
    }

    fn push(&mut self, token: &str) {
        self.sep();
        self.0.push_str(token);
    }
}

/// Collects a record's fields in the order they were attached.
#[derive(Debug, Default)]
struct FieldCollector {
    message: Option<String>,
    exception: Option<String>,
    fields: Vec<(String, TokenValue)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: TokenValue) {
        match field.name() {
            "message" => self.message = Some(value.text()),
            EXCEPTION_FIELD => self.exception = Some(value.text()),
            CONTEXT_FIELD => self
                .fields
                .push((CONTEXT_FIELD.to_string(), TokenValue::Raw(value.text()))),
            // bridged `log` records carry their metadata as fields
            name if name.starts_with("log.") => {}
            name => self.fields.push((name.to_string(), value)),
        }
    }

    fn tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        for (key, value) in &self.fields {
            value.push_tokens(key, &mut tokens);
        }
        tokens
    }
}

impl Visit for FieldCollector {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, TokenValue::Bare(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, TokenValue::Bare(value.to_string()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, TokenValue::Bare(value.to_string()));
    }

    fn record_i128(&mut self, field: &Field, value: i128) {
        self.push(field, TokenValue::Bare(value.to_string()));
    }

    fn record_u128(&mut self, field: &Field, value: u128) {
        self.push(field, TokenValue::Bare(value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, TokenValue::Bare(value.to_string()));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, TokenValue::Quoted(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        self.push(field, TokenValue::Quoted(error_chain(value)));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, TokenValue::Quoted(debug_best_effort(value)));
    }
}

/// Renders span fields as `key=value` tokens so they can be appended to lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValueFields;

impl<'writer> FormatFields<'writer> for KeyValueFields {
    fn format_fields<R: RecordFields>(
        &self,
        mut writer: Writer<'writer>,
        fields: R,
    ) -> fmt::Result {
        let mut collector = FieldCollector::default();
        fields.record(&mut collector);
        let mut line = Line::default();
        if let Some(message) = &collector.message {
            line.quoted("message", message);
        }
        for token in collector.tokens() {
            line.push(&token);
        }
        writer.write_str(&line.0)
    }
}

/// Event formatter producing one `key=value` line per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValueFormat;

impl<S, N> FormatEvent<S, N> for KeyValueFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let mut line = Line::default();
        line.quoted(
            "timestamp",
            &Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        line.bare("level", &meta.level().as_str());
        line.bare("logger", &meta.target());
        line.quoted("message", collector.message.as_deref().unwrap_or_default());
        if let Some(module) = meta.module_path() {
            line.bare("module", &module);
        }
        if let Some(span) = ctx.lookup_current() {
            line.bare("function", &span.name());
        }
        if let Some(number) = meta.line() {
            line.bare("line", &number);
        }
        if let Some(id) = current_correlation_id() {
            if is_bare_safe(id.as_str()) {
                line.bare("correlation_id", &id);
            } else {
                line.quoted("correlation_id", id.as_str());
            }
        }
        if let Some(exception) = &collector.exception {
            line.quoted("exception", exception);
        }

        // Span context from the outermost span inwards, then the event's own
        // fields. A key is written once: event fields beat span fields and
        // inner spans beat outer ones.
        let event_tokens = collector.tokens();
        let mut span_tokens: Vec<String> = Vec::new();
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    let escaped = escape_controls(&fields.fields);
                    for token in split_tokens(&escaped) {
                        let key = token_key(token);
                        span_tokens.retain(|existing| token_key(existing) != key);
                        span_tokens.push(token.to_string());
                    }
                }
            }
        }
        for token in &span_tokens {
            let key = token_key(token);
            if !event_tokens.iter().any(|own| token_key(own) == key) {
                line.push(token);
            }
        }
        for token in &event_tokens {
            line.push(token);
        }

        writeln!(writer, "{}", line.0)
    }
}

/// A `fmt` layer wired with [`KeyValueFormat`] and [`KeyValueFields`].
pub fn key_value_layer<S, W>(
    make_writer: W,
) -> subscriber_fmt::Layer<S, KeyValueFields, KeyValueFormat, W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    subscriber_fmt::layer()
        .fmt_fields(KeyValueFields)
        .event_format(KeyValueFormat)
        .with_writer(make_writer)
}
