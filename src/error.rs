//! Rich diagnostic error types for the cheese-trace engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.
//!
//! Conditions the engine recovers from locally (malformed lot attributes,
//! notifications for other tables, absent optional attributes, queries over an
//! empty store) never surface here.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the cheese-trace engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum TraceError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Listener errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ListenerError {
    #[error("malformed change notification: {message}")]
    #[diagnostic(
        code(trace::listener::malformed_payload),
        help(
            "Notifications must be JSON objects of the form \
             {{\"table\": \"lots\", \"data\": {{\"lot_id\": ..., \"product_type\": ..., \"attrs\": ...}}}}. \
             The notification was skipped."
        )
    )]
    MalformedPayload { message: String },

    #[error("change notification for table \"{table}\" has no lot_id")]
    #[diagnostic(
        code(trace::listener::missing_lot_id),
        help(
            "Every row change must carry a non-empty `lot_id` string. \
             Check the trigger that builds the notification payload."
        )
    )]
    MissingLotId { table: String },

    #[error("notification channel disconnected")]
    #[diagnostic(
        code(trace::listener::disconnected),
        help(
            "The sending side of the notification channel went away. \
             The listener does not reconnect on its own: wrap the source in a \
             reconnecting `NotificationSource` (reconnect with backoff) if the \
             transport can recover."
        )
    )]
    Disconnected,

    #[error("failed to read notifications: {source}")]
    #[diagnostic(
        code(trace::listener::io),
        help("The notification stream could not be read. Check that the file or pipe is readable.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Rule errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RuleError {
    #[error("rule parse error in rule '{rule_name}': {message}")]
    #[diagnostic(
        code(trace::rules::parse),
        help("Patterns are written `(?s predicate ?o)`. Use a '?' prefix for variables.")
    )]
    RuleParse { rule_name: String, message: String },

    #[error("rule '{rule_name}' uses variable ?{variable} in a consequent but never binds it")]
    #[diagnostic(
        code(trace::rules::unbound_consequent),
        help("Every consequent variable must appear in at least one antecedent pattern.")
    )]
    UnboundConsequent { rule_name: String, variable: String },
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("projected variable ?{variable} is not bound by any pattern")]
    #[diagnostic(
        code(trace::query::unbound_projection),
        help("Only variables that appear in the query's patterns can be selected.")
    )]
    UnboundProjection { variable: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(trace::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(
        code(trace::config::parse),
        help("The config file must be valid TOML. Run `cheese-trace config` to print the defaults.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config file: {path}")]
    #[diagnostic(
        code(trace::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(trace::config::invalid), help("Check the TraceConfig fields. {message}"))]
    Invalid { message: String },
}

/// Convenience alias for functions returning cheese-trace results.
pub type TraceResult<T> = std::result::Result<T, TraceError>;
