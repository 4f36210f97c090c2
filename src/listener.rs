//! Change-event listener: row-change notifications → store.
//!
//! Notifications arrive as JSON text on a [`NotificationSource`]:
//!
//! ```json
//! {"table": "lots", "data": {"lot_id": "LOT0000000", "product_type": "milk", "attrs": {...}}}
//! ```
//!
//! The [`ChangeListener`] decodes each one, translates the row and merges the
//! triples into the store before waiting for the next, so the store always
//! reflects events in delivery order. The transport is behind the source
//! trait: an in-process channel ([`ChannelSource`]) or a JSON-lines stream
//! ([`LineSource`]).

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ListenerConfig;
use crate::error::ListenerError;
use crate::graph::{Triple, TripleStore};
use crate::translate::{LotRow, Translator};

// ---------------------------------------------------------------------------
// Payload decoding
// ---------------------------------------------------------------------------

/// A row-change notification as sent by the database trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub table: String,
    #[serde(default)]
    pub data: Value,
}

impl ChangeNotification {
    /// Notification for one upserted `lots`-style row.
    pub fn new(table: impl Into<String>, lot_id: &str, product_type: &str, attrs: Value) -> Self {
        Self {
            table: table.into(),
            data: serde_json::json!({
                "lot_id": lot_id,
                "product_type": product_type,
                "attrs": attrs,
            }),
        }
    }

    /// Wire form.
    pub fn to_payload(&self) -> String {
        // A struct of a String and a Value always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Decode a payload. `Ok(None)` means the notification is for another table.
pub fn decode_notification(
    payload: &str,
    source_table: &str,
) -> Result<Option<LotRow>, ListenerError> {
    let notification: ChangeNotification =
        serde_json::from_str(payload).map_err(|e| ListenerError::MalformedPayload {
            message: e.to_string(),
        })?;
    if notification.table != source_table {
        return Ok(None);
    }

    let data = &notification.data;
    let lot_id = match data.get("lot_id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(ListenerError::MissingLotId {
                table: notification.table,
            });
        }
    };
    let product_type = data
        .get("product_type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let attrs = data.get("attrs").unwrap_or(&Value::Null);

    Ok(Some(LotRow::new(lot_id, product_type, attrs)))
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// What one wait on a source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Payload(String),
    /// Nothing arrived within the timeout. Recoverable.
    TimedOut,
    /// The stream ended cleanly.
    Closed,
}

/// A transport delivering notification payloads in order.
pub trait NotificationSource {
    /// Wait up to `timeout` for the next payload.
    fn recv(&mut self, timeout: Duration) -> Result<Received, ListenerError>;
}

/// In-process channel source. Dropping every sender is a disconnect.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<String>,
}

impl ChannelSource {
    pub fn new(rx: Receiver<String>) -> Self {
        Self { rx }
    }
}

/// Create a connected sender / source pair.
pub fn notification_channel() -> (Sender<String>, ChannelSource) {
    let (tx, rx) = mpsc::channel();
    (tx, ChannelSource::new(rx))
}

impl NotificationSource for ChannelSource {
    fn recv(&mut self, timeout: Duration) -> Result<Received, ListenerError> {
        match self.rx.recv_timeout(timeout) {
            Ok(payload) => Ok(Received::Payload(payload)),
            Err(RecvTimeoutError::Timeout) => Ok(Received::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(ListenerError::Disconnected),
        }
    }
}

/// JSON-lines source over any buffered reader. Blank lines are skipped and
/// end of input closes the stream. Reads block, so the timeout is unused.
#[derive(Debug)]
pub struct LineSource<R> {
    reader: R,
    line: String,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead> NotificationSource for LineSource<R> {
    fn recv(&mut self, _timeout: Duration) -> Result<Received, ListenerError> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|source| ListenerError::Io { source })?;
            if read == 0 {
                return Ok(Received::Closed);
            }
            let trimmed = self.line.trim();
            if !trimmed.is_empty() {
                return Ok(Received::Payload(trimmed.to_string()));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Ingestion counters for one listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Payloads received.
    pub received: u64,
    /// Rows translated and merged.
    pub applied: u64,
    /// Notifications for other tables.
    pub ignored: u64,
    /// Malformed payloads or rows without a lot id.
    pub skipped: u64,
    /// Triples that were new to the store.
    pub triples_added: u64,
    /// Polls that timed out.
    pub timeouts: u64,
}

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Applied { lot_id: String, added: usize },
    Ignored,
    Skipped,
    TimedOut,
    Closed,
}

/// Why [`ChangeListener::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The source ended.
    Closed,
    /// `max_events` notifications were received.
    EventLimit,
    /// `max_idle_polls` consecutive polls timed out.
    Idle,
}

/// Merge triples into the store. Returns how many were new.
pub fn ingest(store: &TripleStore, triples: impl IntoIterator<Item = Triple>) -> usize {
    store.extend(triples)
}

/// Consumes notifications from a source and applies them to a store.
pub struct ChangeListener<S> {
    source: S,
    translator: Translator,
    config: ListenerConfig,
    stats: IngestStats,
}

impl<S: NotificationSource> ChangeListener<S> {
    pub fn new(source: S, translator: Translator, config: ListenerConfig) -> Self {
        Self {
            source,
            translator,
            config,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Wait for one notification and apply it.
    ///
    /// Only transport failures are errors; undecodable notifications are
    /// logged, counted and skipped.
    pub fn poll_once(&mut self, store: &TripleStore) -> Result<PollOutcome, ListenerError> {
        let payload = match self.source.recv(self.config.poll_timeout())? {
            Received::Payload(p) => p,
            Received::TimedOut => {
                self.stats.timeouts += 1;
                return Ok(PollOutcome::TimedOut);
            }
            Received::Closed => return Ok(PollOutcome::Closed),
        };
        self.stats.received += 1;

        let row = match decode_notification(&payload, &self.config.source_table) {
            Ok(Some(row)) => row,
            Ok(None) => {
                self.stats.ignored += 1;
                tracing::debug!("notification for another table ignored");
                return Ok(PollOutcome::Ignored);
            }
            Err(e) => {
                self.stats.skipped += 1;
                tracing::warn!(error = %e, "skipping notification");
                return Ok(PollOutcome::Skipped);
            }
        };

        let added = ingest(store, self.translator.translate(&row));
        self.stats.applied += 1;
        self.stats.triples_added += added as u64;
        tracing::debug!(lot_id = %row.lot_id, added, "lot ingested");
        Ok(PollOutcome::Applied {
            lot_id: row.lot_id,
            added,
        })
    }

    /// Poll until the source closes, the event limit is reached or the
    /// source stays idle for `max_idle_polls` consecutive polls.
    pub fn run(&mut self, store: &TripleStore) -> Result<StopReason, ListenerError> {
        let mut idle = 0u32;
        loop {
            if self
                .config
                .max_events
                .is_some_and(|max| self.stats.received >= max)
            {
                return Ok(StopReason::EventLimit);
            }
            match self.poll_once(store)? {
                PollOutcome::Closed => return Ok(StopReason::Closed),
                PollOutcome::TimedOut => {
                    idle += 1;
                    tracing::warn!(idle, "no notification within the poll timeout");
                    if self.config.max_idle_polls != 0 && idle >= self.config.max_idle_polls {
                        return Ok(StopReason::Idle);
                    }
                }
                _ => idle = 0,
            }
        }
    }
}
