//! Safe wrapper around a libtracker-sparql connection.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`RawConnection`](crate::ffi::RawConnection) which encapsulates the raw pointers and C type conversions.

use std::ffi::CString;

use tracing::{debug, warn};

use super::cursor::Cursor;
use super::error::{TrackerError, TrackerResult};
use super::ffi::{RawConnection, RawCursor};
use super::library::Tracker;

/// A session with the Tracker store.
///
/// Holds one reference on the native connection, released when closed or
/// dropped. Not `Send`/`Sync` -- every call must come from the thread that
/// opened it, one at a time. Open a separate connection per thread instead.
///
/// Every call blocks until the engine answers. No cancellation is wired
/// through: the native `GCancellable*` is always null.
pub struct Connection {
    raw: RawConnection,
    update_priority: i32,
}

impl Connection {
    /// Opens a session with the default store.
    ///
    /// # Errors
    ///
    /// [`TrackerError::Connection`] with the engine's domain, code and message.
    pub fn connect(tracker: &Tracker) -> TrackerResult<Self> {
        let raw = RawConnection::get(tracker.api())
            .map_err(TrackerError::Connection)?
            .ok_or_else(|| null_result("tracker_sparql_connection_get"))?;
        debug!("connection opened");
        Ok(Self {
            raw,
            update_priority: tracker.config().update_priority,
        })
    }

    /// Runs a SPARQL `SELECT`/`ASK`/`CONSTRUCT` query.
    ///
    /// The text is passed through untouched; syntax errors come back from the
    /// engine. The returned cursor is fresh: call
    /// [`Cursor::advance`] to load the first row.
    ///
    /// # Errors
    ///
    /// [`TrackerError::Query`] when the engine rejects or fails the query,
    /// [`TrackerError::InvalidInput`] if the text contains a NUL byte.
    pub fn query(&self, sparql: &str) -> TrackerResult<Cursor<'_>> {
        let text = sparql_text(sparql)?;
        debug!(len = sparql.len(), "submitting query");
        let raw = self
            .raw
            .query(&text)
            .map_err(TrackerError::Query)?
            .ok_or_else(|| null_result("tracker_sparql_connection_query"))?;
        Ok(Cursor::new(raw))
    }

    /// Runs a SPARQL update with the configured priority.
    ///
    /// # Errors
    ///
    /// [`TrackerError::Update`] when the engine rejects or fails the update,
    /// [`TrackerError::InvalidInput`] if the text contains a NUL byte.
    pub fn update(&self, sparql: &str) -> TrackerResult<()> {
        self.update_with_priority(sparql, self.update_priority)
    }

    /// Runs a SPARQL update, forwarding `priority` (a GLib main-loop
    /// priority) to the engine as-is.
    ///
    /// # Errors
    ///
    /// As [`update`](Self::update).
    pub fn update_with_priority(&self, sparql: &str, priority: i32) -> TrackerResult<()> {
        let text = sparql_text(sparql)?;
        debug!(len = sparql.len(), priority, "submitting update");
        self.raw
            .update(&text, priority)
            .map_err(TrackerError::Update)
    }

    /// Runs the engine's built-in statistics query (instance counts per
    /// class).
    ///
    /// # Errors
    ///
    /// [`TrackerError::Query`] when the engine fails.
    pub fn statistics(&self) -> TrackerResult<Cursor<'_>> {
        let raw: RawCursor<'_> = self
            .raw
            .statistics()
            .map_err(TrackerError::Query)?
            .ok_or_else(|| null_result("tracker_sparql_connection_statistics"))?;
        Ok(Cursor::new(raw))
    }

    /// Releases the session. Equivalent to dropping the connection.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        debug!("connection released");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("update_priority", &self.update_priority)
            .finish_non_exhaustive()
    }
}

/// Converts SPARQL text for the C boundary.
fn sparql_text(sparql: &str) -> TrackerResult<CString> {
    CString::new(sparql).map_err(|e| {
        TrackerError::InvalidInput(format!(
            "SPARQL text contains a NUL byte at offset {}",
            e.nul_position()
        ))
    })
}

fn null_result(function: &str) -> TrackerError {
    warn!(function, "native call returned null without an error");
    TrackerError::ProtocolViolation(format!("{function} returned null without an error"))
}
