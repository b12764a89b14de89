//! Safe wrapper around a libtracker-sparql result cursor.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`RawCursor`](crate::ffi::RawCursor) which encapsulates the raw pointers and C type conversions.
//!
//! A cursor moves through four states:
//!
//! ```text
//!            advance            advance
//!   Fresh ───────────▶ Positioned ──────┐
//!     │  ▲                │  ▲          │
//!     │  │ rewind         │  └──────────┘
//!     │  └────────────────┤
//!     │ advance (no row)  │ advance (no row)
//!     ▼                   ▼
//!   Exhausted ◀───────────┘        (any) ── close ──▶ Closed
//! ```
//!
//! Column accessors are only forwarded to the engine while the cursor is
//! positioned on a row. In every other state they fail locally with
//! [`TrackerError::State`].

use std::cell::Cell;
use std::fmt;
use std::os::raw::c_int;

use serde::Serialize;
use tracing::{debug, trace};

use super::error::{TrackerError, TrackerResult};
use super::ffi::RawCursor;
use super::value::{Binding, Value, ValueType};

/// Lifecycle state of a [`Cursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorState {
    /// Before the first [`Cursor::advance`], or after [`Cursor::rewind`].
    Fresh,
    /// The last `advance` loaded a row.
    Positioned,
    /// The last `advance` found no more rows.
    Exhausted,
    /// Released; terminal.
    Closed,
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fresh => "fresh",
            Self::Positioned => "positioned",
            Self::Exhausted => "exhausted",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A forward-only cursor over a SPARQL result set.
///
/// Created via [`Connection::query`](super::Connection::query) or
/// [`Connection::statistics`](super::Connection::statistics).
/// Tied to the lifetime of the connection that created it. Closed when
/// dropped; [`close`](Self::close) may be called earlier, any number of times.
pub struct Cursor<'conn> {
    raw: Option<RawCursor<'conn>>,
    state: CursorState,
    columns: Cell<Option<usize>>,
}

impl<'conn> Cursor<'conn> {
    /// Wraps a raw cursor handle. The cursor starts fresh.
    pub(super) const fn new(raw: RawCursor<'conn>) -> Self {
        Self {
            raw: Some(raw),
            state: CursorState::Fresh,
            columns: Cell::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> CursorState {
        self.state
    }

    /// Loads the next row.
    ///
    /// Returns `true` when a row is available. Once the result set is
    /// exhausted every further call returns `false` without reaching the
    /// engine, until [`rewind`](Self::rewind).
    ///
    /// # Errors
    ///
    /// [`TrackerError::Cursor`] when the engine fails; the state is left
    /// unchanged. [`TrackerError::State`] on a closed cursor.
    pub fn advance(&mut self) -> TrackerResult<bool> {
        if self.state == CursorState::Exhausted {
            return Ok(false);
        }
        let has_row = self
            .live("advance")?
            .advance()
            .map_err(TrackerError::Cursor)?;
        self.state = if has_row {
            CursorState::Positioned
        } else {
            CursorState::Exhausted
        };
        trace!(state = %self.state, "cursor advanced");
        Ok(has_row)
    }

    /// Moves back before the first row.
    ///
    /// The engine exposes no error path for rewinding. Cursors backed by the
    /// local database rewind in place; for cursors whose engine cannot
    /// rewind, the next [`advance`](Self::advance) reports whatever the
    /// engine does (typically no further rows).
    ///
    /// # Errors
    ///
    /// [`TrackerError::State`] on a closed cursor.
    pub fn rewind(&mut self) -> TrackerResult<()> {
        self.live("rewind")?.rewind();
        self.state = CursorState::Fresh;
        Ok(())
    }

    /// Closes the cursor and releases its native resources. Idempotent.
    pub fn close(&mut self) {
        if let Some(raw) = self.raw.take() {
            raw.close();
            debug!("cursor closed");
        }
        self.state = CursorState::Closed;
    }

    /// Number of columns in the result set. Stable for the life of the cursor.
    ///
    /// # Errors
    ///
    /// [`TrackerError::State`] on a closed cursor,
    /// [`TrackerError::ProtocolViolation`] if the engine reports a negative count.
    pub fn column_count(&self) -> TrackerResult<usize> {
        let raw = self.live("column_count")?;
        if let Some(columns) = self.columns.get() {
            return Ok(columns);
        }
        let reported = raw.n_columns();
        let columns = usize::try_from(reported).map_err(|_| {
            TrackerError::ProtocolViolation(format!("negative column count {reported}"))
        })?;
        self.columns.set(Some(columns));
        Ok(columns)
    }

    /// Whether `column` holds a term in the current row.
    ///
    /// # Errors
    ///
    /// [`TrackerError::State`] unless positioned, [`TrackerError::Index`] for
    /// a column past the end.
    pub fn is_bound(&self, column: usize) -> TrackerResult<bool> {
        let (raw, idx) = self.positioned("is_bound", column)?;
        Ok(raw.is_bound(idx))
    }

    /// SPARQL variable name of `column`, without the leading `?`.
    ///
    /// # Errors
    ///
    /// As [`is_bound`](Self::is_bound); [`TrackerError::ProtocolViolation`]
    /// if the engine has no name for the column.
    pub fn binding_name(&self, column: usize) -> TrackerResult<String> {
        let (raw, idx) = self.positioned("binding_name", column)?;
        raw.variable_name(idx).ok_or_else(|| {
            TrackerError::ProtocolViolation(format!("column {column} has no variable name"))
        })
    }

    /// Kind of term bound to `column` in the current row.
    ///
    /// # Errors
    ///
    /// As [`is_bound`](Self::is_bound); [`TrackerError::ProtocolViolation`]
    /// for an unknown type code.
    pub fn value_type(&self, column: usize) -> TrackerResult<ValueType> {
        let (raw, idx) = self.positioned("value_type", column)?;
        ValueType::from_code(raw.value_type(idx))
    }

    /// Reads `column` as text. `None` when the engine has no string for it
    /// (unbound columns).
    ///
    /// Does not check [`value_type`](Self::value_type); the engine's own
    /// conversion applies.
    ///
    /// # Errors
    ///
    /// As [`is_bound`](Self::is_bound).
    pub fn string_value(&self, column: usize) -> TrackerResult<Option<String>> {
        let (raw, idx) = self.positioned("string_value", column)?;
        Ok(raw.string(idx))
    }

    /// Reads `column` as a 64-bit integer, without checking its type.
    ///
    /// # Errors
    ///
    /// As [`is_bound`](Self::is_bound).
    pub fn integer_value(&self, column: usize) -> TrackerResult<i64> {
        let (raw, idx) = self.positioned("integer_value", column)?;
        Ok(raw.integer(idx))
    }

    /// Reads `column` as a double, without checking its type.
    ///
    /// # Errors
    ///
    /// As [`is_bound`](Self::is_bound).
    pub fn double_value(&self, column: usize) -> TrackerResult<f64> {
        let (raw, idx) = self.positioned("double_value", column)?;
        Ok(raw.double(idx))
    }

    /// Reads `column` as a boolean, without checking its type.
    ///
    /// # Errors
    ///
    /// As [`is_bound`](Self::is_bound).
    pub fn boolean_value(&self, column: usize) -> TrackerResult<bool> {
        let (raw, idx) = self.positioned("boolean_value", column)?;
        Ok(raw.boolean(idx))
    }

    /// Reads `column` through the getter matching its [`ValueType`].
    ///
    /// # Errors
    ///
    /// As [`value_type`](Self::value_type); [`TrackerError::ProtocolViolation`]
    /// if a textual term has no string.
    pub fn value(&self, column: usize) -> TrackerResult<Value> {
        let text = || -> TrackerResult<String> {
            self.string_value(column)?.ok_or_else(|| {
                TrackerError::ProtocolViolation(format!("bound column {column} has no text"))
            })
        };
        Ok(match self.value_type(column)? {
            ValueType::Unbound => Value::Unbound,
            ValueType::Uri => Value::Uri(text()?),
            ValueType::String => Value::String(text()?),
            ValueType::DateTime => Value::DateTime(text()?),
            ValueType::BlankNode => Value::BlankNode(text()?),
            ValueType::Integer => Value::Integer(self.integer_value(column)?),
            ValueType::Double => Value::Double(self.double_value(column)?),
            ValueType::Boolean => Value::Boolean(self.boolean_value(column)?),
        })
    }

    /// Name and value of `column`.
    ///
    /// # Errors
    ///
    /// As [`value`](Self::value).
    pub fn binding(&self, column: usize) -> TrackerResult<Binding> {
        Ok(Binding {
            name: self.binding_name(column)?,
            value: self.value(column)?,
        })
    }

    /// Every binding of the current row, in column order.
    ///
    /// # Errors
    ///
    /// As [`value`](Self::value).
    pub fn row(&self) -> TrackerResult<Vec<Binding>> {
        (0..self.column_count()?).map(|column| self.binding(column)).collect()
    }

    /// Advances and returns the new row, or `None` once exhausted.
    ///
    /// # Errors
    ///
    /// As [`advance`](Self::advance) and [`row`](Self::row).
    pub fn next_row(&mut self) -> TrackerResult<Option<Vec<Binding>>> {
        if self.advance()? {
            self.row().map(Some)
        } else {
            Ok(None)
        }
    }

    /// The native cursor, unless closed.
    fn live(&self, operation: &'static str) -> TrackerResult<&RawCursor<'conn>> {
        self.raw.as_ref().ok_or(TrackerError::State {
            operation,
            state: self.state,
        })
    }

    /// Validates state and column bounds for a per-row accessor.
    fn positioned(
        &self,
        operation: &'static str,
        column: usize,
    ) -> TrackerResult<(&RawCursor<'conn>, c_int)> {
        if self.state != CursorState::Positioned {
            return Err(TrackerError::State {
                operation,
                state: self.state,
            });
        }
        let columns = self.column_count()?;
        let idx = c_int::try_from(column)
            .ok()
            .filter(|_| column < columns)
            .ok_or(TrackerError::Index { column, columns })?;
        Ok((self.live(operation)?, idx))
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("state", &self.state)
            .field("columns", &self.columns.get())
            .finish_non_exhaustive()
    }
}
