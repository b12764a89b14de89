//! Safe Rust bindings for `libtracker-sparql`, the query library of the
//! GNOME Tracker RDF store.
//!
//! The native library is loaded at runtime with `libloading` (see
//! [`Tracker::init`]). Everything above the `ffi` module is safe code:
//!
//! * [`Tracker`] -- the loaded entry points, passed explicitly to whatever
//!   opens connections.
//! * [`Connection`] -- a session; runs queries, updates and the statistics
//!   query.
//! * [`Cursor`] -- a forward-only result set with typed column access.
//!
//! Every fallible native call reports failures through a `GError**` slot.
//! The `ffi` layer checks that slot after each call and turns it into a
//! [`NativeError`] before the primary result is looked at.
//!
//! ```no_run
//! use tracker_sparql::{Tracker, TrackerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tracker = Tracker::init(TrackerConfig::from_env()?)?;
//! let conn = tracker.connect()?;
//! let mut cursor = conn.query("SELECT ?s WHERE { ?s a rdfs:Resource } LIMIT 10")?;
//! while let Some(row) = cursor.next_row()? {
//!     for binding in row {
//!         println!("{} = {}", binding.name, binding.value);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod ffi;

pub mod config;
mod connection;
mod cursor;
pub mod error;
mod library;
pub mod value;

pub use config::{ConfigError, TrackerConfig};
pub use connection::Connection;
pub use cursor::{Cursor, CursorState};
pub use error::{ErrorDomain, LoadError, NativeError, TrackerError, TrackerResult};
pub use library::Tracker;
pub use value::{Binding, Value, ValueType};

#[cfg(test)]
mod fake;
