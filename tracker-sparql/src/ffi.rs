//! Raw FFI surface of libtracker-sparql, resolved at runtime via `libloading`.
//!
//! The symbols are looked up once when the library is loaded and kept as
//! plain function pointers in [`NativeApi`]. GLib/GObject helpers
//! (`g_error_free`, `g_free`, `g_object_unref`, `g_quark_to_string`) are
//! resolved through the same handle, since libtracker-sparql links GLib.
//!
//! All pointer types use `*mut c_void` so that no GObject layout leaks into
//! the rest of the crate. This is the **only** file that contains `unsafe`
//! code or C types.

#![allow(non_camel_case_types)]

use std::ffi::{CStr, OsString};
use std::os::raw::{c_char, c_double, c_int, c_long, c_void};
use std::ptr::{self, NonNull};
use std::sync::Arc;

use libloading::Library;
use tracing::debug;

use super::error::{LoadError, NativeError};

// ── GLib types ──────────────────────────────────────────────────────────

pub type gboolean = c_int;
pub type GQuark = u32;

type GCancellable = c_void;
type TrackerSparqlConnection = c_void;
type TrackerSparqlCursor = c_void;

/// Mirror of GLib's `GError`.
#[repr(C)]
pub struct GError {
    pub domain: GQuark,
    pub code: c_int,
    pub message: *mut c_char,
}

// ── Entry point signatures ──────────────────────────────────────────────

pub type GetUuidUrnFn = unsafe extern "C" fn() -> *mut c_char;
pub type ConnectionGetFn = unsafe extern "C" fn(
    cancellable: *mut GCancellable,
    error: *mut *mut GError,
) -> *mut TrackerSparqlConnection;
pub type ConnectionQueryFn = unsafe extern "C" fn(
    connection: *mut TrackerSparqlConnection,
    sparql: *const c_char,
    cancellable: *mut GCancellable,
    error: *mut *mut GError,
) -> *mut TrackerSparqlCursor;
pub type ConnectionUpdateFn = unsafe extern "C" fn(
    connection: *mut TrackerSparqlConnection,
    sparql: *const c_char,
    priority: c_int,
    cancellable: *mut GCancellable,
    error: *mut *mut GError,
);
pub type ConnectionStatisticsFn = unsafe extern "C" fn(
    connection: *mut TrackerSparqlConnection,
    cancellable: *mut GCancellable,
    error: *mut *mut GError,
) -> *mut TrackerSparqlCursor;
pub type CursorNextFn = unsafe extern "C" fn(
    cursor: *mut TrackerSparqlCursor,
    cancellable: *mut GCancellable,
    error: *mut *mut GError,
) -> gboolean;
pub type CursorFn = unsafe extern "C" fn(cursor: *mut TrackerSparqlCursor);
pub type CursorNColumnsFn = unsafe extern "C" fn(cursor: *mut TrackerSparqlCursor) -> c_int;
pub type CursorColumnNameFn =
    unsafe extern "C" fn(cursor: *mut TrackerSparqlCursor, column: c_int) -> *const c_char;
pub type CursorColumnFlagFn =
    unsafe extern "C" fn(cursor: *mut TrackerSparqlCursor, column: c_int) -> gboolean;
pub type CursorValueTypeFn =
    unsafe extern "C" fn(cursor: *mut TrackerSparqlCursor, column: c_int) -> c_int;
pub type CursorGetStringFn = unsafe extern "C" fn(
    cursor: *mut TrackerSparqlCursor,
    column: c_int,
    length: *mut c_long,
) -> *const c_char;
pub type CursorGetIntegerFn =
    unsafe extern "C" fn(cursor: *mut TrackerSparqlCursor, column: c_int) -> i64;
pub type CursorGetDoubleFn =
    unsafe extern "C" fn(cursor: *mut TrackerSparqlCursor, column: c_int) -> c_double;
pub type GErrorFreeFn = unsafe extern "C" fn(error: *mut GError);
pub type GFreeFn = unsafe extern "C" fn(mem: *mut c_void);
pub type GObjectUnrefFn = unsafe extern "C" fn(object: *mut c_void);
pub type GQuarkToStringFn = unsafe extern "C" fn(quark: GQuark) -> *const c_char;

/// Resolved native entry points.
///
/// Built either by [`NativeApi::load`] or, in tests, directly from a table of
/// in-process `extern "C"` functions.
pub struct NativeApi {
    pub(crate) get_uuid_urn: GetUuidUrnFn,
    pub(crate) connection_get: ConnectionGetFn,
    pub(crate) connection_query: ConnectionQueryFn,
    pub(crate) connection_update: ConnectionUpdateFn,
    pub(crate) connection_statistics: ConnectionStatisticsFn,
    pub(crate) cursor_next: CursorNextFn,
    pub(crate) cursor_rewind: CursorFn,
    pub(crate) cursor_close: CursorFn,
    pub(crate) cursor_get_n_columns: CursorNColumnsFn,
    pub(crate) cursor_get_variable_name: CursorColumnNameFn,
    pub(crate) cursor_is_bound: CursorColumnFlagFn,
    pub(crate) cursor_get_value_type: CursorValueTypeFn,
    pub(crate) cursor_get_string: CursorGetStringFn,
    pub(crate) cursor_get_integer: CursorGetIntegerFn,
    pub(crate) cursor_get_double: CursorGetDoubleFn,
    pub(crate) cursor_get_boolean: CursorColumnFlagFn,
    pub(crate) error_free: GErrorFreeFn,
    pub(crate) free: GFreeFn,
    pub(crate) object_unref: GObjectUnrefFn,
    pub(crate) quark_to_string: GQuarkToStringFn,
    /// Keeps the shared object mapped for as long as the pointers above live.
    pub(crate) library: Option<Library>,
}

impl NativeApi {
    /// Loads `library` (a logical name such as `tracker-sparql-1.0`, or a
    /// path) and resolves every entry point.
    pub fn load(library: &str) -> Result<Self, LoadError> {
        let mut failure = None;
        for candidate in library_candidates(library) {
            // SAFETY: loading libtracker-sparql runs its (GLib) constructors,
            // which have no preconditions on the caller.
            match unsafe { Library::new(&candidate) } {
                Ok(handle) => {
                    debug!(library = ?candidate, "loaded native library");
                    return Self::resolve(handle);
                }
                Err(source) => {
                    debug!(library = ?candidate, error = %source, "library candidate rejected");
                    failure = Some(source);
                }
            }
        }
        Err(LoadError::Open {
            library: library.to_owned(),
            source: failure,
        })
    }

    fn resolve(library: Library) -> Result<Self, LoadError> {
        /// Looks up `name` and copies the function pointer out of the symbol.
        ///
        /// SAFETY: `T` must match the C prototype of `name`.
        unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, LoadError> {
            library
                .get::<T>(name.as_bytes())
                .map(|sym| *sym)
                .map_err(|source| LoadError::Symbol {
                    symbol: name,
                    source,
                })
        }

        // SAFETY: every alias above mirrors the prototype published in
        // <libtracker-sparql/tracker-sparql.h> and <glib.h>.
        unsafe {
            Ok(Self {
                get_uuid_urn: symbol(&library, "tracker_sparql_get_uuid_urn")?,
                connection_get: symbol(&library, "tracker_sparql_connection_get")?,
                connection_query: symbol(&library, "tracker_sparql_connection_query")?,
                connection_update: symbol(&library, "tracker_sparql_connection_update")?,
                connection_statistics: symbol(&library, "tracker_sparql_connection_statistics")?,
                cursor_next: symbol(&library, "tracker_sparql_cursor_next")?,
                cursor_rewind: symbol(&library, "tracker_sparql_cursor_rewind")?,
                cursor_close: symbol(&library, "tracker_sparql_cursor_close")?,
                cursor_get_n_columns: symbol(&library, "tracker_sparql_cursor_get_n_columns")?,
                cursor_get_variable_name: symbol(
                    &library,
                    "tracker_sparql_cursor_get_variable_name",
                )?,
                cursor_is_bound: symbol(&library, "tracker_sparql_cursor_is_bound")?,
                cursor_get_value_type: symbol(&library, "tracker_sparql_cursor_get_value_type")?,
                cursor_get_string: symbol(&library, "tracker_sparql_cursor_get_string")?,
                cursor_get_integer: symbol(&library, "tracker_sparql_cursor_get_integer")?,
                cursor_get_double: symbol(&library, "tracker_sparql_cursor_get_double")?,
                cursor_get_boolean: symbol(&library, "tracker_sparql_cursor_get_boolean")?,
                error_free: symbol(&library, "g_error_free")?,
                free: symbol(&library, "g_free")?,
                object_unref: symbol(&library, "g_object_unref")?,
                quark_to_string: symbol(&library, "g_quark_to_string")?,
                library: Some(library),
            })
        }
    }

    /// Runs one fallible native call and inspects its `GError**` slot.
    ///
    /// When the slot is set the primary result is dropped (owned handles are
    /// unreffed by their `Drop`) and only the copied error is returned. The
    /// native `GError` is freed before this function returns.
    pub fn dispatch<T>(&self, call: impl FnOnce(*mut *mut GError) -> T) -> Result<T, NativeError> {
        let mut error: *mut GError = ptr::null_mut();
        let value = call(ptr::addr_of_mut!(error));
        if error.is_null() {
            return Ok(value);
        }
        drop(value);
        // SAFETY: a non-null slot holds a GError allocated by the callee and
        // transferred to us.
        Err(unsafe { self.take_error(error) })
    }

    /// Copies a `GError` into a [`NativeError`] and frees it.
    unsafe fn take_error(&self, error: *mut GError) -> NativeError {
        let raw = &*error;
        let message = copy_c_str(raw.message).unwrap_or_default();
        let domain_name = copy_c_str((self.quark_to_string)(raw.domain)).unwrap_or_default();
        let copied = NativeError::new(raw.domain, domain_name, raw.code, message);
        (self.error_free)(error);
        copied
    }

    /// Returns a freshly generated `urn:uuid:` string.
    pub fn uuid_urn(&self) -> Option<String> {
        // SAFETY: the returned string is newly allocated and owned by us.
        unsafe {
            let raw = (self.get_uuid_urn)();
            let urn = copy_c_str(raw);
            if !raw.is_null() {
                (self.free)(raw.cast());
            }
            urn
        }
    }
}

impl std::fmt::Debug for NativeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeApi")
            .field("dynamic", &self.library.is_some())
            .finish_non_exhaustive()
    }
}

/// File names tried for a logical library name, most specific first.
///
/// A value containing a path separator or an extension is used verbatim.
pub fn library_candidates(library: &str) -> Vec<OsString> {
    if library.contains(std::path::MAIN_SEPARATOR)
        || library.contains(".so")
        || library.ends_with(".dylib")
        || library.ends_with(".dll")
    {
        return vec![OsString::from(library)];
    }
    let mut candidates = vec![libloading::library_filename(library)];
    if cfg!(all(unix, not(target_os = "macos"))) {
        // Runtime packages usually ship only the SONAME, not the dev symlink.
        candidates.push(OsString::from(format!("lib{library}.so.0")));
    }
    candidates
}

/// Copies a NUL-terminated C string. `None` for a null pointer.
unsafe fn copy_c_str(raw: *const c_char) -> Option<String> {
    if raw.is_null() {
        None
    } else {
        Some(CStr::from_ptr(raw).to_string_lossy().into_owned())
    }
}

// ── Owned handles ───────────────────────────────────────────────────────

/// Owning wrapper around a `TrackerSparqlConnection*` (one strong ref).
pub struct RawConnection {
    ptr: NonNull<c_void>,
    api: Arc<NativeApi>,
}

impl RawConnection {
    /// `tracker_sparql_connection_get`. `Ok(None)` when the engine returned
    /// null without reporting an error.
    pub fn get(api: &Arc<NativeApi>) -> Result<Option<Self>, NativeError> {
        api.dispatch(|error| {
            // SAFETY: null cancellable is allowed; `error` points at a null slot.
            let ptr = unsafe { (api.connection_get)(ptr::null_mut(), error) };
            NonNull::new(ptr).map(|ptr| Self {
                ptr,
                api: Arc::clone(api),
            })
        })
    }

    /// `tracker_sparql_connection_query`.
    pub fn query(&self, sparql: &CStr) -> Result<Option<RawCursor<'_>>, NativeError> {
        self.api.dispatch(|error| {
            // SAFETY: `self.ptr` is a live connection and `sparql` outlives the call.
            let ptr = unsafe {
                (self.api.connection_query)(
                    self.ptr.as_ptr(),
                    sparql.as_ptr(),
                    ptr::null_mut(),
                    error,
                )
            };
            NonNull::new(ptr).map(|ptr| RawCursor::new(ptr, &self.api))
        })
    }

    /// `tracker_sparql_connection_update`.
    pub fn update(&self, sparql: &CStr, priority: i32) -> Result<(), NativeError> {
        self.api.dispatch(|error| {
            // SAFETY: `self.ptr` is a live connection and `sparql` outlives the call.
            unsafe {
                (self.api.connection_update)(
                    self.ptr.as_ptr(),
                    sparql.as_ptr(),
                    priority,
                    ptr::null_mut(),
                    error,
                );
            }
        })
    }

    /// `tracker_sparql_connection_statistics`.
    pub fn statistics(&self) -> Result<Option<RawCursor<'_>>, NativeError> {
        self.api.dispatch(|error| {
            // SAFETY: `self.ptr` is a live connection.
            let ptr = unsafe {
                (self.api.connection_statistics)(self.ptr.as_ptr(), ptr::null_mut(), error)
            };
            NonNull::new(ptr).map(|ptr| RawCursor::new(ptr, &self.api))
        })
    }
}

impl Drop for RawConnection {
    fn drop(&mut self) {
        // SAFETY: we own exactly one reference.
        unsafe { (self.api.object_unref)(self.ptr.as_ptr()) }
    }
}

/// Owning wrapper around a `TrackerSparqlCursor*`.
///
/// Borrowed from the connection that produced it. Unreffed on drop.
pub struct RawCursor<'conn> {
    ptr: NonNull<c_void>,
    api: &'conn NativeApi,
}

impl<'conn> RawCursor<'conn> {
    const fn new(ptr: NonNull<c_void>, api: &'conn NativeApi) -> Self {
        Self { ptr, api }
    }

    /// `tracker_sparql_cursor_next`.
    pub fn advance(&self) -> Result<bool, NativeError> {
        self.api.dispatch(|error| {
            // SAFETY: live cursor; null cancellable is allowed.
            unsafe { (self.api.cursor_next)(self.ptr.as_ptr(), ptr::null_mut(), error) != 0 }
        })
    }

    /// `tracker_sparql_cursor_rewind`.
    pub fn rewind(&self) {
        // SAFETY: live cursor.
        unsafe { (self.api.cursor_rewind)(self.ptr.as_ptr()) }
    }

    /// `tracker_sparql_cursor_close`. The reference is released on drop.
    pub fn close(&self) {
        // SAFETY: live cursor.
        unsafe { (self.api.cursor_close)(self.ptr.as_ptr()) }
    }

    /// `tracker_sparql_cursor_get_n_columns`.
    pub fn n_columns(&self) -> c_int {
        // SAFETY: live cursor.
        unsafe { (self.api.cursor_get_n_columns)(self.ptr.as_ptr()) }
    }

    /// `tracker_sparql_cursor_get_variable_name`, copied.
    pub fn variable_name(&self, column: c_int) -> Option<String> {
        // SAFETY: the returned string is owned by the cursor and valid until
        // the next call on it; we copy it immediately.
        unsafe { copy_c_str((self.api.cursor_get_variable_name)(self.ptr.as_ptr(), column)) }
    }

    /// `tracker_sparql_cursor_is_bound`.
    pub fn is_bound(&self, column: c_int) -> bool {
        // SAFETY: live cursor.
        unsafe { (self.api.cursor_is_bound)(self.ptr.as_ptr(), column) != 0 }
    }

    /// `tracker_sparql_cursor_get_value_type`, as the raw enum code.
    pub fn value_type(&self, column: c_int) -> c_int {
        // SAFETY: live cursor.
        unsafe { (self.api.cursor_get_value_type)(self.ptr.as_ptr(), column) }
    }

    /// `tracker_sparql_cursor_get_string`, copied using the reported length.
    pub fn string(&self, column: c_int) -> Option<String> {
        // Stays negative when the engine does not report a length.
        let mut length: c_long = -1;
        // SAFETY: the returned buffer is owned by the cursor, is NUL
        // terminated, holds `length` bytes when one is reported, and is
        // copied before returning.
        unsafe {
            let raw = (self.api.cursor_get_string)(self.ptr.as_ptr(), column, &mut length);
            if raw.is_null() {
                return None;
            }
            let bytes = match usize::try_from(length) {
                Ok(len) => std::slice::from_raw_parts(raw.cast::<u8>(), len),
                Err(_) => CStr::from_ptr(raw).to_bytes(),
            };
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }

    /// `tracker_sparql_cursor_get_integer`.
    pub fn integer(&self, column: c_int) -> i64 {
        // SAFETY: live cursor.
        unsafe { (self.api.cursor_get_integer)(self.ptr.as_ptr(), column) }
    }

    /// `tracker_sparql_cursor_get_double`.
    pub fn double(&self, column: c_int) -> f64 {
        // SAFETY: live cursor.
        unsafe { (self.api.cursor_get_double)(self.ptr.as_ptr(), column) }
    }

    /// `tracker_sparql_cursor_get_boolean`.
    pub fn boolean(&self, column: c_int) -> bool {
        // SAFETY: live cursor.
        unsafe { (self.api.cursor_get_boolean)(self.ptr.as_ptr(), column) != 0 }
    }
}

impl Drop for RawCursor<'_> {
    fn drop(&mut self) {
        // SAFETY: we own exactly one reference.
        unsafe { (self.api.object_unref)(self.ptr.as_ptr()) }
    }
}
