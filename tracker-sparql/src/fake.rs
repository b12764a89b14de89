//! In-process stand-in for libtracker-sparql used by the unit tests.
//!
//! Implements the C entry points with the exact native signatures over a
//! thread-local triple set, so the marshaling in `ffi` (error slots, string
//! copies, reference counting) runs unchanged. It understands only the SPARQL
//! forms the tests issue; anything else is reported as a parse error, the way
//! the engine would.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_double, c_int, c_long, c_void};
use std::ptr;

use crate::config::TrackerConfig;
use crate::ffi::{gboolean, GError, GQuark, NativeApi};
use crate::library::Tracker;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_RESOURCE: &str = "http://www.w3.org/2000/01/rdf-schema#Resource";

pub const SPARQL_ERROR_DOMAIN: GQuark = 1042;
pub const SPARQL_ERROR_DOMAIN_NAME: &str = "tracker-sparql-error-quark";
pub const CONNECTION_ERROR_DOMAIN: GQuark = 1043;

pub const PARSE_ERROR_CODE: c_int = 0;
pub const PARSE_ERROR_MESSAGE: &str = "Parser error at byte 0: Expected SELECT, ASK or DATA";
pub const CONNECTION_ERROR_CODE: c_int = 2;
pub const CONNECTION_ERROR_MESSAGE: &str = "Unable to connect to the store";
pub const CURSOR_ERROR_CODE: c_int = 4;
pub const CURSOR_ERROR_MESSAGE: &str = "Result stream interrupted";

/// One row with a column of every kind, the last one unbound.
pub const TYPED_QUERY: &str =
    "SELECT ?uri ?label ?count ?ratio ?when ?node ?flag ?missing WHERE { fake:typed }";
/// One row whose only column reports value type code 42.
pub const BAD_TYPE_QUERY: &str = "SELECT ?x WHERE { fake:bad-type }";
/// Two rows; loading the second one fails.
pub const FAILING_QUERY: &str = "SELECT ?x WHERE { fake:fails-on-second-row }";
/// Returns a null cursor without setting the error slot.
pub const NULL_CURSOR_QUERY: &str = "SELECT ?x WHERE { fake:null-cursor }";
/// Returns a cursor *and* sets the error slot.
pub const ERROR_WITH_CURSOR_QUERY: &str = "SELECT ?x WHERE { fake:error-with-cursor }";
/// One row; the cursor reports [`NEGATIVE_COLUMN_COUNT`] columns.
pub const NEGATIVE_COLUMNS_QUERY: &str = "SELECT ?x WHERE { fake:negative-columns }";
/// One row with a URI column that has neither a variable name nor text.
pub const UNNAMED_QUERY: &str = "SELECT ?x WHERE { fake:unnamed }";
/// One row with a string column; `get_string` leaves the length untouched.
pub const NO_LENGTH_QUERY: &str = "SELECT ?x WHERE { fake:no-length }";

pub const NEGATIVE_COLUMN_COUNT: c_int = -3;

const VALUE_TYPE_UNBOUND: c_int = 0;
const VALUE_TYPE_URI: c_int = 1;
const VALUE_TYPE_STRING: c_int = 2;
const VALUE_TYPE_INTEGER: c_int = 3;
const VALUE_TYPE_DOUBLE: c_int = 4;
const VALUE_TYPE_DATETIME: c_int = 5;
const VALUE_TYPE_BLANK_NODE: c_int = 6;
const VALUE_TYPE_BOOLEAN: c_int = 7;

// ── Thread-local engine state ───────────────────────────────────────────

#[derive(Default)]
struct FakeState {
    triples: Vec<(String, String, String)>,
    native_calls: usize,
    live_objects: isize,
    refuse_connections: bool,
    last_update_priority: Option<c_int>,
    closed_cursors: usize,
    freed_errors: usize,
    freed_strings: usize,
    uuid_counter: u64,
}

thread_local! {
    static STATE: RefCell<FakeState> = RefCell::new(FakeState::default());
}

fn with_state<R>(f: impl FnOnce(&mut FakeState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

fn count_call() {
    with_state(|s| s.native_calls += 1);
}

// ── Test-facing helpers ─────────────────────────────────────────────────

/// A [`Tracker`] wired to this thread's fake engine.
pub fn tracker() -> Tracker {
    tracker_with(TrackerConfig::default())
}

/// Like [`tracker`] with an explicit configuration.
pub fn tracker_with(config: TrackerConfig) -> Tracker {
    Tracker::from_api(api(), config)
}

/// Number of native entry points invoked so far on this thread.
pub fn native_calls() -> usize {
    with_state(|s| s.native_calls)
}

/// Connections and cursors handed out and not yet unreffed.
pub fn live_objects() -> isize {
    with_state(|s| s.live_objects)
}

/// Number of `tracker_sparql_cursor_close` calls.
pub fn closed_cursors() -> usize {
    with_state(|s| s.closed_cursors)
}

/// Number of `GError`s released through `g_error_free`.
pub fn freed_errors() -> usize {
    with_state(|s| s.freed_errors)
}

/// Number of strings released through `g_free`.
pub fn freed_strings() -> usize {
    with_state(|s| s.freed_strings)
}

/// Priority received by the last update.
pub fn last_update_priority() -> Option<c_int> {
    with_state(|s| s.last_update_priority)
}

/// Makes `tracker_sparql_connection_get` fail from now on.
pub fn refuse_connections() {
    with_state(|s| s.refuse_connections = true);
}

fn api() -> NativeApi {
    NativeApi {
        get_uuid_urn: fake_get_uuid_urn,
        connection_get: fake_connection_get,
        connection_query: fake_connection_query,
        connection_update: fake_connection_update,
        connection_statistics: fake_connection_statistics,
        cursor_next: fake_cursor_next,
        cursor_rewind: fake_cursor_rewind,
        cursor_close: fake_cursor_close,
        cursor_get_n_columns: fake_cursor_get_n_columns,
        cursor_get_variable_name: fake_cursor_get_variable_name,
        cursor_is_bound: fake_cursor_is_bound,
        cursor_get_value_type: fake_cursor_get_value_type,
        cursor_get_string: fake_cursor_get_string,
        cursor_get_integer: fake_cursor_get_integer,
        cursor_get_double: fake_cursor_get_double,
        cursor_get_boolean: fake_cursor_get_boolean,
        error_free: fake_error_free,
        free: fake_free,
        object_unref: fake_object_unref,
        quark_to_string: fake_quark_to_string,
        library: None,
    }
}

// ── Objects ─────────────────────────────────────────────────────────────

struct FakeCell {
    code: c_int,
    text: Option<CString>,
    integer: i64,
    double: f64,
    boolean: bool,
}

impl FakeCell {
    fn unbound() -> Self {
        Self::with_code(VALUE_TYPE_UNBOUND)
    }

    fn with_code(code: c_int) -> Self {
        Self {
            code,
            text: None,
            integer: 0,
            double: 0.0,
            boolean: false,
        }
    }

    fn text(code: c_int, text: &str) -> Self {
        Self {
            text: Some(CString::new(text).unwrap()),
            ..Self::with_code(code)
        }
    }

    fn integer(value: i64) -> Self {
        Self {
            text: Some(CString::new(value.to_string()).unwrap()),
            integer: value,
            ..Self::with_code(VALUE_TYPE_INTEGER)
        }
    }

    fn double(value: f64) -> Self {
        Self {
            text: Some(CString::new(value.to_string()).unwrap()),
            double: value,
            ..Self::with_code(VALUE_TYPE_DOUBLE)
        }
    }

    fn boolean(value: bool) -> Self {
        Self {
            text: Some(CString::new(value.to_string()).unwrap()),
            boolean: value,
            ..Self::with_code(VALUE_TYPE_BOOLEAN)
        }
    }
}

struct FakeCursor {
    names: Vec<CString>,
    rows: Vec<Vec<FakeCell>>,
    current: Option<usize>,
    fail_at: Option<usize>,
    reported_columns: Option<c_int>,
    hide_names: bool,
    skip_length: bool,
}

impl FakeCursor {
    fn new(names: &[&str], rows: Vec<Vec<FakeCell>>) -> Self {
        Self {
            names: names.iter().map(|n| CString::new(*n).unwrap()).collect(),
            rows,
            current: None,
            fail_at: None,
            reported_columns: None,
            hide_names: false,
            skip_length: false,
        }
    }

    fn cell(&self, column: c_int) -> Option<&FakeCell> {
        let row = self.rows.get(self.current?)?;
        row.get(usize::try_from(column).ok()?)
    }
}

enum FakeObject {
    Connection,
    Cursor(FakeCursor),
}

fn into_object(object: FakeObject) -> *mut c_void {
    with_state(|s| s.live_objects += 1);
    Box::into_raw(Box::new(object)).cast()
}

unsafe fn cursor<'a>(ptr: *mut c_void) -> &'a mut FakeCursor {
    match &mut *ptr.cast::<FakeObject>() {
        FakeObject::Cursor(cursor) => cursor,
        FakeObject::Connection => panic!("connection passed where a cursor was expected"),
    }
}

unsafe fn set_error(slot: *mut *mut GError, domain: GQuark, code: c_int, message: &str) {
    assert!((*slot).is_null(), "error slot must be null on entry");
    *slot = Box::into_raw(Box::new(GError {
        domain,
        code,
        message: CString::new(message).unwrap().into_raw(),
    }));
}

fn parse_error(slot: *mut *mut GError) {
    // SAFETY: `slot` comes from the binding's dispatcher.
    unsafe { set_error(slot, SPARQL_ERROR_DOMAIN, PARSE_ERROR_CODE, PARSE_ERROR_MESSAGE) }
}

fn normalize(sparql: *const c_char) -> String {
    // SAFETY: the binding always passes a NUL-terminated string.
    let text = unsafe { CStr::from_ptr(sparql) }.to_string_lossy();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Subject IRI of `<VERB> DATA { <s> a rdfs:Resource }`.
fn data_subject(sparql: &str, verb: &str) -> Option<String> {
    let rest = sparql.strip_prefix(&format!("{verb} DATA {{ <"))?;
    let (subject, tail) = rest.split_once('>')?;
    matches!(tail.trim(), "a rdfs:Resource }" | "a rdfs:Resource . }").then(|| subject.to_owned())
}

/// Subject IRI of `SELECT * WHERE { <s> ?p ?o }`.
fn select_subject(sparql: &str) -> Option<String> {
    let rest = sparql.strip_prefix("SELECT * WHERE { <")?;
    let (subject, tail) = rest.split_once('>')?;
    matches!(tail.trim(), "?p ?o }" | "?p ?o . }").then(|| subject.to_owned())
}

fn typed_cursor() -> FakeCursor {
    FakeCursor::new(
        &["uri", "label", "count", "ratio", "when", "node", "flag", "missing"],
        vec![vec![
            FakeCell::text(VALUE_TYPE_URI, "urn:fake:1"),
            FakeCell::text(VALUE_TYPE_STRING, "café"),
            FakeCell::integer(42),
            FakeCell::double(0.5),
            FakeCell::text(VALUE_TYPE_DATETIME, "2024-01-02T03:04:05Z"),
            FakeCell::text(VALUE_TYPE_BLANK_NODE, "b0"),
            FakeCell::boolean(true),
            FakeCell::unbound(),
        ]],
    )
}

// ── Entry points ────────────────────────────────────────────────────────

unsafe extern "C" fn fake_get_uuid_urn() -> *mut c_char {
    count_call();
    let n = with_state(|s| {
        s.uuid_counter += 1;
        s.uuid_counter
    });
    CString::new(format!("urn:uuid:00000000-0000-4000-8000-{n:012x}"))
        .unwrap()
        .into_raw()
}

unsafe extern "C" fn fake_connection_get(
    _cancellable: *mut c_void,
    error: *mut *mut GError,
) -> *mut c_void {
    count_call();
    if with_state(|s| s.refuse_connections) {
        set_error(
            error,
            CONNECTION_ERROR_DOMAIN,
            CONNECTION_ERROR_CODE,
            CONNECTION_ERROR_MESSAGE,
        );
        return ptr::null_mut();
    }
    into_object(FakeObject::Connection)
}

unsafe extern "C" fn fake_connection_query(
    _connection: *mut c_void,
    sparql: *const c_char,
    _cancellable: *mut c_void,
    error: *mut *mut GError,
) -> *mut c_void {
    count_call();
    let sparql = normalize(sparql);
    let cursor = match sparql.as_str() {
        TYPED_QUERY => typed_cursor(),
        BAD_TYPE_QUERY => FakeCursor::new(&["x"], vec![vec![FakeCell::text(42, "?")]]),
        FAILING_QUERY => FakeCursor {
            fail_at: Some(1),
            ..FakeCursor::new(
                &["x"],
                vec![vec![FakeCell::integer(1)], vec![FakeCell::integer(2)]],
            )
        },
        NEGATIVE_COLUMNS_QUERY => FakeCursor {
            reported_columns: Some(NEGATIVE_COLUMN_COUNT),
            ..FakeCursor::new(&["x"], vec![vec![FakeCell::integer(1)]])
        },
        UNNAMED_QUERY => FakeCursor {
            hide_names: true,
            ..FakeCursor::new(&["x"], vec![vec![FakeCell::with_code(VALUE_TYPE_URI)]])
        },
        NO_LENGTH_QUERY => FakeCursor {
            skip_length: true,
            ..FakeCursor::new(&["x"], vec![vec![FakeCell::text(VALUE_TYPE_STRING, "hello")]])
        },
        NULL_CURSOR_QUERY => return ptr::null_mut(),
        ERROR_WITH_CURSOR_QUERY => {
            parse_error(error);
            return into_object(FakeObject::Cursor(FakeCursor::new(&["x"], Vec::new())));
        }
        other => {
            let Some(subject) = select_subject(other) else {
                parse_error(error);
                return ptr::null_mut();
            };
            let rows = with_state(|s| {
                s.triples
                    .iter()
                    .filter(|(s, _, _)| *s == subject)
                    .map(|(_, p, o)| {
                        vec![
                            FakeCell::text(VALUE_TYPE_URI, p),
                            FakeCell::text(VALUE_TYPE_URI, o),
                        ]
                    })
                    .collect()
            });
            FakeCursor::new(&["p", "o"], rows)
        }
    };
    into_object(FakeObject::Cursor(cursor))
}

unsafe extern "C" fn fake_connection_update(
    _connection: *mut c_void,
    sparql: *const c_char,
    priority: c_int,
    _cancellable: *mut c_void,
    error: *mut *mut GError,
) {
    count_call();
    let sparql = normalize(sparql);
    with_state(|s| s.last_update_priority = Some(priority));
    if let Some(subject) = data_subject(&sparql, "INSERT") {
        with_state(|s| {
            let triple = (subject, RDF_TYPE.to_owned(), RDFS_RESOURCE.to_owned());
            if !s.triples.contains(&triple) {
                s.triples.push(triple);
            }
        });
    } else if let Some(subject) = data_subject(&sparql, "DELETE") {
        with_state(|s| s.triples.retain(|(s, _, _)| *s != subject));
    } else {
        parse_error(error);
    }
}

unsafe extern "C" fn fake_connection_statistics(
    _connection: *mut c_void,
    _cancellable: *mut c_void,
    _error: *mut *mut GError,
) -> *mut c_void {
    count_call();
    let resources = with_state(|s| s.triples.len());
    let cursor = FakeCursor::new(
        &["class", "count"],
        vec![vec![
            FakeCell::text(VALUE_TYPE_STRING, "rdfs:Resource"),
            FakeCell::integer(i64::try_from(resources).unwrap()),
        ]],
    );
    into_object(FakeObject::Cursor(cursor))
}

unsafe extern "C" fn fake_cursor_next(
    ptr: *mut c_void,
    _cancellable: *mut c_void,
    error: *mut *mut GError,
) -> gboolean {
    count_call();
    let cursor = cursor(ptr);
    let next = cursor.current.map_or(0, |current| current + 1);
    if cursor.fail_at == Some(next) {
        set_error(error, SPARQL_ERROR_DOMAIN, CURSOR_ERROR_CODE, CURSOR_ERROR_MESSAGE);
        return 0;
    }
    if next < cursor.rows.len() {
        cursor.current = Some(next);
        1
    } else {
        cursor.current = Some(cursor.rows.len());
        0
    }
}

unsafe extern "C" fn fake_cursor_rewind(ptr: *mut c_void) {
    count_call();
    cursor(ptr).current = None;
}

unsafe extern "C" fn fake_cursor_close(ptr: *mut c_void) {
    count_call();
    cursor(ptr).rows.clear();
    with_state(|s| s.closed_cursors += 1);
}

unsafe extern "C" fn fake_cursor_get_n_columns(ptr: *mut c_void) -> c_int {
    count_call();
    let cursor = cursor(ptr);
    cursor
        .reported_columns
        .unwrap_or_else(|| c_int::try_from(cursor.names.len()).unwrap())
}

unsafe extern "C" fn fake_cursor_get_variable_name(ptr: *mut c_void, column: c_int) -> *const c_char {
    count_call();
    let cursor = cursor(ptr);
    if cursor.hide_names {
        return ptr::null();
    }
    usize::try_from(column)
        .ok()
        .and_then(|idx| cursor.names.get(idx))
        .map_or(ptr::null(), |name| name.as_ptr())
}

unsafe extern "C" fn fake_cursor_is_bound(ptr: *mut c_void, column: c_int) -> gboolean {
    count_call();
    cursor(ptr)
        .cell(column)
        .map_or(0, |cell| gboolean::from(cell.code != VALUE_TYPE_UNBOUND))
}

unsafe extern "C" fn fake_cursor_get_value_type(ptr: *mut c_void, column: c_int) -> c_int {
    count_call();
    cursor(ptr).cell(column).map_or(VALUE_TYPE_UNBOUND, |cell| cell.code)
}

unsafe extern "C" fn fake_cursor_get_string(
    ptr: *mut c_void,
    column: c_int,
    length: *mut c_long,
) -> *const c_char {
    count_call();
    let cursor = cursor(ptr);
    match cursor.cell(column).and_then(|cell| cell.text.as_ref()) {
        Some(text) => {
            if !length.is_null() && !cursor.skip_length {
                *length = c_long::try_from(text.as_bytes().len()).unwrap();
            }
            text.as_ptr()
        }
        None => ptr::null(),
    }
}

unsafe extern "C" fn fake_cursor_get_integer(ptr: *mut c_void, column: c_int) -> i64 {
    count_call();
    cursor(ptr).cell(column).map_or(0, |cell| cell.integer)
}

unsafe extern "C" fn fake_cursor_get_double(ptr: *mut c_void, column: c_int) -> c_double {
    count_call();
    cursor(ptr).cell(column).map_or(0.0, |cell| cell.double)
}

unsafe extern "C" fn fake_cursor_get_boolean(ptr: *mut c_void, column: c_int) -> gboolean {
    count_call();
    cursor(ptr)
        .cell(column)
        .map_or(0, |cell| gboolean::from(cell.boolean))
}

unsafe extern "C" fn fake_error_free(error: *mut GError) {
    let error = Box::from_raw(error);
    drop(CString::from_raw(error.message));
    with_state(|s| s.freed_errors += 1);
}

unsafe extern "C" fn fake_free(mem: *mut c_void) {
    drop(CString::from_raw(mem.cast()));
    with_state(|s| s.freed_strings += 1);
}

unsafe extern "C" fn fake_object_unref(object: *mut c_void) {
    drop(Box::from_raw(object.cast::<FakeObject>()));
    with_state(|s| s.live_objects -= 1);
}

unsafe extern "C" fn fake_quark_to_string(quark: GQuark) -> *const c_char {
    match quark {
        SPARQL_ERROR_DOMAIN => c"tracker-sparql-error-quark".as_ptr(),
        CONNECTION_ERROR_DOMAIN => c"tracker-connection-error-quark".as_ptr(),
        _ => ptr::null(),
    }
}
