//! Process-wide handle on the loaded native library.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{info, warn};

use super::config::TrackerConfig;
use super::connection::Connection;
use super::error::{LoadError, TrackerError, TrackerResult};
use super::ffi::NativeApi;

static SHARED: OnceLock<Tracker> = OnceLock::new();
static SHARED_INIT: Mutex<()> = Mutex::new(());

/// Loaded libtracker-sparql entry points plus the configuration they were
/// loaded with.
///
/// Cheap to clone; pass it to whatever needs to open connections.
#[derive(Clone)]
pub struct Tracker {
    api: Arc<NativeApi>,
    config: Arc<TrackerConfig>,
}

impl Tracker {
    /// Loads the native library described by `config`.
    ///
    /// Each call maps the library again; most programs want
    /// [`init`](Self::init) instead.
    ///
    /// # Errors
    ///
    /// [`LoadError`] if the library or one of its entry points is missing.
    pub fn load(config: TrackerConfig) -> Result<Self, LoadError> {
        let api = NativeApi::load(&config.library)?;
        info!(library = %config.library, "libtracker-sparql loaded");
        Ok(Self {
            api: Arc::new(api),
            config: Arc::new(config),
        })
    }

    /// Loads the library once per process and returns the shared handle.
    ///
    /// Later calls return the handle created by the first successful call;
    /// their `config` is ignored.
    ///
    /// # Errors
    ///
    /// [`LoadError`] if nothing is loaded yet and loading fails.
    pub fn init(config: TrackerConfig) -> Result<Self, LoadError> {
        if let Some(shared) = SHARED.get() {
            return Ok(shared.reuse(&config));
        }
        let _guard = SHARED_INIT.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(shared) = SHARED.get() {
            return Ok(shared.reuse(&config));
        }
        let tracker = Self::load(config)?;
        Ok(SHARED.get_or_init(|| tracker).clone())
    }

    /// Opens a connection to the default store.
    ///
    /// # Errors
    ///
    /// See [`Connection::connect`].
    pub fn connect(&self) -> TrackerResult<Connection> {
        Connection::connect(self)
    }

    /// Generates a fresh `urn:uuid:` IRI with the engine's generator.
    ///
    /// # Errors
    ///
    /// [`TrackerError::ProtocolViolation`] if the engine returns null.
    pub fn uuid_urn(&self) -> TrackerResult<String> {
        self.api.uuid_urn().ok_or_else(|| {
            TrackerError::ProtocolViolation("tracker_sparql_get_uuid_urn returned null".into())
        })
    }

    /// Configuration the library was loaded with.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub(crate) const fn api(&self) -> &Arc<NativeApi> {
        &self.api
    }

    /// The shared handle as returned to a later [`init`](Self::init) call.
    pub(crate) fn reuse(&self, requested: &TrackerConfig) -> Self {
        if *self.config != *requested {
            warn!(
                loaded = %self.config.library,
                requested = %requested.library,
                "native library already initialised; ignoring new configuration"
            );
        }
        self.clone()
    }
}

#[cfg(test)]
impl Tracker {
    /// Wraps an already resolved entry point table.
    pub(crate) fn from_api(api: NativeApi, config: TrackerConfig) -> Self {
        Self {
            api: Arc::new(api),
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("api", &self.api)
            .field("config", &self.config)
            .finish()
    }
}
