//! Process-wide active-backend registry.
//!
//! Holds the single tensor engine currently in effect. Replacement is
//! atomic with respect to [`tensorlib`] readers; the locks below only make
//! the process-wide state sound — callers that replace the backend while
//! other threads compute must provide their own coordination.
//!
//! Replacement policy: a [`set_backend`] call whose backend differs from
//! the current one in `(name, precision)` runs the new backend's `setup`
//! hook and publishes [`EventKind::TensorlibChanged`] exactly once.
//! Re-setting an identical backend swaps the instance but publishes no
//! event and skips the setup call, so downstream caches are not
//! invalidated redundantly.

use std::sync::{Arc, LazyLock, RwLock};

use crate::backend::TensorBackend;
use crate::backends::DenseBackend;
use crate::events::{self, EventKind};
use crate::tensor::Precision;

static ACTIVE: LazyLock<RwLock<Arc<dyn TensorBackend>>> = LazyLock::new(|| {
    let default_backend: Arc<dyn TensorBackend> = Arc::new(DenseBackend::new(Precision::B64));
    RwLock::new(default_backend)
});

/// The currently active tensor backend.
///
/// Initialized to the dense 64-bit engine on first use. Usable anywhere in
/// the process without threading the backend through call sites.
pub fn tensorlib() -> Arc<dyn TensorBackend> {
    ACTIVE.read().expect("backend registry poisoned").clone()
}

/// Atomically replace the active backend.
pub fn set_backend(backend: Arc<dyn TensorBackend>) {
    let changed = {
        let current = ACTIVE.read().expect("backend registry poisoned");
        current.name() != backend.name() || current.precision() != backend.precision()
    };
    if changed {
        backend.setup();
    }
    {
        let mut active = ACTIVE.write().expect("backend registry poisoned");
        *active = backend;
    }
    if changed {
        events::trigger(EventKind::TensorlibChanged);
    }
}
