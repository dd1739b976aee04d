//! Connection Lifecycle
//!
//! Owns the single store handle shared by reloads and writes.
//!
//! ```text
//! disconnected ──ensure_connection (ok)──▶ connected(handle)
//!      ▲                                        │
//!      └──────────── teardown(handle) ◀─────────┘  (any I/O failure)
//! ```
//!
//! There is no reconnect loop. A failed connect leaves the state
//! `disconnected` and the next reload or write tries again.

use crate::store::{Connector, StoreHandle};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Whether a store handle is currently held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

/// Lazily connects to the store and drops the handle on failure
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    /// Current handle; the lock also serializes connect attempts
    handle: Mutex<Option<Arc<dyn StoreHandle>>>,
    /// Mirror of `handle.is_some()` readable without the lock
    connected: AtomicBool,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            handle: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Return the current handle, connecting first if there is none.
    ///
    /// `None` is an expected outcome: the failure is logged and the state
    /// stays `disconnected`.
    pub async fn ensure_connection(&self) -> Option<Arc<dyn StoreHandle>> {
        let mut slot = self.handle.lock().await;

        if let Some(handle) = slot.as_ref() {
            return Some(Arc::clone(handle));
        }

        match self.connector.connect().await {
            Ok(handle) => {
                tracing::info!(target_store = %self.connector.describe(), "Store connected");
                *slot = Some(Arc::clone(&handle));
                self.connected.store(true, Ordering::Release);
                Some(handle)
            }
            Err(e) => {
                tracing::warn!(
                    target_store = %self.connector.describe(),
                    error = %e,
                    "Store connection failed"
                );
                None
            }
        }
    }

    /// Close `handle` and, if it is still the current one, go `disconnected`.
    ///
    /// A handle that was already replaced by a newer connection is closed
    /// without touching the current state.
    pub async fn teardown(&self, handle: &Arc<dyn StoreHandle>) {
        {
            let mut slot = self.handle.lock().await;
            let is_current = slot
                .as_ref()
                .map(|current| same_handle(current, handle))
                .unwrap_or(false);

            if is_current {
                *slot = None;
                self.connected.store(false, Ordering::Release);
                tracing::warn!("Store connection torn down");
            }
        }

        handle.close().await;
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        if self.connected.load(Ordering::Acquire) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Close the current handle, if any (shutdown)
    pub async fn close(&self) {
        let handle = {
            let mut slot = self.handle.lock().await;
            self.connected.store(false, Ordering::Release);
            slot.take()
        };

        if let Some(handle) = handle {
            handle.close().await;
            tracing::info!("Store connection closed");
        }
    }
}

/// Pointer identity of two handles, ignoring vtables
fn same_handle(a: &Arc<dyn StoreHandle>, b: &Arc<dyn StoreHandle>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
