//! Pure game rules plus the application state shared across requests.

pub mod board;
pub mod clue;
pub mod guess;
pub mod lobby;
pub mod state_machine;
pub mod vocabulary;
pub mod win;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tracing::warn;

use crate::{
    config::AppConfig,
    dao::game_store::GameStore,
    error::ServiceError,
    services::sync_coordinator::{SyncCoordinator, SyncPolicy},
    state::board::BoardGenerator,
};

/// Handle to the application state shared by every request.
pub type SharedState = Arc<AppState>;

/// Central application state: the shared store handle, the board dealer and runtime configuration.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
    boards: Arc<BoardGenerator>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, boards: BoardGenerator) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            degraded: degraded_tx,
            boards: Arc::new(boards),
            config,
        })
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
        if changed && value {
            warn!("entering degraded mode");
        }
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Dealer for new boards.
    pub fn boards(&self) -> &Arc<BoardGenerator> {
        &self.boards
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Coordinator bound to the installed store, or [`ServiceError::Degraded`] without one.
    pub async fn coordinator(&self) -> Result<SyncCoordinator, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        let store = self.game_store().await.ok_or(ServiceError::Degraded)?;
        Ok(SyncCoordinator::new(
            store,
            SyncPolicy::from_config(&self.config),
            Arc::clone(&self.boards),
        ))
    }
}
