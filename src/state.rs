// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{catalog::CatalogService, sessions::SessionRegistry},
    store::ExamStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExamStore>,
    pub catalog: CatalogService,
    pub sessions: SessionRegistry,
    pub config: Config,
}

impl AppState {
    /// Wires the services around one store.
    pub fn new(store: Arc<dyn ExamStore>, config: Config) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            sessions: SessionRegistry::new(store.clone(), config.tick_interval())
                .with_max_age(config.session_max_age()),
            store,
            config,
        }
    }
}

impl FromRef<AppState> for Arc<dyn ExamStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for CatalogService {
    fn from_ref(state: &AppState) -> Self {
        state.catalog.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
