//! Library entrypoint for RustAlerts.
//!
//! Everything the binary wires together is public here so that integration
//! tests under `tests/` can build an `AppState` on the in-memory store and
//! drive the routers directly.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub mod controllers;
pub mod routes;

use std::sync::Arc;

use error::AppResult;
use services::{PersistenceGateway, RequestRepository, UserService};

#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub requests: Arc<RequestRepository>,
    pub users: Arc<UserService>,
}

impl AppState {
    /// Builds the registries on top of `gateway` and rehydrates them.
    pub async fn bootstrap(
        settings: config::Settings,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> AppResult<Self> {
        let requests = Arc::new(RequestRepository::load(gateway.clone()).await?);
        let users = Arc::new(UserService::new(gateway, requests.clone()));
        users.reload().await?;

        Ok(Self {
            settings,
            requests,
            users,
        })
    }
}
