pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use services::auth::Authenticator;
use services::dashboard::DashboardController;
use services::remote::RemoteDataService;

/// Shared application state passed to all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub service: Arc<dyn RemoteDataService>,
    pub auth: Arc<Authenticator>,
    pub dashboard: Arc<DashboardController>,
}

impl AppState {
    /// Wire the login gate and dashboard to one data service.
    pub fn new(config: config::AppConfig, service: Arc<dyn RemoteDataService>) -> Self {
        let verifier = services::verifier::for_scheme(config.credential_scheme);
        let auth = Authenticator::new(Arc::clone(&service), verifier, config.tables.admins.clone());
        let dashboard = DashboardController::new(Arc::clone(&service), config.tables.clone());
        Self {
            config,
            service,
            auth: Arc::new(auth),
            dashboard: Arc::new(dashboard),
        }
    }
}
