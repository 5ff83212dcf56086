//! Coze service: share Coze bots over a flat HTTP route.
//!
//! ## Routes
//!
//! ```text
//! GET  /help/coze   plaintext usage example
//! POST /txt2img     prompt in, extracted answer out
//! ```
//!
//! ## Settings
//!
//! ```text
//! coze        bool    enable the service (default false)
//! coze_token  string  bearer token for the Coze API
//! coze_url    string  API base URL (default https://api.coze.cn)
//! ```

mod api;
pub mod answer;
pub mod client;
pub mod request;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use crate::error::AppError;
use crate::services::{self, Service};
use crate::settings::{FlagSpec, Settings};

pub use api::ResponseContent;
use client::{CozeClient, Credentials};

pub const ID: &str = "coze";
pub const COMMENT: &str = "easy to share coze bots/workflow";
pub const ROUTE_PREFIX: &str = "/";
pub const DEFAULT_ENABLE: bool = false;
pub const DEFAULT_URL: &str = "https://api.coze.cn";

const TOKEN_KEY: &str = "coze_token";
const URL_KEY: &str = "coze_url";

/// Router state for the coze handlers.
#[derive(Clone)]
pub(crate) struct CozeState {
    pub settings: Arc<Settings>,
    pub client: CozeClient,
}

impl CozeState {
    /// Token and base URL as configured right now.
    fn credentials(&self) -> Credentials {
        Credentials {
            token: self.settings.get_string(TOKEN_KEY),
            base_url: self.settings.get_string(URL_KEY),
        }
    }
}

pub struct CozeService {
    client: CozeClient,
}

impl CozeService {
    pub fn new() -> Result<Self, AppError> {
        let client = CozeClient::new()
            .map_err(|e| AppError::Server(format!("failed to build coze HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Service for CozeService {
    fn id(&self) -> &'static str {
        ID
    }

    fn comment(&self) -> &'static str {
        COMMENT
    }

    fn route_prefix(&self) -> &'static str {
        ROUTE_PREFIX
    }

    fn flags(&self) -> Vec<FlagSpec> {
        vec![
            FlagSpec::bool(ID, DEFAULT_ENABLE, COMMENT),
            FlagSpec::string(TOKEN_KEY, "", "coze token"),
            FlagSpec::string(URL_KEY, DEFAULT_URL, "coze api url"),
        ]
    }

    fn routes(&self, settings: Arc<Settings>) -> Option<Router> {
        if !services::is_enabled(&settings, ID) {
            return None;
        }
        let state = CozeState { settings, client: self.client.clone() };
        let txt2img_path = format!("{}txt2img", self.route_prefix());
        Some(
            Router::new()
                .route(&format!("/help/{ID}"), get(api::help))
                .route(&txt2img_path, post(api::txt2img))
                .layer(DefaultBodyLimit::disable())
                .with_state(state),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingValue;

    #[test]
    fn disabled_service_mounts_nothing() {
        let svc = CozeService::new().unwrap();
        let settings = Arc::new(Settings::from_flags(&svc.flags()));
        assert!(svc.routes(settings).is_none());
    }

    #[test]
    fn identity_and_prefix() {
        let svc = CozeService::new().unwrap();
        assert_eq!(svc.id(), "coze");
        assert_eq!(svc.route_prefix(), "/");
        assert_eq!(svc.comment(), COMMENT);
    }

    #[test]
    fn enabled_service_mounts_routes() {
        let svc = CozeService::new().unwrap();
        let settings = Arc::new(Settings::from_pairs([(ID, SettingValue::Bool(true))]));
        assert!(svc.routes(settings).is_some());
    }

    #[test]
    fn credentials_read_from_settings() {
        let svc = CozeService::new().unwrap();
        let mut settings = Settings::from_flags(&svc.flags());
        settings.set(TOKEN_KEY, SettingValue::String("pat_123".into()));
        let state = CozeState { settings: Arc::new(settings), client: svc.client.clone() };
        let creds = state.credentials();
        assert_eq!(creds.token, "pat_123");
        assert_eq!(creds.base_url, DEFAULT_URL);
    }
}
