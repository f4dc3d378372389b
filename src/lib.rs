pub mod api;
pub mod broker;
pub mod config;
pub mod directory;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod store;

mod appresult;

use std::sync::Arc;

use anyhow::anyhow;
use axum::{extract::FromRef, routing::get, Router};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio_util::task::TaskTracker;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
pub use config::Config;

use directory::DirectoryClient;
use registry::ConnectionRegistry;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub registry: ConnectionRegistry,
    pub directory: DirectoryClient,
    /// Event handlers and receipt fan-outs still in flight.
    pub tasks: TaskTracker,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config) -> Self {
        Self {
            db_pool,
            registry: ConnectionRegistry::new(),
            directory: DirectoryClient::new(config.directory_url.clone(), config.directory_timeout),
            tasks: TaskTracker::new(),
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(broker::ws::chat_ws))
        .nest("/chatserver-api", api::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> anyhow::Result<&str>;
    fn get_obj_field(&self, field: &str) -> anyhow::Result<&Value>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> anyhow::Result<&str> {
        self.get_obj_field(field)?
            .as_str()
            .ok_or_else(|| anyhow!("expected {field} in {self} to be string"))
    }

    fn get_obj_field(&self, field: &str) -> anyhow::Result<&Value> {
        self.get(field)
            .ok_or_else(|| anyhow!("expected {field} in {self}"))
    }
}
