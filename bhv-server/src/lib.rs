//! # bhv-server: HTTP surface for the behavior store
//!
//! Wraps a shared [`bhv_core::BehaviorStore`] in an axum [`Router`]:
//!
//! ```text
//!  game client ──HTTP──▶ routes ──▶ BehaviorStore ──▶ behaviors.json
//!                                        ▲
//!                           autosave ────┘ (periodic flush mode)
//! ```
//!
//! ## Modules
//!
//! - `routes`: one handler per endpoint
//! - `error`: store errors → HTTP status + JSON body
//! - `autosave`: background flush task
//! - `shutdown`: Ctrl-C / SIGTERM handling
//! - `telemetry`: tracing subscriber setup
//! - `cli`: command-line flags and config loading

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod autosave;
pub mod cli;
pub mod error;
pub mod routes;
pub mod shutdown;
pub mod telemetry;

use axum::Router;
use bhv_core::config::ServerConfig;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use routes::SharedStore;

/// Routes plus middleware, ready to serve.
pub fn app(store: SharedStore, config: &ServerConfig) -> Router {
    let app = routes::router(store).layer(TraceLayer::new_for_http());
    if config.cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
