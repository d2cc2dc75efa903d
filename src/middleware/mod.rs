//! Plug-and-play macaroon authentication middleware for Axum.
//!
//! This module wires the codec, credential store, authorization client and
//! decision flow into login/callback/logout routes plus a
//! [`serve_protected`] helper for protected-resource handlers.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use carton_accounts::middleware::{CartonAuthConfig, auth_routes, serve_protected, session_id};
//!
//! // 1. Implement SessionStore, OpenIdHandshake and IdentityResolver for your app
//! // 2. Configure from environment
//! let config = CartonAuthConfig::from_env()?;
//!
//! // 3. Mount the auth routes
//! let app = axum::Router::new()
//!     .merge(auth_routes(config, openid, resolver, sessions));
//!
//! // 4. Serve protected store resources from your own handlers
//! let response = serve_protected(
//!     &sessions, &client, session_id(&jar, "__carton_session"),
//!     &target, uri.path(), "/login",
//! ).await;
//! ```

mod config;
mod cookies;
mod error;
mod protected;
mod routes;
mod state;
mod traits;
mod types;

pub use config::CartonAuthConfig;
pub use cookies::session_id;
pub use error::AuthError;
pub use protected::{login_redirect, serve_protected};
pub use routes::auth_routes;
pub use traits::{IdentityResolver, OpenIdHandshake};
pub use types::HandshakeReply;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
