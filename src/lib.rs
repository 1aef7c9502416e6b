//! Session, CSRF and permission handling for the admin portal.
//!
//! Server side: an axum service (`/auth/*`) guarded by the CSRF and auth
//! middlewares, driven by a route metadata table. Client side:
//! [`client::ClientSessionManager`], which keeps the permission snapshot,
//! coordinates token refresh and runs the idle logout countdown. Both sides
//! evaluate permissions through the same [`permissions`] module.

pub mod api;
pub mod app;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod permissions;
pub mod services;
pub mod state;
