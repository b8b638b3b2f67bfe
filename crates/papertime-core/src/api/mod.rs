//! REST API client module for the exam server.
//!
//! This module provides the `AuthenticatedClient` every network call goes
//! through and the `PaperApi` endpoint wrappers built on top of it.
//!
//! The server uses JWT bearer tokens obtained from `POST /token` and renewed
//! through `POST /auth/refresh`.

pub mod client;
pub mod error;
pub mod papers;

pub use client::{build_http_client, AuthenticatedClient, Download, TokenPlacement};
pub use error::ApiError;
pub use papers::PaperApi;
