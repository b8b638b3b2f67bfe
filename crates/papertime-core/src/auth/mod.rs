//! Authentication module for managing credentials and sessions.
//!
//! This module provides:
//! - `SessionData`: the persisted credential pair plus username and admin flag
//! - `CredentialStore`: get/set/clear persistence, injected wherever needed
//!   (in-memory, JSON file, or OS keychain)
//! - `TokenManager`: login, logout, and single-flight token renewal

pub mod session;
pub mod store;
pub mod token;

pub use session::SessionData;
pub use store::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    StoreError,
};
pub use token::TokenManager;
