//! # kasir-sync: POS Integrator Client for Kasir
//!
//! HTTP client for the remote POS-group service, plus the application
//! configuration that ties the client, the local database and the codec
//! together.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        kasir-sync Architecture                          │
//! │                                                                         │
//! │   ┌──────────────────┐        ┌──────────────────────────────────┐     │
//! │   │    AppConfig     │───────►│        IntegratorClient          │     │
//! │   │  (config.rs)     │        │         (client.rs)              │     │
//! │   │  TOML + env      │        │                                  │     │
//! │   └──────────────────┘        │  validate ─► HttpTransport ─►    │     │
//! │                               │  PosResponse::from_body          │     │
//! │                               └──────┬─────────────────┬─────────┘     │
//! │                                      │                 │               │
//! │                                      ▼                 ▼               │
//! │                          ┌────────────────────┐ ┌──────────────────┐   │
//! │                          │   POS-group API    │ │  DataStore       │   │
//! │                          │  svr_pos_user.php  │ │  (save_to_local) │   │
//! │                          │  svr_group_pos.php │ │  kasir-db        │   │
//! │                          └────────────────────┘ └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `AppConfig`, `IntegratorConfig`
//! - [`client`] - `IntegratorClient` operations
//! - [`transport`] - HTTP GET/POST helpers
//! - [`protocol`] - Actions, `PosResponse`, `PosLastDate`
//! - [`error`] - Client error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use client::IntegratorClient;
pub use config::{AppConfig, CodecConfig, IntegratorConfig};
pub use error::{ClientError, ClientResult};
pub use protocol::{Action, BulkUpdateOutcome, PosLastDate, PosResponse};
pub use transport::HttpTransport;
