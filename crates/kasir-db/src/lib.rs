//! # kasir-db: Database Layer for Kasir
//!
//! Connection management and the data-access facade for MySQL, Postgres and
//! SQLite. The DSN picks the engine; each engine runs on its own sqlx driver.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kasir Data Flow                                  │
//! │                                                                         │
//! │  kasir-sync (save_to_local) / application code                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     kasir-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │   DataStore   │    │   Session    │  │   │
//! │  │   │   (pool.rs)   │◄───│  (store.rs)   │    │ (session.rs) │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ DbPool        │    │ insert/update │    │ same ops,    │  │   │
//! │  │   │ DSN / env     │    │ query/execute │    │ inside a     │  │   │
//! │  │   │ transaction   │    │ encode/decode │    │ transaction  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            MySQL  •  PostgreSQL  •  SQLite                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Driver kinds, `DbConfig`, session options
//! - [`pool`] - `Database` handle and transactions
//! - [`session`] - Operations bound to an open transaction
//! - [`store`] - `DataStore` facade
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kasir_db::{DataStore, Database, DbConfig};
//! use kasir_core::{Fields, Params};
//!
//! let db = Database::from_config(&DbConfig::from_env()?).await?;
//! let store = DataStore::new(db, "secret");
//!
//! store.insert("users", &Fields::new().with("name", "Ned")).await?;
//! let rows = store.query("SELECT * FROM users", Params::None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
mod exec;
pub mod pool;
pub mod session;
pub mod store;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::{DbConfig, DriverKind, SessionOptions};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbPool};
pub use session::Session;
pub use store::DataStore;
