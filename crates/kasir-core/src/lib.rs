//! # kasir-core: Pure Building Blocks for Kasir
//!
//! Everything here is deterministic and free of I/O: typed SQL values,
//! statement construction, placeholder rewriting, the string codec and
//! required-field validation. `kasir-db` and `kasir-sync` build on it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kasir Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                kasir-sync (integrator client)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                kasir-db (connection + facade)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kasir-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ statement │  │   codec   │  │ validation│  │   │
//! │  │   │ SqlValue  │  │ Statement │  │  Codec    │  │  required │  │   │
//! │  │   │ Fields    │  │ Dialect   │  │  AES-CBC  │  │  fields   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use kasir_core::{Dialect, Fields, Statement};
//!
//! let set = Fields::new().with("role", "admin");
//! let filter = Fields::new().with("name", "Ned");
//! let stmt = Statement::update(Dialect::Postgres, "users", &set, &filter).unwrap();
//!
//! assert_eq!(stmt.sql, "UPDATE users SET role = $1 WHERE name = $2");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codec;
pub mod error;
pub mod statement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use codec::Codec;
pub use error::{CodecError, StatementError, ValidationError};
pub use statement::{escape_literal, validate_identifier, Dialect, Statement};
pub use types::{Fields, Params, Row, SqlValue};
