//! charter - schema-driven compliance engine
//!
//! Components, in dependency order:
//! - Schema Store and Version Ledger: caller-owned, memoized JSON stores
//! - Safety Utilities: path containment, log redaction, constrained execution
//! - Validator, Synchronizer, Auditor: polymorphic tools behind traits
//! - Governor: compliance gating, exception policies, scaffolding, status

pub mod audit;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod governor;
pub mod ledger;
pub mod models;
pub mod safety;
pub mod schema;
pub mod state;
pub mod sync;
pub mod validator;

pub use error::{AppError, AppResult};
pub use state::Engine;
