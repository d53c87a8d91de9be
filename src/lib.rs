//! Lookout - an ad-hoc SQL console with a separate audit trail.
//!
//! User queries run with least-privilege `data` credentials; failures are
//! recorded with `audit` credentials that the read path never touches.
//! This library exposes the core modules to the binary and to integration
//! tests.

pub mod audit;
pub mod config;
pub mod console;
pub mod db;
pub mod error;
pub mod query;
pub mod render;
pub mod safety;
pub mod session;
