//! tack-core library: dense ordering for kanban boards.
//!
//! Boards hold lists and lists hold cards. Within each container the
//! items carry positions that are always exactly `0..N`; every move,
//! reorder, create, and delete keeps it that way inside one SQLite
//! write transaction.
//!
//! - [`order`]: pure move/reorder computations on an in-memory snapshot
//! - [`store`]: snapshot loading and two-phase position write-back
//! - [`service`]: the public operations, with authorization and retries
//! - [`verify`]: density checks and repair
//!
//! # Conventions
//!
//! - **Errors**: Service and store functions return [`error::Result`];
//!   setup paths (`db::open_store`, `Service::open`) return `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod authz;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod order;
pub mod service;
pub mod store;
pub mod verify;

pub use error::{Result, TackError};
pub use service::Service;
