//! Incremental spatial clustering engine for data crystals.
//!
//! Main components:
//! - [`unit`] — data units and their cube footprint.
//! - [`population`] — the unit arena with tree and geometry operations.
//! - [`phases`] — per-tick merge / gravity / jiggle / count phases.
//! - [`engine`] — the cluster engine that owns a population and ticks it.
//! - [`stats`] — derived topology counters and status snapshots.
//! - [`config`] — tunables, loadable from TOML.
//! - [`dataset`] — CSV ingestion into unit buffers.
//! - [`types`] — shared ids and small value types.
//! - [`error`] — crate error type.

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod phases;
pub mod population;
pub mod stats;
pub mod types;
pub mod unit;

pub use engine::{ClusterEngine, Command};
pub use error::{Error, Result};
