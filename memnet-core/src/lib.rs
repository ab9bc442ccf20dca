//! # memnet core library
//!
//! An in-process associative memory store. Each stored [`Record`] is a
//! piece of content with a timestamp, importance, emotional valence,
//! context attributes and tags. On insertion the store:
//!
//! - indexes the record along four dimensions (context, time bucket,
//!   valence step, tag);
//! - scores it against every stored record and links the pairs whose
//!   association strength exceeds a threshold;
//! - evicts the lowest-scoring records once the capacity is exceeded.
//!
//! Queries combine content, context, time, tag, valence and importance
//! filters; every returned record has its retrieval count bumped, which in
//! turn protects it from eviction.
//!
//! ```
//! use chrono::Utc;
//! use memnet_core::{MemoryNetwork, Query, Record};
//!
//! let mut net = MemoryNetwork::with_capacity(100)?;
//! let id = net.store(
//!     Record::new("Started new project", Utc::now(), 0.7, 0.6)?
//!         .with_context("location", "work")
//!         .with_tag("project"),
//! )?;
//! let hits = net.query(&Query::new().with_tag("project"));
//! assert_eq!(hits[0].0, id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod association;
pub mod config;
pub mod error;
pub mod eviction;
pub mod index;
pub mod metrics;
pub mod network;
pub mod persistence;
pub mod query;
pub mod record;
pub mod shared;
pub mod stats;
pub mod types;
mod validation;

pub use association::{AssociationGraph, AssociationStrategy, ExhaustiveScan};
pub use config::{MemnetConfig, NetworkConfig};
pub use error::{MemnetError, Result, ValidationError};
pub use network::MemoryNetwork;
pub use persistence::{NetworkSnapshot, PersistenceEngine};
pub use query::{ContextMatch, Query};
pub use record::Record;
pub use shared::SharedMemoryNetwork;
pub use stats::NetworkStatistics;
pub use types::RecordId;
