//! # Locker Core
//!
//! Exclusive-access coordination for named subjects (resources and the labels
//! that group them), backed by a shared key-value store.
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only
//!
//! ## Layers
//!
//! - [`store`]: the key-value adapter. Compare-and-set is the only mutation
//!   primitive for subject state.
//! - [`registry`]: create/delete/lookup of resources and labels.
//! - [`membership`]: the label → resource relation.
//! - [`coordinator`]: single-resource primitives and composite label
//!   lock/unlock/steal with compensating rollback.
//! - [`query`]: status, listings and per-user lock aggregation.
//! - [`Locker`]: the facade the command and event layers call.
//!
//! Expected refusals (`NotFound`, `Conflict`, ...) are outcome enums. Only
//! store, configuration and validation failures are [`Error`]s.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod config;
pub mod coordinator;
mod error;
pub mod events;
mod locker;
pub mod membership;
pub mod query;
pub mod registry;
pub mod store;
pub mod subject;

pub use config::{load_config, open_store, Config, LogConfig, StoreBackend, StoreConfig};
pub use coordinator::{
    Blocker, Coordinator, LockLabelOutcome, StealOutcome, UnlockLabelOutcome,
};
pub use error::{Error, Result};
pub use events::{Attempt, Notification};
pub use locker::Locker;
pub use membership::{AddMemberOutcome, Membership, RemoveMemberOutcome};
pub use query::{QueryService, StateDocument, SubjectView};
pub use registry::{CreateOutcome, DeleteOutcome, Registry};
pub use store::{MemoryStore, SqliteStore, Store};
pub use subject::{LockState, LockStatus, Subject, SubjectKind, SubjectRecord, UserId};
