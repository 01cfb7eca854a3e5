//! # SecAgg Coordinator
//!
//! Server side of the secure aggregation protocol: collects each round's
//! submissions, routes sealed shares to their recipients, tracks which
//! users dropped out and recovers the aggregate from the masked inputs and
//! the shares revealed in round 4.
//!
//! `SharedCoordinator` wraps a coordinator for concurrent access and
//! `MemoryTransport` drives participants against it in-process.

mod coordinator;
pub mod error;
pub mod memory;
mod shared;
mod unmask;

pub use coordinator::{Coordinator, CoordinatorStatus, Phase};
pub use error::{CoordinatorError, Result};
pub use memory::MemoryTransport;
pub use shared::SharedCoordinator;
