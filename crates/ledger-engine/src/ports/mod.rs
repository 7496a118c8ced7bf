//! Collaborator seams consumed by the engine.
//!
//! The core never talks to a database, a queue broker, or the system clock
//! directly; it goes through the three traits below so that tests can
//! substitute deterministic fakes and deployments can substitute real
//! backends.

mod clock;
mod queue;
mod store;

pub use clock::{Clock, MockClock, SystemClock};
pub use queue::{Queue, QueueError};
pub use store::{AccountStore, LockMode, StoreError, StoreTx};
