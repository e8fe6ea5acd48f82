//! Storage Layer
//!
//! Durable persistence for the task broker. One embedded transactional
//! engine (sled) backs the whole layer:
//!
//! ## Components
//!
//! ### Task (`task.rs`)
//! The `Task` entity, its status enum, and the `extra_args` scalar map plus
//! the validation that keeps non-scalar values out of it.
//!
//! ### Store (`store.rs`)
//! The durable task table and its transactional state transitions: submit
//! (insert-or-upsert), claim (race-free pending -> processing), mark
//! completed, and reset. See `store.rs` for the claim algorithm in detail.
//!
//! ## Error Handling
//!
//! Every mutation runs inside a sled transaction over the trees it touches.
//! Aborted transactions never leave partial state; non-recoverable storage
//! I/O failures bubble up as `StoreError::Internal` / `StoreError::Sled`.

pub mod store;
pub mod task;

pub use store::{now_millis, Store, TaskCounts};
pub use task::{ExtraArgs, Task, TaskStatus};
