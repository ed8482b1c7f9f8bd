//! Blocking synchronization primitives used by the run registry

pub mod cell;
pub mod event;
pub mod ready_queue;
pub mod wait;

pub use cell::ResultCell;
pub use event::WaitEvent;
pub use ready_queue::ReadyQueue;
pub use wait::{CancelToken, WaitOptions};
