//! Frame loop tests against an in-memory backend
//!
//! The mock records every backend call, so ordering and synchronization can
//! be asserted without a GPU.

pub mod recording;

mod presentation;
