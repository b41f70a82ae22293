//! Interfaces between the frame loop and a GPU backend

pub mod frame_backend;

pub use frame_backend::{FrameBackend, PresentStatus, RecordFn, SceneStorage, SceneUpload, Submission};
