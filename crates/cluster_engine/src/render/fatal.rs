//! Abort-with-diagnostic boundary
//!
//! The renderer has no local recovery: a failed API call, an expired wait or
//! a failed allocation ends the process. The public `RenderContext` methods
//! route errors through here so the diagnostic always names the operation
//! and where it was called from.

use std::panic::Location;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Unwrap `result`, aborting the process on error
#[track_caller]
pub fn abort_on_error<T>(result: VulkanResult<T>, operation: &str) -> T {
    match result {
        Ok(value) => value,
        Err(err) => fatal(operation, &err),
    }
}

/// Log `err` with the caller's location and abort
#[track_caller]
pub fn fatal(operation: &str, err: &VulkanError) -> ! {
    let message = diagnostic(operation, err, Location::caller());
    log::error!("{}", message);
    eprintln!("{message}");
    std::process::abort()
}

/// Text written before aborting
pub fn diagnostic(operation: &str, err: &VulkanError, location: &Location<'_>) -> String {
    format!(
        "fatal: {} failed at {}:{}: {}",
        operation,
        location.file(),
        location.line(),
        err
    )
}
