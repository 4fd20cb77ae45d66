//! Diagnostic sink: structured logging plus a thread-local last-error slot.
//!
//! Grounded in the original C `error_handler.h` collaborator interface
//! (`error_log`/`error_get_last`), reimplemented on top of the `log` facade
//! instead of a process-wide handler callback, since this crate has no
//! equivalent of the C global handler-registration API and `log`'s
//! subscriber model supersedes it.

use std::cell::RefCell;

use crate::error::AllocatorError;

thread_local! {
    static LAST_ERROR: RefCell<Option<AllocatorError>> = RefCell::new(None);
}

/// Record `err` as this thread's most recent allocator error and emit it
/// through the `log` facade at `error` severity.
pub fn record(err: &AllocatorError) {
    #[cfg(feature = "logging")]
    log::error!("{err}");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(err.clone()));
}

/// The most recent [`AllocatorError`] recorded on the calling thread, if any.
pub fn last_error() -> Option<AllocatorError> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

/// Clear this thread's last-error slot.
pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Log `err` as fatal and terminate the process.
///
/// Used exclusively for [`AllocatorError::Corruption`]: the allocator's
/// internal invariants can no longer be trusted, so unwinding (which would
/// run further `Drop` impls against poisoned state) is not an option.
#[cold]
pub fn fatal(err: AllocatorError) -> ! {
    #[cfg(feature = "logging")]
    log::error!("fatal allocator error, aborting: {err}");
    #[cfg(not(feature = "logging"))]
    let _ = &err;
    std::process::abort()
}
