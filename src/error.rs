//! Error taxonomy for the pooled allocator.
//!
//! Errors split into two classes: recoverable variants that are logged and
//! returned to the caller, and [`AllocatorError::Corruption`], which is only
//! ever handed to the fatal-abort path in [`crate::diagnostics`] and never
//! returned from a public entry point.

use thiserror::Error;

/// Opaque handle identifying a pool created with [`crate::Allocator::create_pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(pub(crate) usize);

impl PoolId {
    /// Identifier reserved for the allocator's always-present large pool.
    pub const LARGE: PoolId = PoolId(usize::MAX);
}

impl std::fmt::Display for PoolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == PoolId::LARGE {
            write!(f, "pool(large)")
        } else {
            write!(f, "pool({})", self.0)
        }
    }
}

/// Errors the allocator can raise.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocatorError {
    #[error("allocator initialization failed: {0}")]
    InitFailed(&'static str),

    #[error("allocation of {size} bytes failed: no pool or slab could satisfy the request")]
    AllocFailed { size: usize },

    #[error("invalid free: pointer {ptr:#x} does not belong to any known pool or slab")]
    InvalidFree { ptr: usize },

    #[error("invalid pool: {0} is unknown or has been destroyed")]
    InvalidPool(PoolId),

    #[error("pool capacity exhausted: at most {max} pools may exist at once")]
    PoolFull { max: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Internal invariant violated (bad header magic, double free, impossible
    /// accounting). Never returned to a caller; carried only to the fatal
    /// abort path.
    #[error("memory corruption detected: {0}")]
    Corruption(&'static str),
}

impl AllocatorError {
    /// Whether this error terminates the process when raised through
    /// [`crate::diagnostics::fatal`].
    pub fn is_fatal(&self) -> bool {
        matches!(self, AllocatorError::Corruption(_))
    }
}

pub type AllocatorResult<T> = Result<T, AllocatorError>;
