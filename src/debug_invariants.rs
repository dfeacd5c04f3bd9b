//! Structural self-checks.
//!
//! [`RegularDecomposer`](crate::topology::RegularDecomposer) checks that its
//! divisions multiply to the block count and that its cores tile the domain.
//! [`Block`](crate::data::Block) checks that its core lies inside its bounds,
//! its bounds inside the domain, and that the generated grid and points match
//! their extents. The checks are cheap enough for debug builds; release builds
//! opt in with `check-invariants` or `strict-invariants`.

use crate::redist_error::RedistError;

pub trait DebugInvariants {
    /// Panic on a broken invariant when checking is enabled; no-op otherwise.
    fn debug_assert_invariants(&self);
    /// First broken invariant.
    fn validate_invariants(&self) -> Result<(), RedistError>;
}

/// `debug_invariants!(block.validate_invariants(), "Block")` panics with the
/// context prefix if the check fails and checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
