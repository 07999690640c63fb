//! # Continuation Predicate
//!
//! A caller-supplied gate consulted after each failure that still has budget
//! left. Returning `false` stops the session, which then reports how many
//! attempts had failed before the refused one.

use std::fmt;
use std::sync::Arc;

/// Decides whether another attempt may be scheduled
#[derive(Clone)]
pub struct ContinuationPredicate(Arc<dyn Fn() -> bool + Send + Sync>);

impl ContinuationPredicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Evaluates the predicate
    pub fn allows_retry(&self) -> bool {
        (self.0)()
    }
}

impl fmt::Debug for ContinuationPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContinuationPredicate(..)")
    }
}
