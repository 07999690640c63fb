//! # Operations
//!
//! An [`Operation`] is the fallible unit of work a retry session drives. It
//! can report its result in three ways:
//!
//! - through the [`Settle`] handle it receives (executor style), returning
//!   [`Returned::Pending`];
//! - by returning a value or a future directly ([`Returned::Value`],
//!   [`Returned::Thenable`]);
//! - by returning `Err` from [`Operation::invoke`] (throwing style).
//!
//! All three feed one slot and the first settlement wins.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::trace;

type Slot<T, E> = Arc<Mutex<Option<oneshot::Sender<Result<T, E>>>>>;

/// Continuation handle handed to every invocation
///
/// Clones share the same slot, so it can be moved into spawned tasks or
/// timers. Only the first `succeed`/`fail` across all clones counts.
pub struct Settle<T, E> {
    slot: Slot<T, E>,
}

impl<T, E> Settle<T, E> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Result<T, E>>) {
        let (tx, rx) = oneshot::channel();
        let settle = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (settle, rx)
    }

    /// Settles the attempt with a value. Returns false if it was already settled.
    pub fn succeed(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settles the attempt with an error. Returns false if it was already settled.
    pub fn fail(&self, error: E) -> bool {
        self.settle(Err(error))
    }

    /// Settles the attempt with a result. Returns false if it was already settled.
    pub fn settle(&self, result: Result<T, E>) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => {
                // The receiver is gone only when the session future was dropped.
                let _ = tx.send(result);
                true
            }
            None => {
                trace!(
                    success = result.is_ok(),
                    "Ignoring settlement of an already settled attempt"
                );
                false
            }
        }
    }

    /// Returns true once any clone of this handle has settled the attempt
    pub fn is_settled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl<T, E> Clone for Settle<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T, E> fmt::Debug for Settle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settle")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// What an invocation handed back, besides a synchronous error
pub enum Returned<T, E> {
    /// The operation settles through its [`Settle`] handle
    Pending,
    /// The operation produced its value directly
    Value(T),
    /// The operation produced a future whose result is the outcome
    Thenable(BoxFuture<'static, Result<T, E>>),
}

impl<T, E> Returned<T, E> {
    /// Boxes a future into [`Returned::Thenable`]
    pub fn thenable<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Returned::Thenable(future.boxed())
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Returned<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Returned::Pending => write!(f, "Pending"),
            Returned::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Returned::Thenable(_) => write!(f, "Thenable(..)"),
        }
    }
}

/// A fallible unit of work that a retry session may invoke many times
pub trait Operation<T, E> {
    /// Invokes the operation once.
    ///
    /// Returning `Err` is the throwing style: the error becomes the attempt's
    /// failure unless `settle` was already used.
    fn invoke(&mut self, settle: Settle<T, E>) -> Result<Returned<T, E>, E>;
}

impl<T, E, O> Operation<T, E> for &mut O
where
    O: Operation<T, E> + ?Sized,
{
    fn invoke(&mut self, settle: Settle<T, E>) -> Result<Returned<T, E>, E> {
        (**self).invoke(settle)
    }
}

impl<T, E, O> Operation<T, E> for Box<O>
where
    O: Operation<T, E> + ?Sized,
{
    fn invoke(&mut self, settle: Settle<T, E>) -> Result<Returned<T, E>, E> {
        (**self).invoke(settle)
    }
}

/// Executor-style operation, see [`executor`]
#[derive(Debug, Clone)]
pub struct ExecutorFn<F>(F);

/// Wraps a closure that settles through its handle.
///
/// An `Err` returned before the handle was used is the attempt's failure.
pub fn executor<T, E, F>(f: F) -> ExecutorFn<F>
where
    F: FnMut(Settle<T, E>) -> Result<(), E>,
{
    ExecutorFn(f)
}

impl<T, E, F> Operation<T, E> for ExecutorFn<F>
where
    F: FnMut(Settle<T, E>) -> Result<(), E>,
{
    fn invoke(&mut self, settle: Settle<T, E>) -> Result<Returned<T, E>, E> {
        (self.0)(settle)?;
        Ok(Returned::Pending)
    }
}

/// Direct-return operation, see [`returning`]
#[derive(Debug, Clone)]
pub struct ReturningFn<F>(F);

/// Wraps a synchronous closure returning `Result<T, E>`
pub fn returning<T, E, F>(f: F) -> ReturningFn<F>
where
    F: FnMut() -> Result<T, E>,
{
    ReturningFn(f)
}

impl<T, E, F> Operation<T, E> for ReturningFn<F>
where
    F: FnMut() -> Result<T, E>,
{
    fn invoke(&mut self, _settle: Settle<T, E>) -> Result<Returned<T, E>, E> {
        (self.0)().map(Returned::Value)
    }
}

/// Future-returning operation, see [`thenable`]
#[derive(Debug, Clone)]
pub struct ThenableFn<F>(F);

/// Wraps a closure that builds a fresh future for every attempt
pub fn thenable<T, E, F, Fut>(f: F) -> ThenableFn<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    ThenableFn(f)
}

impl<T, E, F, Fut> Operation<T, E> for ThenableFn<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    fn invoke(&mut self, _settle: Settle<T, E>) -> Result<Returned<T, E>, E> {
        Ok(Returned::thenable((self.0)()))
    }
}

/// General-shape operation, see [`from_fn`]
#[derive(Debug, Clone)]
pub struct FromFn<F>(F);

/// Wraps a closure with the full [`Operation::invoke`] signature, for
/// operations that decide their calling convention per attempt
pub fn from_fn<T, E, F>(f: F) -> FromFn<F>
where
    F: FnMut(Settle<T, E>) -> Result<Returned<T, E>, E>,
{
    FromFn(f)
}

impl<T, E, F> Operation<T, E> for FromFn<F>
where
    F: FnMut(Settle<T, E>) -> Result<Returned<T, E>, E>,
{
    fn invoke(&mut self, settle: Settle<T, E>) -> Result<Returned<T, E>, E> {
        (self.0)(settle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_settlement_wins() {
        let (settle, mut rx) = Settle::<u32, &str>::channel();
        let other = settle.clone();

        assert!(!settle.is_settled());
        assert!(settle.succeed(7));
        assert!(!other.fail("late"));
        assert!(other.is_settled());
        assert_eq!(rx.try_recv(), Ok(Ok(7)));
    }

    #[test]
    fn test_executor_adapter_returns_pending() {
        let mut op = executor(|settle: Settle<u32, &str>| {
            settle.succeed(1);
            Ok(())
        });
        let (settle, _rx) = Settle::channel();

        assert!(matches!(op.invoke(settle), Ok(Returned::Pending)));
    }

    #[test]
    fn test_returning_adapter() {
        let mut ok = returning(|| Ok::<_, &str>("success"));
        let mut err = returning(|| Err::<u32, _>("I'm throwing"));
        let (settle, _rx) = Settle::channel();

        assert!(matches!(ok.invoke(settle), Ok(Returned::Value("success"))));

        let (settle, _rx) = Settle::channel();
        assert!(matches!(err.invoke(settle), Err("I'm throwing")));
    }
}
