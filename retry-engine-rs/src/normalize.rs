//! # Outcome Normalizer
//!
//! Runs an operation exactly once and reduces whatever it did into an
//! [`Outcome`]. No retry logic lives here.

use tokio::sync::oneshot;
use tracing::trace;

use crate::error::Fault;
use crate::operation::{Operation, Returned, Settle};
use crate::outcome::Outcome;

/// Invokes `operation` once and classifies its result.
///
/// A missing operation fails with [`Fault::FunctionRequired`] without
/// invoking anything.
pub async fn run_once<T, E, O>(operation: Option<&mut O>) -> Outcome<T, E>
where
    O: Operation<T, E> + ?Sized,
{
    let Some(operation) = operation else {
        return Outcome::Failure(Fault::FunctionRequired);
    };

    let (settle, mut settled) = Settle::channel();

    match operation.invoke(settle.clone()) {
        Ok(Returned::Pending) => {
            trace!("Operation settles through its handle");
        }
        Ok(Returned::Value(value)) => {
            settle.succeed(value);
        }
        Ok(Returned::Thenable(future)) => {
            // A handle settled from another task may still beat the future.
            if !settle.is_settled() {
                tokio::select! {
                    biased;
                    received = &mut settled => return classify(received),
                    result = future => {
                        settle.settle(result);
                    }
                }
            }
        }
        Err(err) => {
            settle.fail(err);
        }
    }

    drop(settle);
    classify(settled.await)
}

fn classify<T, E>(received: Result<Result<T, E>, oneshot::error::RecvError>) -> Outcome<T, E> {
    match received {
        Ok(result) => result.into(),
        Err(_) => Outcome::Failure(Fault::Abandoned),
    }
}
