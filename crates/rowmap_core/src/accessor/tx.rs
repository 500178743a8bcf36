//! Closure-scoped transactions for accessor work.

use super::{Accessor, AccessorError, AccessorResult};
use crate::logging::sanitize_message;
use log::{error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

const MAX_PANIC_MESSAGE_CHARS: usize = 160;

/// Runs `f` with an accessor bound to a new transaction.
///
/// Commits when `f` returns `Ok`. Rolls back when `f` returns `Err` (the
/// error is returned unchanged) or panics (reported as `TxPanicked`).
///
/// # Errors
/// - `Sqlite` when the transaction cannot begin or commit.
/// - Whatever `f` returns.
/// - `TxPanicked` when `f` panics.
pub fn exec_tx<T, F>(conn: &mut Connection, behavior: TransactionBehavior, f: F) -> AccessorResult<T>
where
    F: FnOnce(&Accessor<'_>) -> AccessorResult<T>,
{
    let tx = conn.transaction_with_behavior(behavior)?;
    let outcome = {
        let accessor = Accessor::new(&tx);
        panic::catch_unwind(AssertUnwindSafe(|| f(&accessor)))
    };

    match outcome {
        Ok(Ok(value)) => {
            tx.commit()?;
            info!("event=tx_commit module=accessor status=ok");
            Ok(value)
        }
        Ok(Err(err)) => {
            if let Err(rollback_err) = tx.rollback() {
                error!("event=tx_rollback module=accessor status=error error={rollback_err}");
            } else {
                warn!("event=tx_rollback module=accessor status=ok cause={err}");
            }
            Err(err)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            if let Err(rollback_err) = tx.rollback() {
                error!("event=tx_rollback module=accessor status=error error={rollback_err}");
            }
            error!("event=tx_panic module=accessor status=error payload={message}");
            Err(AccessorError::TxPanicked(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };

    sanitize_message(&message, MAX_PANIC_MESSAGE_CHARS)
}
