//! Run a closure inside a ledger transaction, retrying on conflict.

use tracing::warn;

use crate::error::{EngineError, EngineResult};
use crate::ledger::{LedgerTx, LotLedger};

/// Execute `body` in a fresh transaction and commit it.
///
/// The body is re-run from scratch against a new snapshot whenever the attempt
/// loses an optimistic concurrency race, up to `max_retries` extra attempts.
/// Domain errors abort immediately and nothing is committed.
pub(crate) fn run_in_tx<L, T>(
    ledger: &L,
    max_retries: u32,
    operation: &'static str,
    mut body: impl FnMut(&mut L::Tx) -> EngineResult<T>,
) -> EngineResult<T>
where
    L: LotLedger + ?Sized,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let mut tx = ledger.begin()?;
        let outcome = match body(&mut tx) {
            Ok(value) => tx.commit().map(|_| value).map_err(EngineError::from),
            Err(err) => Err(err),
        };

        match outcome {
            Err(EngineError::Concurrency(reason)) if attempt <= max_retries => {
                warn!(operation, attempt, %reason, "transaction conflicted, retrying");
            }
            Err(EngineError::Concurrency(reason)) => {
                return Err(EngineError::RetriesExhausted {
                    attempts: attempt,
                    last: reason,
                });
            }
            other => return other,
        }
    }
}

/// Open a transaction for reading only; it is dropped, never committed.
pub(crate) fn read<L, T>(
    ledger: &L,
    body: impl FnOnce(&mut L::Tx) -> EngineResult<T>,
) -> EngineResult<T>
where
    L: LotLedger + ?Sized,
{
    let mut tx = ledger.begin()?;
    body(&mut tx)
}
