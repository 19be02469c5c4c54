//! Ledger module containing account management, journal processing and fiscal periods

pub mod account;
pub mod core;
pub mod journal;
pub mod period;

pub use account::*;
pub use self::core::*;
pub use journal::*;
pub use period::*;

use crate::traits::LedgerStorage;
use crate::types::LedgerResult;

/// Commit on success, roll back on failure, and hand the result back.
pub(crate) async fn finish<S, T>(storage: &mut S, result: LedgerResult<T>) -> LedgerResult<T>
where
    S: LedgerStorage + ?Sized,
{
    match result {
        Ok(value) => {
            storage.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = storage.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
