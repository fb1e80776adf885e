use std::future::Future;
use tracing::info;

use crate::error::{HarnessError, Result};
use crate::tx::PendingTx;

/// Succeed only if the operation reverts
///
/// `submission` is anything producing a [`PendingTx`], typically a facade or
/// binding call. A revert caught while simulating, estimating or mining
/// counts. Other failures propagate unchanged; a mined success fails with
/// [`HarnessError::UnexpectedSuccess`].
pub async fn expect_revert<F>(submission: F) -> Result<HarnessError>
where
    F: Future<Output = Result<PendingTx>>,
{
    let pending = match submission.await {
        Ok(pending) => pending,
        Err(e) if e.is_revert() => {
            info!("Reverted before broadcast as expected: {}", e);
            return Ok(e);
        }
        Err(e) => return Err(e),
    };

    let hash = pending.hash();
    match pending.wait().await {
        Ok(_) => Err(HarnessError::UnexpectedSuccess(hash)),
        Err(e) if e.is_revert() => {
            info!("Reverted on chain as expected: {}", e);
            Ok(e)
        }
        Err(e) => Err(e),
    }
}
