//! Expiry sweep: find expired option records, settle them on-chain, purge them.
//!
//! A sweep is a reconciliation pass. A scan failure aborts the whole sweep
//! (nothing has been touched yet); a settlement or delete failure for one
//! record never stops the others. Settlement happens-before deletion for
//! every individual record, so a record is purged iff its on-chain void
//! succeeded.

use crate::error::{StoreError, SweepFailureCause};
use crate::ledger::settlement::OptionSettler;
use crate::store::OptionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Outcome of one sweep pass.
#[derive(Debug)]
pub struct SweepReport {
    /// Records settled and purged
    pub processed: usize,
    /// Records left in place (or purge anomalies), in scan order
    pub failed: Vec<SweepFailure>,
}

#[derive(Debug)]
pub struct SweepFailure {
    pub id: String,
    pub cause: SweepFailureCause,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Scheduled reconciliation job over the option store.
pub struct ExpirySweeper {
    store: Arc<dyn OptionStore>,
    settler: Arc<dyn OptionSettler>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn OptionStore>, settler: Arc<dyn OptionSettler>) -> Self {
        Self { store, settler }
    }

    /// Run one sweep against the given clock reading.
    ///
    /// Records are processed sequentially in scan order to keep failure
    /// attribution simple and avoid amplifying ledger load.
    #[instrument(skip(self))]
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let expired = self.store.scan_expired(now)?;
        info!(count = expired.len(), "Expired option records found");

        let mut processed = 0;
        let mut failed = Vec::new();

        for id in expired {
            if let Err(cause) = self.settler.settle_on_chain(&id).await {
                // Left in the store; retried on the next sweep.
                warn!(%id, error = %cause, "Settlement failed, record retained");
                failed.push(SweepFailure {
                    id,
                    cause: SweepFailureCause::Settlement(cause),
                });
                continue;
            }

            match self.store.delete(&id) {
                Ok(()) => processed += 1,
                Err(cause) => {
                    // Settled on-chain but still in the store: the states have
                    // diverged and a plain retry would settle twice.
                    error!(%id, error = %cause, "Settled but not purged; needs manual reconciliation");
                    failed.push(SweepFailure {
                        id,
                        cause: SweepFailureCause::PurgeAfterSettleFailed(cause),
                    });
                }
            }
        }

        let report = SweepReport { processed, failed };
        info!(
            processed = report.processed,
            failed = report.failed.len(),
            "Sweep complete"
        );
        Ok(report)
    }
}
