//! Snapshot replay: re-enqueue every replayable change of a dumped snapshot.

use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::error::SnapshotError;
use crate::gearman::{ClientConfig, GearClient};

use super::{TenantStatus, TenantStatusSnapshot};

/// Connection attempts before giving up on the scheduler coming back.
const CONNECT_ATTEMPTS: u32 = 120;

/// Fixed delay between attempts; no backoff.
const CONNECT_DELAY: Duration = Duration::from_secs(1);

/// Replays a snapshot against a (re)starting scheduler.
///
/// Waits for the scheduler with a fixed retry budget, then walks the
/// snapshot in order — tenant, pipeline, change queue, head, change — and
/// submits one `enqueue` job per change that passes the replay predicate.
/// Ineligible changes are skipped without a trace.
///
/// Replay is not transactional: a failure mid-walk aborts the rest but
/// leaves already submitted enqueues in place.
pub async fn load_all(
    config: &ClientConfig,
    snapshot: &TenantStatusSnapshot,
) -> Result<(), SnapshotError> {
    let mut client = connect_with_retry(config, CONNECT_ATTEMPTS, CONNECT_DELAY).await?;

    for (tenant, document) in &snapshot.tenants {
        let status: TenantStatus = serde_json::from_value(document.clone()).map_err(|e| {
            SnapshotError::BadTenantStatus {
                tenant: tenant.clone(),
                source: e,
            }
        })?;

        for pipeline in &status.pipelines {
            for queue in &pipeline.change_queues {
                for head in &queue.heads {
                    for change in head {
                        if !change.is_replayable() {
                            continue;
                        }
                        let Some(change_id) = change.enqueue_id() else {
                            continue;
                        };
                        debug!(
                            tenant = %tenant,
                            pipeline = %pipeline.name,
                            change = %change_id,
                            "re-enqueueing"
                        );
                        client
                            .run(
                                "enqueue",
                                json!({
                                    "tenant": tenant,
                                    "pipeline": pipeline.name,
                                    "project": change.project_canonical,
                                    "trigger": "gerrit",
                                    "change": change_id,
                                }),
                            )
                            .await?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Connects with a fixed attempt budget and a constant delay, swallowing
/// each failed attempt until the budget runs out.
async fn connect_with_retry(
    config: &ClientConfig,
    attempts: u32,
    delay: Duration,
) -> Result<GearClient, SnapshotError> {
    for attempt in 1..=attempts {
        match GearClient::connect(config).await {
            Ok(client) => {
                info!(attempt, addr = %config.addr(), "connected to scheduler");
                return Ok(client);
            }
            Err(e) => {
                debug!(attempt, error = %e, "scheduler not ready yet");
                sleep(delay).await;
            }
        }
    }
    Err(SnapshotError::RetriesExhausted {
        addr: config.addr(),
        attempts,
    })
}
