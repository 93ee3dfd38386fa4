//! Snapshot capture: one `status_get` per tenant, in listing order.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::SnapshotError;
use crate::gearman::GearClient;

use super::TenantStatusSnapshot;

#[derive(Debug, Deserialize)]
struct TenantItem {
    name: String,
}

/// Fetches the full pipeline status of every tenant.
///
/// Tenants are queried in the order `tenant_list` returns them and their
/// status documents are stored verbatim. Any failing tenant query aborts
/// the whole dump; a partial snapshot is never returned.
pub async fn dump_all(client: &mut GearClient) -> Result<TenantStatusSnapshot, SnapshotError> {
    let listing = client.run("tenant_list", json!({})).await?;
    let tenants: Vec<TenantItem> =
        serde_json::from_value(listing).map_err(SnapshotError::BadTenantList)?;
    info!(tenants = tenants.len(), "dumping tenant status");

    let mut snapshot = TenantStatusSnapshot::default();
    for TenantItem { name } in tenants {
        debug!(tenant = %name, "fetching status");
        let status = client.run("status_get", json!({ "tenant": name })).await?;
        snapshot.tenants.insert(name, status);
    }
    Ok(snapshot)
}
