//! Tenant status snapshots: dump the scheduler's in-flight state and replay
//! it after a restart.
//!
//! A snapshot maps tenant names to the raw status document the scheduler
//! returned for them. The documents are kept verbatim; only the replay walk
//! interprets the nested pipeline → change queue → head → change structure,
//! and only down to the fields it needs.
//!
//! Replay is selective: changes that are not live, carry no id, or carry
//! an id without a `<number>,<patchset>` shape are skipped without a log
//! line or an error.

mod dump;
mod load;

pub use dump::dump_all;
pub use load::load_all;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full pipeline state for every tenant, keyed by tenant name.
///
/// Key order is the scheduler's tenant listing order and survives
/// serialization, so a replay walks tenants the way the dump saw them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantStatusSnapshot {
    pub tenants: IndexMap<String, Value>,
}

impl TenantStatusSnapshot {
    /// Number of tenants captured.
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    /// Whether the snapshot captured no tenants at all.
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

/// One tenant's status document, reduced to the structure replay walks.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TenantStatus {
    pub pipelines: Vec<PipelineStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PipelineStatus {
    pub name: String,
    pub change_queues: Vec<ChangeQueueStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChangeQueueStatus {
    pub heads: Vec<Vec<ChangeStatus>>,
}

/// A single change as it appears in a pipeline head.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatus {
    /// Whether the change is the live item of its queue entry.
    #[serde(default)]
    pub live: bool,
    /// Change identifier, expected as `<number>,<patchset>`.
    #[serde(default)]
    pub id: Option<String>,
    /// Canonical project name the change belongs to.
    #[serde(default)]
    pub project_canonical: String,
}

impl ChangeStatus {
    /// Whether replay should re-enqueue this change.
    ///
    /// True only for a live change with a non-empty id containing the
    /// `,` separator. Everything else is skipped silently.
    pub fn is_replayable(&self) -> bool {
        self.live
            && self
                .id
                .as_deref()
                .is_some_and(|id| !id.is_empty() && id.contains(','))
    }

    /// The id to re-enqueue, rebuilt from the first two comma-separated
    /// fields: `"123,4,5"` becomes `"123,4"`.
    pub fn enqueue_id(&self) -> Option<String> {
        let id = self.id.as_deref()?;
        let mut fields = id.split(',');
        let number = fields.next()?;
        let patchset = fields.next()?;
        Some(format!("{number},{patchset}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(live: bool, id: Option<&str>) -> ChangeStatus {
        ChangeStatus {
            live,
            id: id.map(str::to_string),
            project_canonical: "review.example.com/demo".to_string(),
        }
    }

    #[test]
    fn test_live_change_with_patchset_id_is_replayable() {
        assert!(change(true, Some("123,4")).is_replayable());
    }

    #[test]
    fn test_non_live_change_is_skipped_regardless_of_id() {
        assert!(!change(false, Some("123,4")).is_replayable());
        assert!(!change(false, None).is_replayable());
    }

    #[test]
    fn test_missing_or_empty_id_is_skipped() {
        assert!(!change(true, None).is_replayable());
        assert!(!change(true, Some("")).is_replayable());
    }

    #[test]
    fn test_id_without_separator_is_skipped() {
        // A bare git sha marks a ref update, not a reviewable change.
        assert!(!change(true, Some("0123456789abcdef")).is_replayable());
    }

    #[test]
    fn test_enqueue_id_keeps_the_first_two_fields() {
        assert_eq!(change(true, Some("123,4")).enqueue_id().as_deref(), Some("123,4"));
        assert_eq!(
            change(true, Some("123,4,5")).enqueue_id().as_deref(),
            Some("123,4")
        );
    }

    #[test]
    fn test_snapshot_preserves_tenant_order_through_serde() {
        let mut snapshot = TenantStatusSnapshot::default();
        snapshot
            .tenants
            .insert("zulu".to_string(), json!({"pipelines": []}));
        snapshot
            .tenants
            .insert("alpha".to_string(), json!({"pipelines": []}));

        let rendered = serde_json::to_string(&snapshot).expect("snapshot should serialize");
        let parsed: TenantStatusSnapshot =
            serde_json::from_str(&rendered).expect("snapshot should deserialize");

        let keys: Vec<&String> = parsed.tenants.keys().collect();
        assert_eq!(keys, ["zulu", "alpha"]);
    }

    #[test]
    fn test_tenant_status_rejects_missing_pipelines() {
        let result: Result<TenantStatus, _> = serde_json::from_value(json!({"queues": []}));
        assert!(result.is_err());
    }

    #[test]
    fn test_change_status_tolerates_extra_fields() {
        let parsed: ChangeStatus = serde_json::from_value(json!({
            "live": true,
            "id": "7,1",
            "project_canonical": "review.example.com/demo",
            "item_ahead": null,
            "active": true,
        }))
        .expect("change should deserialize");
        assert!(parsed.is_replayable());
    }
}
