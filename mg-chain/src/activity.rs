//! Activity lifecycle read model
//!
//! Reconstructs community activities from point-in-time ledger reads. Two
//! calls may observe different snapshots; results are only as fresh as the
//! reads they were built from.

use mg_core::logging::operations;
use mg_core::{
    Activity, Address, ApprovalTally, GridResult, ProtocolParams, QuorumStatus,
    ACTIVITY_SENTINEL_ID,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::gateway::LedgerGateway;

/// Read model over the manager's activity registry
pub struct ActivityLifecycleModel {
    gateway: Arc<dyn LedgerGateway>,
    params: ProtocolParams,
}

impl ActivityLifecycleModel {
    /// Fails with `Configuration` when `params` are inconsistent, e.g. a
    /// quorum of 0 that every activity would trivially reach.
    pub fn new(gateway: Arc<dyn LedgerGateway>, params: ProtocolParams) -> GridResult<Self> {
        params.validate()?;
        Ok(Self { gateway, params })
    }

    /// Fetch one activity
    ///
    /// Id 0 is the ledger's "does not exist" marker: it is never requested,
    /// and a record reporting id 0 is returned as `None`.
    pub async fn get_activity(&self, id: u64) -> GridResult<Option<Activity>> {
        if id == ACTIVITY_SENTINEL_ID {
            return Ok(None);
        }
        let activity = self.gateway.get_activity(id).await?;
        if activity.is_sentinel() {
            debug!(activity_id = id, "Ledger reports no such activity");
            return Ok(None);
        }
        Ok(Some(activity))
    }

    /// Up to `count` of the most recent activities, highest id first
    ///
    /// Reads ids `[max(1, next - count), next)` one at a time. Missing
    /// records and per-item failures are skipped; only failing to read
    /// `nextActivityId` fails the call.
    pub async fn list_recent(&self, count: u64) -> GridResult<Vec<Activity>> {
        let next_id = self.gateway.get_next_activity_id().await?;
        let start = next_id.saturating_sub(count).max(1);

        let mut activities = Vec::new();
        for id in start..next_id {
            match self.get_activity(id).await {
                Ok(Some(activity)) if activity.id == id => activities.push(activity),
                Ok(Some(activity)) => {
                    warn!(
                        activity_id = id,
                        reported_id = activity.id,
                        "Ledger returned a different activity id, skipping"
                    );
                }
                Ok(None) => {
                    debug!(activity_id = id, "Activity missing, skipping");
                }
                Err(e) => {
                    warn!(activity_id = id, error = %e, "Activity read failed, skipping");
                }
            }
        }

        activities.sort_by(|a, b| b.id.cmp(&a.id));
        info!(
            operation = operations::LIST_ACTIVITIES,
            next_id,
            count = activities.len(),
            "Listed recent activities"
        );
        Ok(activities)
    }

    /// Quorum progress from the ledger-recorded approval count
    pub fn quorum_status(&self, activity: &Activity) -> QuorumStatus {
        activity.quorum_status(self.params.quorum)
    }

    /// Whether `address` is in the activity's frozen validator snapshot
    pub fn is_validator_for(&self, activity: &Activity, address: &Address) -> bool {
        activity.is_validator_for(address)
    }

    /// Empty approval tally bound to the activity's snapshot
    pub fn tally_for(&self, activity: &Activity) -> ApprovalTally {
        ApprovalTally::new(activity.validators_snapshot, self.params.quorum)
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLedger;
    use mg_core::{ActivityState, Amount, GridError, ValidatorSet};

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn activity(id: u64) -> Activity {
        Activity {
            id,
            description: format!("activity {}", id),
            reward: Amount::from(10 * id),
            executor: Address::ZERO,
            state: ActivityState::Available,
            validators_snapshot: ValidatorSet::new([addr(1), addr(2), addr(3)]),
            approvals: 0,
        }
    }

    fn model(ledger: Arc<MockLedger>) -> ActivityLifecycleModel {
        ActivityLifecycleModel::new(ledger, ProtocolParams::default()).unwrap()
    }

    #[tokio::test]
    async fn test_sentinel_id_is_none_without_remote_read() {
        let ledger = Arc::new(MockLedger::new());
        // A misbehaving ledger that answers id 0 with a real-looking record
        ledger.insert_activity_at(0, activity(5));

        let model = model(Arc::clone(&ledger));
        assert_eq!(model.get_activity(0).await.unwrap(), None);
        assert_eq!(ledger.activity_reads(), 0);
    }

    #[tokio::test]
    async fn test_reported_sentinel_is_none() {
        let ledger = Arc::new(MockLedger::new());
        ledger.insert_activity_at(4, activity(0));
        assert_eq!(model(ledger).get_activity(4).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_recent_window() {
        let ledger = Arc::new(MockLedger::new());
        for id in 1..=30 {
            ledger.insert_activity(activity(id));
        }

        let listed = model(ledger).list_recent(5).await.unwrap();
        let ids: Vec<u64> = listed.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![30, 29, 28, 27, 26]);
    }

    #[tokio::test]
    async fn test_list_recent_skips_failures_and_mismatches() {
        let ledger = Arc::new(MockLedger::new());
        for id in 1..=5 {
            ledger.insert_activity(activity(id));
        }
        ledger.fail_activity(2);
        ledger.insert_activity_at(4, activity(1));

        let ids: Vec<u64> = model(ledger)
            .list_recent(20)
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![5, 3, 1]);
    }

    #[tokio::test]
    async fn test_list_recent_empty_registry() {
        let ledger = Arc::new(MockLedger::new());
        assert!(model(ledger).list_recent(20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_recent_zero_count() {
        let ledger = Arc::new(MockLedger::new());
        ledger.insert_activity(activity(1));
        assert!(model(ledger).list_recent(0).await.unwrap().is_empty());
    }

    #[test]
    fn test_rejects_unreachable_or_trivial_quorum() {
        for quorum in [0u8, 4] {
            let params = ProtocolParams {
                quorum,
                ..Default::default()
            };
            assert!(matches!(
                ActivityLifecycleModel::new(Arc::new(MockLedger::new()), params),
                Err(GridError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_quorum_helpers() {
        let model = model(Arc::new(MockLedger::new()));
        let mut a = activity(3);
        a.approvals = 2;
        assert!(model.quorum_status(&a).reached);
        assert!(model.is_validator_for(&a, &addr(2)));
        assert!(!model.is_validator_for(&a, &addr(8)));

        let mut tally = model.tally_for(&a);
        tally.approve(addr(1)).unwrap();
        tally.approve(addr(1)).unwrap();
        assert_eq!(tally.count(), 1);
    }
}
