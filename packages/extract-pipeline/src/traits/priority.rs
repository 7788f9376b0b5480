//! Dispatch priority for fetch jobs.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::types::request::PlanTier;

/// Computes the queue priority of a caller's jobs.
#[async_trait]
pub trait PriorityPolicy: Send + Sync {
    /// Priority for a job; lower values are served first.
    async fn compute_priority(&self, plan: PlanTier, account_id: &str, base_priority: i32) -> i32;
}

/// Plan-tier priority: base priority plus a fixed per-plan offset.
#[derive(Debug, Clone)]
pub struct TierPriority {
    offsets: HashMap<PlanTier, i32>,
}

impl Default for TierPriority {
    fn default() -> Self {
        Self::new()
    }
}

impl TierPriority {
    /// Default offsets: paid plans at base priority, hobby and free behind.
    pub fn new() -> Self {
        let offsets = [
            (PlanTier::Free, 20),
            (PlanTier::Hobby, 10),
            (PlanTier::Standard, 0),
            (PlanTier::Growth, 0),
            (PlanTier::Scale, 0),
            (PlanTier::Enterprise, -5),
        ]
        .into_iter()
        .collect();

        Self { offsets }
    }

    /// Override the offset for a plan.
    pub fn with_offset(mut self, plan: PlanTier, offset: i32) -> Self {
        self.offsets.insert(plan, offset);
        self
    }
}

#[async_trait]
impl PriorityPolicy for TierPriority {
    async fn compute_priority(&self, plan: PlanTier, _account_id: &str, base_priority: i32) -> i32 {
        base_priority + self.offsets.get(&plan).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tier_priority_orders_plans() {
        let policy = TierPriority::new();
        let free = policy.compute_priority(PlanTier::Free, "acct", 10).await;
        let standard = policy.compute_priority(PlanTier::Standard, "acct", 10).await;
        let enterprise = policy.compute_priority(PlanTier::Enterprise, "acct", 10).await;

        assert_eq!(standard, 10);
        assert!(enterprise < standard);
        assert!(standard < free);
    }

    #[test]
    fn test_tier_priority_override() {
        let policy = TierPriority::new().with_offset(PlanTier::Free, 0);
        let priority = tokio_test::block_on(policy.compute_priority(PlanTier::Free, "acct", 3));
        assert_eq!(priority, 3);
    }
}
