use crate::error::{Result, VaultError};
use crate::types::{ImportanceSignal, RetentionTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Thresholds for one evolution call. Passed explicitly, never global.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionPolicy {
    /// Importance at or above this promotes one step.
    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: f32,

    /// Days of inactivity after which long-term entities are archived.
    #[serde(default = "default_demotion_after_days")]
    pub demotion_after_days: f64,
}

fn default_promotion_threshold() -> f32 {
    0.7
}

fn default_demotion_after_days() -> f64 {
    90.0
}

impl Default for EvolutionPolicy {
    fn default() -> Self {
        Self {
            promotion_threshold: default_promotion_threshold(),
            demotion_after_days: default_demotion_after_days(),
        }
    }
}

impl EvolutionPolicy {
    pub fn new(promotion_threshold: f32, demotion_after_days: f64) -> Result<Self> {
        let policy = Self {
            promotion_threshold,
            demotion_after_days,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.promotion_threshold.is_finite() || !(0.0..=1.0).contains(&self.promotion_threshold) {
            return Err(VaultError::Validation(format!(
                "promotion_threshold {} out of range [0.0, 1.0]",
                self.promotion_threshold
            )));
        }
        if !self.demotion_after_days.is_finite() || self.demotion_after_days < 0.0 {
            return Err(VaultError::Validation(format!(
                "demotion_after_days {} must be a non-negative number",
                self.demotion_after_days
            )));
        }
        Ok(())
    }
}

/// How an evaluation moved the tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Pinned,
    Promoted,
    Demoted,
    /// Set by hand, never produced by [`evaluate`].
    Manual,
}

/// Outcome of evaluating one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierDecision {
    pub from: RetentionTier,
    pub to: RetentionTier,
    /// Rules that fired, in order.
    pub steps: Vec<TransitionKind>,
    pub reason: String,
}

impl TierDecision {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Decide the tier for one evaluation.
///
/// Rules run sequentially and each sees the previous rule's output:
/// 1. pinned and not canonical: canonical
/// 2. otherwise, importance at or above the threshold: one promotion step
/// 3. then, a long-term entity inactive for at least the demotion window: archived
///
/// So an entity promoted to long-term in this call can be archived in the
/// same call if it is also stale.
pub fn evaluate(
    current: RetentionTier,
    signal: &ImportanceSignal,
    policy: &EvolutionPolicy,
    now: DateTime<Utc>,
) -> TierDecision {
    let mut tier = current;
    let mut steps = Vec::new();
    let mut reasons = Vec::new();

    if signal.pinned && tier != RetentionTier::Canonical {
        tier = RetentionTier::Canonical;
        steps.push(TransitionKind::Pinned);
        reasons.push("pinned".to_string());
    } else if signal.importance >= policy.promotion_threshold {
        if let Some(next) = tier.promoted() {
            tier = next;
            steps.push(TransitionKind::Promoted);
            reasons.push(format!(
                "importance {:.2} >= {:.2}",
                signal.importance, policy.promotion_threshold
            ));
        }
    }

    if let Some(last_active) = signal.last_active_at {
        let days_inactive = (now - last_active).num_seconds() as f64 / 86400.0;
        if tier == RetentionTier::LongTerm && days_inactive >= policy.demotion_after_days {
            tier = RetentionTier::Archived;
            steps.push(TransitionKind::Demoted);
            reasons.push(format!(
                "inactive {:.1} days >= {:.1}",
                days_inactive, policy.demotion_after_days
            ));
        }
    }

    TierDecision {
        from: current,
        to: tier,
        steps,
        reason: reasons.join("; "),
    }
}
