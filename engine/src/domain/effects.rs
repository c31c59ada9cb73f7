//! Deferred side effects chained off committed events.
//!
//! Badge and task rewards are paid out as separate XP grants, run later by a
//! queue worker so the action that earned them never waits on them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::ports::EffectHandler;
use crate::domain::{AchievementEvent, AchievementKind, Error, Metadata, UserId, XpLedger};

/// Work scheduled for asynchronous execution.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredEffect {
    /// Grant XP as a consequence of another event.
    GrantXp {
        user_id: UserId,
        event_type: String,
        amount: i64,
        metadata: Metadata,
    },
}

impl DeferredEffect {
    /// User the effect applies to.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        match self {
            Self::GrantXp { user_id, .. } => *user_id,
        }
    }
}

/// Derive the chained effect for an event, if it has one.
///
/// `badge_unlocked` and `task_completed` pay out their positive `xp_reward`;
/// `answer_verified` pays `answer_verified_xp` when that is positive. XP and
/// level events never chain, so rewards cannot loop.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use engine::domain::{AchievementEvent, AchievementKind, UserId, chained_effect_for};
/// use serde_json::json;
/// use uuid::Uuid;
///
/// let event = AchievementEvent {
///     id: Uuid::new_v4(),
///     user_id: UserId::random(),
///     kind: AchievementKind::XpGained,
///     payload: json!({ "xp_amount": 10 }),
///     occurred_at: Utc::now(),
/// };
/// assert!(chained_effect_for(&event, 50).is_none());
/// ```
#[must_use]
pub fn chained_effect_for(event: &AchievementEvent, answer_verified_xp: i64) -> Option<DeferredEffect> {
    let amount = match event.kind {
        AchievementKind::BadgeUnlocked | AchievementKind::TaskCompleted => {
            event.payload_i64("xp_reward")?
        }
        AchievementKind::AnswerVerified => answer_verified_xp,
        AchievementKind::XpGained | AchievementKind::LevelUp => return None,
    };
    if amount <= 0 {
        return None;
    }

    let mut metadata = Metadata::new();
    metadata.insert("source_event_id".to_owned(), json!(event.id));
    for key in ["badge_id", "task_id", "answer_id"] {
        if let Some(value) = event.payload.get(key).filter(|value| !value.is_null()) {
            metadata.insert(key.to_owned(), Value::clone(value));
        }
    }

    Some(DeferredEffect::GrantXp {
        user_id: event.user_id,
        event_type: event.kind.as_str().to_owned(),
        amount,
        metadata,
    })
}

/// Executes deferred effects against the XP ledger.
pub struct ChainedXpEffects {
    ledger: Arc<XpLedger>,
}

impl ChainedXpEffects {
    /// Create a handler granting through `ledger`.
    pub fn new(ledger: Arc<XpLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl EffectHandler for ChainedXpEffects {
    async fn apply(&self, effect: &DeferredEffect) -> Result<(), Error> {
        match effect {
            DeferredEffect::GrantXp {
                user_id,
                event_type,
                amount,
                metadata,
            } => {
                let grant = self
                    .ledger
                    .grant_xp(*user_id, event_type, *amount, metadata.clone())
                    .await?;
                debug!(
                    user_id = %user_id,
                    event_type = %event_type,
                    total_xp = grant.progress.total_xp,
                    "chained xp granted"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;
    use uuid::Uuid;

    fn event(kind: AchievementKind, payload: Value) -> AchievementEvent {
        AchievementEvent {
            id: Uuid::new_v4(),
            user_id: UserId::random(),
            kind,
            payload,
            occurred_at: Utc::now(),
        }
    }

    #[rstest]
    fn badge_reward_becomes_a_grant() {
        let badge_id = Uuid::new_v4();
        let source = event(
            AchievementKind::BadgeUnlocked,
            json!({ "badge_id": badge_id, "xp_reward": 25 }),
        );

        let Some(DeferredEffect::GrantXp {
            user_id,
            event_type,
            amount,
            metadata,
        }) = chained_effect_for(&source, 0)
        else {
            panic!("expected a chained grant");
        };

        assert_eq!(user_id, source.user_id);
        assert_eq!(event_type, "badge_unlocked");
        assert_eq!(amount, 25);
        assert_eq!(metadata.get("badge_id"), Some(&json!(badge_id)));
        assert_eq!(metadata.get("source_event_id"), Some(&json!(source.id)));
    }

    #[rstest]
    #[case(AchievementKind::TaskCompleted, json!({ "xp_reward": 0 }), 0)]
    #[case(AchievementKind::XpGained, json!({ "xp_amount": 10 }), 10)]
    #[case(AchievementKind::LevelUp, json!({ "tier": 2 }), 10)]
    #[case(AchievementKind::AnswerVerified, json!({ "score": 4 }), 0)]
    fn events_without_reward_do_not_chain(
        #[case] kind: AchievementKind,
        #[case] payload: Value,
        #[case] answer_xp: i64,
    ) {
        assert!(chained_effect_for(&event(kind, payload), answer_xp).is_none());
    }

    #[rstest]
    fn verified_answer_pays_configured_amount() {
        let source = event(AchievementKind::AnswerVerified, json!({ "score": 4 }));
        let effect = chained_effect_for(&source, 15).expect("chained grant");

        assert!(matches!(
            effect,
            DeferredEffect::GrantXp { amount: 15, ref event_type, .. } if event_type == "answer_verified"
        ));
    }
}
