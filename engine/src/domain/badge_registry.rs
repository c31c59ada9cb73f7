//! Badge registry service.

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{AwardOutcome, BadgeAwardCommit, BadgeRepository};
use crate::domain::{
    AchievementEvent, AchievementFact, AchievementPipeline, AwardedBadge, Badge, Error, UserBadge,
    UserId,
};

/// Result of an award request.
#[derive(Debug, Clone, PartialEq)]
pub enum BadgeAward {
    /// The badge was newly awarded and `event` emitted.
    Awarded {
        badge: Badge,
        award: UserBadge,
        event: Option<AchievementEvent>,
    },
    /// The user already held the badge; nothing was written or emitted.
    AlreadyHeld { badge: Badge, award: UserBadge },
}

/// Catalogue of awardable badges and the at-most-once award rule.
pub struct BadgeRegistry {
    badges: Arc<dyn BadgeRepository>,
    pipeline: Arc<AchievementPipeline>,
    clock: Arc<dyn Clock>,
}

impl BadgeRegistry {
    /// Create a registry.
    pub fn new(
        badges: Arc<dyn BadgeRepository>,
        pipeline: Arc<AchievementPipeline>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            badges,
            pipeline,
            clock,
        }
    }

    /// Award `badge_id` to `user_id` at most once.
    ///
    /// Unknown badges yield `not_found`, inactive ones `invalid_request`.
    /// Re-awarding, including a lost race against a concurrent award, is a
    /// silent no-op that emits no event.
    pub async fn award_badge(&self, user_id: UserId, badge_id: Uuid) -> Result<BadgeAward, Error> {
        let badge = self
            .badges
            .find_badge(&badge_id)
            .await?
            .ok_or_else(|| {
                Error::not_found(format!("badge {badge_id} does not exist"))
                    .with_details(json!({ "badgeId": badge_id }))
            })?;
        if !badge.is_active {
            return Err(Error::invalid_request(format!("badge {} is not active", badge.slug))
                .with_details(json!({ "badgeId": badge_id })));
        }

        if let Some(award) = self.badges.find_user_badge(&user_id, &badge_id).await? {
            debug!(user_id = %user_id, badge = %badge.slug, "badge already held");
            return Ok(BadgeAward::AlreadyHeld { badge, award });
        }

        let now = self.clock.utc();
        let award = UserBadge {
            user_id,
            badge_id,
            awarded_at: now,
        };
        let mut achievements = self.pipeline.record(
            user_id,
            &[AchievementFact::BadgeUnlocked(badge.clone())],
            now,
        );
        let Some(achievement) = achievements.pop() else {
            return Err(Error::internal("badge award produced no achievement entry"));
        };
        let commit = BadgeAwardCommit { award, achievement };

        match self.badges.commit_award(&commit).await? {
            AwardOutcome::Awarded => {
                let event = self
                    .pipeline
                    .publish(std::slice::from_ref(&commit.achievement))
                    .await
                    .pop();
                Ok(BadgeAward::Awarded {
                    badge,
                    award: commit.award,
                    event,
                })
            }
            AwardOutcome::AlreadyHeld(award) => {
                debug!(user_id = %user_id, badge = %badge.slug, "concurrent award won elsewhere");
                Ok(BadgeAward::AlreadyHeld { badge, award })
            }
        }
    }

    /// Badges held by `user_id`, most recently awarded first.
    pub async fn badges_for_user(&self, user_id: &UserId) -> Result<Vec<AwardedBadge>, Error> {
        let mut badges = self.badges.list_user_badges(user_id).await?;
        badges.sort_by(|a, b| b.awarded_at.cmp(&a.awarded_at));
        Ok(badges)
    }

    /// Active badges.
    pub async fn all_badges(&self) -> Result<Vec<Badge>, Error> {
        Ok(self.badges.list_active_badges().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockAchievementLogRepository, MockBadgeRepository};
    use crate::domain::{BadgeKind, ErrorCode, EventFanOut, SubscriberRegistry};
    use crate::test_support::FixtureClock;
    use chrono::Duration;

    fn badge(is_active: bool) -> Badge {
        Badge {
            id: Uuid::new_v4(),
            name: "Helper".to_owned(),
            slug: "helper".to_owned(),
            description: "Answered ten questions".to_owned(),
            kind: BadgeKind::Achievement,
            icon_path: Some("/icons/helper.svg".to_owned()),
            xp_reward: 20,
            is_active,
        }
    }

    fn registry(repo: MockBadgeRepository) -> BadgeRegistry {
        let clock: Arc<dyn Clock> = Arc::new(FixtureClock::default());
        let pipeline = Arc::new(AchievementPipeline::new(
            Arc::new(MockAchievementLogRepository::new()),
            EventFanOut::new(SubscriberRegistry::new()),
            Arc::clone(&clock),
        ));
        BadgeRegistry::new(Arc::new(repo), pipeline, clock)
    }

    #[tokio::test]
    async fn awards_new_badge_with_one_event() {
        let active = badge(true);
        let found = active.clone();
        let mut repo = MockBadgeRepository::new();
        repo.expect_find_badge()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));
        repo.expect_find_user_badge().times(1).returning(|_, _| Ok(None));
        repo.expect_commit_award()
            .withf(|commit| commit.achievement.metadata["badge_slug"] == "helper")
            .times(1)
            .returning(|_| Ok(AwardOutcome::Awarded));

        let award = registry(repo)
            .award_badge(UserId::random(), active.id)
            .await
            .expect("awarded");

        assert!(matches!(award, BadgeAward::Awarded { event: Some(_), .. }));
    }

    #[tokio::test]
    async fn re_award_is_a_silent_no_op() {
        let active = badge(true);
        let found = active.clone();
        let user_id = UserId::random();
        let mut repo = MockBadgeRepository::new();
        repo.expect_find_badge()
            .returning(move |_| Ok(Some(found.clone())));
        repo.expect_find_user_badge().returning(move |user, badge| {
            Ok(Some(UserBadge {
                user_id: *user,
                badge_id: *badge,
                awarded_at: FixtureClock::default().now - Duration::days(2),
            }))
        });
        repo.expect_commit_award().times(0);

        let award = registry(repo)
            .award_badge(user_id, active.id)
            .await
            .expect("no-op");

        assert!(matches!(award, BadgeAward::AlreadyHeld { .. }));
    }

    #[tokio::test]
    async fn lost_race_emits_nothing() {
        let active = badge(true);
        let found = active.clone();
        let mut repo = MockBadgeRepository::new();
        repo.expect_find_badge()
            .returning(move |_| Ok(Some(found.clone())));
        repo.expect_find_user_badge().returning(|_, _| Ok(None));
        repo.expect_commit_award().times(1).returning(|commit| {
            Ok(AwardOutcome::AlreadyHeld(commit.award.clone()))
        });

        let award = registry(repo)
            .award_badge(UserId::random(), active.id)
            .await
            .expect("no-op");

        assert!(matches!(award, BadgeAward::AlreadyHeld { .. }));
    }

    #[tokio::test]
    async fn unknown_badge_is_not_found() {
        let mut repo = MockBadgeRepository::new();
        repo.expect_find_badge().returning(|_| Ok(None));

        let error = registry(repo)
            .award_badge(UserId::random(), Uuid::new_v4())
            .await
            .expect_err("missing badge");
        assert_eq!(error.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn inactive_badge_is_rejected() {
        let inactive = badge(false);
        let found = inactive.clone();
        let mut repo = MockBadgeRepository::new();
        repo.expect_find_badge()
            .returning(move |_| Ok(Some(found.clone())));
        repo.expect_commit_award().times(0);

        let error = registry(repo)
            .award_badge(UserId::random(), inactive.id)
            .await
            .expect_err("inactive badge");
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn user_badges_are_newest_first() {
        let now = FixtureClock::default().now;
        let older = AwardedBadge {
            badge: badge(true),
            awarded_at: now - Duration::days(3),
        };
        let newer = AwardedBadge {
            badge: badge(true),
            awarded_at: now,
        };
        let rows = vec![older.clone(), newer.clone()];
        let mut repo = MockBadgeRepository::new();
        repo.expect_list_user_badges()
            .returning(move |_| Ok(rows.clone()));

        let badges = registry(repo)
            .badges_for_user(&UserId::random())
            .await
            .expect("listed");
        assert_eq!(badges, vec![newer, older]);
    }
}
