//! Shared fixtures for the engine's integration tests.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use engine::domain::ports::{BadgeRepository, LevelRepository, TaskRepository};
use engine::domain::{Badge, BadgeKind, Level, Task, TaskFrequency};
use engine::outbound::memory::InMemoryProgressionStore;
use engine::settings::EngineSettings;
use engine::wiring::{EngineComponents, StorePorts};
use mockable::Clock;
use uuid::Uuid;

/// Clock the test moves by hand.
#[derive(Debug)]
pub struct MutableClock {
    now: Mutex<DateTime<Utc>>,
}

impl MutableClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wednesday 2026-03-04 09:00 UTC.
pub fn start_of_test() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 4, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Ladder with thresholds 0, 100, 500 and 2000.
pub fn ladder() -> Vec<Level> {
    [(0, "Newcomer"), (100, "Contributor"), (500, "Expert"), (2000, "Master")]
        .into_iter()
        .zip(1..)
        .map(|((xp_required, name), tier)| Level {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            xp_required,
            tier,
        })
        .collect()
}

pub fn daily_task(xp_reward: i64) -> Task {
    Task {
        id: Uuid::new_v4(),
        title: "Answer a question".to_owned(),
        description: "Post one accepted answer".to_owned(),
        frequency: TaskFrequency::Daily,
        xp_reward,
        is_active: true,
    }
}

pub fn badge(xp_reward: i64) -> Badge {
    Badge {
        id: Uuid::new_v4(),
        name: "First Answer".to_owned(),
        slug: "first-answer".to_owned(),
        description: "Posted a first answer".to_owned(),
        kind: BadgeKind::Milestone,
        icon_path: None,
        xp_reward,
        is_active: true,
    }
}

/// An assembled engine over the in-memory store.
pub struct TestEngine {
    pub store: Arc<InMemoryProgressionStore>,
    pub clock: Arc<MutableClock>,
    pub engine: EngineComponents,
}

impl TestEngine {
    /// Seed the ladder plus `tasks` and `badges`, then assemble.
    pub async fn start(tasks: &[Task], badges: &[Badge]) -> Self {
        Self::start_with(tasks, badges, &EngineSettings::default()).await
    }

    /// Like [`Self::start`], assembled with `settings`.
    pub async fn start_with(tasks: &[Task], badges: &[Badge], settings: &EngineSettings) -> Self {
        let store = Arc::new(InMemoryProgressionStore::new());
        for level in ladder() {
            store.upsert_level(&level).await.expect("level stored");
        }
        for task in tasks {
            store.upsert_task(task).await.expect("task stored");
        }
        for badge in badges {
            store.upsert_badge(badge).await.expect("badge stored");
        }
        let clock = Arc::new(MutableClock::at(start_of_test()));
        let engine = EngineComponents::assemble(
            StorePorts::in_memory(&store),
            settings,
            clock.clone(),
        )
        .await
        .expect("engine assembles");
        Self {
            store,
            clock,
            engine,
        }
    }
}
