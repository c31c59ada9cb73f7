//! Assembly of the engine's component graph from a set of storage ports.
//!
//! The binary, the reset runner and the integration tests all build the
//! same graph: levels, pipeline with its three subscribers, ledger, badge
//! registry, task tracker, progression service, reset jobs and the effect
//! worker that closes the loop from queued effects back into the ledger.

use std::sync::Arc;

use mockable::Clock;
use tokio::task::JoinHandle;

use crate::domain::ports::{
    AchievementLogRepository, BadgeRepository, EventAuditRepository, JobLeaseRepository,
    LevelRepository, TaskRepository, UserProgressRepository,
};
use crate::domain::{
    AchievementPipeline, AuditLogger, BadgeRegistry, ChainedXpEffects, Error, EventFanOut,
    LevelResolver, ProgressionService, QueuedEffects, RealtimeNotifier, ResetJobs,
    SubscriberRegistry, TaskTracker, XpLedger,
};
use crate::outbound::memory::InMemoryProgressionStore;
use crate::outbound::persistence::{
    DbPool, DieselAchievementLogRepository, DieselBadgeRepository, DieselEventAuditRepository,
    DieselJobLeaseRepository, DieselLevelRepository, DieselTaskRepository,
    DieselUserProgressRepository,
};
use crate::outbound::queue::{EffectReceiver, EffectWorker, TokioEffectQueue};
use crate::outbound::realtime::BroadcastRealtimeHub;
use crate::settings::EngineSettings;

/// Storage ports the engine runs on.
#[derive(Clone)]
pub struct StorePorts {
    pub progress: Arc<dyn UserProgressRepository>,
    pub levels: Arc<dyn LevelRepository>,
    pub badges: Arc<dyn BadgeRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub achievements: Arc<dyn AchievementLogRepository>,
    pub audit: Arc<dyn EventAuditRepository>,
    pub job_leases: Arc<dyn JobLeaseRepository>,
}

impl StorePorts {
    /// Every port served by one in-memory store.
    pub fn in_memory(store: &Arc<InMemoryProgressionStore>) -> Self {
        Self {
            progress: store.clone(),
            levels: store.clone(),
            badges: store.clone(),
            tasks: store.clone(),
            achievements: store.clone(),
            audit: store.clone(),
            job_leases: store.clone(),
        }
    }

    /// Every port backed by PostgreSQL through `pool`.
    pub fn postgres(pool: &DbPool) -> Self {
        Self {
            progress: Arc::new(DieselUserProgressRepository::new(pool.clone())),
            levels: Arc::new(DieselLevelRepository::new(pool.clone())),
            badges: Arc::new(DieselBadgeRepository::new(pool.clone())),
            tasks: Arc::new(DieselTaskRepository::new(pool.clone())),
            achievements: Arc::new(DieselAchievementLogRepository::new(pool.clone())),
            audit: Arc::new(DieselEventAuditRepository::new(pool.clone())),
            job_leases: Arc::new(DieselJobLeaseRepository::new(pool.clone())),
        }
    }
}

/// The assembled engine.
pub struct EngineComponents {
    pub service: Arc<ProgressionService>,
    pub ledger: Arc<XpLedger>,
    pub levels: Arc<LevelResolver>,
    pub reset_jobs: Arc<ResetJobs>,
    pub realtime: BroadcastRealtimeHub,
    effects: Option<(EffectWorker, EffectReceiver)>,
}

impl EngineComponents {
    /// Build the graph, loading the level ladder from `stores`.
    ///
    /// # Errors
    ///
    /// Fails when the stored level ladder cannot be read or is invalid.
    pub async fn assemble(
        stores: StorePorts,
        settings: &EngineSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let levels = Arc::new(LevelResolver::load(stores.levels.clone()).await?);
        let realtime = BroadcastRealtimeHub::with_capacity(settings.realtime_channel_capacity());
        let (queue, receiver) = TokioEffectQueue::channel(settings.effect_queue_capacity());

        let subscribers = SubscriberRegistry::new()
            .register(Arc::new(RealtimeNotifier::new(Arc::new(realtime.clone()))))
            .register(Arc::new(AuditLogger::new(
                stores.audit.clone(),
                settings.audit_retry_policy(),
            )))
            .register(Arc::new(QueuedEffects::new(
                Arc::new(queue),
                settings.answer_verified_xp(),
            )));
        let pipeline = Arc::new(AchievementPipeline::new(
            stores.achievements.clone(),
            EventFanOut::new(subscribers),
            clock.clone(),
        ));

        let ledger = Arc::new(
            XpLedger::new(
                stores.progress.clone(),
                levels.clone(),
                pipeline.clone(),
                clock.clone(),
            )
            .with_max_attempts(settings.grant_max_attempts()),
        );
        let badges = Arc::new(BadgeRegistry::new(
            stores.badges.clone(),
            pipeline.clone(),
            clock.clone(),
        ));
        let tracker = Arc::new(TaskTracker::new(
            stores.tasks.clone(),
            pipeline.clone(),
            clock.clone(),
        ));
        let service = Arc::new(ProgressionService::new(
            ledger.clone(),
            badges,
            tracker.clone(),
            pipeline,
            levels.clone(),
        ));
        let reset_jobs = Arc::new(
            ResetJobs::new(tracker, stores.progress, stores.job_leases, clock)
                .with_active_user_days(settings.active_user_days()),
        );
        let worker = EffectWorker::new(
            Arc::new(ChainedXpEffects::new(ledger.clone())),
            settings.effect_retry_policy(),
        );

        Ok(Self {
            service,
            ledger,
            levels,
            reset_jobs,
            realtime,
            effects: Some((worker, receiver)),
        })
    }

    /// Start the effect worker on the current runtime.
    ///
    /// Returns `None` once the worker has already been started.
    pub fn spawn_effect_worker(&mut self) -> Option<JoinHandle<()>> {
        self.effects
            .take()
            .map(|(worker, receiver)| worker.spawn(receiver))
    }
}
