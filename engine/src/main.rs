//! Engine entry-point: loads settings, wires the store, starts the effect
//! worker and reset scheduler, then serves the REST API.

use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig as _;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use engine::ApiDoc;
use engine::domain::ports::{ProgressionCommand, ProgressionQuery};
use engine::inbound::http::health::{HealthState, live, ready};
use engine::inbound::http::progression;
use engine::inbound::http::state::HttpState;
use engine::inbound::scheduler::{ResetSchedule, ResetScheduler};
use engine::outbound::memory::InMemoryProgressionStore;
use engine::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};
use engine::seed::{Catalogue, CatalogueSeeder};
use engine::settings::EngineSettings;
use engine::wiring::{EngineComponents, StorePorts};

fn other(context: &str, err: impl std::fmt::Display) -> io::Error {
    io::Error::other(format!("{context}: {err}"))
}

async fn connect_store(settings: &EngineSettings) -> io::Result<StorePorts> {
    let Some(database_url) = settings.database_url.clone() else {
        warn!("no database configured; progression state is kept in memory");
        return Ok(StorePorts::in_memory(&Arc::new(InMemoryProgressionStore::new())));
    };

    let migration_url = database_url.clone();
    let applied = tokio::task::spawn_blocking(move || run_pending_migrations(&migration_url))
        .await
        .map_err(|err| other("migration task", err))?
        .map_err(|err| other("run migrations", err))?;
    info!(applied, "database migrations applied");

    let mut config = PoolConfig::new(database_url);
    if let Some(max) = settings.database_max_connections {
        config = config.with_max_size(max);
    }
    let pool = DbPool::new(config)
        .await
        .map_err(|err| other("create database pool", err))?;
    Ok(StorePorts::postgres(&pool))
}

async fn seed_catalogue(settings: &EngineSettings, stores: &StorePorts) -> io::Result<()> {
    let Some(path) = settings.catalogue_path.as_deref() else {
        return Ok(());
    };
    let catalogue = Catalogue::load(path).map_err(|err| other("load catalogue", err))?;
    let report = CatalogueSeeder::new(
        stores.levels.clone(),
        stores.badges.clone(),
        stores.tasks.clone(),
    )
    .apply(&catalogue)
    .await
    .map_err(|err| other("seed catalogue", err))?;
    info!(
        levels = report.levels,
        badges = report.badges,
        tasks = report.tasks,
        "catalogue seeded"
    );
    Ok(())
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = EngineSettings::load_from_iter(std::env::args_os())
        .map_err(|err| other("load settings", err))?;
    let bind_addr = settings
        .bind_addr()
        .map_err(|err| other("bind address", err))?;
    let schedule =
        ResetSchedule::from_settings(&settings).map_err(|err| other("reset schedule", err))?;

    let stores = connect_store(&settings).await?;
    seed_catalogue(&settings, &stores).await?;

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let mut engine = EngineComponents::assemble(stores, &settings, clock.clone())
        .await
        .map_err(|err| other("assemble engine", err))?;
    let worker = engine.spawn_effect_worker();
    let scheduler = if settings.disable_scheduler {
        info!("in-process reset scheduler disabled");
        None
    } else {
        Some(ResetScheduler::new(engine.reset_jobs.clone(), schedule, clock).spawn())
    };

    let command: Arc<dyn ProgressionCommand> = engine.service.clone();
    let query: Arc<dyn ProgressionQuery> = engine.service.clone();
    let http_state = web::Data::new(HttpState::new(command, query));
    let health_state = web::Data::new(HealthState::new());
    let server_health_state = health_state.clone();

    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(http_state.clone())
            .app_data(server_health_state.clone())
            .service(web::scope("/api/v1").configure(progression::configure))
            .service(ready)
            .service(live);
        #[cfg(debug_assertions)]
        let app =
            app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
        app
    })
    .bind(bind_addr)?
    .run();

    health_state.mark_ready();
    info!(%bind_addr, "engine listening");
    let result = server.await;

    health_state.mark_unhealthy();
    for task in scheduler.into_iter().chain(worker) {
        task.abort();
    }
    result
}
