use std::{process, sync::Arc};

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use portal::{
    application::{
        characters::CharacterQueryService,
        error::AppError,
        jobs::{SyncCharactersContext, process_sync_characters_job},
        repos::{CharactersRepo, CharactersWriteRepo},
        seed::SeedService,
        sync::{CharacterSyncService, SyncOutcome},
    },
    cache::{CacheConfig, CacheStore, DisabledCacheStore},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        upstream::GraphQlCharacterSource,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Sync(_) => run_sync_once(settings).await,
        config::Command::Seed(_) => run_seed(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache = CacheConfig::from(&settings.cache).build_store().await;

    let monitor_handle = if settings.sync.enabled {
        let sync = build_sync_service(&settings, &repositories, &cache)?;
        Some(spawn_sync_monitor(sync, &settings.sync))
    } else {
        info!(target = "portal::sync", "Scheduled sync disabled by configuration");
        None
    };

    let characters_repo: Arc<dyn CharactersRepo> = repositories.clone();
    let characters = Arc::new(CharacterQueryService::new(characters_repo, cache.clone()));
    let http_state = HttpState {
        schema: http::build_schema(characters),
        db: repositories,
        cache,
    };

    let result = serve_http(&settings, http_state).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_sync_once(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache: Arc<dyn CacheStore> = if settings.sync.invalidate_cache {
        CacheConfig::from(&settings.cache).build_store().await
    } else {
        Arc::new(DisabledCacheStore)
    };
    let sync = build_sync_service(&settings, &repositories, &cache)?;

    match sync.run().await? {
        SyncOutcome::Completed(summary) => {
            info!(
                target = "portal::sync",
                records = summary.records,
                pages = summary.pages,
                "Sync completed"
            );
        }
        SyncOutcome::Skipped => {
            warn!(target = "portal::sync", "Sync skipped");
        }
    }
    Ok(())
}

async fn run_seed(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let writer: Arc<dyn CharactersWriteRepo> = repositories;
    let summary = SeedService::new(writer).seed().await?;
    info!(
        target = "portal::seed",
        origins = summary.origins,
        characters = summary.characters,
        "Seed completed"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_sync_service(
    settings: &config::Settings,
    repositories: &Arc<PostgresRepositories>,
    cache: &Arc<dyn CacheStore>,
) -> Result<Arc<CharacterSyncService>, AppError> {
    let source = GraphQlCharacterSource::new(
        settings.sync.endpoint.clone(),
        settings.sync.request_timeout,
    )?;
    let writer: Arc<dyn CharactersWriteRepo> = repositories.clone();

    let mut sync = CharacterSyncService::new(Arc::new(source), writer);
    if settings.sync.invalidate_cache {
        sync = sync.with_cache_invalidation(cache.clone());
    }
    Ok(Arc::new(sync))
}

fn spawn_sync_monitor(
    sync: Arc<CharacterSyncService>,
    settings: &config::SyncSettings,
) -> tokio::task::JoinHandle<()> {
    let worker = WorkerBuilder::new("sync-characters-worker")
        .data(SyncCharactersContext { sync })
        .backend(CronStream::new(settings.schedule.clone()))
        .build_fn(process_sync_characters_job);

    let monitor = Monitor::new().register(worker);

    info!(
        target = "portal::sync",
        endpoint = %settings.endpoint,
        "Scheduled sync worker started"
    );

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "portal::http",
        addr = %settings.server.addr,
        "Listening for GraphQL requests"
    );

    let signalled = Arc::new(Notify::new());
    let shutdown = {
        let signalled = signalled.clone();
        async move {
            shutdown_signal().await;
            signalled.notify_one();
        }
    };

    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(shutdown);
    let mut server = tokio::spawn(async move { server.await });
    let grace = settings.server.graceful_shutdown;

    tokio::select! {
        joined = &mut server => {
            joined
                .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
                .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            info!(target = "portal::http", "Server stopped");
        }
        () = async {
            signalled.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "portal::http",
                grace_seconds = grace.as_secs(),
                "Graceful shutdown window elapsed, aborting in-flight requests"
            );
            server.abort();
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!(target = "portal::http", "Received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            info!(target = "portal::http", "Received SIGTERM, starting graceful shutdown");
        }
    }
}
