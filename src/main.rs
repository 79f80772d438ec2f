use std::{process, sync::Arc, time::Duration};

use tokio::{signal, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        accounts::AccountService,
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        groups::GroupService,
        messages::MessageService,
        posts::PostService,
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, HealthRepo, MessagesRepo, PostsRepo,
            PostsWriteRepo, SessionsRepo, UsersRepo,
        },
    },
    cache::{CacheConfig, PageCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::UploadStorage,
    },
};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

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
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    let purge_handle = spawn_session_purge(app.accounts.clone());
    let result = serve_http(&settings, app.http_state).await;

    purge_handle.abort();
    let _ = purge_handle.await;

    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let database_url = database_url(&settings)?;
    let pool = PostgresRepositories::connect(database_url, 1)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    info!(target = "yatube::migrate", "Migrations applied");
    Ok(())
}

fn database_url(settings: &config::Settings) -> Result<&str, AppError> {
    settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| AppError::from(InfraError::configuration("database url is not configured")))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = database_url(settings)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

struct ApplicationContext {
    http_state: HttpState,
    accounts: Arc<AccountService>,
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let messages_repo: Arc<dyn MessagesRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let upload_storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );
    let cache = Arc::new(PageCache::new(&CacheConfig::from(&settings.cache)));

    let feed = Arc::new(FeedService::new(
        users_repo.clone(),
        groups_repo.clone(),
        posts_repo.clone(),
        comments_repo.clone(),
        follows_repo.clone(),
    ));
    let posts = Arc::new(PostService::new(
        users_repo.clone(),
        groups_repo.clone(),
        posts_repo,
        posts_write_repo,
        comments_repo,
        upload_storage.clone(),
        cache.clone(),
    ));
    let groups = Arc::new(GroupService::new(groups_repo));
    let follows = Arc::new(FollowService::new(users_repo.clone(), follows_repo.clone()));
    let messages = Arc::new(MessageService::new(
        users_repo.clone(),
        messages_repo,
        follows_repo,
    ));
    let accounts = Arc::new(AccountService::new(
        users_repo,
        sessions_repo,
        settings.auth.session_ttl,
    ));

    let upload_limit_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds usize"))?;

    let http_state = HttpState {
        feed,
        posts,
        groups,
        follows,
        messages,
        accounts: accounts.clone(),
        cache,
        upload_storage,
        health: health_repo,
        upload_limit_bytes,
        cookie_secure: settings.auth.cookie_secure,
    };

    Ok(ApplicationContext {
        http_state,
        accounts,
    })
}

fn spawn_session_purge(accounts: Arc<AccountService>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match accounts.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(removed) => {
                    info!(target = "yatube::sessions", removed, "Purged expired sessions")
                }
                Err(err) => {
                    warn!(target = "yatube::sessions", error = %err, "Session purge failed")
                }
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "yatube::http",
        addr = %settings.server.public_addr,
        "Listening"
    );

    let grace = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(grace))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

/// Resolves on Ctrl-C or SIGTERM and arms a hard exit after `grace`.
async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(
        target = "yatube::http",
        grace_seconds = grace.as_secs(),
        "Shutdown requested"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(target = "yatube::http", "Graceful shutdown timed out");
        process::exit(1);
    });
}
