use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        groups::{GroupService, NewGroup},
        identity::IdentityProvider,
        posts::{ImageStore, PostService},
        repos::{
            CommentsRepo, FollowsRepo, GroupsRepo, GroupsWriteRepo, PostsRepo, PostsWriteRepo,
            UsersRepo, UsersWriteRepo,
        },
        users::UserService,
    },
    cache::{CacheConfig, CacheState, INDEX_PAGE_PREFIX},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        identity::HeaderIdentityProvider,
        memory::MemoryRepositories,
        telemetry,
        uploads::UploadStorage,
    },
};

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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Groups(args) => run_groups(settings, args).await,
        config::Command::Users(args) => run_users(settings, args).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let http_state = build_http_state(&repositories, &settings)?;
    serve_http(&settings, http_state).await
}

async fn run_groups(settings: config::Settings, args: config::GroupsArgs) -> Result<(), AppError> {
    let repositories = Repositories::postgres(connect_postgres(&settings).await?);
    let groups = GroupService::new(repositories.groups, repositories.groups_write);

    match args.command {
        config::GroupsCommand::Create(create) => {
            let group = groups
                .create_group(NewGroup {
                    title: create.title,
                    slug: create.slug,
                    description: create.description,
                })
                .await?;
            info!(
                target = "yatube::cli::groups",
                id = group.id,
                slug = %group.slug,
                "group created"
            );
        }
        config::GroupsCommand::Delete(delete) => {
            let group = groups.delete_group(&delete.slug).await?;
            info!(
                target = "yatube::cli::groups",
                id = group.id,
                slug = %group.slug,
                "group deleted; its posts no longer belong to a group"
            );
        }
    }

    Ok(())
}

async fn run_users(settings: config::Settings, args: config::UsersArgs) -> Result<(), AppError> {
    let repositories = Repositories::postgres(connect_postgres(&settings).await?);
    let users = UserService::new(repositories.users_write);

    match args.command {
        config::UsersCommand::Create(create) => {
            let user = users.create_user(&create.username).await?;
            info!(
                target = "yatube::cli::users",
                id = user.id,
                username = %user.username,
                "user created"
            );
        }
    }

    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    connect_postgres(&settings).await?;
    info!(target = "yatube::cli::migrate", "migrations applied");
    Ok(())
}

/// Trait-object handles over one storage backend.
#[derive(Clone)]
struct Repositories {
    users: Arc<dyn UsersRepo>,
    users_write: Arc<dyn UsersWriteRepo>,
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    groups_write: Arc<dyn GroupsWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl Repositories {
    fn postgres(repositories: Arc<PostgresRepositories>) -> Self {
        Self {
            users: repositories.clone(),
            users_write: repositories.clone(),
            posts: repositories.clone(),
            posts_write: repositories.clone(),
            groups: repositories.clone(),
            groups_write: repositories.clone(),
            comments: repositories.clone(),
            follows: repositories,
        }
    }

    fn memory(repositories: Arc<MemoryRepositories>) -> Self {
        Self {
            users: repositories.clone(),
            users_write: repositories.clone(),
            posts: repositories.clone(),
            posts_write: repositories.clone(),
            groups: repositories.clone(),
            groups_write: repositories.clone(),
            comments: repositories.clone(),
            follows: repositories,
        }
    }
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    match settings.database.backend {
        config::DatabaseBackend::Postgres => {
            Ok(Repositories::postgres(connect_postgres(settings).await?))
        }
        config::DatabaseBackend::Memory => {
            warn!(
                target = "yatube::bootstrap",
                "using the in-memory backend; data is lost on shutdown"
            );
            Ok(Repositories::memory(Arc::new(MemoryRepositories::new())))
        }
    }
}

/// Connect to postgres and bring the schema up to date.
async fn connect_postgres(
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
        .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: &Repositories,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let upload_storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );
    let image_store: Arc<dyn ImageStore> = upload_storage.clone();
    let max_image_bytes = settings.uploads.max_image_bytes.get();

    let feed = Arc::new(FeedService::new(
        repositories.posts.clone(),
        repositories.groups.clone(),
        repositories.users.clone(),
        repositories.follows.clone(),
        repositories.comments.clone(),
        settings.feed.page_size,
    ));
    let posts = Arc::new(PostService::new(
        repositories.posts.clone(),
        repositories.posts_write.clone(),
        repositories.groups.clone(),
        repositories.comments.clone(),
        image_store,
        max_image_bytes,
    ));
    let follows = Arc::new(FollowService::new(
        repositories.users.clone(),
        repositories.follows.clone(),
    ));
    let identity: Arc<dyn IdentityProvider> = Arc::new(HeaderIdentityProvider::new(
        settings.identity.user_header.clone(),
        repositories.users.clone(),
    ));

    let cache_config = CacheConfig::from(&settings.cache);
    let cache = cache_config
        .is_enabled()
        .then(|| CacheState::new(cache_config, INDEX_PAGE_PREFIX));

    Ok(HttpState {
        feed,
        posts,
        follows,
        identity,
        upload_storage,
        login_url: settings.identity.login_url.clone(),
        max_image_bytes,
        cache,
    })
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "yatube::bootstrap",
        addr = %settings.server.addr,
        "listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(&mut stop_rx, grace) => {
            warn!(
                target = "yatube::bootstrap",
                grace_seconds = grace.as_secs(),
                "in-flight requests did not finish before the shutdown deadline"
            );
        }
    }

    info!(target = "yatube::bootstrap", "server stopped");
    Ok(())
}

/// Resolves `grace` after the shutdown signal fired.
async fn drain_deadline(stop: &mut watch::Receiver<bool>, grace: Duration) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "yatube::bootstrap", error = %err, "failed to listen for ctrl-c");
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
                error!(target = "yatube::bootstrap", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!(target = "yatube::bootstrap", "shutdown signal received");
}
