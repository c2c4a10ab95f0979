//! Chatter Server Library
//!
//! Chat backend: session auth, group membership via time-boxed invite
//! codes, strategy-routed messaging, quick messages and file uploads.

pub mod auth;
pub mod config;
pub mod ctx;
pub mod error;
pub mod files;
pub mod groups;
pub mod messages;
pub mod quick;
pub mod response;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use auth::middleware::mw_require_auth;
use auth::AuthManager;
use config::{AppState, ServerConfig};
use files::FileManager;
use groups::GroupManager;
use messages::MessageManager;
use quick::QuickMessageManager;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::handlers::register))
        .route("/auth/login", post(auth::handlers::login))
        .route("/health", get(health_check));

    let protected = Router::new()
        // Auth
        .route("/auth/logout", post(auth::handlers::logout))
        .route("/auth/me", get(auth::handlers::me))
        .route("/users", get(auth::handlers::list_users))
        // Groups & invites
        .route(
            "/groups",
            get(groups::handlers::list_groups).post(groups::handlers::create_group),
        )
        .route("/groups/join", post(groups::handlers::join_group))
        .route(
            "/groups/{group_id}/invite",
            post(groups::handlers::generate_invite).delete(groups::handlers::revoke_invite),
        )
        .route("/groups/{group_id}/leave", post(groups::handlers::leave_group))
        .route(
            "/groups/{group_id}/promote",
            post(groups::handlers::promote_member),
        )
        .route(
            "/groups/{group_id}/members",
            get(groups::handlers::list_members),
        )
        .route(
            "/groups/{group_id}/messages",
            get(messages::handlers::group_messages),
        )
        // Messaging
        .route("/messages", post(messages::handlers::send_message))
        .route("/messages/read", post(messages::handlers::mark_read))
        .route(
            "/conversations",
            get(messages::handlers::list_conversations),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(messages::handlers::conversation_messages),
        )
        // Quick messages
        .route(
            "/quick-messages",
            get(quick::handlers::list).post(quick::handlers::create),
        )
        .route(
            "/quick-messages/{key}",
            put(quick::handlers::update).delete(quick::handlers::delete),
        )
        // Files
        .route(
            "/files",
            get(files::handlers::list_files).post(files::handlers::upload_file),
        )
        .route("/files/{file_id}", get(files::handlers::download_file))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            mw_require_auth,
        ));

    public
        .merge(protected)
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }

    info!("=== Chatter Server ===");
    info!("Features: Auth | Groups & Invites | Messaging | Quick Messages | Files");

    // Get CHATTER_ROOT from environment or default
    let root = std::env::var("CHATTER_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("chatter_data"));

    let config = ServerConfig::with_base_dir(&root);
    config.ensure_dirs().await?;

    info!("Data directory: {:?}", config.base_dir);
    info!("Database: {:?}", config.db_path());

    let auth = Arc::new(AuthManager::new(config.db_path()).await?);
    let groups = Arc::new(GroupManager::new(config.db_path(), config.invite_ttl_hours).await?);
    let messages = Arc::new(MessageManager::new(config.db_path()).await?);
    let quick = Arc::new(QuickMessageManager::new(config.db_path()).await?);
    let files = Arc::new(FileManager::new(config.db_path(), config.upload_dir.clone()).await?);

    let state = AppState {
        config: config.clone(),
        auth,
        groups,
        messages,
        quick,
        files,
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK - Chatter Server"
}
