use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use refuge_api::middleware::require_auth;
use refuge_api::{AppState, AppStateInner, admin, auth, members};
use refuge_auth::{AuthConfig, LogNotifier, Notifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refuge=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("REFUGE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("REFUGE_DB_PATH").unwrap_or_else(|_| "refuge.db".into());
    let host = std::env::var("REFUGE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("REFUGE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let public_url =
        std::env::var("REFUGE_PUBLIC_URL").unwrap_or_else(|_| "http://localhost:3000".into());

    // Init database
    let db = Arc::new(refuge_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let config = AuthConfig {
        jwt_secret,
        ..AuthConfig::default()
    };
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new(&public_url));
    let state: AppState = Arc::new(AppStateInner::new(db, notifier, config));

    // Routes
    let public_routes = Router::new()
        .route("/auth/magic-link", post(auth::request_magic_link))
        .route("/auth/verify-magic-link", post(auth::verify_magic_link))
        .route("/auth/refresh", post(auth::refresh_tokens))
        .route("/auth/anonymous", post(auth::create_anonymous_account))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route(
            "/auth/me",
            get(auth::get_profile)
                .put(auth::update_profile)
                .delete(auth::delete_own_account),
        )
        .route("/members", get(members::directory))
        .route("/admin/users", post(admin::create_user))
        .route("/admin/users/{user_id}", delete(admin::delete_user))
        .route("/admin/users/{user_id}/anonymize", post(admin::anonymize_user))
        .route(
            "/admin/users/{user_id}/assignments",
            post(admin::create_assignment),
        )
        .route(
            "/admin/users/{user_id}/privacy-report",
            get(admin::privacy_report),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Refuge server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
