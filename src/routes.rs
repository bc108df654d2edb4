use axum::{middleware, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::auth::accounts;
use crate::auth::middleware::JwtSecret;
use crate::invite::{create as invite_create, manage as invite_manage, redeem as invite_redeem};
use crate::state::AppState;

/// Inject the signing secret into request extensions so the Claims
/// extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut().insert(JwtSecret(state.secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 5 requests per minute per IP on auth endpoints.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>.
    let auth_governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5)
            .finish()
            .expect("Failed to build governor config"),
    );
    let auth_limiter = auth_governor_config.limiter().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            auth_limiter.retain_recent();
        }
    });

    let auth_routes = Router::new()
        .route("/api/auth/signup", axum::routing::post(accounts::sign_up))
        .route("/api/auth/signin", axum::routing::post(accounts::sign_in))
        .layer(GovernorLayer {
            config: auth_governor_config,
        });

    // Activation is rate-limited too: 6-char codes are brute-forceable, so
    // guessing attempts are throttled per IP. 10 per minute.
    let activation_governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(6) // 1 token every 6 seconds = 10 per minute
            .burst_size(10)
            .finish()
            .expect("Failed to build activation governor config"),
    );
    let activation_limiter = activation_governor_config.limiter().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            activation_limiter.retain_recent();
        }
    });

    let activation_routes = Router::new()
        .route(
            "/api/invites/activate",
            axum::routing::post(invite_redeem::activate_invite),
        )
        .route(
            "/api/invites/activate/{token}",
            axum::routing::get(invite_redeem::activate_invite_callback),
        )
        .layer(GovernorLayer {
            config: activation_governor_config,
        });

    // Invite management (JWT required — Claims extractor validates token)
    let invite_routes = Router::new()
        .route("/api/invites", axum::routing::post(invite_create::create_invite))
        .route("/api/invites", axum::routing::get(invite_manage::list_invites))
        .route(
            "/api/invites/cancel",
            axum::routing::post(invite_manage::cancel_invite),
        )
        .route(
            "/api/invites/reject",
            axum::routing::post(invite_manage::reject_invite),
        );

    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(activation_routes)
        .merge(invite_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
