mod auth;
mod config;
mod db;
mod invite;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use invite::options::{EmailDelivery, InviteConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "foyer_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "foyer_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("FOYER server v{} starting", env!("CARGO_PKG_VERSION"));

    let invite_settings = config.invites.clone().unwrap_or_default();
    let email_delivery = invite_settings.email_delivery;

    // Initialize SQLite database (invite tables templated from the schema)
    let db = db::init_db(&config.data_dir, &invite_settings.schema)?;

    // Load or generate signing key (256-bit random, stored in data_dir)
    let secret = auth::jwt::load_or_generate_secret(&config.data_dir)?;

    // Resolve invite engine options once; embedding code would wire real
    // delivery/policies/hooks here.
    let mut invites = InviteConfig::resolve(invite_settings, config.base_url.clone());
    if email_delivery == EmailDelivery::Log {
        invites.send_invitation = Some(Arc::new(|email| {
            Box::pin(async move {
                tracing::info!(
                    to = %email.email,
                    role = %email.role,
                    url = %email.url,
                    new_account = email.new_account,
                    "invitation email (log delivery)"
                );
                Ok(())
            })
        }));
    }

    let state = state::AppState {
        db,
        secret,
        invites: Arc::new(invites),
        default_role: config.default_role.clone(),
        bootstrap_admin_email: config.bootstrap_admin_email.clone(),
    };

    let app = routes::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
