use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::invite::options::InviteSettings;

/// FOYER invitation gateway server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "foyer-server", version, about = "FOYER invitation gateway server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "FOYER_PORT", default_value = "4280")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "FOYER_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./foyer.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "FOYER_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long, env = "FOYER_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Public base URL of this deployment, used in activation URLs
    #[arg(long, env = "FOYER_BASE_URL", default_value = "http://localhost:4280")]
    pub base_url: String,

    /// Role assigned to freshly signed-up accounts
    #[arg(long, env = "FOYER_DEFAULT_ROLE", default_value = "member")]
    pub default_role: String,

    /// Email that receives the admin role on sign-up (bootstrap)
    #[arg(long, env = "FOYER_BOOTSTRAP_ADMIN_EMAIL")]
    pub bootstrap_admin_email: Option<String>,

    /// Invite engine defaults (loaded from [invites] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub invites: Option<InviteSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4280,
            bind_address: "0.0.0.0".to_string(),
            config: "./foyer.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            base_url: "http://localhost:4280".to_string(),
            default_role: "member".to_string(),
            bootstrap_admin_email: None,
            invites: Some(InviteSettings::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (FOYER_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("FOYER_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# FOYER Invitation Gateway Configuration
# Place this file at ./foyer.toml or specify with --config <path>
# All settings can be overridden via environment variables (FOYER_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 4280)
# port = 4280

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for SQLite database and signing key
# data_dir = "./data"

# Public base URL used when building activation links
# base_url = "http://localhost:4280"

# Role assigned to freshly signed-up accounts
# default_role = "member"

# Email that receives the admin role on sign-up (first-boot bootstrap)
# bootstrap_admin_email = ""

# ---- Invite Engine ----
# [invites]

# Default token shape: "token" (32-char), "code" (6-char, human-typable)
# or "custom" (requires an embedded generator)
# token_type = "token"

# Default use limit. Omit to fall back to the email rule:
# private invites default to 1 use, public invites to unlimited.
# max_uses = 1

# Default invitation lifetime in seconds (default: 172800 = 48 hours)
# expires_in_secs = 172800

# Where a redeemer lands after a successful role upgrade
# redirect_after_upgrade = "/"

# Whether success responses expose the creator's name
# share_inviter_name = false

# What the create response carries for public invites:
# "confirmation", "token", or "url"
# sender_response = "url"

# Which page a public activation URL targets: "sign-up" or "sign-in"
# sender_response_redirect = "sign-up"

# Pending-redemption cookie (bridges activation across sign-in/sign-up)
# cookie_name = "foyer_pending_invite"
# cookie_max_age_secs = 600

# Paths an anonymous redeemer is sent to for authentication
# sign_up_path = "/sign-up"
# sign_in_path = "/sign-in"

# How private-invite emails are delivered by this binary:
# "off" (private invites refused) or "log" (written to the server log;
# real transports are wired by embedding code)
# email_delivery = "off"

# Remap the invite tables/columns to coexist with an existing schema
# [invites.schema]
# invite_table = "invites"
# use_table = "invite_uses"
"#
    .to_string()
}
