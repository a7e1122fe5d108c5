use std::{env, io::Write, time::Duration};

use log::*;
use marketplace_engine::{helpers::RetryPolicy, PricingPolicy};
use mkt_common::{parse_boolean_flag, Secret};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use stripe_tools::{StripeConfig, DEFAULT_SIGNATURE_TOLERANCE_SECS};
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8360;
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub auth: AuthConfig,
    /// The storefront's public base URL. Buyers are sent back here after paying.
    pub public_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    pub pricing: PricingPolicy,
    pub stripe: StripeConfig,
    /// Applied to payment provider lookups during reconciliation
    pub provider_retry: RetryPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auth: AuthConfig::default(),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            pricing: PricingPolicy::default(),
            stripe: StripeConfig::default(),
            provider_retry: RetryPolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            let url = marketplace_engine::sqlite::db::db_url();
            warn!("🪛️ MKT_DATABASE_URL is not set. Using {url}");
            url
        });
        let max_connections = env::var("MKT_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let public_url = env::var("MKT_PUBLIC_URL").ok().filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
            info!("🪛️ MKT_PUBLIC_URL is not set. Buyers will be sent back to {DEFAULT_PUBLIC_URL}");
            DEFAULT_PUBLIC_URL.to_string()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("MKT_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("MKT_USE_FORWARDED").ok(), false);
        let pricing = PricingPolicy::from_env_or_default();
        let stripe = StripeConfig::new_from_env_or_default();
        let provider_retry = configure_retry_policy();
        Self {
            host,
            port,
            database_url,
            max_connections,
            auth,
            public_url,
            use_x_forwarded_for,
            use_forwarded,
            pricing,
            stripe,
            provider_retry,
        }
    }
}

fn configure_retry_policy() -> RetryPolicy {
    let default = RetryPolicy::default();
    let max_attempts = env::var("MKT_STRIPE_RETRY_ATTEMPTS")
        .ok()
        .and_then(|s| s.parse::<usize>().map_err(|e| warn!("🪛️ Invalid MKT_STRIPE_RETRY_ATTEMPTS. {e}")).ok())
        .unwrap_or(default.max_attempts);
    let base_delay = env::var("MKT_STRIPE_RETRY_BASE_DELAY_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid MKT_STRIPE_RETRY_BASE_DELAY_MS. {e}")).ok())
        .map(Duration::from_millis)
        .unwrap_or(default.base_delay);
    let multiplier = env::var("MKT_STRIPE_RETRY_MULTIPLIER")
        .ok()
        .and_then(|s| s.parse::<f32>().map_err(|e| warn!("🪛️ Invalid MKT_STRIPE_RETRY_MULTIPLIER. {e}")).ok())
        .filter(|m| *m >= 1.0)
        .unwrap_or(default.multiplier);
    debug!("🪛️ Provider retry policy: {max_attempts} attempts, {}ms base delay, x{multiplier}", base_delay.as_millis());
    RetryPolicy::new(max_attempts, base_delay, multiplier)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC secret that access tokens are signed with (HS256)
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this since every issued token becomes invalid on restart. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                         you are doing it wrong! Set the MKT_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret.");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self { jwt_secret: Secret::new(secret.into()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret = env::var("MKT_JWT_SECRET")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [MKT_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "MKT_JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }
        Ok(Self::new(secret))
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

//-------------------------------------------------  WebhookOptions  ---------------------------------------------------
/// What the Stripe webhook handler needs to authenticate deliveries.
#[derive(Clone, Debug)]
pub struct WebhookOptions {
    pub signing_secret: Secret<String>,
    /// Deliveries signed more than this many seconds away from the server clock are rejected
    pub tolerance_secs: i64,
}

impl WebhookOptions {
    pub fn new<S: Into<String>>(signing_secret: S) -> Self {
        Self { signing_secret: Secret::new(signing_secret.into()), tolerance_secs: DEFAULT_SIGNATURE_TOLERANCE_SECS }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self { signing_secret: config.stripe.webhook_secret.clone(), tolerance_secs: DEFAULT_SIGNATURE_TOLERANCE_SECS }
    }
}
