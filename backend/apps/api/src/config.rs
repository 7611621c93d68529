//! Server configuration loaded from the environment

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use learning::LearningConfig;
use platform::cache::CacheConfig;
use platform::mail::MailConfig;
use platform::messaging::BrokerConfig;
use platform::token::TokenConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_FRONTEND_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

/// Write/read database URLs; `None` means in-memory stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseUrls {
    pub write: String,
    pub read: String,
}

impl DatabaseUrls {
    /// One database serves both sides
    pub fn is_shared(&self) -> bool {
        self.write == self.read
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: Option<DatabaseUrls>,
    pub tokens: TokenConfig,
    pub broker: BrokerConfig,
    pub mail: MailConfig,
    pub cache: CacheConfig,
    pub learning: LearningConfig,
    pub bind_addr: SocketAddr,
    pub frontend_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Build from any key lookup; release builds refuse to start without JWT keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let env = Env(&lookup);

        let database = match (env.get("WRITE_DATABASE_URL"), env.get("READ_DATABASE_URL")) {
            (Some(write), Some(read)) => Some(DatabaseUrls { write, read }),
            (Some(write), None) => Some(DatabaseUrls {
                read: write.clone(),
                write,
            }),
            (None, Some(_)) => bail!("READ_DATABASE_URL is set but WRITE_DATABASE_URL is not"),
            (None, None) => None,
        };

        let app_base_url = env.or("APP_BASE_URL", "http://localhost:8080");

        let mail_defaults = MailConfig::default();
        let mail = MailConfig {
            smtp_host: env.or("SMTP_HOST", ""),
            smtp_port: env.parse("SMTP_PORT", mail_defaults.smtp_port)?,
            use_tls: env.parse("SMTP_USE_TLS", mail_defaults.use_tls)?,
            from_email: env.or("SMTP_FROM_EMAIL", ""),
            from_password: env.or("SMTP_FROM_PASSWORD", ""),
            from_name: env.or("SMTP_FROM_NAME", &mail_defaults.from_name),
            base_url: app_base_url.clone(),
        };

        let broker_defaults = BrokerConfig::default();
        let broker = BrokerConfig {
            enabled: env.parse("KAFKA_ENABLED", false)?,
            bootstrap_servers: env.or("KAFKA_BOOTSTRAP_SERVERS", &broker_defaults.bootstrap_servers),
            client_id: env.or("KAFKA_CLIENT_ID", &broker_defaults.client_id),
            group_id: env.or("KAFKA_GROUP_ID", &broker_defaults.group_id),
        };

        let cache = CacheConfig {
            max_capacity: env.parse("CACHE_MAX_CAPACITY", CacheConfig::default().max_capacity)?,
            ..CacheConfig::default()
        };

        let bind_addr = env
            .or("BIND_ADDR", DEFAULT_BIND_ADDR)
            .parse()
            .context("BIND_ADDR is not a socket address")?;

        let frontend_origins = env
            .or("FRONTEND_ORIGINS", DEFAULT_FRONTEND_ORIGINS)
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let learning_defaults = if cfg!(debug_assertions) {
            LearningConfig::development()
        } else {
            LearningConfig::default()
        };
        let learning = LearningConfig {
            app_base_url,
            ..learning_defaults
        };

        Ok(Self {
            database,
            tokens: token_config(&env)?,
            broker,
            mail,
            cache,
            learning,
            bind_addr,
            frontend_origins,
        })
    }
}

fn token_config(env: &Env<'_>) -> anyhow::Result<TokenConfig> {
    let keys = (
        env.get("JWT_ACCESS_KEY"),
        env.get("JWT_REFRESH_KEY"),
        env.get("JWT_CONFIRM_EMAIL_KEY"),
    );

    let mut config = match keys {
        (Some(access), Some(refresh), Some(confirm)) => {
            let mut config = TokenConfig::default();
            config.access.secret = access.into_bytes();
            config.refresh.secret = refresh.into_bytes();
            config.confirm_email.secret = confirm.into_bytes();
            config
        }
        _ if cfg!(debug_assertions) => {
            tracing::warn!("JWT keys not set, using development keys");
            TokenConfig::development()
        }
        _ => bail!("JWT_ACCESS_KEY, JWT_REFRESH_KEY and JWT_CONFIRM_EMAIL_KEY must be set in production"),
    };

    config.access.lifetime = lifetime(env, "JWT_ACCESS_EXPIRES_MINUTES", 60, 60)?;
    config.refresh.lifetime = lifetime(env, "JWT_REFRESH_EXPIRES_DAYS", 7, 24 * 3600)?;
    config.confirm_email.lifetime = lifetime(env, "JWT_CONFIRM_EMAIL_EXPIRES_MINUTES", 60, 60)?;

    if let Some(issuer) = env.get("JWT_ISSUER") {
        config.issuer = issuer;
    }
    if let Some(audience) = env.get("JWT_AUDIENCE") {
        config.audience = audience;
    }

    Ok(config)
}

/// `key` counted in units of `unit_secs` seconds
fn lifetime(env: &Env<'_>, key: &str, default: u64, unit_secs: u64) -> anyhow::Result<Duration> {
    let count: u64 = env.parse(key, default)?;
    match count.checked_mul(unit_secs) {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => bail!("{key} is too large: {count}"),
    }
}

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("{key} has an invalid value: {raw}")),
            None => Ok(default),
        }
    }
}
