use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    #[serde(default)]
    pub entitlement: EntitlementConfig,
    #[serde(default)]
    pub bypass: BypassConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty list allows any origin (local development only).
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

/// Identity provider settings. Tokens are HS256-signed with the client secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub publishable_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: i64,
}

/// What the entitlement gate answers when the user lookup fails or times out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageErrorPolicy {
    /// Treat the user as non-premium and keep serving the page.
    #[default]
    Deny,
    /// Surface the failure as 503.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntitlementConfig {
    #[serde(default)]
    pub on_storage_error: StorageErrorPolicy,
}

/// Only read by builds with the `payment-bypass` feature.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BypassConfig {
    #[serde(default)]
    pub token: Option<String>,
}

fn default_query_timeout_secs() -> u64 {
    5
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_webhook_tolerance_secs() -> i64 {
    300
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => toml::from_str(&config_str)
                .map_err(|e| format!("Failed to parse config file {config_path}: {e}"))?,
            // 无配置文件：完全依赖环境变量
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env_only()?,
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_env_only() -> Result<Self, Box<dyn std::error::Error>> {
        let database_url = get_env("DATABASE_URL")
            .ok_or("DATABASE_URL is not set and no config.toml was found")?;

        Ok(Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
                allowed_origins: get_env("ALLOWED_ORIGINS")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                query_timeout_secs: get_env_parse(
                    "DB_QUERY_TIMEOUT_SECS",
                    default_query_timeout_secs(),
                ),
            },
            auth: AuthConfig {
                domain: get_env("AUTH_DOMAIN").unwrap_or_default(),
                client_id: get_env("AUTH_CLIENT_ID").unwrap_or_default(),
                client_secret: get_env("AUTH_CLIENT_SECRET").unwrap_or_default(),
            },
            stripe: StripeConfig {
                secret_key: get_env("STRIPE_SECRET_KEY").unwrap_or_default(),
                publishable_key: get_env("STRIPE_PUBLISHABLE_KEY").unwrap_or_default(),
                webhook_secret: get_env("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
                currency: get_env("STRIPE_CURRENCY").unwrap_or_else(default_currency),
                webhook_tolerance_secs: get_env_parse(
                    "STRIPE_WEBHOOK_TOLERANCE_SECS",
                    default_webhook_tolerance_secs(),
                ),
            },
            entitlement: EntitlementConfig::default(),
            bypass: BypassConfig::default(),
        })
    }

    // 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("ALLOWED_ORIGINS") {
            self.server.allowed_origins = split_list(&v);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("DB_QUERY_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            self.database.query_timeout_secs = n;
        }
        if let Ok(v) = env::var("AUTH_DOMAIN") {
            self.auth.domain = v;
        }
        if let Ok(v) = env::var("AUTH_CLIENT_ID") {
            self.auth.client_id = v;
        }
        if let Ok(v) = env::var("AUTH_CLIENT_SECRET") {
            self.auth.client_secret = v;
        }
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            self.stripe.secret_key = v;
        }
        if let Ok(v) = env::var("STRIPE_PUBLISHABLE_KEY") {
            self.stripe.publishable_key = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            self.stripe.webhook_secret = v;
        }
        if let Ok(v) = env::var("STRIPE_CURRENCY") {
            self.stripe.currency = v;
        }
        if let Ok(v) = env::var("ENTITLEMENT_ON_STORAGE_ERROR") {
            match v.as_str() {
                "deny" => self.entitlement.on_storage_error = StorageErrorPolicy::Deny,
                "error" => self.entitlement.on_storage_error = StorageErrorPolicy::Error,
                other => log::warn!("Ignoring unknown ENTITLEMENT_ON_STORAGE_ERROR value: {other}"),
            }
        }
        if let Ok(v) = env::var("PAYMENT_BYPASS_TOKEN") {
            self.bypass.token = Some(v);
        }
    }

    /// Every secret this service talks to the outside world with must be present
    /// before the server binds.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("database.url", &self.database.url),
            ("auth.domain", &self.auth.domain),
            ("auth.client_id", &self.auth.client_id),
            ("auth.client_secret", &self.auth.client_secret),
            ("stripe.secret_key", &self.stripe.secret_key),
            ("stripe.publishable_key", &self.stripe.publishable_key),
            ("stripe.webhook_secret", &self.stripe.webhook_secret),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(format!("Missing required configuration: {}", missing.join(", ")));
        }
        if self.database.query_timeout_secs == 0 {
            return Err("database.query_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 8080

        [database]
        url = "sqlite::memory:"
        max_connections = 1

        [auth]
        domain = "lexhub.eu.auth0.com"
        client_id = "client"
        client_secret = "secret"

        [stripe]
        secret_key = "sk_test_123"
        publishable_key = "pk_test_123"
        webhook_secret = "whsec_123"
    "#;

    #[test]
    fn test_parse_applies_defaults() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.database.query_timeout_secs, 5);
        assert_eq!(config.stripe.currency, "usd");
        assert_eq!(config.stripe.webhook_tolerance_secs, 300);
        assert_eq!(
            config.entitlement.on_storage_error,
            StorageErrorPolicy::Deny
        );
        assert!(config.bypass.token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_missing_secrets() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.stripe.webhook_secret = String::new();
        config.auth.client_secret = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("stripe.webhook_secret"));
        assert!(err.contains("auth.client_secret"));
        assert!(!err.contains("stripe.secret_key"));
    }

    #[test]
    fn test_storage_error_policy_from_toml() {
        let with_policy = format!("{SAMPLE}\n[entitlement]\non_storage_error = \"error\"\n");
        let config: Config = toml::from_str(&with_policy).unwrap();
        assert_eq!(
            config.entitlement.on_storage_error,
            StorageErrorPolicy::Error
        );
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("https://a.example, https://b.example,,"),
            vec!["https://a.example", "https://b.example"]
        );
    }
}
