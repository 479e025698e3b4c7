use std::time::Duration;

use thiserror::Error;

const MIB: u64 = 1 << 20;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got '{value}'")]
    InvalidValue {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct S3Config {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub use_ssl: bool,
    pub bucket: String,
    pub region: String,
}

impl S3Config {
    /// Endpoint as a full URL; a bare `host:port` gets its scheme from `use_ssl`.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            self.endpoint.clone()
        } else {
            let scheme = if self.use_ssl { "https" } else { "http" };
            format!("{}://{}", scheme, self.endpoint)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadLimits {
    pub max_image_size: u64,
    pub max_audio_size: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_image_size: 10 * MIB,
            max_audio_size: 50 * MIB,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub max_request_body: usize,
    pub create_timeout: Duration,
    pub upload_limits: UploadLimits,
    pub database: DatabaseConfig,
    pub s3: S3Config,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                get("DB_USER", "postgres"),
                get("DB_PASSWORD", "postgres"),
                get("DB_HOST", "localhost"),
                get("DB_PORT", "5432"),
                get("DB_NAME", "postgres"),
            ),
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let defaults = UploadLimits::default();

        Ok(Self {
            port: parse_number(&lookup, "PORT", 8080)?,
            cors_allowed_origins,
            max_request_body: parse_number(&lookup, "MAX_REQUEST_BODY_BYTES", 256 * MIB as usize)?,
            create_timeout: Duration::from_secs(parse_number(&lookup, "CREATE_TIMEOUT_SECS", 30)?),
            upload_limits: UploadLimits {
                max_image_size: parse_number(
                    &lookup,
                    "MAX_IMAGE_SIZE_BYTES",
                    defaults.max_image_size,
                )?,
                max_audio_size: parse_number(
                    &lookup,
                    "MAX_AUDIO_SIZE_BYTES",
                    defaults.max_audio_size,
                )?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_number(&lookup, "DB_MAX_CONNECTIONS", 25)?,
                run_migrations: parse_bool(&lookup, "RUN_MIGRATIONS", true)?,
            },
            s3: S3Config {
                endpoint: get("S3_ENDPOINT", "localhost:9000"),
                access_key: get("S3_ACCESS_KEY", "minioadmin"),
                secret_key: get("S3_SECRET_KEY", "minioadmin"),
                use_ssl: parse_bool(&lookup, "S3_USE_SSL", false)?,
                bucket: get("S3_BUCKET", "default"),
                region: get("S3_REGION", "us-east-1"),
            },
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key,
            expected: "number",
            value,
        }),
    }
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key,
                expected: "boolean",
                value,
            }),
        },
    }
}
