//! Configuration, loaded once at start-up and handed to every adapter.

use crate::domain::jobs::Language;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} env var required")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which object store implementation backs the gateway.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageBackend {
    S3,
    /// Directory on the local filesystem, used for development.
    Fs(PathBuf),
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Custom S3-compatible endpoint (minio and friends). Forces path-style addressing.
    pub endpoint: Option<String>,
    pub bucket: String,
    /// Public base URL under which uploaded objects are served.
    pub public_asset_endpoint: String,
}

#[derive(Clone, Debug)]
pub struct RegistryConfig {
    pub server_url: String,
    /// Sent verbatim in the `authorization` header of every registry call.
    pub api_key: String,
}

#[derive(Clone, Debug)]
pub struct SpeechConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: String,
    /// Deployment label, `dev` by default.
    pub env: String,
    pub storage: StorageConfig,
    pub registry: RegistryConfig,
    pub speech: SpeechConfig,
    /// Translation target used for asynchronous jobs and `/transcribe/audio`.
    pub subtitle_language: Language,
    pub api_secret_key: Option<String>,
    pub cors_allowed_origin: Option<String>,
    pub body_limit_bytes: usize,
    pub delete_source_after_job: bool,
}

const DEFAULT_BODY_LIMIT: usize = 40 * 1024 * 1024;

impl AppConfig {
    /// Load configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let backend = match get("STORAGE_BACKEND").as_deref() {
            None | Some("s3") => StorageBackend::S3,
            Some("fs") => StorageBackend::Fs(PathBuf::from(
                get("LOCAL_STORAGE_ROOT").unwrap_or_else(|| String::from("./storage")),
            )),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let (access_key, secret_key, bucket) = match backend {
            StorageBackend::S3 => (
                require("AWS_ACCESS_KEY")?,
                require("AWS_SECRET_KEY")?,
                require("S3_BUCKET")?,
            ),
            StorageBackend::Fs(_) => (
                get("AWS_ACCESS_KEY").unwrap_or_default(),
                get("AWS_SECRET_KEY").unwrap_or_default(),
                get("S3_BUCKET").unwrap_or_default(),
            ),
        };

        let body_limit_bytes = match get("BODY_LIMIT_BYTES") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "BODY_LIMIT_BYTES",
                value: raw,
            })?,
            None => DEFAULT_BODY_LIMIT,
        };

        let subtitle_language = match get("SUBTITLE_LANGUAGE") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "SUBTITLE_LANGUAGE",
                value: raw,
            })?,
            None => Language::Mandarin,
        };

        let delete_source_after_job = match get("DELETE_SOURCE_AFTER_JOB") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "DELETE_SOURCE_AFTER_JOB",
                value: raw,
            })?,
            None => true,
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| String::from("127.0.0.1")),
            port: get("PORT").unwrap_or_else(|| String::from("4884")),
            env: get("ENV").unwrap_or_else(|| String::from("dev")),
            storage: StorageConfig {
                backend,
                access_key,
                secret_key,
                region: get("AWS_REGION").unwrap_or_else(|| String::from("us-east-1")),
                endpoint: get("S3_ENDPOINT"),
                bucket,
                public_asset_endpoint: require("PUBLIC_ASSET_ENDPOINT")?
                    .trim_end_matches('/')
                    .to_string(),
            },
            registry: RegistryConfig {
                server_url: require("VIDEO_PLATFORM_SERVER_URL")?
                    .trim_end_matches('/')
                    .to_string(),
                api_key: require("VIDEO_PLATFORM_API_KEY")?,
            },
            speech: SpeechConfig {
                api_key: require("OPENAI_API_KEY")?,
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| String::from("https://api.openai.com/v1"))
                    .trim_end_matches('/')
                    .to_string(),
            },
            subtitle_language,
            api_secret_key: get("API_SECRET_KEY"),
            cors_allowed_origin: get("CORS_ALLOWED_ORIGIN"),
            body_limit_bytes,
            delete_source_after_job,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
