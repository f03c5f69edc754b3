//! Server configuration
//!
//! Read once at startup from the environment (after `.env` is loaded).

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use url::Url;

/// Local database used when nothing else is configured
pub const DEFAULT_SQLITE_URL: &str = "sqlite:./data/gateway.db?mode=rwc";

/// Where the gateway sends its statements
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Postgres { url: String },
    Sqlite { url: String },
    Rest { base_url: Url, api_key: String },
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Postgres { .. } => "postgres",
            Backend::Sqlite { .. } => "sqlite",
            Backend::Rest { .. } => "rest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Postgres,
    Sqlite,
    Rest,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            "sqlite" => Ok(BackendKind::Sqlite),
            "rest" | "supabase" => Ok(BackendKind::Rest),
            other => bail!("unknown GATEWAY_BACKEND {other:?} (expected postgres, sqlite or rest)"),
        }
    }
}

/// Gateway server settings
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub address: SocketAddr,

    /// Path of the CRUD endpoint
    pub base_path: String,

    pub backend: Backend,

    /// Table used when a request names none
    pub default_table: String,

    /// Postgres `search_path` / PostgREST profile
    pub schema: String,
}

impl Config {
    /// Load settings from process environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through `lookup`; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let address = get("GATEWAY_ADDRESS")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse::<SocketAddr>()
            .context("GATEWAY_ADDRESS must be a socket address such as 127.0.0.1:3000")?;

        let base_path = get("GATEWAY_BASE_PATH").unwrap_or_else(|| "/api/db".to_string());
        if !base_path.starts_with('/') {
            bail!("GATEWAY_BASE_PATH must start with '/', got {base_path:?}");
        }

        let connection_string = get("CONNECTION_STRING");

        let kind = match get("GATEWAY_BACKEND") {
            Some(value) => Some(value.parse::<BackendKind>()?),
            None => None,
        };

        let backend = match kind.or_else(|| infer_backend(connection_string.as_deref(), &get)) {
            Some(BackendKind::Postgres) => {
                let url = connection_string
                    .as_deref()
                    .filter(|url| is_postgres_url(url))
                    .ok_or_else(|| anyhow!("the postgres backend needs a postgres:// CONNECTION_STRING"))?;
                Backend::Postgres {
                    url: splice_credentials(url, get("USERNAME_OVERRIDE"), get("PASSWORD"))?,
                }
            }
            Some(BackendKind::Rest) => {
                let base_url = match get("SUPABASE_URL") {
                    Some(url) => Url::parse(&url).context("SUPABASE_URL is not a valid URL")?,
                    None => connection_string
                        .as_deref()
                        .and_then(derive_supabase_url)
                        .ok_or_else(|| anyhow!("the rest backend needs SUPABASE_URL"))?,
                };
                let api_key = get("SUPABASE_ANON_KEY")
                    .ok_or_else(|| anyhow!("the rest backend needs SUPABASE_ANON_KEY"))?;
                Backend::Rest { base_url, api_key }
            }
            Some(BackendKind::Sqlite) | None => Backend::Sqlite {
                url: connection_string
                    .filter(|url| url.starts_with("sqlite:"))
                    .unwrap_or_else(|| DEFAULT_SQLITE_URL.to_string()),
            },
        };

        Ok(Self {
            address,
            base_path,
            backend,
            default_table: get("DEFAULT_TABLE_NAME").unwrap_or_else(|| "hospital_records".to_string()),
            schema: get("SCHEMA_NAME").unwrap_or_else(|| "public".to_string()),
        })
    }
}

fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

fn infer_backend(
    connection_string: Option<&str>,
    get: &impl Fn(&str) -> Option<String>,
) -> Option<BackendKind> {
    match connection_string {
        Some(url) if is_postgres_url(url) => Some(BackendKind::Postgres),
        Some(url) if url.starts_with("sqlite:") => Some(BackendKind::Sqlite),
        _ if get("SUPABASE_URL").is_some() && get("SUPABASE_ANON_KEY").is_some() => {
            Some(BackendKind::Rest)
        }
        _ => None,
    }
}

/// Replace the user and password of a Postgres URL
///
/// Connection strings copied from a hosting dashboard usually carry a
/// `[YOUR-PASSWORD]` placeholder; the real secret comes from its own variable.
fn splice_credentials(
    url: &str,
    username: Option<String>,
    password: Option<String>,
) -> anyhow::Result<String> {
    if username.is_none() && password.is_none() {
        return Ok(url.to_string());
    }

    let mut parsed = Url::parse(url).context("CONNECTION_STRING is not a valid URL")?;
    if let Some(username) = username {
        parsed
            .set_username(&username)
            .map_err(|_| anyhow!("CONNECTION_STRING cannot carry a username"))?;
    }
    if let Some(password) = password {
        parsed
            .set_password(Some(&password))
            .map_err(|_| anyhow!("CONNECTION_STRING cannot carry a password"))?;
    }

    Ok(parsed.to_string())
}

/// `postgres.<ref>@...` (a Supabase pooler user) → `https://<ref>.supabase.co`
fn derive_supabase_url(connection_string: &str) -> Option<Url> {
    let parsed = Url::parse(connection_string).ok()?;
    let project = parsed.username().strip_prefix("postgres.")?;
    if project.is_empty() || !project.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    Url::parse(&format!("https://{project}.supabase.co")).ok()
}
