//! Configuration: command-line flags, optional TOML file and secrets

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use stemgraph_server::{ResolveFrom, ServerConfig, TreeLimits};
use stemgraph_store::Neo4jConfig;

pub const DEFAULT_SECRETS_DIR: &str = "/run/secrets";

const USER_SECRET: &str = "STEMgraph_user";
const PASSWORD_SECRET: &str = "STEMgraph_pw";
const WRITE_ACCESS_SECRET: &str = "STEMgraph_write_access";

const FALLBACK_USER: &str = "default_user";
const FALLBACK_PASSWORD: &str = "default_password";
const FALLBACK_TOKEN: &str = "default_token";

/// Flags describing how to reach the graph store.
#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Graph store base URL
    #[arg(long, env = "STEMGRAPH_STORE_URL")]
    pub store_url: Option<String>,

    /// Database name
    #[arg(long)]
    pub database: Option<String>,

    /// Store user
    #[arg(long, env = "STEMGRAPH_USER")]
    pub user: Option<String>,

    /// Store password
    #[arg(long, env = "STEMGRAPH_PW", hide_env_values = true)]
    pub password: Option<String>,

    /// Directory holding mounted secret files
    #[arg(long)]
    pub secrets_dir: Option<PathBuf>,
}

/// Flags of the `serve` command.
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Token required in X-API-Key for writes
    #[arg(long, env = "STEMGRAPH_WRITE_ACCESS", hide_env_values = true)]
    pub write_token: Option<String>,

    /// Dependency endpoints read from `store` or `cache`
    #[arg(long)]
    pub resolve_from: Option<ResolveFrom>,

    /// Serve from an in-process store instead of the graph database
    #[arg(long)]
    pub memory: bool,
}

/// Contents of the optional TOML config file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub store: StoreSection,
    pub refresh: RefreshSection,
    pub resolver: ResolverSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub readiness_backoff_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub url: Option<String>,
    pub database: Option<String>,
    pub timeout_secs: Option<u64>,
    pub secrets_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshSection {
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverSection {
    pub source: Option<ResolveFrom>,
    pub max_tree_depth: Option<usize>,
    pub max_tree_nodes: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Load `path` if given, otherwise use built-in defaults.
    pub fn load_optional(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

fn secrets_dir(file: &FileConfig, args: &StoreArgs) -> PathBuf {
    args.secrets_dir
        .clone()
        .or_else(|| file.store.secrets_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_DIR))
}

/// Resolve one secret: explicit value, then `<dir>/<name>`, then `fallback`.
fn secret(explicit: Option<&str>, dir: &Path, name: &str, fallback: &str) -> String {
    if let Some(value) = explicit.map(str::trim).filter(|v| !v.is_empty()) {
        return value.to_string();
    }

    let path = dir.join(name);
    match fs::read_to_string(&path) {
        Ok(content) if !content.trim().is_empty() => return content.trim().to_string(),
        Ok(_) => tracing::debug!("Secret file {} is empty", path.display()),
        Err(e) => tracing::debug!("Secret file {} not readable: {}", path.display(), e),
    }

    tracing::warn!("No value configured for {}, using built-in fallback", name);
    fallback.to_string()
}

/// A duration in whole seconds that must not be zero.
fn nonzero_secs(value: Option<u64>, key: &str, default: Duration) -> anyhow::Result<Duration> {
    match value {
        Some(0) => anyhow::bail!("{key} must be greater than zero"),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}

/// Connection settings for the graph store. Flags beat the file, the file
/// beats defaults.
pub fn store_config(file: &FileConfig, args: &StoreArgs) -> anyhow::Result<Neo4jConfig> {
    let defaults = Neo4jConfig::default();
    let dir = secrets_dir(file, args);

    Ok(Neo4jConfig {
        url: args
            .store_url
            .clone()
            .or_else(|| file.store.url.clone())
            .unwrap_or(defaults.url),
        database: args
            .database
            .clone()
            .or_else(|| file.store.database.clone())
            .unwrap_or(defaults.database),
        user: secret(args.user.as_deref(), &dir, USER_SECRET, FALLBACK_USER),
        password: secret(args.password.as_deref(), &dir, PASSWORD_SECRET, FALLBACK_PASSWORD),
        timeout: nonzero_secs(file.store.timeout_secs, "store.timeout_secs", defaults.timeout)?,
    })
}

pub fn server_config(file: &FileConfig, args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let defaults = ServerConfig::default();
    let dir = secrets_dir(file, &args.store);

    let max_nodes = file
        .resolver
        .max_tree_nodes
        .unwrap_or(defaults.tree_limits.max_nodes);
    if max_nodes == 0 {
        anyhow::bail!("resolver.max_tree_nodes must be greater than zero");
    }
    let tree_limits = TreeLimits {
        max_depth: file
            .resolver
            .max_tree_depth
            .unwrap_or(defaults.tree_limits.max_depth),
        max_nodes,
    };

    Ok(ServerConfig {
        host: args
            .host
            .clone()
            .or_else(|| file.server.host.clone())
            .unwrap_or(defaults.host),
        port: args.port.or(file.server.port).unwrap_or(defaults.port),
        write_token: secret(
            args.write_token.as_deref(),
            &dir,
            WRITE_ACCESS_SECRET,
            FALLBACK_TOKEN,
        ),
        refresh_interval: nonzero_secs(
            file.refresh.interval_secs,
            "refresh.interval_secs",
            defaults.refresh_interval,
        )?,
        readiness_backoff: nonzero_secs(
            file.server.readiness_backoff_secs,
            "server.readiness_backoff_secs",
            defaults.readiness_backoff,
        )?,
        resolve_from: args
            .resolve_from
            .or(file.resolver.source)
            .unwrap_or(defaults.resolve_from),
        tree_limits,
    })
}
