use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the portal binary.
#[derive(Debug, Parser)]
#[command(
    name = "portal",
    version,
    about = "Cache-aside GraphQL character service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PORTAL_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the GraphQL HTTP service and the scheduled sync worker.
    Serve(Box<ServeArgs>),
    /// Run a single sync pass against the upstream API and exit.
    Sync(SyncArgs),
    /// Insert the reference origins and characters.
    Seed(SeedArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the upstream GraphQL endpoint.
    #[arg(long = "sync-endpoint", value_name = "URL")]
    pub sync_endpoint: Option<String>,

    /// Delete cached character entries after the run succeeds.
    #[arg(
        long = "sync-invalidate-cache",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub sync_invalidate_cache: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SeedArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Toggle the cache-aside layer.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the cache backend (redis|memory).
    #[arg(long = "cache-backend", value_name = "BACKEND")]
    pub cache_backend: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "cache-redis-url", value_name = "URL")]
    pub cache_redis_url: Option<String>,

    /// Override the default cache TTL.
    #[arg(long = "cache-default-ttl-seconds", value_name = "SECONDS")]
    pub cache_default_ttl_seconds: Option<u64>,

    /// Toggle the scheduled sync worker.
    #[arg(
        long = "sync-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub sync_enabled: Option<bool>,

    /// Override the sync cron schedule (six fields, seconds first).
    #[arg(long = "sync-schedule", value_name = "CRON")]
    pub sync_schedule: Option<String>,

    /// Override the upstream GraphQL endpoint.
    #[arg(long = "sync-endpoint", value_name = "URL")]
    pub sync_endpoint: Option<String>,
}
