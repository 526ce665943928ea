use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Disable timeout middleware
    #[arg(long, env = "TIMEOUT_DISABLED")]
    pub timeout_disabled: Option<bool>,

    /// Pause between streamed tokens, in milliseconds
    #[arg(long, env = "TOKEN_DELAY_MS")]
    pub token_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub resilience: ResilienceConfig,
    pub reply: ReplyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResilienceConfig {
    pub timeout_disabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplyConfig {
    pub token_delay_ms: u64,
    pub channel_capacity: usize,
}

impl ReplyConfig {
    #[must_use]
    pub fn token_delay(&self) -> Duration {
        Duration::from_millis(self.token_delay_ms)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("resilience.timeout_disabled", false)?
            .set_default("reply.token_delay_ms", 20)?
            .set_default("reply.channel_capacity", 64)?;

        // 2. Config file, when one was named or ./config.yaml exists
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        } else if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config.yaml"));
        }

        // 3. Environment variables prefixed with RELAY_
        // E.g. RELAY_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI overrides. clap also fills these from the bare env vars
        // (PORT, TIMEOUT_DISABLED, TOKEN_DELAY_MS), so the effective
        // priority is: CLI flag > bare env var > RELAY_ env var > file >
        // defaults.
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(td) = cli.timeout_disabled {
            builder = builder.set_override("resilience.timeout_disabled", td)?;
        }
        if let Some(delay) = cli.token_delay_ms {
            builder = builder.set_override("reply.token_delay_ms", delay)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}
