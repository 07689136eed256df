use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::scenario::WaitTime;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("host must be an http:// url, got {0:?}")]
    InvalidHost(String),

    #[error("at least one user is required")]
    NoUsers,

    #[error("spawn rate must be a finite, non-negative number, got {0}")]
    InvalidSpawnRate(f64),

    #[error("run time must be positive")]
    ZeroRunTime,

    #[error("invalid wait time: min {min}s, max {max}s")]
    InvalidWaitTime { min: f64, max: f64 },

    #[error("request timeout must be positive, got {0}s")]
    InvalidTimeout(f64),

    #[error("invalid task weights: {0}")]
    InvalidWeights(String),
}

/// Product catalog load generator
#[derive(Parser, Debug, Clone)]
#[command(name = "loadtest")]
#[command(about = "Simulates users creating and fetching products")]
#[command(version)]
pub struct Cli {
    /// Base url of the catalog service
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "LOADTEST_HOST")]
    pub host: String,

    /// Number of concurrent users
    #[arg(short, long, default_value = "10", env = "LOADTEST_USERS")]
    pub users: usize,

    /// Users started per second, 0 starts all at once
    #[arg(short = 'r', long, default_value = "1.0", env = "LOADTEST_SPAWN_RATE")]
    pub spawn_rate: f64,

    /// Test duration in seconds
    #[arg(short = 't', long, default_value = "60", env = "LOADTEST_RUN_TIME")]
    pub run_time: u64,

    /// Shortest pause between two tasks, in seconds
    #[arg(long, default_value = "1.0", env = "LOADTEST_WAIT_MIN")]
    pub wait_min: f64,

    /// Longest pause between two tasks, in seconds
    #[arg(long, default_value = "3.0", env = "LOADTEST_WAIT_MAX")]
    pub wait_max: f64,

    /// Per request timeout in seconds
    #[arg(long, env = "LOADTEST_REQUEST_TIMEOUT")]
    pub request_timeout: Option<f64>,

    /// Seed for reproducible task and wait sequences
    #[arg(long, env = "LOADTEST_SEED")]
    pub seed: Option<u64>,

    /// Exit with an error if any request failed
    #[arg(long)]
    pub fail_on_error: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated settings of one run.
#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    pub host: String,
    pub users: usize,
    /// Pause between two user spawns, `None` starts all users at once.
    pub spawn_interval: Option<Duration>,
    pub run_time: Duration,
    pub wait_time: WaitTime,
    pub request_timeout: Option<Duration>,
    pub seed: Option<u64>,
}

impl TryFrom<&Cli> for LoadTestConfig {
    type Error = ConfigError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        if !cli.host.starts_with("http://") || cli.host.len() == "http://".len() {
            return Err(ConfigError::InvalidHost(cli.host.clone()));
        }
        if cli.users == 0 {
            return Err(ConfigError::NoUsers);
        }
        let spawn_interval = match cli.spawn_rate {
            rate if rate == 0.0 => None,
            rate if rate > 0.0 => Some(
                Duration::try_from_secs_f64(1.0 / rate)
                    .map_err(|_| ConfigError::InvalidSpawnRate(rate))?,
            ),
            rate => return Err(ConfigError::InvalidSpawnRate(rate)),
        };
        if cli.run_time == 0 {
            return Err(ConfigError::ZeroRunTime);
        }
        let request_timeout = match cli.request_timeout {
            Some(secs) => match Duration::try_from_secs_f64(secs) {
                Ok(limit) if !limit.is_zero() => Some(limit),
                _ => return Err(ConfigError::InvalidTimeout(secs)),
            },
            None => None,
        };
        Ok(Self {
            host: cli.host.clone(),
            users: cli.users,
            spawn_interval,
            run_time: Duration::from_secs(cli.run_time),
            wait_time: WaitTime::between(cli.wait_min, cli.wait_max)?,
            request_timeout,
            seed: cli.seed,
        })
    }
}
