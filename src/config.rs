use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bench::config::{MockServerConfig, RunParams};
use crate::bench::cost::{CostModel, DEFAULT_COST_PER_GB_SECOND, DEFAULT_COST_PER_REQUEST};
use crate::error::{BenchError, Result};

/// Lambda cost benchmark - invoke every memory tier of a function and
/// estimate what the run cost
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Benchmark the functions listed in a tier file
    Run {
        /// Tier file mapping memory sizes to function URLs
        #[arg(long, env = "BENCH_CONFIG_FILE", default_value = "config.json")]
        config: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Start a local prime-search endpoint and benchmark it
    Standalone {
        /// Memory tiers to serve (comma-separated)
        #[arg(long, default_value = "128,256,512,1024", value_delimiter = ',')]
        tiers: Vec<u32>,

        /// Extra latency per response in milliseconds
        #[arg(long, default_value = "0")]
        latency_ms: u64,

        /// Fraction of requests answered with a 500 (0.0 to 1.0)
        #[arg(long, default_value = "0.0")]
        error_rate: f64,

        #[command(flatten)]
        run: RunArgs,
    },
}

/// Flags shared by both subcommands
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Maximum number to search for primes (<=2M to not cause out of memory
    /// in the lowest memory setting)
    #[arg(long = "max", env = "BENCH_MAX_PRIME", default_value = "1000000")]
    pub max_prime: u64,

    /// Number of times to execute each function
    #[arg(long = "execs", env = "BENCH_EXECUTIONS", default_value = "20")]
    pub num_executions: usize,

    /// Number of times to repeat the search for primes (without consuming
    /// additional memory)
    #[arg(long = "loops", env = "BENCH_LOOPS", default_value = "1")]
    pub num_loops: u32,

    /// Limit of concurrently running invocations
    #[arg(long = "conc", env = "BENCH_CONCURRENCY", default_value = "80")]
    pub max_concurrency: usize,

    /// Price of one request
    #[arg(long, env = "BENCH_COST_PER_REQUEST", default_value_t = DEFAULT_COST_PER_REQUEST)]
    pub cost_per_request: f64,

    /// Price of one GB-second of compute
    #[arg(long, env = "BENCH_COST_PER_GB_SECOND", default_value_t = DEFAULT_COST_PER_GB_SECOND)]
    pub cost_per_gb_second: f64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "BENCH_REQUEST_TIMEOUT", default_value = "300")]
    pub request_timeout: u64,

    /// Give up on outstanding invocations after this many seconds
    #[arg(long, env = "BENCH_RUN_TIMEOUT")]
    pub run_timeout: Option<u64>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Run parameters described by these flags. Not validated yet.
    pub fn params(&self) -> RunParams {
        RunParams {
            max_prime: self.max_prime,
            num_executions: self.num_executions,
            num_loops: self.num_loops,
            max_concurrency: self.max_concurrency,
            request_timeout: Duration::from_secs(self.request_timeout),
            run_timeout: self.run_timeout.map(Duration::from_secs),
            cost: CostModel::new(self.cost_per_request, self.cost_per_gb_second),
        }
    }
}

impl Command {
    pub fn run_args(&self) -> &RunArgs {
        match self {
            Command::Run { run, .. } | Command::Standalone { run, .. } => run,
        }
    }

    /// Local endpoint settings, only for `standalone`
    pub fn mock_server(&self) -> Option<MockServerConfig> {
        match self {
            Command::Standalone {
                latency_ms,
                error_rate,
                ..
            } => Some(MockServerConfig {
                port: 0,
                latency_ms: *latency_ms,
                error_rate: *error_rate,
            }),
            Command::Run { .. } => None,
        }
    }
}

/// Shape of the tier file
#[derive(Debug, Deserialize)]
struct TierFile {
    functions: HashMap<String, String>,
}

/// Memory tier to endpoint URL, ascending by memory size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    functions: BTreeMap<u32, String>,
}

impl TierTable {
    /// Build a table, rejecting an empty one, zero tiers and anything that is
    /// not an http(s) URL
    pub fn new(functions: BTreeMap<u32, String>) -> Result<Self> {
        if functions.is_empty() {
            return Err(BenchError::Config("no functions defined".to_string()));
        }
        for (memory, url) in &functions {
            if *memory == 0 {
                return Err(BenchError::Config(
                    "memory level must be a positive integer".to_string(),
                ));
            }
            if url.trim().is_empty() {
                return Err(BenchError::Config(format!(
                    "function {}mb has an empty URL",
                    memory
                )));
            }
            validate_endpoint(*memory, url)?;
        }
        Ok(Self { functions })
    }

    /// Build a table from string keys as found in the tier file
    pub fn from_raw(raw: HashMap<String, String>) -> Result<Self> {
        let mut functions = BTreeMap::new();
        for (key, url) in raw {
            let memory: u32 = key.trim().parse().map_err(|e| {
                BenchError::Config(format!(
                    "Error parsing memory level {} in config file: {}",
                    key, e
                ))
            })?;
            if functions.insert(memory, url).is_some() {
                return Err(BenchError::Config(format!(
                    "memory level {} is listed more than once",
                    memory
                )));
            }
        }
        Self::new(functions)
    }

    /// Load a tier file (JSON, TOML or YAML, picked by extension)
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| {
                BenchError::Config(format!(
                    "Error opening config file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let file: TierFile = settings
            .try_deserialize()
            .map_err(|e| BenchError::Config(format!("Error parsing config file: {}", e)))?;

        let table = Self::from_raw(file.functions)?;
        tracing::debug!(
            path = %path.display(),
            tiers = ?table.memories().collect::<Vec<_>>(),
            "Loaded tier file"
        );
        Ok(table)
    }

    /// (memory, url) pairs ascending by memory
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.functions.iter().map(|(m, u)| (*m, u.as_str()))
    }

    pub fn memories(&self) -> impl Iterator<Item = u32> + '_ {
        self.functions.keys().copied()
    }

    pub fn endpoint(&self, memory: u32) -> Option<&str> {
        self.functions.get(&memory).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn validate_endpoint(memory: u32, url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url.trim()).map_err(|e| {
        BenchError::Config(format!("function {}mb has an invalid URL: {}", memory, e))
    })?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(()),
        scheme => Err(BenchError::Config(format!(
            "function {}mb has an invalid URL: unsupported scheme {} in {}",
            memory, scheme, url
        ))),
    }
}

/// Expand tilde (~) in file paths to user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
