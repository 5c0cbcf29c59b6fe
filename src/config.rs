use std::{path::PathBuf, sync::LazyLock};

use fmt_pipe::{EngineOptions, process::DENO_BIN_ENV};

const READ_BUFFER_ENV: &str = "FMT_PIPE_READ_BUFFER";
const OUTPUT_CAPACITY_ENV: &str = "FMT_PIPE_OUTPUT_CAPACITY";

/// Process-wide settings read once from the environment.
pub struct PipeConfig {
    deno_bin: Option<PathBuf>,
    engine: EngineOptions,
}

impl PipeConfig {
    fn from_env() -> Self {
        let defaults = EngineOptions::default();
        Self {
            deno_bin: std::env::var_os(DENO_BIN_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            engine: EngineOptions {
                read_buffer_size: env_usize(READ_BUFFER_ENV).unwrap_or(defaults.read_buffer_size),
                output_capacity: env_usize(OUTPUT_CAPACITY_ENV).unwrap_or(defaults.output_capacity),
            },
        }
    }

    pub fn deno_bin(&self) -> Option<&PathBuf> {
        self.deno_bin.as_ref()
    }

    pub fn engine(&self) -> &EngineOptions {
        &self.engine
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let value = std::env::var(key).ok()?;
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            log::warn!("ignoring {}={:?}, expected a positive integer", key, value);
            None
        }
    }
}

pub fn config() -> &'static PipeConfig {
    static CONFIG: LazyLock<PipeConfig> = LazyLock::new(PipeConfig::from_env);
    &CONFIG
}
