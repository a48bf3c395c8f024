//! # Runtime Configuration Module
//!
//! Environment-driven settings for the two runtimes dyndispatch runs on:
//! the `may` coroutines serving HTTP connections and the tokio worker pool
//! that drives dispatch futures.
//!
//! ## Environment Variables
//!
//! ### `DYND_STACK_SIZE`
//!
//! Stack size for connection coroutines. Decimal (`32768`) or hexadecimal
//! (`0x8000`). Default: `0x8000` (32 KB).
//!
//! ### `DYND_WORKER_THREADS`
//!
//! Number of tokio worker threads. Default: the number of available CPUs.
//!
//! ## Usage
//!
//! ```rust
//! use dyndispatch::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;

use anyhow::{Context, Result};

const DEFAULT_STACK_SIZE: usize = 0x8000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    /// Tokio worker threads; `None` lets tokio pick
    pub worker_threads: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            worker_threads: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary lookup; invalid values fall
    /// back to defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let stack_size = lookup("DYND_STACK_SIZE")
            .and_then(|v| parse_size(&v))
            .unwrap_or(DEFAULT_STACK_SIZE);
        let worker_threads = lookup("DYND_WORKER_THREADS")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0);
        Self {
            stack_size,
            worker_threads,
        }
    }

    /// Configure the global `may` coroutine settings.
    pub fn apply_to_may(&self) {
        may::config().set_stack_size(self.stack_size);
    }

    /// Build the multi-threaded tokio runtime that executes dispatches.
    ///
    /// # Errors
    ///
    /// Propagates runtime construction failures.
    pub fn build_tokio(&self) -> Result<tokio::runtime::Runtime> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name("dyndispatch-worker");
        if let Some(threads) = self.worker_threads {
            builder.worker_threads(threads);
        }
        builder.build().context("failed to build tokio runtime")
    }
}

/// Parse decimal or `0x`-prefixed hexadecimal sizes.
#[must_use]
pub fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}
