// =============================================================================
// Matrixon Matrix NextServer - Config Module
// =============================================================================
//
// Project: Matrixon - Ultra High Performance Matrix NextServer (Synapse Alternative)
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Contributors: Matrixon Development Team
// Date: 2024-12-11
// Version: 2.0.0-alpha (Relations Engine)
// License: Apache 2.0 / MIT
//
// Description:
//   Core component of the Matrixon Matrix NextServer. This module is part of the Matrixon Matrix NextServer
//   implementation, designed for enterprise-grade deployment with 20,000+
//   concurrent connections and <50ms response latency.
//
// Performance Targets:
//   • 20k+ concurrent connections
//   • <50ms response latency
//   • >99% success rate
//   • Memory-efficient operation
//   • Horizontal scalability
//
// Features:
//   • High-performance Matrix operations
//   • Enterprise-grade reliability
//   • Scalable architecture
//   • Security-focused design
//   • Matrix protocol compliance
//
// Architecture:
//   • Lazy iterator pipelines over storage traits
//   • Zero-copy operations where possible
//   • Memory-efficient data structures
//   • Lock-free read paths
//   • Enterprise monitoring integration
//
// Dependencies:
//   • Structured logging with tracing
//   • Error handling with thiserror
//   • Serialization with serde
//   • Matrix protocol types with ruma
//
// References:
//   • Matrix.org specification: https://matrix.org/
//   • Synapse reference: https://github.com/element-hq/synapse
//   • Matrix spec: https://spec.matrix.org/
//   • Performance guidelines: Internal Matrixon documentation
//
// Quality Assurance:
//   • Comprehensive unit testing
//   • Integration test coverage
//   • Performance benchmarking
//   • Memory leak detection
//   • Security audit compliance
//
// =============================================================================

use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::{Error, Result};

/// Tuning knobs for the relation query and thread aggregation engine.
///
/// Loaded from a `[global]` TOML section merged with `MATRIXON_`-prefixed
/// environment variables; every field has a serving default.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Page size applied when a query carries no limit.
    #[serde(default = "default_default_limit")]
    pub default_limit: usize,
    /// Hard cap on requested page sizes.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// How many relation hops a recursive query may follow.
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: u32,
    /// Whether thread roots without any surviving reply are listed.
    #[serde(default = "default_true")]
    pub list_replyless_threads: bool,
}

impl Config {
    /// Loads configuration from an optional TOML file merged with
    /// `MATRIXON_`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path).nested());
        }
        let config: Self = figment
            .merge(Env::prefixed("MATRIXON_").global())
            .extract()
            .map_err(|error| Error::bad_config(&format!("{error}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot serve.
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(Error::bad_config("default_limit must be at least 1"));
        }
        if self.max_limit < self.default_limit {
            return Err(Error::bad_config("max_limit must not be below default_limit"));
        }
        if self.max_recursion_depth == 0 {
            return Err(Error::bad_config("max_recursion_depth must be at least 1"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_limit: default_default_limit(),
            max_limit: default_max_limit(),
            max_recursion_depth: default_max_recursion_depth(),
            list_replyless_threads: true,
        }
    }
}

fn default_default_limit() -> usize {
    5
}

fn default_max_limit() -> usize {
    100
}

fn default_max_recursion_depth() -> u32 {
    3
}

fn default_true() -> bool {
    true
}
