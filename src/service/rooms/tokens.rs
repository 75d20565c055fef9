// =============================================================================
// Matrixon Matrix NextServer - Tokens Module
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
//   Core business logic service implementation. This module is part of the Matrixon Matrix NextServer
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
//   • Business logic implementation
//   • Service orchestration
//   • Event handling and processing
//   • State management
//   • Enterprise-grade reliability
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

//! Stateless pagination cursors.
//!
//! A token encodes everything needed to resume a walk; the server keeps no
//! per-client cursor state. Each token kind has its own format, so a token
//! minted by one endpoint fails to parse at the other.

use super::timeline::StreamPosition;
use crate::{Error, Result};

/// Cursor for relation pagination: the stream position of the last event
/// returned on the previous page.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct RelationsToken {
    pub position: StreamPosition,
}

impl RelationsToken {
    pub fn stringify(&self) -> String {
        self.position.stringify()
    }

    pub fn try_from_string(token: &str) -> Result<Self> {
        StreamPosition::try_from_string(token).map(|position| Self { position })
    }
}

/// Cursor for thread listing: the sort key of the last thread returned on
/// the previous page.
///
/// Threads sort by their latest activity, with the root position breaking
/// ties, so the token carries both.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct ThreadsToken {
    pub latest: StreamPosition,
    pub root: StreamPosition,
}

impl ThreadsToken {
    pub fn stringify(&self) -> String {
        format!("{}_{}", self.latest.stringify(), self.root.stringify())
    }

    pub fn try_from_string(token: &str) -> Result<Self> {
        let (latest, root) = token
            .split_once('_')
            .ok_or(Error::MalformedToken("Invalid thread token"))?;

        Ok(Self {
            latest: StreamPosition::try_from_string(latest)?,
            root: StreamPosition::try_from_string(root)?,
        })
    }
}
