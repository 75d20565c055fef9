// =============================================================================
// Matrixon Matrix NextServer - Rooms Module
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

pub mod pdu_metadata;
pub mod state_accessor;
pub mod threads;
pub mod timeline;
pub mod tokens;

use std::sync::Arc;

/// The full read surface an event store must provide to serve relation and
/// thread queries.
pub trait Data:
    pdu_metadata::Data + state_accessor::Data + threads::Data + timeline::Data
{
}

pub struct Service {
    pub pdu_metadata: Arc<pdu_metadata::Service>,
    pub state_accessor: Arc<state_accessor::Service>,
    pub threads: Arc<threads::Service>,
    pub timeline: Arc<timeline::Service>,
}
