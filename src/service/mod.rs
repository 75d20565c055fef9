// =============================================================================
// Matrixon Matrix NextServer - Service Module
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

pub mod pdu;
pub mod rooms;

use std::{sync::Arc, time::Instant};

use tracing::{debug, info};

use crate::{config::Config, Result};

/// Central container for the relation and thread query services.
///
/// Built once per event store; every request borrows it. No global state is
/// kept, so independent stores (and independent tests) can run side by side.
pub struct Services {
    pub rooms: rooms::Service,
    pub config: Config,
}

impl Services {
    /// Wires all services to the given event store.
    ///
    /// The store is the only injected dependency. Services are built in
    /// dependency order and share one handle to it.
    #[tracing::instrument(level = "info", skip(db))]
    pub fn build<D: rooms::Data + 'static>(db: Arc<D>, config: Config) -> Result<Self> {
        let start = Instant::now();
        info!("🚀 Initializing Matrixon relation services");

        config.validate()?;

        let timeline = Arc::new(rooms::timeline::Service { db: db.clone() });
        let state_accessor = Arc::new(rooms::state_accessor::Service { db: db.clone() });
        let pdu_metadata = Arc::new(rooms::pdu_metadata::Service {
            db: db.clone(),
            timeline: Arc::clone(&timeline),
            state_accessor: Arc::clone(&state_accessor),
            config: config.clone(),
        });
        let threads = Arc::new(rooms::threads::Service {
            db,
            pdu_metadata: Arc::clone(&pdu_metadata),
            state_accessor: Arc::clone(&state_accessor),
            config: config.clone(),
        });
        debug!("✅ Room services initialized");

        info!("🎉 Services ready in {:?}", start.elapsed());

        Ok(Self {
            rooms: rooms::Service {
                pdu_metadata,
                state_accessor,
                threads,
                timeline,
            },
            config,
        })
    }
}
