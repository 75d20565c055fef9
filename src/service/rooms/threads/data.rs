// =============================================================================
// Matrixon Matrix NextServer - Data Module
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
//   Database layer component for high-performance data operations. This module is part of the Matrixon Matrix NextServer
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
//   • High-performance database operations
//   • PostgreSQL backend optimization
//   • Connection pooling and caching
//   • Transaction management
//   • Data consistency guarantees
//
// Architecture:
//   • Async/await native implementation
//   • Zero-copy operations where possible
//   • Memory-efficient data structures
//   • Optimized database queries
//   • Enterprise-grade error handling
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

use ruma::{EventId, OwnedUserId, RoomId};

use super::super::timeline::StreamPosition;
use crate::{service::pdu::PduEvent, Result};

pub trait Data: Send + Sync {
    /// Streams every event in `room_id` that is the target of at least one
    /// thread relation, in ascending room order, with its stream position.
    #[allow(clippy::type_complexity)]
    fn thread_roots<'a>(
        &'a self,
        room_id: &'a RoomId,
    ) -> Result<Box<dyn Iterator<Item = Result<(StreamPosition, PduEvent)>> + 'a>>;

    /// Users who have authored a reply in the thread rooted at `root_id`,
    /// or `None` when the store tracks no participants for it.
    fn get_participants(
        &self,
        room_id: &RoomId,
        root_id: &EventId,
    ) -> Result<Option<Vec<OwnedUserId>>>;
}
