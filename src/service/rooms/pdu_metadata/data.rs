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

use ruma::{api::Direction, EventId, RoomId};

use super::super::timeline::StreamPosition;
use crate::{service::pdu::PduEvent, Result};

pub trait Data: Send + Sync {
    /// Streams the direct children of `target` in `room_id`, strictly beyond
    /// `from` in the given direction.
    ///
    /// `Direction::Forward` yields positions greater than `from` in ascending
    /// order, `Direction::Backward` yields positions less than `from` in
    /// descending order. Children whose event body is no longer stored are
    /// skipped.
    #[allow(clippy::type_complexity)]
    fn relations_from<'a>(
        &'a self,
        room_id: &'a RoomId,
        target: &'a EventId,
        from: StreamPosition,
        dir: Direction,
    ) -> Result<Box<dyn Iterator<Item = Result<(StreamPosition, PduEvent)>> + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: Verify Data trait definition and signatures
    ///
    /// This test ensures that the relation storage trait stays object safe
    /// and usable behind `Arc<dyn Data>`.
    #[test]
    fn test_data_trait_object_safety() {
        struct MockData;

        impl Data for MockData {
            fn relations_from<'a>(
                &'a self,
                _room_id: &'a RoomId,
                _target: &'a EventId,
                _from: StreamPosition,
                _dir: Direction,
            ) -> Result<Box<dyn Iterator<Item = Result<(StreamPosition, PduEvent)>> + 'a>>
            {
                Ok(Box::new(std::iter::empty()))
            }
        }

        let data: Box<dyn Data> = Box::new(MockData);
        let room_id: &RoomId = "!room:example.com".try_into().expect("Valid room ID");
        let event_id: &EventId = "$event:example.com".try_into().expect("Valid event ID");

        let iter = data
            .relations_from(room_id, event_id, StreamPosition::min(), Direction::Forward)
            .expect("iterator is created");
        assert_eq!(iter.count(), 0);
    }
}
