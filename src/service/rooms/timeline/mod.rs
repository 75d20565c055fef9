// =============================================================================
// Matrixon Matrix NextServer - Timeline Module
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

mod data;

use std::{cmp::Ordering, sync::Arc};

use ruma::{EventId, RoomId};

pub use data::Data;

use crate::{service::pdu::PduEvent, Error, Result};

/// A position in a room's event stream.
///
/// Live events count upwards from the point the server joined the room;
/// backfilled history counts downwards below every live event. The ordering
/// therefore runs over all backfilled positions (oldest first) and then all
/// live positions.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum StreamPosition {
    /// The `u64` is the offset into backfilled history, growing towards
    /// older events.
    Backfilled(u64),
    /// The `u64` is the offset into the live stream, growing towards newer
    /// events.
    Live(u64),
}

impl StreamPosition {
    /// The smallest representable position, before all stored events.
    pub fn min() -> Self {
        Self::Backfilled(u64::MAX)
    }

    /// The largest representable position, after all stored events.
    pub fn max() -> Self {
        Self::Live(u64::MAX)
    }

    /// Renders the position as a pagination token fragment.
    pub fn stringify(&self) -> String {
        match self {
            StreamPosition::Backfilled(x) => format!("-{x}"),
            StreamPosition::Live(x) => x.to_string(),
        }
    }

    /// Parses a token fragment produced by [`Self::stringify`].
    pub fn try_from_string(token: &str) -> Result<Self> {
        if let Some(stripped) = token.strip_prefix('-') {
            stripped.parse().map(StreamPosition::Backfilled)
        } else {
            token.parse().map(StreamPosition::Live)
        }
        .map_err(|_| Error::MalformedToken("Invalid stream position"))
    }
}

impl PartialOrd for StreamPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StreamPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (StreamPosition::Live(a), StreamPosition::Live(b)) => a.cmp(b),
            (StreamPosition::Backfilled(a), StreamPosition::Backfilled(b)) => b.cmp(a),
            (StreamPosition::Live(_), StreamPosition::Backfilled(_)) => Ordering::Greater,
            (StreamPosition::Backfilled(_), StreamPosition::Live(_)) => Ordering::Less,
        }
    }
}

pub struct Service {
    pub db: Arc<dyn Data>,
}

impl Service {
    /// Fetches a stored event by id.
    #[tracing::instrument(skip(self))]
    pub fn get_pdu(&self, event_id: &EventId) -> Result<Option<PduEvent>> {
        self.db.get_pdu(event_id)
    }

    /// Fetches a stored event, requiring it to live in the given room.
    ///
    /// Events from other rooms are treated as unknown so that event ids
    /// cannot be probed across room boundaries.
    #[tracing::instrument(skip(self))]
    pub fn get_room_pdu(&self, room_id: &RoomId, event_id: &EventId) -> Result<Option<PduEvent>> {
        Ok(self
            .db
            .get_pdu(event_id)?
            .filter(|pdu| pdu.room_id == room_id))
    }

    /// Returns the stream position of a stored event, if known.
    #[tracing::instrument(skip(self))]
    pub fn get_event_position(&self, event_id: &EventId) -> Result<Option<StreamPosition>> {
        self.db.get_event_position(event_id)
    }
}
