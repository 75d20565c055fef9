// =============================================================================
// Matrixon Matrix NextServer - Pdu Metadata Module
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

use std::{
    cmp::Reverse,
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::Instant,
};

use ruma::{
    api::Direction,
    events::{relation::RelationType, AnyTimelineEvent, TimelineEventType},
    serde::Raw,
    EventId, OwnedEventId, RoomId, UserId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use data::Data;

use super::{
    state_accessor,
    timeline::{self, StreamPosition},
    tokens::RelationsToken,
};
use crate::{config::Config, service::pdu::PduEvent, Error, Result};

#[derive(Clone, Debug, Deserialize)]
struct ExtractRelType {
    rel_type: RelationType,
}

#[derive(Clone, Debug, Deserialize)]
struct ExtractRelatesToEventId {
    #[serde(rename = "m.relates_to")]
    relates_to: ExtractRelType,
}

/// All inputs of a relation query, resolved to typed values by the caller.
///
/// Whether the original event is attached to the response is an explicit
/// field here; the engine never inspects request paths or API generations.
#[derive(Clone, Debug)]
pub struct RelationsQuery {
    /// Only return children related with this relation kind.
    pub rel_type: Option<RelationType>,
    /// Only return children of this event type.
    pub event_type: Option<TimelineEventType>,
    pub dir: Direction,
    /// Page size. `None` uses the configured default, larger values are
    /// clamped to the configured maximum.
    pub limit: Option<usize>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Follow relations transitively instead of only direct children.
    pub recurse: bool,
    /// Attach the parent event to the response (legacy response shape).
    pub include_original_event: bool,
}

impl Default for RelationsQuery {
    fn default() -> Self {
        Self {
            rel_type: None,
            event_type: None,
            dir: Direction::Backward,
            limit: None,
            from: None,
            to: None,
            recurse: false,
            include_original_event: false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RelationsResponse {
    pub chunk: Vec<Raw<AnyTimelineEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_event: Option<Raw<AnyTimelineEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursion_depth: Option<u32>,
}

pub struct Service {
    pub db: Arc<dyn Data>,
    pub timeline: Arc<timeline::Service>,
    pub state_accessor: Arc<state_accessor::Service>,
    pub config: Config,
}

impl Service {
    /// Returns one page of events related to `target`, filtered and ordered
    /// per `query`.
    ///
    /// Pagination bounds are validated before any store read. Events the
    /// requesting user may not see are dropped before the page is counted,
    /// so a full page never hides an uncounted remainder.
    #[tracing::instrument(skip(self))]
    pub fn paginate_relations_with_filter(
        &self,
        sender_user: &UserId,
        room_id: &RoomId,
        target: &EventId,
        query: &RelationsQuery,
    ) -> Result<RelationsResponse> {
        let start = Instant::now();

        let limit = match query.limit {
            Some(0) => {
                return Err(Error::InvalidPaginationBounds("`limit` must be at least 1."))
            }
            Some(limit) => limit.min(self.config.max_limit),
            None => self.config.default_limit,
        };

        let from_token = query
            .from
            .as_deref()
            .map(RelationsToken::try_from_string)
            .transpose()?;
        let from = match from_token {
            Some(token) => token.position,
            None => match query.dir {
                Direction::Forward => StreamPosition::min(),
                Direction::Backward => StreamPosition::max(),
            },
        };
        let to = query
            .to
            .as_deref()
            .map(RelationsToken::try_from_string)
            .transpose()?
            .map(|token| token.position);

        if let (Some(_), Some(to)) = (from_token, to) {
            let contradictory = match query.dir {
                Direction::Forward => from >= to,
                Direction::Backward => from <= to,
            };
            if contradictory {
                return Err(Error::InvalidPaginationBounds(
                    "`from` does not precede `to` in the requested direction.",
                ));
            }
        }

        let original = self
            .timeline
            .get_room_pdu(room_id, target)?
            .ok_or_else(|| Error::UnknownParentEvent(target.to_string()))?;

        let depth = if query.recurse {
            self.config.max_recursion_depth
        } else {
            1
        };

        let related = self.resolve_relations(room_id, target, from, query.dir, depth)?;

        let mut page: Vec<(StreamPosition, PduEvent)> = Vec::new();
        let mut more = false;
        for (position, pdu) in related {
            // An exclusive `to` bound ends the walk before the bound itself.
            if to == Some(position) {
                break;
            }

            if let Some(rel_type) = &query.rel_type {
                let matches = serde_json::from_str::<ExtractRelatesToEventId>(pdu.content.get())
                    .map_or(false, |content| content.relates_to.rel_type == *rel_type);
                if !matches {
                    continue;
                }
            }

            if let Some(event_type) = &query.event_type {
                if pdu.kind != *event_type {
                    continue;
                }
            }

            if !self
                .state_accessor
                .user_can_see_event(sender_user, room_id, &pdu.event_id)?
            {
                continue;
            }

            if page.len() == limit {
                more = true;
                break;
            }

            page.push((position, pdu));
        }

        let next_batch = more
            .then(|| {
                page.last()
                    .map(|(position, _)| RelationsToken { position: *position }.stringify())
            })
            .flatten();
        let prev_batch = from_token.map(|token| token.stringify());

        let chunk = page
            .into_iter()
            .map(|(_, mut pdu)| {
                if pdu.sender != sender_user {
                    pdu.remove_transaction_id()?;
                }
                Ok(pdu.to_room_event())
            })
            .collect::<Result<Vec<_>>>()?;

        let original_event = if query.include_original_event {
            let mut original = original;
            if original.sender != sender_user {
                original.remove_transaction_id()?;
            }
            Some(original.to_room_event())
        } else {
            None
        };

        debug!(
            "🔍 Resolved {} related event(s) for {} in {:?}",
            chunk.len(),
            target,
            start.elapsed()
        );

        Ok(RelationsResponse {
            chunk,
            next_batch,
            prev_batch,
            original_event,
            recursion_depth: query.recurse.then_some(depth),
        })
    }

    /// Streams the direct children of `target`, strictly beyond `from` in
    /// the given direction. The thread aggregator scans summaries with this.
    #[allow(clippy::type_complexity)]
    pub fn relations_from<'a>(
        &'a self,
        room_id: &'a RoomId,
        target: &'a EventId,
        from: StreamPosition,
        dir: Direction,
    ) -> Result<Box<dyn Iterator<Item = Result<(StreamPosition, PduEvent)>> + 'a>> {
        self.db.relations_from(room_id, target, from, dir)
    }

    /// Collects every event related to `target` within `max_depth` relation
    /// hops, strictly beyond `from` in the given direction, sorted for that
    /// direction.
    ///
    /// The walk is an iterative breadth-first traversal with a visited set,
    /// so relation cycles terminate and no event is emitted twice. Children
    /// are discovered over the full room ordering and the `from` bound is
    /// applied afterwards; a transitive child is never lost just because its
    /// parent lies outside the requested window.
    #[tracing::instrument(skip(self))]
    fn resolve_relations(
        &self,
        room_id: &RoomId,
        target: &EventId,
        from: StreamPosition,
        dir: Direction,
        max_depth: u32,
    ) -> Result<Vec<(StreamPosition, PduEvent)>> {
        let scan_start = match dir {
            Direction::Forward => StreamPosition::min(),
            Direction::Backward => StreamPosition::max(),
        };

        let mut seen: HashSet<OwnedEventId> = HashSet::from([target.to_owned()]);
        let mut frontier: VecDeque<(OwnedEventId, u32)> =
            VecDeque::from([(target.to_owned(), 1)]);
        let mut related = Vec::new();

        while let Some((node, depth)) = frontier.pop_front() {
            for entry in self.db.relations_from(room_id, &node, scan_start, dir)? {
                let (position, pdu) = entry?;

                if !seen.insert(pdu.event_id.as_ref().to_owned()) {
                    continue;
                }
                if depth < max_depth {
                    frontier.push_back((pdu.event_id.as_ref().to_owned(), depth + 1));
                }

                related.push((position, pdu));
            }
        }

        match dir {
            Direction::Forward => {
                related.retain(|(position, _)| *position > from);
                related.sort_by_key(|(position, _)| *position);
            }
            Direction::Backward => {
                related.retain(|(position, _)| *position < from);
                related.sort_by_key(|(position, _)| Reverse(*position));
            }
        }

        Ok(related)
    }
}
