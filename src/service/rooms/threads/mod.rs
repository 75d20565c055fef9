// =============================================================================
// Matrixon Matrix NextServer - Threads Module
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

use std::{cmp::Reverse, sync::Arc, time::Instant};

use ruma::{
    api::Direction,
    events::{
        relation::{BundledThread, RelationType},
        AnyTimelineEvent,
    },
    serde::Raw,
    uint, RoomId, UInt, UserId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use data::Data;

use super::{
    pdu_metadata, state_accessor,
    timeline::StreamPosition,
    tokens::ThreadsToken,
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

/// Which threads of a room the listing covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThreadsInclude {
    /// Every thread in the room.
    #[default]
    All,
    /// Only threads the requesting user has posted in or rooted.
    Participated,
}

impl ThreadsInclude {
    pub fn try_from_string(value: &str) -> Result<Self> {
        match value {
            "all" => Ok(Self::All),
            "participated" => Ok(Self::Participated),
            _ => Err(Error::InvalidPaginationBounds("Unsupported `include` value.")),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ThreadsQuery {
    pub include: ThreadsInclude,
    /// Page size. `None` uses the configured default, larger values are
    /// clamped to the configured maximum.
    pub limit: Option<usize>,
    pub from: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ThreadsResponse {
    pub chunk: Vec<Raw<AnyTimelineEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_batch: Option<String>,
}

/// One thread root with the aggregation computed for it, before response
/// assembly.
struct ThreadListing {
    latest_position: StreamPosition,
    root_position: StreamPosition,
    count: UInt,
    participated: bool,
    root: PduEvent,
    latest: PduEvent,
}

pub struct Service {
    pub db: Arc<dyn Data>,
    pub pdu_metadata: Arc<pdu_metadata::Service>,
    pub state_accessor: Arc<state_accessor::Service>,
    pub config: Config,
}

impl Service {
    /// Returns one page of the room's threads, most recently active first.
    ///
    /// Aggregations are recomputed from the live event set on every call;
    /// each returned root carries its bundled thread summary under
    /// `unsigned`.
    #[tracing::instrument(skip(self))]
    pub fn paginate_threads(
        &self,
        sender_user: &UserId,
        room_id: &RoomId,
        query: &ThreadsQuery,
    ) -> Result<ThreadsResponse> {
        let start = Instant::now();

        let limit = match query.limit {
            Some(0) => {
                return Err(Error::InvalidPaginationBounds("`limit` must be at least 1."))
            }
            Some(limit) => limit.min(self.config.max_limit),
            None => self.config.default_limit,
        };

        let from = query
            .from
            .as_deref()
            .map(ThreadsToken::try_from_string)
            .transpose()?;

        let mut threads = Vec::new();
        for entry in self.db.thread_roots(room_id)? {
            let (root_position, root) = entry?;

            let (latest_position, latest, count) =
                match self.thread_summary(room_id, &root)? {
                    Some(summary) => summary,
                    None if self.config.list_replyless_threads => {
                        (root_position, root.clone(), uint!(0))
                    }
                    None => continue,
                };

            let participated = root.sender == sender_user
                || self
                    .db
                    .get_participants(room_id, &root.event_id)?
                    .map_or(false, |participants| {
                        participants.contains(&sender_user.to_owned())
                    });

            if query.include == ThreadsInclude::Participated && !participated {
                continue;
            }

            if !self
                .state_accessor
                .user_can_see_event(sender_user, room_id, &root.event_id)?
            {
                continue;
            }

            threads.push(ThreadListing {
                latest_position,
                root_position,
                count,
                participated,
                root,
                latest,
            });
        }

        threads.sort_by_key(|thread| Reverse((thread.latest_position, thread.root_position)));

        if let Some(from) = from {
            threads.retain(|thread| {
                (thread.latest_position, thread.root_position) < (from.latest, from.root)
            });
        }

        let more = threads.len() > limit;
        threads.truncate(limit);

        let next_batch = more
            .then(|| {
                threads.last().map(|thread| {
                    ThreadsToken {
                        latest: thread.latest_position,
                        root: thread.root_position,
                    }
                    .stringify()
                })
            })
            .flatten();

        let chunk = threads
            .into_iter()
            .map(|thread| {
                let ThreadListing {
                    count,
                    participated,
                    mut root,
                    mut latest,
                    ..
                } = thread;

                if latest.sender != sender_user {
                    latest.remove_transaction_id()?;
                }
                let bundled =
                    BundledThread::new(latest.to_message_like_event(), count, participated);

                if root.sender != sender_user {
                    root.remove_transaction_id()?;
                }
                root.set_bundled_thread(&bundled)?;

                Ok(root.to_room_event())
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("🧵 Listed {} thread(s) in {:?}", chunk.len(), start.elapsed());

        Ok(ThreadsResponse { chunk, next_batch })
    }

    /// Latest reply, reply count and latest position for the thread rooted
    /// at `root`, or `None` when the thread has no qualifying replies.
    ///
    /// A root whose only thread relation points at itself counts as
    /// replyless.
    #[tracing::instrument(skip(self, root))]
    fn thread_summary(
        &self,
        room_id: &RoomId,
        root: &PduEvent,
    ) -> Result<Option<(StreamPosition, PduEvent, UInt)>> {
        let mut latest: Option<(StreamPosition, PduEvent)> = None;
        let mut count = uint!(0);

        for entry in self.pdu_metadata.relations_from(
            room_id,
            &root.event_id,
            StreamPosition::min(),
            Direction::Forward,
        )? {
            let (position, pdu) = entry?;

            if pdu.event_id == root.event_id {
                continue;
            }

            let is_thread_reply =
                serde_json::from_str::<ExtractRelatesToEventId>(pdu.content.get())
                    .map_or(false, |content| {
                        content.relates_to.rel_type == RelationType::Thread
                    });
            if !is_thread_reply {
                continue;
            }

            count += uint!(1);
            latest = Some((position, pdu));
        }

        Ok(latest.map(|(position, pdu)| (position, pdu, count)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::{
        test_utils::{
            init_test_environment, message_pdu, related_pdu, test_event_id, test_room_id,
            test_user_id, MemoryStore,
        },
        Services,
    };

    fn services_with_store() -> (crate::Services, Arc<MemoryStore>) {
        init_test_environment();
        let store = MemoryStore::new();
        let services =
            Services::build(Arc::clone(&store), Config::default()).expect("valid test config");
        (services, store)
    }

    fn chunk_event_ids(chunk: &[Raw<AnyTimelineEvent>]) -> Vec<String> {
        chunk
            .iter()
            .map(|event| {
                let json: Value =
                    serde_json::from_str(event.json().get()).expect("event serializes");
                json["event_id"].as_str().expect("event id present").to_owned()
            })
            .collect()
    }

    /// Seeds two threads: t1 rooted by alice with a reply from alice at
    /// position 10, t2 rooted by bob with a reply from bob at position 20.
    fn seed_thread_room(store: &MemoryStore) {
        let room_id = test_room_id("threads");
        let alice = test_user_id("alice");
        let bob = test_user_id("bob");

        store
            .append(message_pdu("t1", &room_id, &alice, 1), StreamPosition::Live(1))
            .expect("store is writable");
        store
            .append(message_pdu("t2", &room_id, &bob, 2), StreamPosition::Live(2))
            .expect("store is writable");
        store
            .append(
                related_pdu("t1_reply", &room_id, &alice, 10, RelationType::Thread, &test_event_id("t1")),
                StreamPosition::Live(10),
            )
            .expect("store is writable");
        store
            .append(
                related_pdu("t2_reply", &room_id, &bob, 20, RelationType::Thread, &test_event_id("t2")),
                StreamPosition::Live(20),
            )
            .expect("store is writable");
    }

    /// Test: Verify threads list most recently active first
    #[test]
    fn test_threads_ordered_by_recency() {
        let (services, store) = services_with_store();
        seed_thread_room(&store);

        let response = services
            .rooms
            .threads
            .paginate_threads(
                &test_user_id("alice"),
                &test_room_id("threads"),
                &ThreadsQuery::default(),
            )
            .expect("query succeeds");

        assert_eq!(
            chunk_event_ids(&response.chunk),
            vec![
                test_event_id("t2").to_string(),
                test_event_id("t1").to_string(),
            ]
        );
        assert_eq!(response.next_batch, None);
    }

    /// Test: Verify the participation filter keeps only the user's threads
    #[test]
    fn test_participated_filter() {
        let (services, store) = services_with_store();
        seed_thread_room(&store);

        let response = services
            .rooms
            .threads
            .paginate_threads(
                &test_user_id("alice"),
                &test_room_id("threads"),
                &ThreadsQuery {
                    include: ThreadsInclude::Participated,
                    ..Default::default()
                },
            )
            .expect("query succeeds");

        assert_eq!(
            chunk_event_ids(&response.chunk),
            vec![test_event_id("t1").to_string()]
        );
    }

    /// Test: Verify the participation listing is a subset of the full one
    #[test]
    fn test_participated_is_subset_of_all() {
        let (services, store) = services_with_store();
        seed_thread_room(&store);

        let all = services
            .rooms
            .threads
            .paginate_threads(
                &test_user_id("bob"),
                &test_room_id("threads"),
                &ThreadsQuery::default(),
            )
            .expect("query succeeds");
        let participated = services
            .rooms
            .threads
            .paginate_threads(
                &test_user_id("bob"),
                &test_room_id("threads"),
                &ThreadsQuery {
                    include: ThreadsInclude::Participated,
                    ..Default::default()
                },
            )
            .expect("query succeeds");

        let all_ids = chunk_event_ids(&all.chunk);
        for id in chunk_event_ids(&participated.chunk) {
            assert!(all_ids.contains(&id), "{id} missing from the full listing");
        }
    }

    /// Test: Verify each root carries its bundled aggregation
    #[test]
    fn test_bundled_thread_summary() {
        let (services, store) = services_with_store();
        seed_thread_room(&store);
        let room_id = test_room_id("threads");
        store
            .append(
                related_pdu(
                    "t1_reply2",
                    &room_id,
                    &test_user_id("bob"),
                    30,
                    RelationType::Thread,
                    &test_event_id("t1"),
                ),
                StreamPosition::Live(30),
            )
            .expect("store is writable");

        let response = services
            .rooms
            .threads
            .paginate_threads(&test_user_id("alice"), &room_id, &ThreadsQuery::default())
            .expect("query succeeds");

        assert_eq!(
            chunk_event_ids(&response.chunk),
            vec![
                test_event_id("t1").to_string(),
                test_event_id("t2").to_string(),
            ]
        );

        let t1: Value =
            serde_json::from_str(response.chunk[0].json().get()).expect("event serializes");
        let summary = &t1["unsigned"]["m.relations"]["m.thread"];
        assert_eq!(summary["count"], 2);
        assert_eq!(summary["current_user_participated"], true);
        assert_eq!(
            summary["latest_event"]["event_id"],
            test_event_id("t1_reply2").to_string()
        );

        let t2: Value =
            serde_json::from_str(response.chunk[1].json().get()).expect("event serializes");
        let summary = &t2["unsigned"]["m.relations"]["m.thread"];
        assert_eq!(summary["count"], 1);
        assert_eq!(summary["current_user_participated"], false);
    }

    /// Test: Verify a token walk visits every thread exactly once
    #[test]
    fn test_thread_pagination_walk() {
        let (services, store) = services_with_store();
        seed_thread_room(&store);

        let mut collected = Vec::new();
        let mut from = None;
        loop {
            let response = services
                .rooms
                .threads
                .paginate_threads(
                    &test_user_id("alice"),
                    &test_room_id("threads"),
                    &ThreadsQuery {
                        limit: Some(1),
                        from: from.clone(),
                        ..Default::default()
                    },
                )
                .expect("query succeeds");

            assert!(response.chunk.len() <= 1);
            collected.extend(chunk_event_ids(&response.chunk));

            match response.next_batch {
                Some(token) => from = Some(token),
                None => break,
            }
        }

        assert_eq!(
            collected,
            vec![
                test_event_id("t2").to_string(),
                test_event_id("t1").to_string(),
            ]
        );
    }

    /// Test: Verify replyless self-related roots follow the configuration
    #[test]
    fn test_replyless_root_listing_is_configurable() {
        init_test_environment();
        let room_id = test_room_id("lonely");
        let alice = test_user_id("alice");

        let seed = |store: &MemoryStore| {
            store
                .append(
                    related_pdu("lonely", &room_id, &alice, 1, RelationType::Thread, &test_event_id("lonely")),
                    StreamPosition::Live(1),
                )
                .expect("store is writable");
        };

        let store = MemoryStore::new();
        seed(&store);
        let services =
            Services::build(Arc::clone(&store), Config::default()).expect("valid test config");
        let listed = services
            .rooms
            .threads
            .paginate_threads(&alice, &room_id, &ThreadsQuery::default())
            .expect("query succeeds");
        assert_eq!(
            chunk_event_ids(&listed.chunk),
            vec![test_event_id("lonely").to_string()]
        );
        let root: Value =
            serde_json::from_str(listed.chunk[0].json().get()).expect("event serializes");
        assert_eq!(root["unsigned"]["m.relations"]["m.thread"]["count"], 0);

        let store = MemoryStore::new();
        seed(&store);
        let config = Config {
            list_replyless_threads: false,
            ..Default::default()
        };
        let services = Services::build(Arc::clone(&store), config).expect("valid test config");
        let hidden = services
            .rooms
            .threads
            .paginate_threads(&alice, &room_id, &ThreadsQuery::default())
            .expect("query succeeds");
        assert!(hidden.chunk.is_empty());
    }

    /// Test: Verify malformed and wrong-kind cursors are rejected
    #[test]
    fn test_bad_from_tokens_rejected() {
        let (services, store) = services_with_store();
        seed_thread_room(&store);

        for token in ["garbage", "20"] {
            let result = services.rooms.threads.paginate_threads(
                &test_user_id("alice"),
                &test_room_id("threads"),
                &ThreadsQuery {
                    from: Some(token.to_owned()),
                    ..Default::default()
                },
            );

            assert!(
                matches!(result, Err(Error::MalformedToken(_))),
                "token {token:?} was accepted"
            );
        }
    }

    /// Test: Verify unsupported include values are rejected at the boundary
    #[test]
    fn test_unsupported_include_value() {
        assert_eq!(
            ThreadsInclude::try_from_string("all").ok(),
            Some(ThreadsInclude::All)
        );
        assert_eq!(
            ThreadsInclude::try_from_string("participated").ok(),
            Some(ThreadsInclude::Participated)
        );
        assert!(matches!(
            ThreadsInclude::try_from_string("mine"),
            Err(Error::InvalidPaginationBounds(_))
        ));
    }

    /// Test: Verify a zero limit is rejected before any store read
    #[test]
    fn test_zero_limit_rejected() {
        let (services, store) = services_with_store();
        store.set_unavailable();

        let result = services.rooms.threads.paginate_threads(
            &test_user_id("alice"),
            &test_room_id("threads"),
            &ThreadsQuery {
                limit: Some(0),
                ..Default::default()
            },
        );

        assert!(matches!(result, Err(Error::InvalidPaginationBounds(_))));
    }

    /// Test: Verify hidden roots stay out of the listing
    #[test]
    fn test_hidden_root_not_listed() {
        let (services, store) = services_with_store();
        seed_thread_room(&store);
        store.hide(&test_event_id("t2"));

        let response = services
            .rooms
            .threads
            .paginate_threads(
                &test_user_id("alice"),
                &test_room_id("threads"),
                &ThreadsQuery::default(),
            )
            .expect("query succeeds");

        assert_eq!(
            chunk_event_ids(&response.chunk),
            vec![test_event_id("t1").to_string()]
        );
    }

    /// Test: Verify threads never leak across rooms
    #[test]
    fn test_rooms_are_isolated() {
        let (services, store) = services_with_store();
        seed_thread_room(&store);

        let response = services
            .rooms
            .threads
            .paginate_threads(
                &test_user_id("alice"),
                &test_room_id("empty"),
                &ThreadsQuery::default(),
            )
            .expect("query succeeds");

        assert!(response.chunk.is_empty());
    }

    /// Test: Verify store failures surface as server errors
    #[test]
    fn test_store_unavailable_surfaces() {
        let (services, store) = services_with_store();
        seed_thread_room(&store);
        store.set_unavailable();

        let result = services.rooms.threads.paginate_threads(
            &test_user_id("alice"),
            &test_room_id("threads"),
            &ThreadsQuery::default(),
        );

        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
    }

    /// Test: Verify participation counts replies, not only root authorship
    #[test]
    fn test_participation_through_reply() {
        let (services, store) = services_with_store();
        seed_thread_room(&store);
        let room_id = test_room_id("threads");
        // Alice replies into bob's thread.
        store
            .append(
                related_pdu(
                    "t2_alice",
                    &room_id,
                    &test_user_id("alice"),
                    25,
                    RelationType::Thread,
                    &test_event_id("t2"),
                ),
                StreamPosition::Live(25),
            )
            .expect("store is writable");

        let response = services
            .rooms
            .threads
            .paginate_threads(
                &test_user_id("alice"),
                &room_id,
                &ThreadsQuery {
                    include: ThreadsInclude::Participated,
                    ..Default::default()
                },
            )
            .expect("query succeeds");

        assert_eq!(
            chunk_event_ids(&response.chunk),
            vec![
                test_event_id("t2").to_string(),
                test_event_id("t1").to_string(),
            ]
        );
    }
}
