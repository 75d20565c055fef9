// =============================================================================
// Matrixon Matrix NextServer - Pdu Module
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

use std::{collections::BTreeMap, sync::Arc};

use ruma::{
    events::{relation::BundledThread, AnyMessageLikeEvent, AnyTimelineEvent, TimelineEventType},
    serde::Raw,
    EventId, OwnedRoomId, OwnedUserId, UInt,
};
use serde::{Deserialize, Serialize};
use serde_json::{
    json,
    value::{to_raw_value, RawValue as RawJsonValue},
};

use crate::{Error, Result};

/// A stored room event, in the shape the event store hands out.
///
/// Only the fields the relation and thread engines read are carried here;
/// graph-authentication data (prev events, hashes, signatures) stays inside
/// the store.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PduEvent {
    pub event_id: Arc<EventId>,
    pub room_id: OwnedRoomId,
    pub sender: OwnedUserId,
    pub origin_server_ts: UInt,
    #[serde(rename = "type")]
    pub kind: TimelineEventType,
    pub content: Box<RawJsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsigned: Option<Box<RawJsonValue>>,
}

impl PduEvent {
    /// Strips the sender-local transaction id from `unsigned`.
    ///
    /// Transaction ids are private to the sending client; they must not leak
    /// to other users.
    #[tracing::instrument(skip(self))]
    pub fn remove_transaction_id(&mut self) -> Result<()> {
        if let Some(unsigned) = &self.unsigned {
            let mut unsigned: BTreeMap<String, Box<RawJsonValue>> =
                serde_json::from_str(unsigned.get())
                    .map_err(|_| Error::bad_database("Invalid unsigned in pdu event"))?;
            unsigned.remove("transaction_id");
            self.unsigned = Some(to_raw_value(&unsigned).expect("unsigned is valid"));
        }

        Ok(())
    }

    /// Replaces the bundled thread aggregation under
    /// `unsigned.m.relations.m.thread`, keeping any other unsigned data.
    #[tracing::instrument(skip(self, thread))]
    pub fn set_bundled_thread(&mut self, thread: &BundledThread) -> Result<()> {
        let mut unsigned: BTreeMap<String, serde_json::Value> = self
            .unsigned
            .as_ref()
            .map(|unsigned| serde_json::from_str(unsigned.get()))
            .transpose()
            .map_err(|_| Error::bad_database("Invalid unsigned in pdu event"))?
            .unwrap_or_default();

        let thread = serde_json::to_value(thread)
            .map_err(|_| Error::bad_database("Invalid bundled thread aggregation"))?;
        let relations = unsigned
            .entry("m.relations".to_owned())
            .or_insert_with(|| json!({}));
        match relations.as_object_mut() {
            Some(relations) => {
                relations.insert("m.thread".to_owned(), thread);
            }
            None => *relations = json!({ "m.thread": thread }),
        }

        self.unsigned = Some(to_raw_value(&unsigned).expect("unsigned is valid"));

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn to_room_event(&self) -> Raw<AnyTimelineEvent> {
        let mut json = json!({
            "content": self.content,
            "type": self.kind,
            "event_id": self.event_id,
            "sender": self.sender,
            "origin_server_ts": self.origin_server_ts,
            "room_id": self.room_id,
        });

        if let Some(unsigned) = &self.unsigned {
            json["unsigned"] = json!(unsigned);
        }

        serde_json::from_value(json).expect("Raw::from_value always works")
    }

    #[tracing::instrument(skip(self))]
    pub fn to_message_like_event(&self) -> Raw<AnyMessageLikeEvent> {
        let mut json = json!({
            "content": self.content,
            "type": self.kind,
            "event_id": self.event_id,
            "sender": self.sender,
            "origin_server_ts": self.origin_server_ts,
            "room_id": self.room_id,
        });

        if let Some(unsigned) = &self.unsigned {
            json["unsigned"] = json!(unsigned);
        }

        serde_json::from_value(json).expect("Raw::from_value always works")
    }
}
