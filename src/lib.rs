// =============================================================================
// Matrixon Matrix NextServer - Library Crate
// =============================================================================
//
// Project: Matrixon - Ultra High Performance Matrix NextServer (Synapse Alternative)
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Date: 2024-12-11
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// Description:
//   Relation query and thread aggregation engine for the Matrixon Matrix
//   server: resolves the events related to a parent event and the threads of
//   a room, with stateless cursor pagination over the room ordering.
//
// =============================================================================

pub use ruma;

pub mod config;
pub mod service;
pub mod test_utils;
pub mod utils;

pub use config::Config;
pub use service::{pdu::PduEvent, Services};
pub use utils::error::{Error, Result};
