//! Test module for clisync-core
//!
//! This module contains tests for:
//! - Session reconciliation (reuse, retirement, handshake failures, events)
//! - Index synchronization (status lines, retries, ordering)
//! - Configuration loading and defaults

mod fixtures;
