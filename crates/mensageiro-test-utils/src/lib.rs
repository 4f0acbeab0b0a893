// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Mensageiro integration tests.
//!
//! - [`MockPlatform`]: scripted chat platform that captures outbound messages
//! - [`MockAiBackend`]: AI backend answering from a FIFO of outcomes
//! - [`TestHarness`]: the real dispatcher wired to both, over memory or SQLite stores

pub mod harness;
pub mod mock_ai;
pub mod mock_platform;

pub use harness::{
    TestHarness, TestHarnessBuilder, group_event, media_event, media_payload, text_event,
};
pub use mock_ai::{MockAiBackend, MockOutcome};
pub use mock_platform::MockPlatform;
