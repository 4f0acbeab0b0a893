// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous media processing for Mensageiro.
//!
//! [`MediaQueueClient`] is what the dispatcher talks to. [`WorkerPool`] is the
//! in-process queue behind it and [`MediaJobProcessor`] runs each job against
//! the AI backend.

pub mod client;
pub mod pool;
pub mod processor;

pub use client::MediaQueueClient;
pub use pool::{JobProcessor, WorkerPool, WorkerPoolConfig};
pub use processor::MediaJobProcessor;
