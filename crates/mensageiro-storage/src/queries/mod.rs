// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions. Each takes a `&Database` and runs on its writer thread.

pub mod chat_config;
pub mod transactions;
