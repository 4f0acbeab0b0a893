// SPDX-FileCopyrightText: 2026 Mensageiro Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait shared by every collaborator adapter.

use async_trait::async_trait;

use crate::error::MensageiroError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, health and lifecycle of an adapter instance.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Human-readable name of this adapter instance.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    async fn health_check(&self) -> Result<HealthStatus, MensageiroError>;

    /// Releases held resources. Called once during graceful shutdown.
    async fn shutdown(&self) -> Result<(), MensageiroError>;
}
