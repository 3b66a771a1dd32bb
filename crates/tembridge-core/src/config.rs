// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Plugin-level configuration.
//!
//! Consumed by the surrounding plugin that wires the Temporal client and the
//! worker pools; owned here so host and plugin agree on one schema.

use serde::{Deserialize, Serialize};

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Temporal frontend address.
    pub address: String,
    /// Temporal namespace.
    pub namespace: String,
    /// Activity worker pool sizing.
    pub activities: PoolConfig,
    /// Grace period for worker shutdown, in milliseconds.
    pub graceful_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7233".to_string(),
            namespace: "default".to_string(),
            activities: PoolConfig::default(),
            graceful_timeout_ms: 30_000,
        }
    }
}

/// Worker pool sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker processes; 0 lets the pool pick one per CPU.
    pub num_workers: u64,
    /// Max executions per worker before recycling; 0 disables recycling.
    pub max_jobs: u64,
    /// Worker allocation timeout, in milliseconds.
    pub allocate_timeout_ms: u64,
    /// Worker destroy timeout, in milliseconds.
    pub destroy_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 0,
            max_jobs: 0,
            allocate_timeout_ms: 60_000,
            destroy_timeout_ms: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.address, "127.0.0.1:7233");
        assert_eq!(config.namespace, "default");
        assert_eq!(config.graceful_timeout_ms, 30_000);
        assert_eq!(config.activities.num_workers, 0);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{"address": "temporal.prod:7233", "activities": {"num_workers": 8}}"#,
        )
        .unwrap();
        assert_eq!(config.address, "temporal.prod:7233");
        assert_eq!(config.namespace, "default");
        assert_eq!(config.activities.num_workers, 8);
        assert_eq!(config.activities.allocate_timeout_ms, 60_000);
    }
}
