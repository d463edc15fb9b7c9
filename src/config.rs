// This file is part of TRINCI.
//
// Copyright (C) 2021 Affidaty Spa.
//
// TRINCI is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// TRINCI is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with TRINCI. If not, see <https://www.gnu.org/licenses/>.

//! Client configuration.

use crate::{broadcast::BroadcastConfig, deliver::DeliverConfig, Error, ErrorKind, Result};
use std::{fs, path::Path};

/// Default membership service provider identifier.
pub const DEFAULT_MSP_ID: &str = "DEFAULT";

fn default_msp_id() -> String {
    DEFAULT_MSP_ID.to_owned()
}

/// Whole client configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Ordering service address (`host:port`).
    pub orderer: String,
    /// Database folder.
    pub db_path: String,
    /// Membership service provider of the local signer.
    #[serde(default = "default_msp_id")]
    pub msp_id: String,
    pub deliver: DeliverConfig,
    pub broadcast: BroadcastConfig,
}

impl ClientConfig {
    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))
    }

    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref()).map_err(|err| {
            Error::new_ext(
                ErrorKind::ResourceNotFound,
                format!("{}: {}", path.as_ref().display(), err),
            )
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deliver::{DEFAULT_QUEUE_BOUND, DEFAULT_TX_PER_BLOCK, DEFAULT_WORKERS};
    use std::io::Write;

    const FULL_CONFIG: &str = r#"{
        "orderer": "127.0.0.1:7050",
        "db_path": "/tmp/ote-db",
        "msp_id": "Org1MSP",
        "deliver": {
            "channel_id": "mychannel",
            "tx_per_block": 100,
            "workers": 8,
            "queue_bound": 16
        },
        "broadcast": {
            "channel_id": "mychannel",
            "client_id": "client-1"
        }
    }"#;

    const MINIMAL_CONFIG: &str = r#"{
        "orderer": "orderer.example.com:7050",
        "db_path": "db",
        "deliver": { "channel_id": "a" },
        "broadcast": { "channel_id": "b" }
    }"#;

    #[test]
    fn full_config() {
        let config = ClientConfig::from_json(FULL_CONFIG).unwrap();

        assert_eq!(config.orderer, "127.0.0.1:7050");
        assert_eq!(config.msp_id, "Org1MSP");
        assert_eq!(config.deliver.tx_per_block, 100);
        assert_eq!(config.deliver.workers, 8);
        assert_eq!(config.deliver.queue_bound, 16);
        assert_eq!(config.broadcast.client_id, "client-1");
    }

    #[test]
    fn minimal_config_defaults() {
        let config = ClientConfig::from_json(MINIMAL_CONFIG).unwrap();

        assert_eq!(config.msp_id, DEFAULT_MSP_ID);
        assert_eq!(config.deliver, DeliverConfig::new("a"));
        assert_eq!(config.deliver.tx_per_block, DEFAULT_TX_PER_BLOCK);
        assert_eq!(config.deliver.workers, DEFAULT_WORKERS);
        assert_eq!(config.deliver.queue_bound, DEFAULT_QUEUE_BOUND);
        assert_eq!(config.broadcast.client_id, "");
    }

    #[test]
    fn missing_field() {
        let err = ClientConfig::from_json(r#"{ "orderer": "x" }"#).unwrap_err();

        assert_eq!(err.kind, ErrorKind::MalformedData);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = ClientConfig::load(file.path()).unwrap();

        assert_eq!(config.deliver.channel_id, "mychannel");
    }

    #[test]
    fn load_missing_file() {
        let err = ClientConfig::load("/nonexistent/ote.json").unwrap_err();

        assert_eq!(err.kind, ErrorKind::ResourceNotFound);
    }
}
