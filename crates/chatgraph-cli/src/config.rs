//! Connection and dataset settings shared by every subcommand.
//!
//! Flags win over environment variables, which win over defaults.

use anyhow::{anyhow, Context, Result};
use chatgraph_dgraph::{ClientConfig, DEFAULT_DGRAPH_URL};
use chatgraph_ingest_csv::DataSet;
use chatgraph_schema::SchemaV1;
use clap::Args;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DGRAPH_URL_ENV: &str = "DGRAPH_URL";
pub const DGRAPH_AUTH_TOKEN_ENV: &str = "DGRAPH_AUTH_TOKEN";

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Dgraph alpha HTTP endpoint [env: DGRAPH_URL] [default: http://localhost:8080]
    #[arg(long, global = true)]
    pub dgraph_url: Option<String>,

    /// Value for the `X-Dgraph-AuthToken` header [env: DGRAPH_AUTH_TOKEN]
    #[arg(long, global = true)]
    pub auth_token: Option<String>,

    /// Per-request timeout; 0 disables it
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Directory holding users.csv, groups.csv, messages.csv and statuses.csv
    #[arg(long, global = true, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Schema artifact (JSON, `chatgraph_schema_v1`); defaults to the built-in schema
    #[arg(long, global = true)]
    pub schema: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn client_config(&self) -> ClientConfig {
        let url = self
            .dgraph_url
            .clone()
            .or_else(|| env::var(DGRAPH_URL_ENV).ok())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DGRAPH_URL.to_string());
        let token = self
            .auth_token
            .clone()
            .or_else(|| env::var(DGRAPH_AUTH_TOKEN_ENV).ok());
        let timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));

        ClientConfig::new(url)
            .with_timeout(timeout)
            .with_auth_token(token)
    }

    pub fn dataset(&self) -> DataSet {
        DataSet::from_dir(&self.data_dir)
    }

    pub fn load_schema(&self) -> Result<SchemaV1> {
        let Some(path) = &self.schema else {
            return Ok(SchemaV1::chat_v1());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read schema {}", path.display()))?;
        SchemaV1::from_json_str(&text).map_err(|e| anyhow!("{}: {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = ConnectionArgs {
            dgraph_url: Some("dgraph:8080".to_string()),
            auth_token: Some("secret".to_string()),
            timeout_secs: 0,
            data_dir: PathBuf::from("fixtures"),
            schema: None,
        };
        let config = args.client_config();
        assert_eq!(config.url, "dgraph:8080");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert!(config.timeout.is_none());
        assert_eq!(args.dataset().users, PathBuf::from("fixtures/users.csv"));
    }

    #[test]
    fn schema_file_must_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let mut schema = SchemaV1::chat_v1();
        schema.version = "v0".to_string();
        fs::write(&path, serde_json::to_string(&schema).unwrap()).unwrap();

        let args = ConnectionArgs {
            schema: Some(path),
            ..ConnectionArgs::default()
        };
        assert!(args.load_schema().is_err());
        assert_eq!(
            ConnectionArgs::default().load_schema().unwrap(),
            SchemaV1::chat_v1()
        );
    }
}
