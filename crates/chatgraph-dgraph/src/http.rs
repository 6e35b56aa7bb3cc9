//! Dgraph over HTTP (blocking).
//!
//! Transactions follow the HTTP protocol: the first request of a transaction
//! gets a `start_ts` from the server; later requests pass it back as
//! `startTs`; mutations return conflict `keys`/`preds` which are sent with the
//! commit. Aborting is `/commit?startTs=N&abort=true`.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::{Assigned, DgraphError, GraphClient, Mutation, Operation, Transaction, Uid, Variables};

pub const DEFAULT_DGRAPH_URL: &str = "http://localhost:8080";

/// Header carrying the alpha `--security token=` secret.
const AUTH_TOKEN_HEADER: &str = "X-Dgraph-AuthToken";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub timeout: Option<Duration>,
    pub auth_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DGRAPH_URL.to_string(),
            timeout: Some(Duration::from_secs(30)),
            auth_token: None,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.trim().is_empty());
        self
    }
}

/// Accept `host:port` as well as full URLs; drop trailing slashes.
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Shared request plumbing for the client and its transactions.
#[derive(Clone)]
struct Endpoint {
    base_url: String,
    http: Client,
}

enum Body<'a> {
    Json(&'a Value),
    Text(&'a str),
}

impl Endpoint {
    fn post(&self, path: &str, body: Body<'_>) -> Result<Value, DgraphError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "dgraph request");

        let request = match body {
            Body::Json(value) => self.http.post(&url).json(value),
            Body::Text(text) => self
                .http
                .post(&url)
                .header(CONTENT_TYPE, "application/dql")
                .body(text.to_string()),
        };
        let resp = request.send().map_err(|e| DgraphError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;
        read_response(resp)
    }

    fn get(&self, path: &str) -> Result<Value, DgraphError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self.http.get(&url).send().map_err(|e| DgraphError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;
        read_response(resp)
    }
}

fn read_response(resp: reqwest::blocking::Response) -> Result<Value, DgraphError> {
    let status = resp.status();
    let text = resp.text().map_err(|e| DgraphError::Decode(e.to_string()))?;
    if !status.is_success() {
        return Err(DgraphError::Http {
            status: status.as_u16(),
            body: text,
        });
    }
    let value: Value =
        serde_json::from_str(&text).map_err(|e| DgraphError::Decode(format!("{e}: {text}")))?;
    check_errors(&value)?;
    Ok(value)
}

/// Dgraph reports request failures as `{"errors": [{"message": ...}]}` with a
/// 200 status.
fn check_errors(value: &Value) -> Result<(), DgraphError> {
    let Some(errors) = value.get("errors").and_then(Value::as_array) else {
        return Ok(());
    };
    if errors.is_empty() {
        return Ok(());
    }
    let messages = errors
        .iter()
        .map(|e| {
            e.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string())
        })
        .collect();
    Err(DgraphError::Server { messages })
}

pub struct HttpClient {
    endpoint: Endpoint,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, DgraphError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.auth_token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| DgraphError::Decode(format!("invalid auth token: {e}")))?;
            headers.insert(AUTH_TOKEN_HEADER, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let base_url = normalize_base_url(&config.url);
        let http = builder.build().map_err(|e| DgraphError::Transport {
            url: base_url.clone(),
            message: format!("failed to build http client: {e}"),
        })?;

        Ok(Self {
            endpoint: Endpoint { base_url, http },
        })
    }

    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }

    /// `GET /health`; used to fail fast before a long load.
    pub fn health(&self) -> Result<Value, DgraphError> {
        self.endpoint.get("/health")
    }
}

impl GraphClient for HttpClient {
    type Txn = HttpTxn;

    fn alter(&self, op: &Operation) -> Result<(), DgraphError> {
        match op {
            Operation::Schema(schema) => self.endpoint.post("/alter", Body::Text(schema))?,
            Operation::DropAll => self
                .endpoint
                .post("/alter", Body::Json(&json!({ "drop_all": true })))?,
        };
        Ok(())
    }

    fn txn(&self) -> HttpTxn {
        HttpTxn::new(self.endpoint.clone(), false)
    }

    fn read_only_txn(&self) -> HttpTxn {
        HttpTxn::new(self.endpoint.clone(), true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Open,
    Committed,
    Discarded,
}

#[derive(Debug, Default, Deserialize)]
struct TxnExtensions {
    #[serde(default)]
    start_ts: u64,
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    preds: Vec<String>,
}

pub struct HttpTxn {
    endpoint: Endpoint,
    read_only: bool,
    start_ts: Option<u64>,
    keys: Vec<String>,
    preds: Vec<String>,
    state: TxnState,
}

impl HttpTxn {
    fn new(endpoint: Endpoint, read_only: bool) -> Self {
        Self {
            endpoint,
            read_only,
            start_ts: None,
            keys: Vec::new(),
            preds: Vec::new(),
            state: TxnState::Open,
        }
    }

    pub fn start_ts(&self) -> Option<u64> {
        self.start_ts
    }

    fn ensure_open(&self) -> Result<(), DgraphError> {
        match self.state {
            TxnState::Open => Ok(()),
            TxnState::Committed => Err(DgraphError::Finished("committed")),
            TxnState::Discarded => Err(DgraphError::Finished("discarded")),
        }
    }

    fn absorb_extensions(&mut self, resp: &Value) -> Result<(), DgraphError> {
        let Some(txn) = resp.pointer("/extensions/txn") else {
            return Ok(());
        };
        let ext: TxnExtensions = serde_json::from_value(txn.clone())
            .map_err(|e| DgraphError::Decode(format!("bad txn extensions: {e}")))?;

        match self.start_ts {
            None if ext.start_ts != 0 => self.start_ts = Some(ext.start_ts),
            Some(ts) if ext.start_ts != 0 && ext.start_ts != ts => {
                return Err(DgraphError::Decode(format!(
                    "start_ts changed mid-transaction ({ts} -> {})",
                    ext.start_ts
                )))
            }
            _ => {}
        }
        for key in ext.keys {
            if !self.keys.contains(&key) {
                self.keys.push(key);
            }
        }
        for pred in ext.preds {
            if !self.preds.contains(&pred) {
                self.preds.push(pred);
            }
        }
        Ok(())
    }
}

impl Transaction for HttpTxn {
    fn query(&mut self, query: &str, vars: &Variables) -> Result<Value, DgraphError> {
        self.ensure_open()?;

        let mut params = Vec::new();
        if let Some(ts) = self.start_ts {
            params.push(format!("startTs={ts}"));
        }
        if self.read_only {
            params.push("ro=true".to_string());
        }
        let path = if params.is_empty() {
            "/query".to_string()
        } else {
            format!("/query?{}", params.join("&"))
        };

        let body = json!({ "query": query, "variables": vars });
        let resp = self.endpoint.post(&path, Body::Json(&body))?;
        if !self.read_only {
            self.absorb_extensions(&resp)?;
        }
        Ok(resp.get("data").cloned().unwrap_or(Value::Null))
    }

    fn mutate(&mut self, mutation: &Mutation) -> Result<Assigned, DgraphError> {
        self.ensure_open()?;
        if self.read_only {
            return Err(DgraphError::ReadOnly("mutate"));
        }
        if mutation.is_empty() {
            return Ok(Assigned::default());
        }

        let path = match self.start_ts {
            Some(ts) => format!("/mutate?startTs={ts}"),
            None => "/mutate".to_string(),
        };
        let body = serde_json::to_value(mutation).map_err(|e| DgraphError::Decode(e.to_string()))?;
        let resp = self.endpoint.post(&path, Body::Json(&body))?;
        self.absorb_extensions(&resp)?;

        let mut assigned = Assigned::default();
        if let Some(uids) = resp.pointer("/data/uids").and_then(Value::as_object) {
            for (blank, uid) in uids {
                let uid = uid
                    .as_str()
                    .ok_or_else(|| DgraphError::Decode(format!("uid for `{blank}` is not a string")))?;
                assigned.uids.insert(blank.clone(), Uid::new(uid));
            }
        }
        Ok(assigned)
    }

    fn commit(&mut self) -> Result<(), DgraphError> {
        self.ensure_open()?;
        if self.read_only {
            return Err(DgraphError::ReadOnly("commit"));
        }
        let Some(ts) = self.start_ts else {
            // Nothing was sent; there is nothing to commit.
            self.state = TxnState::Committed;
            return Ok(());
        };

        let body = json!({ "keys": self.keys, "preds": self.preds });
        self.endpoint
            .post(&format!("/commit?startTs={ts}"), Body::Json(&body))?;
        self.state = TxnState::Committed;
        Ok(())
    }

    fn discard(&mut self) -> Result<(), DgraphError> {
        if self.state != TxnState::Open {
            return Ok(());
        }
        self.state = TxnState::Discarded;
        match self.start_ts {
            Some(ts) if !self.read_only => {
                self.endpoint.post(
                    &format!("/commit?startTs={ts}&abort=true"),
                    Body::Json(&json!({})),
                )?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
