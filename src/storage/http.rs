//! HTTP record store speaking the backend's JSON action API.
//!
//! Every call is a `POST` to the endpoint with a JSON body naming the
//! action:
//!
//! ```json
//! {"action": "record:query", "api_key": "...", "record_type": "user", "predicate": [...]}
//! ```
//!
//! Responses carry either `result` or `error: {code, name, message}`.

use super::traits::{BackendError, RecordQuery, RecordStore, SaveOutcome};
use crate::models::{FetchedRecord, Record};
use crate::schema::Schema;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::instrument;

/// Database queried for records; spans public and private databases.
const QUERY_DATABASE: &str = "_union";

/// Record store backed by the remote HTTP API.
pub struct HttpRecordStore {
    endpoint: String,
    api_key: SecretString,
    database_id: String,
    client: reqwest::blocking::Client,
}

impl HttpRecordStore {
    /// Default database records are saved to.
    pub const DEFAULT_DATABASE: &'static str = "_public";

    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a store for `endpoint` authenticating with the master `api_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, api_key: SecretString) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            database_id: Self::DEFAULT_DATABASE.to_string(),
            client: build_http_client(Self::DEFAULT_TIMEOUT)?,
        })
    }

    /// Sets the database records are saved to.
    #[must_use]
    pub fn with_database_id(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    /// Sets the request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be rebuilt.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_http_client(timeout)?;
        Ok(self)
    }

    fn request(&self, action: &str, payload: Map<String, Value>) -> Result<Value> {
        let operation = action.replace(':', "_");
        let mut body = payload;
        body.insert("action".to_string(), json!(action));
        body.insert("api_key".to_string(), json!(self.api_key.expose_secret()));

        metrics::counter!("recordport_backend_requests_total", "action" => action.to_string())
            .increment(1);

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Skygear-Api-Key", self.api_key.expose_secret())
            .json(&Value::Object(body))
            .send()
            .map_err(|e| {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else if e.is_request() {
                    "request"
                } else {
                    "unknown"
                };
                tracing::error!(
                    action,
                    error = %e,
                    error_kind,
                    "Backend request failed"
                );
                Error::operation(&operation, format!("{error_kind} error: {e}"))
            })?;

        let status = response.status();
        let payload: Value = response.json().map_err(|e| {
            tracing::error!(action, status = %status, error = %e, "Failed to parse backend response");
            Error::operation(&operation, format!("invalid response ({status}): {e}"))
        })?;

        if let Some(error) = payload.get("error") {
            let error = decode_backend_error(error);
            tracing::error!(
                action,
                status = %status,
                code = error.code,
                name = %error.name,
                "Backend returned an error"
            );
            return Err(Error::operation(&operation, error));
        }
        if !status.is_success() {
            tracing::error!(action, status = %status, "Backend returned error status");
            return Err(Error::operation(&operation, format!("status {status}")));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| Error::operation(&operation, "response has no result"))
    }
}

impl RecordStore for HttpRecordStore {
    #[instrument(skip(self))]
    fn fetch_schema(&self) -> Result<Schema> {
        let result = self.request("schema:fetch", Map::new())?;
        Schema::from_wire(&result)
    }

    #[instrument(skip(self, query), fields(record_type = %query.record_type))]
    fn query(&self, query: &RecordQuery) -> Result<Vec<FetchedRecord>> {
        let includes: Map<String, Value> = query
            .includes
            .iter()
            .map(|name| (name.clone(), json!({"$type": "keypath", "$val": name})))
            .collect();

        let mut payload = Map::new();
        payload.insert("record_type".to_string(), json!(query.record_type));
        payload.insert("database_id".to_string(), json!(QUERY_DATABASE));
        payload.insert("include".to_string(), Value::Object(includes));
        payload.insert(
            "predicate".to_string(),
            query.predicate.as_ref().map_or(Value::Null, |p| p.to_wire()),
        );

        let result = self.request("record:query", payload)?;
        let records = result
            .as_array()
            .ok_or_else(|| Error::operation("record_query", "result is not a list"))?;
        records.iter().map(Record::from_wire).collect()
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    fn save(&self, records: &[Record], atomic: bool) -> Result<Vec<SaveOutcome>> {
        let mut payload = Map::new();
        payload.insert("database_id".to_string(), json!(self.database_id));
        payload.insert(
            "records".to_string(),
            Value::Array(records.iter().map(Record::to_wire).collect()),
        );
        payload.insert("atomic".to_string(), json!(atomic));

        let result = self.request("record:save", payload)?;
        let items = result
            .as_array()
            .ok_or_else(|| Error::operation("record_save", "result is not a list"))?;
        if items.len() != records.len() {
            return Err(Error::operation(
                "record_save",
                format!("expected {} results, got {}", records.len(), items.len()),
            ));
        }
        items.iter().map(decode_save_item).collect()
    }
}

impl std::fmt::Debug for HttpRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRecordStore")
            .field("endpoint", &self.endpoint)
            .field("database_id", &self.database_id)
            .finish_non_exhaustive()
    }
}

/// Builds the blocking client shared by backend and document requests.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
        .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))
}

fn decode_backend_error(value: &Value) -> BackendError {
    BackendError {
        code: value
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or_default(),
        name: value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("UnexpectedError")
            .to_string(),
        message: value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

fn decode_save_item(item: &Value) -> Result<SaveOutcome> {
    if item.get("_type").and_then(Value::as_str) == Some("error") {
        return Ok(Err(decode_backend_error(item)));
    }
    Record::from_wire(item).map(|fetched| Ok(fetched.record))
}
