// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use sift_app::{ModerationAction, Record, RecordId};
use std::io::{BufRead, BufReader, Lines};
use std::time::Duration;

/// Blocking client for the record service. One instance is built at startup
/// and shared for the life of the process; requests carry the public access
/// key on every call.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    api_key: String,
    timeout: Duration,
    http: HttpClient,
    // Change feeds stay open indefinitely, so they go through a client that
    // only bounds connection setup.
    streaming: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("service.base_url must not be empty");
        }
        let parsed = url::Url::parse(&base_url)
            .with_context(|| format!("invalid service url {base_url:?}"))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            bail!("service.base_url must be http or https, got {base_url:?}");
        }
        if api_key.trim().is_empty() {
            bail!("service.api_key must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        let streaming = HttpClient::builder()
            .connect_timeout(timeout)
            .build()
            .context("build streaming HTTP client")?;

        Ok(Self {
            base_url,
            api_key: api_key.to_owned(),
            timeout,
            http,
            streaming,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches every row of the table, all columns, in service order.
    pub fn select_all(&self, table: &str) -> Result<Vec<Record>> {
        check_table_name(table)?;
        let response = self
            .authorized(
                self.http
                    .get(format!("{}/rest/v1/{table}?select=*", self.base_url)),
            )
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let records: Vec<Record> = response.json().context("decode record list")?;
        Ok(records)
    }

    /// Writes the status that results from `action` to a single row, matched
    /// by id. The service enforces nothing about the previous status; any
    /// terminal-state guard lives with the caller.
    pub fn update_status(&self, table: &str, id: RecordId, action: ModerationAction) -> Result<()> {
        check_table_name(table)?;
        let response = self
            .authorized(
                self.http
                    .patch(format!("{}/rest/v1/{table}?id=eq.{id}", self.base_url)),
            )
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "status": action.resulting_status() }))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(())
    }

    /// Opens the change feed for a table. The returned stream blocks on the
    /// underlying socket, so callers read it from a dedicated thread.
    pub fn subscribe(&self, table: &str) -> Result<ChangeStream> {
        check_table_name(table)?;
        let response = self
            .authorized(
                self.streaming
                    .get(format!("{}/realtime/v1/changes?table={table}", self.base_url)),
            )
            .header("Accept", "text/event-stream")
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        Ok(ChangeStream {
            done: false,
            lines: BufReader::new(response).lines(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One row-change notification from the service. Only enough to know the
/// table was touched; the view re-fetches rather than patching in place.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub op: ChangeOp,
}

pub struct ChangeStream {
    done: bool,
    lines: Lines<BufReader<Response>>,
}

impl Iterator for ChangeStream {
    type Item = Result<ChangeEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Ok(line)) => line,
                Some(Err(error)) => {
                    self.done = true;
                    return Some(Err(error).context("read change feed"));
                }
            };

            // Heartbeats arrive as comment lines; event names are irrelevant.
            let trimmed = line.trim();
            if !trimmed.starts_with("data: ") {
                continue;
            }

            let payload = trimmed.trim_start_matches("data: ");
            let event: ChangeEvent = match serde_json::from_str(payload) {
                Ok(event) => event,
                Err(error) => {
                    self.done = true;
                    return Some(Err(error).context("decode change event"));
                }
            };

            return Some(Ok(event));
        }
    }
}

fn check_table_name(table: &str) -> Result<()> {
    if !is_safe_identifier(table) {
        bail!("invalid table name {table:?}");
    }
    Ok(())
}

fn is_safe_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!("cannot reach {} -- check service.base_url ({})", base_url, error)
}

// The service reports failures as {"message": "..."}; that text goes to the
// caller verbatim because the toast shows it word for word.
fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ServiceErrorEnvelope>(body)
        && let Some(message) = parsed.message
        && !message.is_empty()
    {
        return anyhow!("{message}");
    }

    if body.len() < 100 && !body.is_empty() && !body.contains('{') {
        return anyhow!("{}", body.trim());
    }

    anyhow!("service returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct ServiceErrorEnvelope {
    message: Option<String>,
}
