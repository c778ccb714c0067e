//! ZMS REST client (§6): `GET monitor(id)`, `PUT monitor-state-op-status`,
//! bearer-token authenticated.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;

use crate::zms::models::{HeartbeatRequest, HeartbeatResponse, MonitorElaborated};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ZmsRestClient {
    base_url: String,
    bearer_token: String,
    http: Client,
}

impl ZmsRestClient {
    pub fn new(base_url: String, bearer_token: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building ZMS REST client")?;
        Ok(Self { base_url, bearer_token, http })
    }

    pub fn get_monitor(&self, monitor_id: &str) -> Result<MonitorElaborated> {
        let url = format!("{}/monitor/{monitor_id}", self.base_url);
        self.http
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned an error status"))?
            .json()
            .context("decoding monitor elaborated form")
    }

    pub fn put_op_status(&self, monitor_id: &str, body: &HeartbeatRequest) -> Result<HeartbeatResponse> {
        let url = format!("{}/monitor-state-op-status/{monitor_id}", self.base_url);
        self.http
            .put(&url)
            .bearer_auth(&self.bearer_token)
            .json(body)
            .send()
            .with_context(|| format!("PUT {url}"))?
            .error_for_status()
            .with_context(|| format!("PUT {url} returned an error status"))?
            .json()
            .context("decoding heartbeat response")
    }
}
