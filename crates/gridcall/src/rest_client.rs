//! HTTP clients for room allocation and inviting the AI participant.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

/// Response from the room-allocation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCreated {
    /// Identifier of the new room.
    #[serde(rename = "roomId")]
    pub room_id: String,
}

/// Body sent to the agent join endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPlayerRequest {
    /// Room the agent should join.
    pub meeting_id: String,
    /// Access credential the agent uses for the room.
    pub token: String,
}

/// Plain `{ "message": ... }` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable result.
    pub message: String,
}

impl MessageResponse {
    /// Wraps `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Allocates rooms from the conferencing provider.
#[derive(Debug, Clone)]
pub struct RoomClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl RoomClient {
    /// Creates a client for the API at `base_url`.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    /// Allocates a new room and returns its ID.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn create_room(&self) -> Result<String> {
        let url = format!("{}/v2/rooms", self.base_url);
        debug!(url = %url, "Requesting room");

        let mut request = self.client.post(&url);
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach room API at {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Room creation rejected");
            anyhow::bail!("Room creation failed with {}: {}", status, body);
        }

        let created: RoomCreated = response
            .json()
            .await
            .context("Room API returned an unexpected body")?;
        info!(room_id = %created.room_id, "Room created");
        Ok(created.room_id)
    }
}

/// Asks the agent endpoint to put the AI participant into a room.
#[derive(Debug, Clone)]
pub struct AgentInviter {
    endpoint: String,
    client: reqwest::Client,
}

impl AgentInviter {
    /// Creates an inviter for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Invites the agent into `meeting_id`. Not retried.
    #[instrument(skip(self, token), fields(endpoint = %self.endpoint))]
    pub async fn invite(&self, meeting_id: &str, token: &str) -> Result<String> {
        let body = JoinPlayerRequest {
            meeting_id: meeting_id.to_string(),
            token: token.to_string(),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach agent endpoint {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Agent invite rejected");
            anyhow::bail!("Agent invite failed with {}: {}", status, body);
        }

        let reply: MessageResponse = response
            .json()
            .await
            .context("Agent endpoint returned an unexpected body")?;
        info!(message = %reply.message, "Agent invited");
        Ok(reply.message)
    }
}
