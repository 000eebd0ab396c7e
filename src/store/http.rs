use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{
    CreateProfileRequest, MatchPatch, MatchStore, StoreError, StoreResult, UpdateGuard,
    UpdateRequest,
};
use crate::types::{LeaderboardEntry, Match, MatchSummary, NewMatch, Profile};

/// `MatchStore` implementation speaking to a remote gridlock service. Status
/// codes carry the store semantics: 404 is `NotFound`, 409 is
/// `ConditionFailed`, anything else non-2xx is a transport failure.
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> StoreResult<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| StoreError::Transport(format!("invalid response body: {e}")));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            Err(StoreError::NotFound)
        } else if status == reqwest::StatusCode::CONFLICT {
            Err(StoreError::ConditionFailed)
        } else {
            Err(StoreError::Transport(format!("unexpected status {status}")))
        }
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

#[async_trait]
impl MatchStore for HttpStore {
    async fn get_match(&self, id: &str) -> StoreResult<Match> {
        let response = self
            .client
            .get(self.url(&format!("/api/matches/{id}")))
            .send()
            .await
            .map_err(transport)?;
        Self::decode(response).await
    }

    async fn insert_match(&self, new: NewMatch) -> StoreResult<Match> {
        let response = self
            .client
            .post(self.url("/api/matches"))
            .json(&new)
            .send()
            .await
            .map_err(transport)?;
        Self::decode(response).await
    }

    async fn update_match(
        &self,
        id: &str,
        guard: UpdateGuard,
        patch: MatchPatch,
    ) -> StoreResult<Match> {
        let response = self
            .client
            .patch(self.url(&format!("/api/matches/{id}")))
            .json(&UpdateRequest { guard, patch })
            .send()
            .await
            .map_err(transport)?;
        Self::decode(response).await
    }

    async fn list_waiting(&self, excluding: &str) -> StoreResult<Vec<MatchSummary>> {
        let response = self
            .client
            .get(self.url("/api/matches"))
            .query(&[("exclude", excluding)])
            .send()
            .await
            .map_err(transport)?;
        Self::decode(response).await
    }

    async fn create_profile(&self, username: &str) -> StoreResult<Profile> {
        let response = self
            .client
            .post(self.url("/api/profiles"))
            .json(&CreateProfileRequest {
                username: username.to_string(),
            })
            .send()
            .await
            .map_err(transport)?;
        Self::decode(response).await
    }

    async fn get_profile(&self, id: &str) -> StoreResult<Profile> {
        let response = self
            .client
            .get(self.url(&format!("/api/profiles/{id}")))
            .send()
            .await
            .map_err(transport)?;
        Self::decode(response).await
    }

    async fn leaderboard(&self, limit: usize) -> StoreResult<Vec<LeaderboardEntry>> {
        let response = self
            .client
            .get(self.url("/api/leaderboard"))
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(transport)?;
        Self::decode(response).await
    }
}
