//! Mail Service Client: authenticated calls against the Gmail REST API.
//!
//! Every call follows one contract: attach the stored bearer token, refresh
//! and retry exactly once on 401, map 403 to `PermissionDenied`, map other
//! non-2xx statuses to `RemoteError`, and decode empty bodies to an empty
//! result.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::SessionManager;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::models::{Label, LabelStats, MailboxProfile, MessageSummary, SearchPage};

pub const INBOX_LABEL: &str = "INBOX";

/// The remote mail API surface. Pure request/response; no local state.
#[async_trait::async_trait]
pub trait MailApi: Send + Sync {
    async fn get_profile(&self) -> Result<MailboxProfile>;

    async fn list_labels(&self) -> Result<Vec<Label>>;

    async fn get_label(&self, label_id: &str) -> Result<LabelStats>;

    /// Ids of up to `max_results` messages carrying the label.
    async fn list_messages_by_label(
        &self,
        label_id: &str,
        max_results: u32,
    ) -> Result<Vec<String>>;

    /// Metadata-format fetch of a single message.
    async fn get_message(&self, id: &str) -> Result<MessageSummary>;

    /// Search by query string, returning ids and the provider's result-size
    /// estimate.
    async fn search_messages(&self, query: &str, max_results: u32) -> Result<SearchPage>;

    /// Remove the inbox label from all given messages in one batch call.
    async fn batch_archive(&self, ids: &[String]) -> Result<()>;

    /// Permanently delete all given messages in one batch call.
    async fn batch_delete(&self, ids: &[String]) -> Result<()>;

    /// Add the inbox label back to all given messages in one batch call.
    async fn batch_restore(&self, ids: &[String]) -> Result<()>;
}

#[derive(Clone)]
pub struct GmailClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionManager>,
}

// Wire types. Shapes follow the Gmail v1 JSON bodies.

#[derive(Debug, Default, Deserialize)]
struct LabelListResponse {
    #[serde(default)]
    labels: Vec<Label>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    #[serde(default)]
    result_size_estimate: u64,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    thread_id: String,
    snippet: Option<String>,
    #[serde(default)]
    size_estimate: u64,
    #[serde(default)]
    label_ids: Vec<String>,
    payload: Option<MessagePayload>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchModifyRequest<'a> {
    ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    add_label_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remove_label_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct BatchDeleteRequest<'a> {
    ids: &'a [String],
}

/// Decode target for operations whose success body is empty.
#[derive(Debug, Default, Deserialize)]
struct Empty {}

impl GmailClient {
    pub fn new(session: Arc<SessionManager>, config: &ApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
        token: &str,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .request(method, url)
            .query(query)
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// One authenticated call with the uniform retry contract.
    async fn call<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let url = format!("{}{path}", self.base_url);
        let token = self
            .session
            .access_token()
            .await?
            .ok_or(Error::AuthExpired)?;

        let mut response = self
            .send(method.clone(), &url, query, body.as_ref(), &token)
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("401 from {path}, refreshing token and retrying once");
            // refresh_token clears the stored credential and yields
            // AuthExpired when both renewal paths fail.
            let credential = self.session.refresh_token().await?;
            response = self
                .send(method, &url, query, body.as_ref(), &credential.access_token)
                .await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                // A second 401 after a fresh token is not retried again.
                return Err(Error::AuthExpired);
            }
        }

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(Error::PermissionDenied);
        }
        if !status.is_success() {
            return Err(Error::RemoteError {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn batch_modify(
        &self,
        ids: &[String],
        add: Option<Vec<String>>,
        remove: Option<Vec<String>>,
    ) -> Result<()> {
        if ids.is_empty() {
            return Err(Error::EmptySelection);
        }
        let body = serde_json::to_value(BatchModifyRequest {
            ids,
            add_label_ids: add,
            remove_label_ids: remove,
        })?;
        self.call::<Empty>(
            Method::POST,
            "/users/me/messages/batchModify",
            &[],
            Some(body),
        )
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MailApi for GmailClient {
    async fn get_profile(&self) -> Result<MailboxProfile> {
        self.call(Method::GET, "/users/me/profile", &[], None).await
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        let response: LabelListResponse =
            self.call(Method::GET, "/users/me/labels", &[], None).await?;
        Ok(response.labels)
    }

    async fn get_label(&self, label_id: &str) -> Result<LabelStats> {
        self.call(
            Method::GET,
            &format!("/users/me/labels/{label_id}"),
            &[],
            None,
        )
        .await
    }

    async fn list_messages_by_label(
        &self,
        label_id: &str,
        max_results: u32,
    ) -> Result<Vec<String>> {
        let response: MessageListResponse = self
            .call(
                Method::GET,
                "/users/me/messages",
                &[
                    ("labelIds", label_id.to_string()),
                    ("maxResults", max_results.to_string()),
                ],
                None,
            )
            .await?;
        Ok(response.messages.into_iter().map(|m| m.id).collect())
    }

    async fn get_message(&self, id: &str) -> Result<MessageSummary> {
        let response: MessageResponse = self
            .call(
                Method::GET,
                &format!("/users/me/messages/{id}"),
                &[
                    ("format", "metadata".to_string()),
                    ("metadataHeaders", "From".to_string()),
                    ("metadataHeaders", "To".to_string()),
                    ("metadataHeaders", "Subject".to_string()),
                    ("metadataHeaders", "Date".to_string()),
                ],
                None,
            )
            .await?;

        let mut from = None;
        let mut to = None;
        let mut subject = None;
        let mut date = None;
        if let Some(payload) = &response.payload {
            for header in &payload.headers {
                let value = Some(header.value.clone());
                if header.name.eq_ignore_ascii_case("From") {
                    from = value;
                } else if header.name.eq_ignore_ascii_case("To") {
                    to = value;
                } else if header.name.eq_ignore_ascii_case("Subject") {
                    subject = value;
                } else if header.name.eq_ignore_ascii_case("Date") {
                    date = value;
                }
            }
        }

        Ok(MessageSummary {
            id: response.id,
            thread_id: response.thread_id,
            from,
            to,
            subject,
            date,
            size_estimate: response.size_estimate,
            snippet: response.snippet,
            label_ids: response.label_ids,
        })
    }

    async fn search_messages(&self, query: &str, max_results: u32) -> Result<SearchPage> {
        let response: MessageListResponse = self
            .call(
                Method::GET,
                "/users/me/messages",
                &[
                    ("q", query.to_string()),
                    ("maxResults", max_results.to_string()),
                ],
                None,
            )
            .await?;
        Ok(SearchPage {
            ids: response.messages.into_iter().map(|m| m.id).collect(),
            result_size_estimate: response.result_size_estimate,
        })
    }

    async fn batch_archive(&self, ids: &[String]) -> Result<()> {
        debug!("archiving {} messages", ids.len());
        self.batch_modify(ids, None, Some(vec![INBOX_LABEL.to_string()]))
            .await
    }

    async fn batch_delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Err(Error::EmptySelection);
        }
        debug!("deleting {} messages", ids.len());
        let body = serde_json::to_value(BatchDeleteRequest { ids })?;
        self.call::<Empty>(
            Method::POST,
            "/users/me/messages/batchDelete",
            &[],
            Some(body),
        )
        .await?;
        Ok(())
    }

    async fn batch_restore(&self, ids: &[String]) -> Result<()> {
        debug!("restoring {} messages to inbox", ids.len());
        self.batch_modify(ids, Some(vec![INBOX_LABEL.to_string()]), None)
            .await
    }
}
