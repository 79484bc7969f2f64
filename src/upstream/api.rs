//! Request/response Web API client.
//!
//! [`Api`] is the narrow seam the rest of the gateway calls through: one
//! generic method call plus a raw download. [`WebApi`] is the production
//! implementation over HTTPS; tests substitute a recording mock.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;

use super::events::{FileInfo, Snapshot, UserInfo};

/// The upstream request/response endpoint.
#[async_trait]
pub trait Api: Send + Sync {
    /// Invoke `method` with form arguments, returning the response body
    /// after the `ok` field has been checked.
    async fn call(&self, method: &str, args: &[(&str, &str)]) -> Result<Value, ApiError>;

    /// Fetch a raw authenticated URL (file contents).
    async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

/// HTTPS implementation of [`Api`].
pub struct WebApi {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl WebApi {
    pub fn new(token: String) -> WebApi {
        WebApi::with_base("https://slack.com/api".to_string(), token)
    }

    /// Point the client at a different endpoint root (tests).
    pub fn with_base(base: String, token: String) -> WebApi {
        WebApi {
            http: reqwest::Client::new(),
            base,
            token,
        }
    }
}

#[async_trait]
impl Api for WebApi {
    async fn call(&self, method: &str, args: &[(&str, &str)]) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base, method);
        let mut form: Vec<(&str, &str)> = vec![("token", self.token.as_str())];
        form.extend_from_slice(args);

        debug!(target: "wire", method = %method, "API call");
        let response = self.http.post(&url).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ApiError::Refused(reason));
        }
        Ok(body)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// `rtm.start`: the bootstrap handshake. `simple_latest` and `no_unreads`
/// keep the snapshot small; the gateway reads neither history nor unread
/// counts.
pub async fn rtm_start(api: &dyn Api) -> Result<Snapshot, ApiError> {
    let body = api
        .call("rtm.start", &[("simple_latest", "1"), ("no_unreads", "1")])
        .await?;
    Ok(serde_json::from_value(body)?)
}

/// `users.info`: fetch real attributes for a user seen only by id.
pub async fn users_info(api: &dyn Api, user_id: &str) -> Result<UserInfo, ApiError> {
    let body = api.call("users.info", &[("user", user_id)]).await?;
    let user = body
        .get("user")
        .cloned()
        .ok_or_else(|| ApiError::Refused("missing user in response".to_string()))?;
    Ok(serde_json::from_value(user)?)
}

/// `im.open`: open (or resurrect) the DM conduit to a user, returning the
/// DM channel id.
pub async fn im_open(api: &dyn Api, user_id: &str) -> Result<String, ApiError> {
    let body = api.call("im.open", &[("user", user_id)]).await?;
    body.get("channel")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::Refused("missing channel in response".to_string()))
}

/// `files.info`: metadata for one file.
pub async fn files_info(api: &dyn Api, file_id: &str) -> Result<FileInfo, ApiError> {
    let body = api.call("files.info", &[("file", file_id)]).await?;
    let file = body
        .get("file")
        .cloned()
        .ok_or_else(|| ApiError::Refused("missing file in response".to_string()))?;
    Ok(serde_json::from_value(file)?)
}
