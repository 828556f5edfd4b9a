//! reqwest implementation of the authority port.

use crate::config::ClientConfig;
use crate::response::{
    CHANGE_CONTROL_ATTR, STEP_MAPPING_ATTR, TEST_INFO_ATTR, TRACKING_ATTR, classify_failure,
    result_attr, result_object,
};
use async_trait::async_trait;
use changegate_core::ports::ChangeControlAuthority;
use changegate_core::wire::{
    ControlVerdict, FailureKind, JobTarget, RegistrationRequest, RemoteFailure, RemoteResult,
    StepMappingRequest, TrackingQuery, TrackingResponse,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid client configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP client could not be built: {0}")]
    Build(#[from] reqwest::Error),
}

/// HTTP client for the change-management authority.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    config: ClientConfig,
    client: Client,
}

impl HttpAuthority {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.tool_id.trim().is_empty() {
            return Err(ClientError::InvalidConfiguration("tool_id is empty".into()));
        }
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_ref()),
            None => request,
        }
    }

    fn tool_params(&self) -> Vec<(String, String)> {
        vec![
            ("toolId".to_string(), self.config.tool_id.clone()),
            ("toolType".to_string(), self.config.tool_type.clone()),
        ]
    }

    async fn get(&self, url: &str, params: &[(String, String)]) -> RemoteResult<Value> {
        debug!(url = %url, "GET");
        let request = self.authorized(self.client.get(url).query(params));
        send(request).await
    }

    async fn post(&self, url: &str, body: &Value) -> RemoteResult<Value> {
        debug!(url = %url, "POST");
        let request = self.authorized(
            self.client
                .post(url)
                .query(&self.tool_params())
                .json(body),
        );
        send(request).await
    }
}

async fn send(request: RequestBuilder) -> RemoteResult<Value> {
    let response = request.send().await.map_err(transport_failure)?;
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteFailure::new(
            FailureKind::Unauthorized,
            format!("HTTP {}", status),
        ));
    }

    let text = response.text().await.map_err(transport_failure)?;
    let body: Option<Value> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        // Failure bodies carry the authority's message.
        if let Some(Value::String(message)) = body.as_ref().and_then(|b| b.get("failure")) {
            return Err(RemoteFailure::new(classify_failure(message), message.clone()));
        }
        return Err(RemoteFailure::new(
            FailureKind::Other,
            format!("HTTP {}", status),
        ));
    }

    body.ok_or_else(|| RemoteFailure::new(FailureKind::Malformed, "response is not JSON"))
}

fn transport_failure(err: reqwest::Error) -> RemoteFailure {
    let kind = if err.is_connect() {
        FailureKind::ConnectionRefused
    } else if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_decode() {
        FailureKind::Malformed
    } else {
        FailureKind::Other
    };
    RemoteFailure::new(kind, err.to_string())
}

fn parse_verdict(body: &Value) -> RemoteResult<ControlVerdict> {
    let value = result_attr(body, CHANGE_CONTROL_ATTR)?;
    ControlVerdict::parse(&value).ok_or_else(|| {
        RemoteFailure::new(
            FailureKind::Malformed,
            format!("unexpected change control value '{}'", value),
        )
    })
}

/// Job addressing fields, stage-scoped when a stage is set.
fn target_fields(target: &JobTarget, with_root: bool) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("jobUrl".into(), json!(target.scoped_url()));
    fields.insert("jobName".into(), json!(target.scoped_name()));
    fields.insert("isMultiBranch".into(), json!(target.multi_branch.to_string()));
    if let Some(branch) = &target.branch_name {
        fields.insert("branchName".into(), json!(branch));
    }
    if let Some((name, url)) = target.parent_stage() {
        fields.insert("parentStageName".into(), json!(name));
        fields.insert("parentStageURL".into(), json!(url));
        // The full root summary only travels in request bodies.
        if with_root {
            if let Some(root) = target.root() {
                fields.insert("parentNode".into(), json!(root));
            }
        }
    }
    fields
}

#[async_trait]
impl ChangeControlAuthority for HttpAuthority {
    async fn tracking_query(&self, query: &TrackingQuery) -> RemoteResult<TrackingResponse> {
        let mut params = self.tool_params();
        params.push(("url".into(), query.url.clone()));
        params.push(("name".into(), query.name.clone()));
        params.push(("pronoun".into(), query.pronoun.to_string()));
        if let Some(branch) = &query.branch_name {
            params.push(("branchName".into(), branch.clone()));
        }
        params.push(("isMultiBranch".into(), query.is_multi_branch.to_string()));

        let body = self.get(&self.config.tracking_url, &params).await?;
        let tracked = result_attr(&body, TRACKING_ATTR)?;
        match tracked.to_ascii_lowercase().as_str() {
            "true" => Ok(TrackingResponse {
                tracked: true,
                test_info: result_object(&body)?.get(TEST_INFO_ATTR).cloned(),
            }),
            "false" => Ok(TrackingResponse {
                tracked: false,
                test_info: None,
            }),
            _ => Err(RemoteFailure::new(classify_failure(&tracked), tracked)),
        }
    }

    async fn is_under_change_control(&self, target: &JobTarget) -> RemoteResult<ControlVerdict> {
        let mut params = self.tool_params();
        for (key, value) in target_fields(target, false) {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            params.push((key, value));
        }
        let body = self.get(&self.config.change_control_url, &params).await?;
        parse_verdict(&body)
    }

    async fn register_and_notify(
        &self,
        request: &RegistrationRequest,
    ) -> RemoteResult<ControlVerdict> {
        let mut data = target_fields(&request.target, true);
        data.insert("callbackURL".into(), json!(request.callback_url));
        data.insert("jobDetails".into(), json!(request.job_details));
        if let Some(details) = &request.change_request_details {
            data.insert("changeRequestDetails".into(), details.clone());
        }

        let body = self
            .post(&self.config.change_control_url, &Value::Object(data))
            .await?;
        parse_verdict(&body)
    }

    async fn update_step_mapping(&self, request: &StepMappingRequest) -> RemoteResult<bool> {
        let mut data = target_fields(&request.target, true);
        if let Some(step_id) = &request.step_id {
            data.insert("stepSysId".into(), json!(step_id));
        }

        let body = self
            .post(&self.config.mapping_url, &Value::Object(data))
            .await?;
        let status = result_attr(&body, STEP_MAPPING_ATTR)?;
        Ok(status.eq_ignore_ascii_case("true"))
    }
}
