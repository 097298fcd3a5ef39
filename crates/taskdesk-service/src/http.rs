use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use taskdesk_core::attachment::{AttachmentFile, Upload, ATTACHMENT_FIELD, PDF_CONTENT_TYPE};
use taskdesk_core::task::{TaskInput, TaskView};
use taskdesk_core::user::{LoginInput, RegisterInput, User};
use taskdesk_core::{Envelope, TokenResponse, ValidationErrors};

use crate::{ServiceError, TaskService};

/// Async HTTP client for a running taskdesk-server.
///
/// Login and refresh return the token; store it with [`HttpService::set_token`]
/// to authenticate subsequent calls.
pub struct HttpService {
    base_url: String,
    client: Client,
    token: Option<String>,
}

/// Error body shape: `{ "message": ..., "errors": { field: [..] } }`.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    errors: Option<ValidationErrors>,
}

impl HttpService {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            token: None,
        }
    }

    pub fn with_token(base_url: &str, token: String) -> Self {
        let mut svc = Self::new(base_url);
        svc.token = Some(token);
        svc
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        self.with_auth(builder)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("request failed: {e}")))
    }

    /// Check if the server is reachable. Not authenticated.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        let resp = self
            .client
            .get(self.url("/api/health"))
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("connection failed: {e}")))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ServiceError::Internal(format!(
                "health check failed: {}",
                resp.status()
            )))
        }
    }

    // -- Accounts --

    pub async fn register(&self, input: &RegisterInput) -> Result<User, ServiceError> {
        let resp = self.send(self.client.post(self.url("/api/register")).json(input)).await?;
        envelope_data(resp).await
    }

    pub async fn login(&self, input: &LoginInput) -> Result<TokenResponse, ServiceError> {
        let resp = self.send(self.client.post(self.url("/api/login")).json(input)).await?;
        handle_response(resp).await
    }

    pub async fn me(&self) -> Result<User, ServiceError> {
        let resp = self.send(self.client.get(self.url("/api/me"))).await?;
        envelope_data(resp).await
    }

    pub async fn logout(&self) -> Result<(), ServiceError> {
        let resp = self.send(self.client.post(self.url("/api/logout"))).await?;
        handle_empty(resp).await
    }

    pub async fn refresh(&self) -> Result<TokenResponse, ServiceError> {
        let resp = self.send(self.client.post(self.url("/api/refresh"))).await?;
        handle_response(resp).await
    }

    /// JSON when there is no file, multipart otherwise.
    fn task_body(
        builder: RequestBuilder,
        input: &TaskInput,
        upload: Option<Upload>,
    ) -> Result<RequestBuilder, ServiceError> {
        let Some(upload) = upload else {
            return Ok(builder.json(input));
        };
        let mut form = Form::new();
        let fields = [
            ("title", &input.title),
            ("description", &input.description),
            ("status", &input.status),
            ("deadline", &input.deadline),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                form = form.text(name, value.clone());
            }
        }
        let content_type = upload
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let mut part = Part::bytes(upload.data.to_vec())
            .mime_str(&content_type)
            .map_err(|e| ServiceError::Internal(format!("content type: {e}")))?;
        if let Some(name) = upload.filename {
            part = part.file_name(name);
        }
        Ok(builder.multipart(form.part(ATTACHMENT_FIELD, part)))
    }
}

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Internal(format!("json decode: {e}")))
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn envelope_data<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ServiceError> {
    let envelope: Envelope<T> = handle_response(resp).await?;
    envelope
        .data
        .ok_or_else(|| ServiceError::Internal("missing data in response".into()))
}

async fn handle_empty(resp: reqwest::Response) -> Result<(), ServiceError> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn parse_error_with_status(status: StatusCode, resp: reqwest::Response) -> ServiceError {
    let body = resp.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
    let (message, errors) = match parsed {
        Some(ErrorBody { message, errors }) => (message.unwrap_or_else(|| body.clone()), errors),
        None => (body, None),
    };

    match status {
        StatusCode::UNPROCESSABLE_ENTITY => {
            ServiceError::Validation(errors.unwrap_or_else(|| ValidationErrors::single("body", message)))
        }
        StatusCode::UNAUTHORIZED => ServiceError::Unauthenticated(message),
        StatusCode::FORBIDDEN => ServiceError::Forbidden(message),
        StatusCode::NOT_FOUND => ServiceError::NotFound(message),
        _ => ServiceError::Internal(message),
    }
}

/// `inline; filename="abc.pdf"` → `abc.pdf`.
fn disposition_file_name(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|part| {
        part.strip_prefix("filename=")
            .map(|name| name.trim_matches('"').to_string())
    })
}

#[async_trait]
impl TaskService for HttpService {
    async fn list_tasks(&self) -> Result<Vec<TaskView>, ServiceError> {
        let resp = self.send(self.client.get(self.url("/api/tasks"))).await?;
        envelope_data(resp).await
    }

    async fn get_task(&self, id: &str) -> Result<TaskView, ServiceError> {
        let resp = self
            .send(self.client.get(self.url(&format!("/api/tasks/{id}"))))
            .await?;
        envelope_data(resp).await
    }

    async fn create_task(
        &self,
        input: &TaskInput,
        upload: Option<Upload>,
    ) -> Result<TaskView, ServiceError> {
        let builder = Self::task_body(self.client.post(self.url("/api/tasks")), input, upload)?;
        envelope_data(self.send(builder).await?).await
    }

    async fn update_task(
        &self,
        id: &str,
        input: &TaskInput,
        upload: Option<Upload>,
    ) -> Result<TaskView, ServiceError> {
        let builder = Self::task_body(
            self.client.put(self.url(&format!("/api/tasks/{id}"))),
            input,
            upload,
        )?;
        envelope_data(self.send(builder).await?).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), ServiceError> {
        let resp = self
            .send(self.client.delete(self.url(&format!("/api/tasks/{id}"))))
            .await?;
        handle_empty(resp).await
    }

    async fn preview_attachment(&self, id: &str) -> Result<AttachmentFile, ServiceError> {
        let resp = self
            .send(self.client.get(self.url(&format!("/api/tasks/{id}/preview"))))
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(parse_error_with_status(status, resp).await);
        }
        let headers = resp.headers();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(PDF_CONTENT_TYPE)
            .to_string();
        let filename = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_file_name)
            .unwrap_or_else(|| format!("{id}.pdf"));
        let data = resp
            .bytes()
            .await
            .map_err(|e| ServiceError::Internal(format!("read body: {e}")))?;
        Ok(AttachmentFile {
            filename,
            content_type,
            data,
        })
    }
}
