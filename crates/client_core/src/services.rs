//! Request/response clients for the fortune, render, and asset-hosting endpoints.

use async_trait::async_trait;
use reqwest::{
    header::CONTENT_TYPE,
    multipart::{Form, Part},
    Client, Response,
};
use shared::{
    domain::{FortuneText, Handle, HostedImageUrl},
    error::ServiceError,
    protocol::{FortuneQuery, RenderCardRequest, UploadResponse},
};
use tracing::debug;

use crate::config::ClientSettings;

#[async_trait]
pub trait FortuneService: Send + Sync {
    async fn request_fortune(&self, handle: &Handle) -> Result<FortuneText, ServiceError>;
}

#[async_trait]
pub trait CardRenderer: Send + Sync {
    async fn render_card(&self, fortune: &FortuneText) -> Result<Vec<u8>, ServiceError>;
}

#[async_trait]
pub trait AssetHost: Send + Sync {
    async fn host_image(
        &self,
        image: Vec<u8>,
        suggested_name: &str,
    ) -> Result<HostedImageUrl, ServiceError>;
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &HostedImageUrl) -> Result<Vec<u8>, ServiceError>;
}

/// One pooled HTTP client backing every remote collaborator.
#[derive(Clone)]
pub struct HttpServices {
    http: Client,
    api_base_url: String,
    upload_url: String,
    upload_preset: String,
}

impl HttpServices {
    pub fn new(settings: &ClientSettings) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(transport_error)?;
        Ok(Self::with_client(http, settings))
    }

    pub fn with_client(http: Client, settings: &ClientSettings) -> Self {
        Self {
            http,
            api_base_url: settings.api_base_url.clone(),
            upload_url: settings.upload_url(),
            upload_preset: settings.upload_preset.clone(),
        }
    }
}

#[async_trait]
impl FortuneService for HttpServices {
    async fn request_fortune(&self, handle: &Handle) -> Result<FortuneText, ServiceError> {
        let res = self
            .http
            .get(format!("{}/api/generateFortune", self.api_base_url))
            .query(&FortuneQuery {
                username: handle.as_str().to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        let res = ensure_success(res).await?;

        let is_json = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));
        let body = res.text().await.map_err(transport_error)?;

        // JSON-encoded string bodies are unwrapped; anything else is already the text.
        let text = if is_json {
            serde_json::from_str::<String>(&body)
                .map_err(|err| ServiceError::InvalidResponse(format!("fortune body: {err}")))?
        } else {
            body
        };

        debug!(handle = %handle, len = text.len(), "fortune received");
        Ok(FortuneText::parse(text)?)
    }
}

#[async_trait]
impl CardRenderer for HttpServices {
    async fn render_card(&self, fortune: &FortuneText) -> Result<Vec<u8>, ServiceError> {
        let res = self
            .http
            .post(format!("{}/api/og", self.api_base_url))
            .json(&RenderCardRequest {
                fortune: fortune.as_str().to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        let res = ensure_success(res).await?;
        let bytes = res.bytes().await.map_err(transport_error)?;
        if bytes.is_empty() {
            return Err(ServiceError::InvalidResponse(
                "render endpoint returned an empty image".into(),
            ));
        }

        debug!(bytes = bytes.len(), "card rendered");
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl AssetHost for HttpServices {
    async fn host_image(
        &self,
        image: Vec<u8>,
        suggested_name: &str,
    ) -> Result<HostedImageUrl, ServiceError> {
        let file = Part::bytes(image)
            .file_name(suggested_name.to_string())
            .mime_str("image/png")
            .map_err(transport_error)?;
        let form = Form::new()
            .part("file", file)
            .text("upload_preset", self.upload_preset.clone());

        let res = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let res = ensure_success(res).await?;
        let body: UploadResponse = res
            .json()
            .await
            .map_err(|err| ServiceError::InvalidResponse(format!("upload body: {err}")))?;

        Ok(HostedImageUrl::parse(body.secure_url)?)
    }
}

#[async_trait]
impl ImageFetcher for HttpServices {
    async fn fetch_image(&self, url: &HostedImageUrl) -> Result<Vec<u8>, ServiceError> {
        let res = self
            .http
            .get(url.as_str())
            .send()
            .await
            .map_err(transport_error)?;
        let res = ensure_success(res).await?;
        let bytes = res.bytes().await.map_err(transport_error)?;
        if bytes.is_empty() {
            return Err(ServiceError::InvalidResponse(format!(
                "hosted image at {url} is empty"
            )));
        }
        Ok(bytes.to_vec())
    }
}

async fn ensure_success(res: Response) -> Result<Response, ServiceError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::Transport(err.to_string())
}

#[cfg(test)]
#[path = "tests/services_tests.rs"]
mod tests;
