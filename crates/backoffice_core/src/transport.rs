//! The REST contract the data layer depends on, and its HTTP implementation.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde_json::Value;
use shared::{
    domain::Resource,
    protocol::{ImportSummary, ListParams, UpdateSequenceRequest},
};
use tracing::{debug, warn};
use url::Url;

use crate::{config::ConsoleSettings, error::TransportError};

/// CSV file handed to [`BackofficeApi::import_csv`].
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl CsvUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "import.csv".to_string());
        Ok(Self { filename, bytes })
    }
}

#[async_trait]
pub trait BackofficeApi: Send + Sync {
    /// Raw list payload; its envelope is decoded by the caller.
    async fn fetch_list(
        &self,
        resource: Resource,
        params: &ListParams,
    ) -> Result<Value, TransportError>;

    /// Sequence updates are scoped by the caller to one sibling collection.
    async fn update_sequence(
        &self,
        resource: Resource,
        request: &UpdateSequenceRequest,
    ) -> Result<(), TransportError>;

    async fn import_csv(
        &self,
        resource: Resource,
        upload: CsvUpload,
    ) -> Result<ImportSummary, TransportError>;
}

pub struct HttpBackofficeApi {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackofficeApi {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidRequest(format!(
                "api base url '{base_url}' cannot carry paths"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            token: None,
        })
    }

    pub fn from_settings(settings: &ConsoleSettings) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;
        let api = Self::with_client(http, &settings.api_base_url)?;
        Ok(match &settings.api_token {
            Some(token) => api.with_bearer_token(token.clone()),
            None => api,
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, resource: Resource, action: Option<&str>) -> Result<Url, TransportError> {
        let relative = match action {
            Some(action) => format!("{}/{action}", resource.path()),
            None => resource.path().to_string(),
        };
        Ok(self.base_url.join(&relative)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Maps non-2xx responses to [`TransportError`], reading the error body.
async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = TransportError::from_status(status.as_u16(), &body);
    warn!(status = status.as_u16(), error = %err, "api request failed");
    Err(err)
}

#[async_trait]
impl BackofficeApi for HttpBackofficeApi {
    async fn fetch_list(
        &self,
        resource: Resource,
        params: &ListParams,
    ) -> Result<Value, TransportError> {
        let url = self.endpoint(resource, None)?;
        debug!(%resource, page = params.page, per_page = params.per_page, "GET list");
        let response = self
            .authorize(self.http.get(url).query(&params.to_pairs()))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        // An empty or non-JSON body is a malformed payload, not a failure.
        Ok(serde_json::from_str(&body).unwrap_or_else(|err| {
            warn!(%resource, error = %err, "list response is not JSON");
            Value::Null
        }))
    }

    async fn update_sequence(
        &self,
        resource: Resource,
        request: &UpdateSequenceRequest,
    ) -> Result<(), TransportError> {
        let url = self.endpoint(resource, Some("update-sequence"))?;
        debug!(%resource, id = %request.id, new_seq_no = request.new_seq_no, "POST sequence");
        let response = self
            .authorize(self.http.post(url).json(request))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn import_csv(
        &self,
        resource: Resource,
        upload: CsvUpload,
    ) -> Result<ImportSummary, TransportError> {
        let url = self.endpoint(resource, Some("import"))?;
        debug!(%resource, filename = %upload.filename, bytes = upload.bytes.len(), "POST import");
        let part = multipart::Part::bytes(upload.bytes)
            .file_name(upload.filename)
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);
        let response = self
            .authorize(self.http.post(url).multipart(form))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(ImportSummary::default());
        }
        serde_json::from_str(&body).map_err(|err| TransportError::Decode(err.to_string()))
    }
}
