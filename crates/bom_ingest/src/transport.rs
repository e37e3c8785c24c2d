use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::Deserialize;

use crate::{IngestError, TransportError, TransportFailure};

/// Response body of a streamed identification request.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

const ACCEPTED_EXTENSIONS: [&str; 2] = ["xls", "xlsx"];

/// A BOM spreadsheet to be identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, IngestError> {
        let file_name = file_name.into();
        if !accepts(&file_name) {
            return Err(IngestError::UnsupportedUpload { file_name });
        }
        Ok(Self { file_name, bytes })
    }

    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Reject by name before reading the file.
        if !accepts(&file_name) {
            return Err(IngestError::UnsupportedUpload { file_name });
        }
        let bytes = std::fs::read(path)?;
        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn to_form(&self) -> Form {
        Form::new().part(
            "file",
            Part::bytes(self.bytes.clone()).file_name(self.file_name.clone()),
        )
    }
}

fn accepts(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| accepted.eq_ignore_ascii_case(ext))
        })
}

/// Per-part lookup result as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    #[serde(default)]
    pub status: String,
    pub product_type: Option<String>,
    pub manufacturer: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PartListResponse {
    partnumbers: Vec<String>,
}

/// Backend requests the engine depends on.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Upload the file and return the chunked frame stream of the response.
    async fn open_stream(&self, upload: &Upload) -> Result<ByteStream, TransportError>;

    /// Upload the file and return the extracted part numbers.
    async fn fetch_part_list(&self, upload: &Upload) -> Result<Vec<String>, TransportError>;

    /// Identify a single part number.
    async fn identify(&self, part_number: &str) -> Result<LookupResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Whole-request limit for the list and per-part requests.
    pub request_timeout: Duration,
    /// Limit between two reads of the streamed response body.
    pub read_timeout: Duration,
    pub stream_path: String,
    pub list_path: String,
    pub lookup_path: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            read_timeout: Duration::from_secs(300),
            stream_path: "identify".to_string(),
            list_path: "parse-excel".to_string(),
            lookup_path: "identify-part".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: TransportSettings,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .build()
            .map_err(|err| TransportError::new(TransportFailure::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        let raw = format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|err| TransportError::new(TransportFailure::InvalidUrl, err.to_string()))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                TransportFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(response)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        serde_json::from_slice(&body)
            .map_err(|err| TransportError::new(TransportFailure::InvalidBody, err.to_string()))
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn open_stream(&self, upload: &Upload) -> Result<ByteStream, TransportError> {
        let url = self.endpoint(&self.settings.stream_path)?;
        let response = self
            .send(self.client.post(url).multipart(upload.to_form()))
            .await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed())
    }

    async fn fetch_part_list(&self, upload: &Upload) -> Result<Vec<String>, TransportError> {
        let url = self.endpoint(&self.settings.list_path)?;
        let response = self
            .send(
                self.client
                    .post(url)
                    .timeout(self.settings.request_timeout)
                    .multipart(upload.to_form()),
            )
            .await?;
        let list: PartListResponse = Self::read_json(response).await?;
        Ok(list.partnumbers)
    }

    async fn identify(&self, part_number: &str) -> Result<LookupResponse, TransportError> {
        let mut url = self.endpoint(&self.settings.lookup_path)?;
        url.query_pairs_mut().append_pair("partnumber", part_number);
        let response = self
            .send(self.client.get(url).timeout(self.settings.request_timeout))
            .await?;
        Self::read_json(response).await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(TransportFailure::Timeout, err.to_string());
    }
    if err.is_decode() {
        return TransportError::new(TransportFailure::InvalidBody, err.to_string());
    }
    TransportError::new(TransportFailure::Network, err.to_string())
}
