//! Authenticated HTTP transport for the prototype API.
//!
//! Routes:
//! - `GET    {base}/prototypes/{slug}`
//! - `POST   {base}/prototypes`
//! - `PUT    {base}/prototypes/{id}`
//! - `POST   {base}/prototypes/{id}/versions/{version}/restore`

use crate::transport::{Connectivity, DocumentTransport, DocumentUpdate, NewDocument, TransportError};
use async_trait::async_trait;
use prototyper_editor::{Document, DocumentId};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
    connectivity: Connectivity,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        connectivity: Connectivity,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("prototyper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            connectivity,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Document, TransportError> {
        if !self.connectivity.is_online() {
            return Err(TransportError::Offline);
        }

        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::from_status(status.as_u16(), body));
        }

        let document: Document = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        document
            .content
            .validate()
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        Ok(document)
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    match error.status() {
        Some(status) => TransportError::from_status(status.as_u16(), error.to_string()),
        None => TransportError::Network(error.to_string()),
    }
}

#[async_trait]
impl DocumentTransport for HttpTransport {
    async fn fetch(&self, slug: &str) -> Result<Document, TransportError> {
        tracing::debug!(%slug, "fetching prototype");
        self.send(self.client.get(self.url(&format!("prototypes/{slug}"))))
            .await
    }

    async fn create(&self, document: NewDocument) -> Result<Document, TransportError> {
        tracing::debug!(name = %document.name, "creating prototype");
        self.send(self.client.post(self.url("prototypes")).json(&document))
            .await
    }

    async fn update(
        &self,
        id: &DocumentId,
        update: DocumentUpdate,
    ) -> Result<Document, TransportError> {
        tracing::debug!(%id, "updating prototype");
        self.send(self.client.put(self.url(&format!("prototypes/{id}"))).json(&update))
            .await
    }

    async fn restore_version(
        &self,
        id: &DocumentId,
        version: u64,
    ) -> Result<Document, TransportError> {
        tracing::debug!(%id, version, "restoring prototype version");
        self.send(
            self.client
                .post(self.url(&format!("prototypes/{id}/versions/{version}/restore"))),
        )
        .await
    }
}
