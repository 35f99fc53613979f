//! Network loader (HTTP GET)

use futures::future::BoxFuture;
use std::time::Duration;

use super::{is_http_url, Document, DocumentLoader};
use crate::error::{CalmError, Result};

/// Fetches documents from absolute `http`/`https` URLs.
///
/// No retries: a failed fetch is reported once and the caller decides
/// whether the missing document is fatal.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl DocumentLoader for HttpLoader {
    fn can_resolve(&self, identifier: &str) -> bool {
        is_http_url(identifier)
    }

    fn resolve<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<Document>> {
        Box::pin(async move {
            tracing::debug!(url = identifier, "fetching document");
            let response = self.client.get(identifier).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CalmError::Load {
                    identifier: identifier.to_string(),
                    reason: format!("http status {status}"),
                });
            }
            let text = response.text().await?;
            Document::parse(identifier, text)
        })
    }
}
