//! AzureBlobClient: `BlobStore` over an Azure block-blob SAS URI.
//!
//! The SAS URI already authorizes writes, so no bearer credential is attached.
//! Blocks go to `<uri>&comp=block&blockid=<id>`; the block list goes to
//! `<uri>&comp=blocklist` as an XML `BlockList` document.

use reqwest::Url;
use serde::Serialize;

use super::BlobStore;
use crate::error::AppError;

const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

#[derive(Debug, Serialize)]
#[serde(rename = "BlockList")]
struct BlockList<'a> {
    #[serde(rename = "Latest")]
    latest: &'a [String],
}

/// Render the block-list document for the given ordered ids.
pub(crate) fn block_list_xml(block_ids: &[String]) -> crate::error::Result<String> {
    let body = quick_xml::se::to_string(&BlockList { latest: block_ids })
        .map_err(|e| AppError::Internal(format!("Block list serialization error: {}", e)))?;
    Ok(format!("{}{}", XML_DECLARATION, body))
}

fn target_url(target_uri: &str, params: &[(&str, &str)]) -> crate::error::Result<Url> {
    let mut url = Url::parse(target_uri)
        .map_err(|e| AppError::Api(format!("Invalid transfer URI: {}", e)))?;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

pub struct AzureBlobClient {
    client: reqwest::Client,
}

impl AzureBlobClient {
    pub fn new(timeout_secs: u64) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build blob client: {}", e)))?;
        Ok(Self { client })
    }

    async fn put(&self, url: Url, request: reqwest::RequestBuilder) -> crate::error::Result<()> {
        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        log::debug!("Blob PUT failed: path={} status={}", url.path(), status.as_u16());
        Err(AppError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl BlobStore for AzureBlobClient {
    async fn put_block(
        &self,
        target_uri: &str,
        block_id: &str,
        data: bytes::Bytes,
    ) -> crate::error::Result<()> {
        let url = target_url(target_uri, &[("comp", "block"), ("blockid", block_id)])?;
        let request = self
            .client
            .put(url.clone())
            .header(BLOB_TYPE_HEADER, "BlockBlob")
            .body(data);
        self.put(url, request).await
    }

    async fn put_block_list(
        &self,
        target_uri: &str,
        block_ids: &[String],
    ) -> crate::error::Result<()> {
        let url = target_url(target_uri, &[("comp", "blocklist")])?;
        let body = block_list_xml(block_ids)?;
        let request = self
            .client
            .put(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(body);
        self.put(url, request).await
    }
}
