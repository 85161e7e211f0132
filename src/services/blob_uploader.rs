//! Chunked blob upload: stages the encrypted blob block by block, then
//! finalizes it with the ordered block list.
//!
//! Blocks are sent sequentially in index order. Each block gets a bounded
//! number of fixed-delay retries; the block list is only sent once every
//! block has been accepted.

use std::path::Path;

use crate::api::BlobStore;
use crate::error::AppError;
use crate::models::upload::{BlockSpan, UploadBlock};
use crate::services::chunk_manager;
use crate::services::encryptor::EncryptedBlob;
use crate::services::retry_engine::{self, FixedRetry};

pub struct ChunkedBlobUploader<'a, B: BlobStore> {
    store: &'a B,
    block_size: u64,
    retry: FixedRetry,
}

impl<'a, B: BlobStore> ChunkedBlobUploader<'a, B> {
    pub fn new(store: &'a B, block_size: u64, retry: FixedRetry) -> Self {
        Self {
            store,
            block_size,
            retry,
        }
    }

    /// Upload `blob` to `target_uri` and finalize it.
    ///
    /// Returns the block ids in the order they were committed.
    pub async fn upload(
        &self,
        blob: &EncryptedBlob,
        target_uri: &str,
    ) -> crate::error::Result<Vec<String>> {
        let spans = chunk_manager::plan_blocks(blob.encrypted_size, self.block_size);
        log::info!(
            "Uploading blob: size={}, blocks={}, block_size={}",
            blob.encrypted_size,
            spans.len(),
            self.block_size
        );

        let mut block_ids = Vec::with_capacity(spans.len());
        for span in &spans {
            let block = read_block(blob.path(), span).await?;
            self.put_block(target_uri, block).await?;
            block_ids.push(span.block_id.clone());
        }

        let list_result = retry_engine::retry_fixed(&self.retry, "block list", || {
            self.store.put_block_list(target_uri, &block_ids)
        })
        .await;

        if let Err(exhausted) = list_result {
            log::error!(
                "Block list rejected after {} attempt(s): {}",
                exhausted.attempts,
                exhausted.last_error
            );
            return Err(AppError::Transfer {
                block_index: None,
                status: exhausted.last_error.http_status(),
                message: exhausted.last_error.to_string(),
            });
        }

        log::info!("Blob finalized: blocks={}", block_ids.len());
        Ok(block_ids)
    }

    async fn put_block(&self, target_uri: &str, block: UploadBlock) -> crate::error::Result<()> {
        let label = format!("block {}", block.index);
        let result = retry_engine::retry_fixed(&self.retry, &label, || {
            self.store
                .put_block(target_uri, &block.block_id, block.bytes.clone())
        })
        .await;

        match result {
            Ok(()) => {
                log::debug!("Block {} accepted ({} bytes)", block.index, block.bytes.len());
                Ok(())
            }
            Err(exhausted) => {
                log::error!(
                    "Block {} failed after {} attempt(s): {}",
                    block.index,
                    exhausted.attempts,
                    exhausted.last_error
                );
                Err(AppError::Transfer {
                    block_index: Some(block.index),
                    status: exhausted.last_error.http_status(),
                    message: exhausted.last_error.to_string(),
                })
            }
        }
    }
}

async fn read_block(path: &Path, span: &BlockSpan) -> crate::error::Result<UploadBlock> {
    let data = chunk_manager::read_chunk_data(path, span.offset, span.size).await?;
    if data.len() as u64 != span.size {
        return Err(AppError::Io(format!(
            "short read for block {}: expected {} bytes, got {}",
            span.index,
            span.size,
            data.len()
        )));
    }
    Ok(UploadBlock {
        index: span.index,
        block_id: span.block_id.clone(),
        bytes: bytes::Bytes::from(data),
    })
}
