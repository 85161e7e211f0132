//! Block planning for blob uploads.
//!
//! Splits an encrypted blob into fixed-size blocks (the last one may be short)
//! and names each block from its index. Planning is pure computation; block
//! bytes are read from disk only when a block is about to be sent.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::AppError;
use crate::models::upload::BlockSpan;

/// Block id for `index`: base64 of `block-NNNNN`.
///
/// Zero-padded to five digits so every id of one blob has the same length,
/// which the blob store requires, up to its 50 000 block limit.
pub fn block_id(index: u32) -> String {
    BASE64.encode(format!("block-{:05}", index))
}

/// Plan the block layout for a blob of `total_size` bytes.
pub fn plan_blocks(total_size: u64, block_size: u64) -> Vec<BlockSpan> {
    if total_size == 0 || block_size == 0 {
        return Vec::new();
    }

    let mut blocks = Vec::new();
    let mut offset: u64 = 0;
    let mut index: u32 = 0;

    while offset < total_size {
        let size = std::cmp::min(block_size, total_size - offset);
        blocks.push(BlockSpan {
            index,
            block_id: block_id(index),
            offset,
            size,
        });
        offset += size;
        index += 1;
    }

    blocks
}

/// Read `size` bytes at `offset` from `file_path`.
///
/// Uses spawn_blocking to avoid blocking the tokio runtime. A short read at
/// end of file returns the bytes available.
pub async fn read_chunk_data(
    file_path: &Path,
    offset: u64,
    size: u64,
) -> crate::error::Result<Vec<u8>> {
    let file_path = file_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = std::fs::File::open(&file_path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(size as usize);
        file.take(size).read_to_end(&mut buf)?;
        Ok(buf)
    })
    .await
    .map_err(|e| AppError::Internal(format!("spawn_blocking join error: {}", e)))?
}
