//! Block layout of an encrypted blob.

/// Planned byte range of one block. Pure layout; no bytes attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub index: u32,
    pub block_id: String,
    pub offset: u64,
    pub size: u64,
}

/// A block materialized for transfer.
#[derive(Debug, Clone)]
pub struct UploadBlock {
    pub index: u32,
    pub block_id: String,
    pub bytes: bytes::Bytes,
}
