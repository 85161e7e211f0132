//! Content encryptor: produces the backend's encrypted blob format.
//!
//! Blob layout: `mac (32) || iv (16) || AES-256-CBC(padded plaintext)`, where
//! `mac = HMAC-SHA256(mac_key, iv || ciphertext)`. The plaintext is streamed
//! through in fixed-size reads; the MAC slot is written as zeros first and
//! filled in once the ciphertext is complete.
//!
//! The blob is written to a temporary sibling of the source file. It is removed
//! when the returned `EncryptedBlob` is dropped.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use aes::cipher::{BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, TryRngCore};
use sha2::{Digest, Sha256};
use tempfile::TempPath;

use crate::error::AppError;
use crate::models::encryption::{EncryptionManifest, FILE_DIGEST_ALGORITHM, PROFILE_IDENTIFIER};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub const KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;
pub const MAC_SIZE: usize = 32;
pub const CIPHER_BLOCK_SIZE: usize = 16;
/// Bytes preceding the ciphertext in the blob.
pub const HEADER_SIZE: usize = MAC_SIZE + IV_SIZE;

/// Plaintext read size; a multiple of the cipher block size.
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Encrypted blob on disk plus the sizes the file entry needs.
#[derive(Debug)]
pub struct EncryptedBlob {
    path: TempPath,
    pub plaintext_size: u64,
    pub encrypted_size: u64,
}

impl EncryptedBlob {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the blob now, reporting failures instead of swallowing them in Drop.
    pub fn close(self) -> crate::error::Result<()> {
        self.path.close()?;
        Ok(())
    }
}

/// Output of one encryption pass. The manifest belongs to exactly this blob.
#[derive(Debug)]
pub struct EncryptedPackage {
    pub blob: EncryptedBlob,
    pub manifest: EncryptionManifest,
}

/// Key material for one encryption pass.
struct ContentKeys {
    encryption_key: [u8; KEY_SIZE],
    mac_key: [u8; KEY_SIZE],
    iv: [u8; IV_SIZE],
}

impl ContentKeys {
    fn generate() -> crate::error::Result<Self> {
        let mut keys = ContentKeys {
            encryption_key: [0u8; KEY_SIZE],
            mac_key: [0u8; KEY_SIZE],
            iv: [0u8; IV_SIZE],
        };
        let mut rng = OsRng;
        for buf in [
            &mut keys.encryption_key[..],
            &mut keys.mac_key[..],
            &mut keys.iv[..],
        ] {
            rng.try_fill_bytes(buf)
                .map_err(|e| AppError::Encryption(format!("random source failed: {}", e)))?;
        }
        Ok(keys)
    }
}

/// Trailing-byte-count padding: N bytes of value N, N in 1..=16.
pub fn pad_final_block(tail: &[u8]) -> Vec<u8> {
    let pad = CIPHER_BLOCK_SIZE - (tail.len() % CIPHER_BLOCK_SIZE);
    let mut out = Vec::with_capacity(tail.len() + pad);
    out.extend_from_slice(tail);
    out.resize(tail.len() + pad, pad as u8);
    out
}

/// Encrypted size for a plaintext of `plaintext_len` bytes.
pub fn encrypted_len(plaintext_len: u64) -> u64 {
    let block = CIPHER_BLOCK_SIZE as u64;
    HEADER_SIZE as u64 + (plaintext_len / block + 1) * block
}

/// Encrypt `source` into a temporary sibling file.
///
/// Runs on the blocking pool; the whole file is read and written once.
pub async fn encrypt_file(source: &Path) -> crate::error::Result<EncryptedPackage> {
    let source = source.to_path_buf();
    tokio::task::spawn_blocking(move || encrypt_file_blocking(&source))
        .await
        .map_err(|e| AppError::Internal(format!("spawn_blocking join error: {}", e)))?
}

fn sibling_dir(source: &Path) -> PathBuf {
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn encryption_io(context: &str) -> impl Fn(std::io::Error) -> AppError + '_ {
    move |e| AppError::Encryption(format!("{}: {}", context, e))
}

pub fn encrypt_file_blocking(source: &Path) -> crate::error::Result<EncryptedPackage> {
    let mut input = File::open(source).map_err(encryption_io("cannot open source"))?;
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("package");

    let keys = ContentKeys::generate()?;
    let mut cipher = Aes256CbcEnc::new(&keys.encryption_key.into(), &keys.iv.into());
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&keys.mac_key)
        .map_err(|e| AppError::Encryption(format!("invalid MAC key: {}", e)))?;
    let mut digest = Sha256::new();
    mac.update(&keys.iv);

    let temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".bin")
        .tempfile_in(sibling_dir(source))
        .map_err(encryption_io("cannot create encrypted file"))?;
    let mut writer = BufWriter::new(temp);
    writer
        .write_all(&[0u8; MAC_SIZE])
        .and_then(|_| writer.write_all(&keys.iv))
        .map_err(encryption_io("write failed"))?;

    let mut plaintext_size: u64 = 0;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    // Bytes carried over that do not yet fill a whole cipher block.
    let mut carry: Vec<u8> = Vec::with_capacity(CIPHER_BLOCK_SIZE);
    loop {
        let n = input
            .read(&mut buf)
            .map_err(encryption_io("cannot read source"))?;
        if n == 0 {
            break;
        }
        plaintext_size += n as u64;
        digest.update(&buf[..n]);

        carry.extend_from_slice(&buf[..n]);
        let whole = carry.len() - carry.len() % CIPHER_BLOCK_SIZE;
        let mut chunk: Vec<u8> = carry.drain(..whole).collect();
        encrypt_blocks(&mut cipher, &mut chunk);
        mac.update(&chunk);
        writer
            .write_all(&chunk)
            .map_err(encryption_io("write failed"))?;
    }

    let mut last = pad_final_block(&carry);
    encrypt_blocks(&mut cipher, &mut last);
    mac.update(&last);
    writer
        .write_all(&last)
        .map_err(encryption_io("write failed"))?;

    let mac_bytes = mac.finalize().into_bytes();
    let mut file = writer
        .into_inner()
        .map_err(|e| AppError::Encryption(format!("flush failed: {}", e.error())))?;
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.write_all(&mac_bytes))
        .and_then(|_| file.as_file().sync_all())
        .map_err(encryption_io("cannot write MAC"))?;

    let encrypted_size = encrypted_len(plaintext_size);
    let manifest = EncryptionManifest {
        encryption_key: BASE64.encode(keys.encryption_key),
        mac_key: BASE64.encode(keys.mac_key),
        initialization_vector: BASE64.encode(keys.iv),
        mac: BASE64.encode(mac_bytes),
        profile_identifier: PROFILE_IDENTIFIER.to_string(),
        file_digest: BASE64.encode(digest.finalize()),
        file_digest_algorithm: FILE_DIGEST_ALGORITHM.to_string(),
    };

    Ok(EncryptedPackage {
        blob: EncryptedBlob {
            path: file.into_temp_path(),
            plaintext_size,
            encrypted_size,
        },
        manifest,
    })
}

/// Encrypt `data` in place. `data.len()` must be a multiple of the block size.
fn encrypt_blocks(cipher: &mut Aes256CbcEnc, data: &mut [u8]) {
    for block in data.chunks_exact_mut(CIPHER_BLOCK_SIZE) {
        cipher.encrypt_block_mut(block.into());
    }
}
