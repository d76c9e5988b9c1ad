//! In-memory reassembly of chunked file transfers.
//!
//! The offer announces name/size/type; chunks arrive base64-encoded in any
//! order and may repeat. Once every index up to TOTAL_CHUNKS is present the
//! payload is assembled and held in memory; writing it anywhere is the
//! display layer's call.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

use lsnp_core::UserId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileError {
    #[error("unknown file id {0:?}")]
    Unknown(String),
    #[error("chunk index {index} outside of {total} chunks")]
    IndexOutOfRange { index: u32, total: u32 },
    #[error("chunk payload is not valid base64")]
    BadData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkProgress {
    /// Chunks still outstanding: (received, total).
    Pending(u32, u32),
    Complete,
}

#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub from: UserId,
    pub filename: String,
    pub filesize: u64,
    pub filetype: String,
    pub description: Option<String>,
    chunks: HashMap<u32, Vec<u8>>,
    total_chunks: Option<u32>,
    assembled: Option<Vec<u8>>,
}

impl IncomingFile {
    pub fn new(
        from: UserId,
        filename: String,
        filesize: u64,
        filetype: String,
        description: Option<String>,
    ) -> IncomingFile {
        IncomingFile {
            from,
            filename,
            filesize,
            filetype,
            description,
            chunks: HashMap::new(),
            total_chunks: None,
            assembled: None,
        }
    }

    /// Store one chunk. Duplicates overwrite; completion assembles.
    pub fn store_chunk(
        &mut self,
        index: u32,
        total: u32,
        data: &str,
    ) -> Result<ChunkProgress, FileError> {
        if index >= total {
            return Err(FileError::IndexOutOfRange { index, total });
        }
        let bytes = BASE64.decode(data).map_err(|_| FileError::BadData)?;
        self.total_chunks = Some(total);
        self.chunks.insert(index, bytes);

        let received = self.chunks.len() as u32;
        if received < total {
            return Ok(ChunkProgress::Pending(received, total));
        }
        let mut payload = Vec::new();
        for i in 0..total {
            payload.extend_from_slice(&self.chunks[&i]);
        }
        self.assembled = Some(payload);
        Ok(ChunkProgress::Complete)
    }

    pub fn is_complete(&self) -> bool {
        self.assembled.is_some()
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.assembled.as_deref()
    }
}

/// Split raw bytes into base64 chunk payloads of `chunk_size` raw bytes.
pub fn encode_chunks(bytes: &[u8], chunk_size: usize) -> Vec<String> {
    if bytes.is_empty() {
        return vec![BASE64.encode([])];
    }
    bytes.chunks(chunk_size).map(|c| BASE64.encode(c)).collect()
}
