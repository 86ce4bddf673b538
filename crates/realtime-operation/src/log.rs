//! Framed operation log.
//!
//! Layout: one version byte, then for every entry a big-endian `u32` length
//! followed by that many bytes of JSON-encoded [`SequencedOperation`].
//! An empty buffer is an empty log.

use thiserror::Error;

use crate::operation::SequencedOperation;

pub const OPERATION_LOG_VERSION: u8 = 1;
pub const MAX_ENTRY_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum OperationLogError {
    #[error("unsupported operation log version: {0}")]
    UnsupportedVersion(u8),
    #[error("corrupt operation log: truncated length header")]
    TruncatedLengthHeader,
    #[error("corrupt operation log: entry size {0} exceeds max")]
    EntryTooLarge(usize),
    #[error("corrupt operation log: truncated entry data")]
    TruncatedEntryData,
    #[error("operation decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

fn encode_entry(entry: &SequencedOperation) -> Result<Vec<u8>, OperationLogError> {
    let bin = serde_json::to_vec(entry)?;
    if bin.len() > MAX_ENTRY_SIZE {
        return Err(OperationLogError::EntryTooLarge(bin.len()));
    }
    Ok(bin)
}

fn push_frame(out: &mut Vec<u8>, bin: &[u8]) {
    out.extend_from_slice(&(bin.len() as u32).to_be_bytes());
    out.extend_from_slice(bin);
}

pub fn serialize_operations(entries: &[SequencedOperation]) -> Result<Vec<u8>, OperationLogError> {
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let binaries = entries
        .iter()
        .map(encode_entry)
        .collect::<Result<Vec<_>, _>>()?;
    let total_len = 1usize + binaries.iter().map(|b| 4 + b.len()).sum::<usize>();

    let mut out = Vec::with_capacity(total_len);
    out.push(OPERATION_LOG_VERSION);
    for bin in &binaries {
        push_frame(&mut out, bin);
    }
    Ok(out)
}

pub fn deserialize_operations(data: &[u8]) -> Result<Vec<SequencedOperation>, OperationLogError> {
    if data.is_empty() {
        return Ok(vec![]);
    }

    let version = data[0];
    if version != OPERATION_LOG_VERSION {
        return Err(OperationLogError::UnsupportedVersion(version));
    }

    let mut entries = Vec::new();
    let mut offset = 1usize;

    while offset < data.len() {
        let header = data
            .get(offset..offset + 4)
            .ok_or(OperationLogError::TruncatedLengthHeader)?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        offset += 4;

        if len > MAX_ENTRY_SIZE {
            return Err(OperationLogError::EntryTooLarge(len));
        }
        if len > data.len() - offset {
            return Err(OperationLogError::TruncatedEntryData);
        }

        entries.push(serde_json::from_slice(&data[offset..offset + len])?);
        offset += len;
    }

    Ok(entries)
}

pub fn append_operation(
    existing: &[u8],
    entry: &SequencedOperation,
) -> Result<Vec<u8>, OperationLogError> {
    let bin = encode_entry(entry)?;

    let mut out = Vec::with_capacity(existing.len().max(1) + 4 + bin.len());
    if existing.is_empty() {
        out.push(OPERATION_LOG_VERSION);
    } else {
        out.extend_from_slice(existing);
    }
    push_frame(&mut out, &bin);
    Ok(out)
}
