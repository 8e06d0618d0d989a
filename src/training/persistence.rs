//! Checked binary envelope for persisted models

use crate::error::{LagwatchError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Magic bytes for lagwatch model files
const MAGIC: [u8; 4] = *b"LGWM";
/// Current format version
const FORMAT_VERSION: u32 = 1;

/// Descriptive data stored next to the payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Training timestamp (RFC 3339)
    pub trained_at: String,
    pub feature_names: Vec<String>,
    pub model_type: String,
    pub crate_version: String,
    pub metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    magic: [u8; 4],
    format_version: u32,
    metadata: ArtifactMetadata,
    payload: Vec<u8>,
    checksum: u64,
}

/// FNV-1a hash of the payload
fn checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    data.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Serialize `value` with bincode and write it inside an envelope
pub fn write_artifact<T: Serialize, W: Write>(
    value: &T,
    metadata: ArtifactMetadata,
    mut writer: W,
) -> Result<()> {
    let payload = bincode::serialize(value)?;
    let envelope = Envelope {
        magic: MAGIC,
        format_version: FORMAT_VERSION,
        metadata,
        checksum: checksum(&payload),
        payload,
    };

    let bytes = bincode::serialize(&envelope)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read an envelope, verify it and decode the payload
pub fn read_artifact<T: DeserializeOwned, R: Read>(mut reader: R) -> Result<(T, ArtifactMetadata)> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let envelope: Envelope = bincode::deserialize(&bytes)
        .map_err(|e| LagwatchError::SerializationError(format!("not a model artifact: {}", e)))?;

    if envelope.magic != MAGIC {
        return Err(LagwatchError::SerializationError(
            "not a model artifact: bad magic bytes".to_string(),
        ));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(LagwatchError::SerializationError(format!(
            "unsupported artifact version {} (expected {})",
            envelope.format_version, FORMAT_VERSION
        )));
    }
    if checksum(&envelope.payload) != envelope.checksum {
        return Err(LagwatchError::SerializationError(
            "checksum mismatch; artifact is corrupted".to_string(),
        ));
    }

    let value = bincode::deserialize(&envelope.payload)?;
    Ok((value, envelope.metadata))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(checksum(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(checksum(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_corrupted_payload_is_rejected() {
        let mut bytes = Vec::new();
        write_artifact(&vec![1.5f64, 2.5], ArtifactMetadata::default(), &mut bytes).unwrap();

        let last = bytes.len() - 9;
        bytes[last] ^= 0xff;
        let result = read_artifact::<Vec<f64>, _>(bytes.as_slice());
        assert!(matches!(result, Err(LagwatchError::SerializationError(_))));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let result = read_artifact::<Vec<f64>, _>(&b"definitely not a model"[..]);
        assert!(matches!(result, Err(LagwatchError::SerializationError(_))));
    }
}
