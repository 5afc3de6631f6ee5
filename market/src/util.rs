//! CBOR helpers shared by listing documents and the reference store.

use crate::error::{MarketError, MarketResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a value as CBOR.
pub fn cbor_to_vec<T: Serialize>(value: &T) -> MarketResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| MarketError::Serialization(format!("CBOR serialization failed: {e}")))?;
    Ok(bytes)
}

/// Deserialize CBOR data with a size limit to prevent oversized payloads.
pub fn cbor_from_limited_reader<T: DeserializeOwned>(
    data: &[u8],
    max_bytes: usize,
) -> MarketResult<T> {
    if data.len() > max_bytes {
        return Err(MarketError::Validation(format!(
            "CBOR payload too large: {} bytes (max {})",
            data.len(),
            max_bytes
        )));
    }
    ciborium::from_reader(data)
        .map_err(|e| MarketError::Serialization(format!("CBOR deserialization failed: {e}")))
}
