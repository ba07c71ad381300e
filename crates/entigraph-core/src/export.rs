//! # Canonical Triple Export
//!
//! Byte-stable serialization of a State's triple store.
//!
//! Downstream knowledge bases are rebuilt from this export, so two runs over
//! the same graph must produce identical bytes. Triples are written sorted,
//! together with the root id and the identifier counter, as a `postcard`
//! stream behind a small header:
//!
//! ```text
//! [header_len: u32 LE] [CanonicalHeader (postcard)] [CanonicalTriples (postcard)]
//! ```

use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES, MAX_IMPORT_TRIPLE_COUNT};
use crate::state::{State, Triple, TripleObject};
use crate::{EntityId, GraphError};
use serde::{Deserialize, Serialize};

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Header for canonical export files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub triple_count: u64,
    /// Checksum of the data section, see [`CanonicalTriples::checksum`].
    pub checksum: u64,
}

impl CanonicalHeader {
    #[must_use]
    pub fn new(triple_count: u64, checksum: u64) -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
            triple_count,
            checksum,
        }
    }

    /// Error messages stay generic; they describe the failure class only.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.magic != *MAGIC_BYTES {
            return Err(GraphError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(GraphError::SerializationError(
                "Unsupported file version".to_string(),
            ));
        }
        if self.triple_count > MAX_IMPORT_TRIPLE_COUNT {
            return Err(GraphError::SerializationError(format!(
                "Triple count {} exceeds maximum allowed {}",
                self.triple_count, MAX_IMPORT_TRIPLE_COUNT
            )));
        }
        Ok(())
    }
}

/// The triple store of one State in canonical form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalTriples {
    /// Identifier of the root entity.
    pub root: EntityId,
    /// Identifier counter at export time.
    pub next_id: u64,
    /// Triples sorted by (subject, relation, object).
    pub triples: Vec<Triple>,
}

impl CanonicalTriples {
    /// Capture the triple store of `state`, materializing it if needed.
    pub fn from_state(state: &mut State) -> Result<Self, GraphError> {
        let root = state.root_id()?.clone();
        let next_id = state.next_id();
        let triples = state.materialize_triples()?.iter().cloned().collect();
        Ok(Self {
            root,
            next_id,
            triples,
        })
    }

    /// Deterministic 64-bit FNV-1a digest of the data.
    ///
    /// Detects accidental corruption only. It is NOT collision resistant;
    /// use `canonical_crypto_hash` (feature `crypto-hash`) for that.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut hasher = Fnv1a::new();
        hasher.write_str(self.root.as_str());
        hasher.write(&self.next_id.to_le_bytes());
        for triple in &self.triples {
            hasher.write_str(triple.subject.as_str());
            hasher.write_str(&triple.relation);
            match &triple.object {
                TripleObject::Entity(id) => {
                    hasher.write(&[0]);
                    hasher.write_str(id.as_str());
                }
                TripleObject::Value(value) => {
                    hasher.write(&[1]);
                    hasher.write_str(&value.kind_name());
                    hasher.write_str(&value.to_string());
                }
            }
        }
        hasher.finish()
    }
}

struct Fnv1a(u64);

impl Fnv1a {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Self(Self::OFFSET)
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(Self::PRIME);
        }
    }

    /// Length-prefixed, so ("ab", "c") and ("a", "bc") differ.
    fn write_str(&mut self, s: &str) {
        self.write(&(s.len() as u64).to_le_bytes());
        self.write(s.as_bytes());
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

// =============================================================================
// EXPORT FUNCTIONS
// =============================================================================

/// Export the triple store of `state` to canonical postcard bytes.
pub fn export_canonical(state: &mut State) -> Result<Vec<u8>, GraphError> {
    let canonical = CanonicalTriples::from_state(state)?;
    encode(&canonical)
}

fn encode(canonical: &CanonicalTriples) -> Result<Vec<u8>, GraphError> {
    let header = CanonicalHeader::new(canonical.triples.len() as u64, canonical.checksum());

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| GraphError::SerializationError(format!("Header: {}", e)))?;
    let data_bytes = postcard::to_allocvec(canonical)
        .map_err(|e| GraphError::SerializationError(format!("Data: {}", e)))?;

    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Decode and verify a canonical export.
///
/// Checks the header, the count bound (before decoding the body), the
/// checksum, the triple count and the sort order.
pub fn import_canonical(data: &[u8]) -> Result<CanonicalTriples, GraphError> {
    let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
        return Err(GraphError::SerializationError(
            "Data too short".to_string(),
        ));
    };
    let header_len = u32::from_le_bytes(*len_bytes) as usize;
    if rest.len() < header_len {
        return Err(GraphError::SerializationError(
            "Data too short for header".to_string(),
        ));
    }
    let (header_bytes, body) = rest.split_at(header_len);

    let header: CanonicalHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| GraphError::SerializationError(format!("Header: {}", e)))?;
    header.validate()?;

    let canonical: CanonicalTriples = postcard::from_bytes(body)
        .map_err(|e| GraphError::SerializationError(format!("Data: {}", e)))?;

    let computed = canonical.checksum();
    if computed != header.checksum {
        return Err(GraphError::SerializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }
    if canonical.triples.len() as u64 != header.triple_count {
        return Err(GraphError::SerializationError(
            "Triple count mismatch".to_string(),
        ));
    }
    if !canonical.triples.windows(2).all(|w| w[0] < w[1]) {
        return Err(GraphError::SerializationError(
            "Triples are not in canonical order".to_string(),
        ));
    }
    Ok(canonical)
}

/// Whether `canonical_data` is an export of `state`'s current triple store.
pub fn verify_canonical(state: &mut State, canonical_data: &[u8]) -> Result<bool, GraphError> {
    let imported = import_canonical(canonical_data)?;
    Ok(CanonicalTriples::from_state(state)? == imported)
}

/// Canonical checksum of `state`'s triple store.
pub fn canonical_checksum(state: &mut State) -> Result<u64, GraphError> {
    Ok(CanonicalTriples::from_state(state)?.checksum())
}

// =============================================================================
// CRYPTOGRAPHIC HASH SUPPORT
// =============================================================================

/// BLAKE3 hash of the canonical export, as 64 hex characters.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash(state: &mut State) -> Result<String, GraphError> {
    let data = export_canonical(state)?;
    Ok(compute_blake3_hash(&data))
}

/// BLAKE3 hash of raw bytes, as 64 hex characters.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn compute_blake3_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
