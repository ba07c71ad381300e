//! # Runtime Constants
//!
//! Fixed constants of the entity-graph runtime. They are compiled into the
//! binary and immutable at runtime.

/// Prefix of every minted entity identifier (`e1`, `e2`, ...).
pub const ID_PREFIX: &str = "e";

/// First value of a State's identifier counter.
pub const FIRST_ID: u64 = 1;

/// Magic bytes for the canonical triple export header.
pub const MAGIC_BYTES: &[u8; 4] = b"EGTX";

/// Current canonical export format version.
///
/// Increment this when making breaking changes to the export format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum number of triples accepted by a canonical import.
///
/// Prevents memory exhaustion from corrupted or hostile export files.
pub const MAX_IMPORT_TRIPLE_COUNT: u64 = 10_000_000;

/// First numeric suffix given to a friendly id whose base is already taken.
pub const FRIENDLY_ID_SUFFIX_START: usize = 2;
