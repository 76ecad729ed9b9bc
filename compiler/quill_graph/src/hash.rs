//! Content hashes for modules, environments and outputs.
//!
//! Every input is length-prefixed before it is fed to sha256, so no two
//! different field sequences hash the same bytes.

use std::collections::BTreeMap;
use std::fmt;

use quill_eval::Environment;
use sha2::{Digest, Sha256};

/// A sha256 digest identifying a module version, an environment or an output.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        ContentHash(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(ContentHash(bytes))
    }

    /// First twelve hex digits, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

/// Incremental hasher over length-prefixed fields.
struct FieldHasher(Sha256);

impl FieldHasher {
    fn new(domain: &str) -> Self {
        let mut hasher = FieldHasher(Sha256::new());
        hasher.field(domain.as_bytes());
        hasher
    }

    fn field(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update((bytes.len() as u64).to_le_bytes());
        self.0.update(bytes);
        self
    }

    fn finish(self) -> ContentHash {
        ContentHash(self.0.finalize().into())
    }
}

/// Identity of a module version: its id, its source and its pins.
pub fn module_hash(id: &str, source: &str, pins: &BTreeMap<String, ContentHash>) -> ContentHash {
    let mut hasher = FieldHasher::new("module");
    hasher.field(id.as_bytes()).field(source.as_bytes());
    hasher.field(&(pins.len() as u64).to_le_bytes());
    for (name, pinned) in pins {
        hasher.field(name.as_bytes()).field(pinned.as_bytes());
    }
    hasher.finish()
}

pub fn environment_hash(environment: &Environment) -> ContentHash {
    let mut hasher = FieldHasher::new("environment");
    hasher
        .field(&environment.sample_count.to_le_bytes())
        .field(&environment.precision.to_le_bytes())
        .field(environment.seed.as_bytes());
    hasher.finish()
}

/// Identity of the output of `module` run under `environment`.
pub fn output_hash(module: ContentHash, environment: ContentHash) -> ContentHash {
    let mut hasher = FieldHasher::new("output");
    hasher.field(module.as_bytes()).field(environment.as_bytes());
    hasher.finish()
}
