//! Versioned, self-verifying serialization of a topology and its parameters,
//! for whichever store owns durability.

use super::{Parameters, Topology};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const TOPOLOGY_SCHEMA_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported topology schema version {found} (expected {expected})")]
    UnsupportedSchema { found: u16, expected: u16 },
    #[error("topology digest mismatch: recorded {recorded}, computed {computed}")]
    DigestMismatch { recorded: String, computed: String },
    #[error("topology sequence {header} does not match payload sequence {payload}")]
    SequenceMismatch { header: u64, payload: u64 },
    #[error("topology document JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyDocument {
    pub schema_version: u16,
    pub sequence: u64,
    pub digest: String,
    pub topology: Topology,
    pub parameters: Parameters,
}

#[derive(Serialize)]
struct DigestInput<'a> {
    topology: &'a Topology,
    parameters: &'a Parameters,
}

impl TopologyDocument {
    pub fn new(topology: Topology, parameters: Parameters) -> Result<Self, DocumentError> {
        let digest = compute_digest(&topology, &parameters)?;
        Ok(Self {
            schema_version: TOPOLOGY_SCHEMA_VERSION,
            sequence: topology.sequence(),
            digest,
            topology,
            parameters,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parses and verifies a document. The schema version is checked before
    /// the payload is trusted.
    pub fn decode(bytes: &[u8]) -> Result<Self, DocumentError> {
        #[derive(Deserialize)]
        struct Header {
            schema_version: u16,
        }
        let header: Header = serde_json::from_slice(bytes)?;
        if header.schema_version != TOPOLOGY_SCHEMA_VERSION {
            return Err(DocumentError::UnsupportedSchema {
                found: header.schema_version,
                expected: TOPOLOGY_SCHEMA_VERSION,
            });
        }
        let document: TopologyDocument = serde_json::from_slice(bytes)?;
        document.verify()?;
        Ok(document)
    }

    pub fn verify(&self) -> Result<(), DocumentError> {
        if self.sequence != self.topology.sequence() {
            return Err(DocumentError::SequenceMismatch {
                header: self.sequence,
                payload: self.topology.sequence(),
            });
        }
        let computed = compute_digest(&self.topology, &self.parameters)?;
        if computed != self.digest {
            return Err(DocumentError::DigestMismatch {
                recorded: self.digest.clone(),
                computed,
            });
        }
        Ok(())
    }

    pub fn into_parts(self) -> (Topology, Parameters) {
        (self.topology, self.parameters)
    }
}

fn compute_digest(topology: &Topology, parameters: &Parameters) -> Result<String, DocumentError> {
    let payload = serde_json::to_vec(&DigestInput {
        topology,
        parameters,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&payload);
    Ok(hex::encode(hasher.finalize()))
}
