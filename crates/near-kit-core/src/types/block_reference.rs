//! Block references and execution-status thresholds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::CryptoHash;

/// Which block an RPC query reads state from.
///
/// A finality level and a concrete block id are mutually exclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockReference {
    /// Latest block at the given finality.
    Finality(Finality),
    /// Block at a specific height.
    Height(u64),
    /// Block with a specific hash.
    Hash(CryptoHash),
}

impl Default for BlockReference {
    fn default() -> Self {
        Self::Finality(Finality::Final)
    }
}

impl BlockReference {
    pub fn final_() -> Self {
        Self::Finality(Finality::Final)
    }

    pub fn optimistic() -> Self {
        Self::Finality(Finality::Optimistic)
    }

    pub fn at_height(height: u64) -> Self {
        Self::Height(height)
    }

    pub fn at_hash(hash: CryptoHash) -> Self {
        Self::Hash(hash)
    }

    /// The JSON fields selecting this block in an RPC request.
    pub fn to_rpc_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        match self {
            BlockReference::Finality(f) => {
                params.insert("finality".into(), f.as_str().into());
            }
            BlockReference::Height(h) => {
                params.insert("block_id".into(), (*h).into());
            }
            BlockReference::Hash(h) => {
                params.insert("block_id".into(), h.to_string().into());
            }
        }
        params
    }
}

impl From<Finality> for BlockReference {
    fn from(f: Finality) -> Self {
        Self::Finality(f)
    }
}

impl From<u64> for BlockReference {
    fn from(height: u64) -> Self {
        Self::Height(height)
    }
}

impl From<CryptoHash> for BlockReference {
    fn from(hash: CryptoHash) -> Self {
        Self::Hash(hash)
    }
}

/// Finality level for queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finality {
    /// Latest optimistic block. Fastest, but may be reorged.
    Optimistic,
    /// Doomslug finality.
    #[serde(rename = "near-final")]
    NearFinal,
    /// Fully finalized.
    #[default]
    Final,
}

impl Finality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Finality::Optimistic => "optimistic",
            Finality::NearFinal => "near-final",
            Finality::Final => "final",
        }
    }
}

/// How far a transaction has progressed, and how far a sender wants to wait.
///
/// Totally ordered: each level implies every level before it.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxExecutionStatus {
    /// Accepted by the RPC node; nothing else is known.
    None,
    Included,
    #[default]
    ExecutedOptimistic,
    IncludedFinal,
    Executed,
    Final,
}

impl TxExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Included => "INCLUDED",
            Self::ExecutedOptimistic => "EXECUTED_OPTIMISTIC",
            Self::IncludedFinal => "INCLUDED_FINAL",
            Self::Executed => "EXECUTED",
            Self::Final => "FINAL",
        }
    }

    /// Whether reaching `self` satisfies a wait for `threshold`.
    pub fn satisfies(&self, threshold: TxExecutionStatus) -> bool {
        *self >= threshold
    }
}
