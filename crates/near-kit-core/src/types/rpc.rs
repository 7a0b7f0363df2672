//! RPC response types.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::Value;

use super::{AccountId, CryptoHash, NearToken, PublicKey, Signature, TxExecutionStatus};

/// Storage staking price: 10^19 yoctoNEAR per byte.
pub const STORAGE_AMOUNT_PER_BYTE: u128 = 10_000_000_000_000_000_000;

// ============================================================================
// Account types
// ============================================================================

/// Result of a `view_account` query.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountView {
    /// Liquid balance.
    pub amount: NearToken,
    /// Staked balance.
    pub locked: NearToken,
    /// All zeros when no contract is deployed.
    pub code_hash: CryptoHash,
    pub storage_usage: u64,
    pub block_height: u64,
    pub block_hash: CryptoHash,
}

impl AccountView {
    /// Liquid balance reserved for storage: `max(0, storage_required - locked)`.
    /// Staked tokens count towards the storage requirement.
    pub fn storage_cost(&self) -> NearToken {
        let required = NearToken::from_yoctonear(
            STORAGE_AMOUNT_PER_BYTE.saturating_mul(u128::from(self.storage_usage)),
        );
        required.saturating_sub(self.locked)
    }

    /// Spendable balance.
    pub fn available(&self) -> NearToken {
        self.amount.saturating_sub(self.storage_cost())
    }

    pub fn has_contract(&self) -> bool {
        !self.code_hash.is_zero()
    }
}

/// Result of a `view_access_key` query.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessKeyView {
    /// Highest nonce used so far with this key.
    pub nonce: u64,
    pub permission: AccessKeyPermissionView,
    pub block_height: u64,
    pub block_hash: CryptoHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum AccessKeyPermissionView {
    FullAccess,
    FunctionCall {
        allowance: Option<NearToken>,
        receiver_id: AccountId,
        method_names: Vec<String>,
    },
}

/// Result of a `view_access_key_list` query.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessKeyListView {
    pub keys: Vec<AccessKeyInfoView>,
    pub block_height: u64,
    pub block_hash: CryptoHash,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessKeyInfoView {
    pub public_key: PublicKey,
    pub access_key: AccessKeyDetails,
}

/// An access key without the block it was read at.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessKeyDetails {
    pub nonce: u64,
    pub permission: AccessKeyPermissionView,
}

// ============================================================================
// Block and node types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BlockView {
    pub author: AccountId,
    pub header: BlockHeaderView,
}

/// The subset of a block header the client uses.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeaderView {
    pub height: u64,
    pub hash: CryptoHash,
    pub prev_hash: CryptoHash,
    pub epoch_id: CryptoHash,
    /// Nanoseconds since the Unix epoch.
    pub timestamp: u64,
    pub gas_price: NearToken,
}

/// Result of `gas_price`.
#[derive(Debug, Clone, Deserialize)]
pub struct GasPrice {
    /// Price of one unit of gas.
    pub gas_price: NearToken,
}

/// Result of `status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub chain_id: String,
    pub protocol_version: u32,
    pub latest_protocol_version: u32,
    pub sync_info: SyncInfo,
    pub version: NodeVersion,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncInfo {
    pub latest_block_hash: CryptoHash,
    pub latest_block_height: u64,
    pub latest_block_time: String,
    pub syncing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeVersion {
    pub version: String,
    pub build: String,
}

// ============================================================================
// Transaction outcome types
// ============================================================================

/// What `send_tx`, `broadcast_tx_commit` and `tx` return.
///
/// Everything but the status level is absent until the transaction has
/// executed.
#[derive(Debug, Clone, Deserialize)]
pub struct FinalExecutionOutcome {
    /// Older nodes omit this; see [`reached`](Self::reached).
    #[serde(default)]
    pub final_execution_status: Option<TxExecutionStatus>,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
    #[serde(default)]
    pub transaction: Option<TransactionView>,
    #[serde(default)]
    pub transaction_outcome: Option<ExecutionOutcomeWithId>,
    #[serde(default)]
    pub receipts_outcome: Vec<ExecutionOutcomeWithId>,
}

impl FinalExecutionOutcome {
    /// How far the transaction has progressed.
    ///
    /// Without an explicit level, a present execution status implies at
    /// least optimistic execution.
    pub fn reached(&self) -> TxExecutionStatus {
        match (self.final_execution_status, &self.status) {
            (Some(level), _) => level,
            (None, Some(ExecutionStatus::Unknown | ExecutionStatus::Pending) | None) => {
                TxExecutionStatus::None
            }
            (None, Some(_)) => TxExecutionStatus::ExecutedOptimistic,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            &self.status,
            Some(ExecutionStatus::SuccessValue(_) | ExecutionStatus::SuccessReceiptId(_))
        )
    }

    pub fn is_failure(&self) -> bool {
        self.failure().is_some()
    }

    /// The raw failure object, e.g. `{"ActionError": {...}}`.
    pub fn failure(&self) -> Option<&Value> {
        match &self.status {
            Some(ExecutionStatus::Failure(err)) => Some(err),
            _ => None,
        }
    }

    /// Decoded `SuccessValue` bytes.
    pub fn success_value(&self) -> Option<Vec<u8>> {
        match &self.status {
            Some(ExecutionStatus::SuccessValue(s)) => STANDARD.decode(s).ok(),
            _ => None,
        }
    }

    pub fn success_value_json<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.success_value()
            .and_then(|v| serde_json::from_slice(&v).ok())
    }

    pub fn transaction_hash(&self) -> Option<&CryptoHash> {
        self.transaction_outcome
            .as_ref()
            .map(|o| &o.id)
            .or_else(|| self.transaction.as_ref().map(|t| &t.hash))
    }

    /// Logs from the transaction and every receipt, in execution order.
    pub fn logs(&self) -> Vec<&str> {
        self.transaction_outcome
            .iter()
            .chain(&self.receipts_outcome)
            .flat_map(|o| o.outcome.logs.iter().map(String::as_str))
            .collect()
    }

    pub fn total_gas_burnt(&self) -> u64 {
        self.transaction_outcome
            .iter()
            .chain(&self.receipts_outcome)
            .map(|o| o.outcome.gas_burnt)
            .sum()
    }
}

/// Execution status of a transaction or receipt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum ExecutionStatus {
    Unknown,
    Pending,
    /// Left as JSON; see the error classifier in the RPC client.
    Failure(Value),
    /// Base64-encoded return value.
    SuccessValue(String),
    SuccessReceiptId(CryptoHash),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionView {
    pub signer_id: AccountId,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: AccountId,
    pub hash: CryptoHash,
    #[serde(default)]
    pub actions: Vec<Value>,
    pub signature: Signature,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionOutcomeWithId {
    /// Transaction or receipt id.
    pub id: CryptoHash,
    pub outcome: ExecutionOutcome,
    pub block_hash: CryptoHash,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionOutcome {
    pub executor_id: AccountId,
    pub gas_burnt: u64,
    pub tokens_burnt: NearToken,
    pub logs: Vec<String>,
    pub receipt_ids: Vec<CryptoHash>,
    pub status: ExecutionStatus,
}

// ============================================================================
// View function
// ============================================================================

/// Result of a `call_function` query.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewFunctionResult {
    pub result: Vec<u8>,
    #[serde(default)]
    pub logs: Vec<String>,
    pub block_height: u64,
    pub block_hash: CryptoHash,
}

impl ViewFunctionResult {
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.result)
    }

    /// For contracts that return borsh instead of JSON.
    pub fn borsh<T: borsh::BorshDeserialize>(&self) -> Result<T, borsh::io::Error> {
        borsh::from_slice(&self.result)
    }
}
