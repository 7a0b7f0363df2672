//! Wire types and RPC views.
//!
//! Account ids, token amounts and gas come from the NEAR ecosystem crates;
//! everything that has a byte-exact wire form lives here.

mod action;
mod block_reference;
mod delegate;
mod hash;
mod key;
pub mod nep413;
mod rpc;
mod transaction;

pub use action::{
    AccessKey, AccessKeyPermission, Action, AddKeyAction, CreateAccountAction, DeleteAccountAction,
    DeleteKeyAction, DeployContractAction, FunctionCallAction, FunctionCallPermission,
    NonDelegateAction, StakeAction, TransferAction,
};
pub use block_reference::{BlockReference, Finality, TxExecutionStatus};
pub use delegate::{
    DELEGATE_ACTION_PREFIX, DecodeError as DelegateDecodeError, DelegateAction,
    SignedDelegateAction, decode_signed_delegate_action, encode_signed_delegate_action,
    serialize_delegate_action,
};
pub use hash::CryptoHash;
pub use key::{KeyPair, KeyType, PublicKey, SecretKey, Signature};
pub use near_account_id::AccountId;
pub use near_gas::NearGas as Gas;
pub use near_token::NearToken;
pub use rpc::{
    AccessKeyDetails, AccessKeyInfoView, AccessKeyListView, AccessKeyPermissionView, AccessKeyView,
    AccountView, BlockHeaderView, BlockView, ExecutionOutcome, ExecutionOutcomeWithId,
    ExecutionStatus, FinalExecutionOutcome, GasPrice, NodeVersion, STORAGE_AMOUNT_PER_BYTE,
    StatusResponse, SyncInfo, TransactionView, ViewFunctionResult,
};
pub use transaction::{SignedTransaction, Transaction};

/// Borsh-encode into memory.
///
/// Every type passed here has a derived or hand-written encoder that only
/// fails when the underlying writer does, and a `Vec` never does.
pub(crate) fn borsh_bytes<T: borsh::BorshSerialize + ?Sized>(value: &T) -> Vec<u8> {
    borsh::to_vec(value).expect("borsh encoding into a Vec cannot fail")
}
