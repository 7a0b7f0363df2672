//! Transaction actions and their canonical binary layout.
//!
//! Enum variant order is the wire discriminant. Reordering anything here
//! changes every transaction hash this crate produces.

use borsh::{BorshDeserialize, BorshSerialize};

use super::{AccountId, Gas, NearToken, PublicKey, SignedDelegateAction};

/// Access key permission. `FunctionCall = 0`, `FullAccess = 1`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum AccessKeyPermission {
    FunctionCall(FunctionCallPermission),
    FullAccess,
}

/// Restrictions on a function-call access key.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FunctionCallPermission {
    /// Spending cap; `None` means unlimited.
    pub allowance: Option<NearToken>,
    pub receiver_id: AccountId,
    /// Callable methods; empty means any.
    pub method_names: Vec<String>,
}

/// An access key as stored on chain.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AccessKey {
    pub nonce: u64,
    pub permission: AccessKeyPermission,
}

impl AccessKey {
    pub fn full_access() -> Self {
        Self {
            nonce: 0,
            permission: AccessKeyPermission::FullAccess,
        }
    }

    pub fn function_call(
        receiver_id: AccountId,
        method_names: Vec<String>,
        allowance: Option<NearToken>,
    ) -> Self {
        Self {
            nonce: 0,
            permission: AccessKeyPermission::FunctionCall(FunctionCallPermission {
                allowance,
                receiver_id,
                method_names,
            }),
        }
    }
}

/// A transaction action.
///
/// | tag | variant |
/// |-----|---------|
/// | 0 | `CreateAccount` |
/// | 1 | `DeployContract` |
/// | 2 | `FunctionCall` |
/// | 3 | `Transfer` |
/// | 4 | `Stake` |
/// | 5 | `AddKey` |
/// | 6 | `DeleteKey` |
/// | 7 | `DeleteAccount` |
/// | 8 | `Delegate` |
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Action {
    CreateAccount(CreateAccountAction),
    DeployContract(DeployContractAction),
    FunctionCall(FunctionCallAction),
    Transfer(TransferAction),
    Stake(StakeAction),
    AddKey(AddKeyAction),
    DeleteKey(DeleteKeyAction),
    DeleteAccount(DeleteAccountAction),
    Delegate(Box<SignedDelegateAction>),
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CreateAccountAction;

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DeployContractAction {
    /// WASM bytes.
    pub code: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FunctionCallAction {
    pub method_name: String,
    /// Already-encoded arguments (usually JSON).
    pub args: Vec<u8>,
    pub gas: Gas,
    pub deposit: NearToken,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TransferAction {
    pub deposit: NearToken,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StakeAction {
    pub stake: NearToken,
    /// Validator key.
    pub public_key: PublicKey,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AddKeyAction {
    pub public_key: PublicKey,
    pub access_key: AccessKey,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DeleteKeyAction {
    pub public_key: PublicKey,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DeleteAccountAction {
    /// Receives the remaining balance.
    pub beneficiary_id: AccountId,
}

impl Action {
    pub fn create_account() -> Self {
        Self::CreateAccount(CreateAccountAction)
    }

    pub fn deploy_contract(code: Vec<u8>) -> Self {
        Self::DeployContract(DeployContractAction { code })
    }

    pub fn function_call(
        method_name: impl Into<String>,
        args: Vec<u8>,
        gas: Gas,
        deposit: NearToken,
    ) -> Self {
        Self::FunctionCall(FunctionCallAction {
            method_name: method_name.into(),
            args,
            gas,
            deposit,
        })
    }

    pub fn transfer(deposit: NearToken) -> Self {
        Self::Transfer(TransferAction { deposit })
    }

    pub fn stake(stake: NearToken, public_key: PublicKey) -> Self {
        Self::Stake(StakeAction { stake, public_key })
    }

    pub fn add_full_access_key(public_key: PublicKey) -> Self {
        Self::AddKey(AddKeyAction {
            public_key,
            access_key: AccessKey::full_access(),
        })
    }

    pub fn add_function_call_key(
        public_key: PublicKey,
        receiver_id: AccountId,
        method_names: Vec<String>,
        allowance: Option<NearToken>,
    ) -> Self {
        Self::AddKey(AddKeyAction {
            public_key,
            access_key: AccessKey::function_call(receiver_id, method_names, allowance),
        })
    }

    pub fn delete_key(public_key: PublicKey) -> Self {
        Self::DeleteKey(DeleteKeyAction { public_key })
    }

    pub fn delete_account(beneficiary_id: AccountId) -> Self {
        Self::DeleteAccount(DeleteAccountAction { beneficiary_id })
    }

    /// Wrap a relayed meta-transaction.
    pub fn delegate(signed_delegate: SignedDelegateAction) -> Self {
        Self::Delegate(Box::new(signed_delegate))
    }
}

/// An action that is allowed inside a delegate action (anything but
/// `Delegate`). Encodes exactly like the wrapped [`Action`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize)]
pub struct NonDelegateAction(Action);

impl NonDelegateAction {
    pub fn inner(&self) -> &Action {
        &self.0
    }

    pub fn into_inner(self) -> Action {
        self.0
    }
}

impl TryFrom<Action> for NonDelegateAction {
    type Error = Action;

    /// Hands the action back if it is itself a delegate action.
    fn try_from(action: Action) -> Result<Self, Self::Error> {
        match action {
            Action::Delegate(_) => Err(action),
            other => Ok(Self(other)),
        }
    }
}

impl From<NonDelegateAction> for Action {
    fn from(action: NonDelegateAction) -> Self {
        action.0
    }
}

impl BorshDeserialize for NonDelegateAction {
    fn deserialize_reader<R: borsh::io::Read>(reader: &mut R) -> borsh::io::Result<Self> {
        Action::deserialize_reader(reader)?.try_into().map_err(|_| {
            borsh::io::Error::new(
                borsh::io::ErrorKind::InvalidData,
                "delegate actions cannot be nested",
            )
        })
    }
}
