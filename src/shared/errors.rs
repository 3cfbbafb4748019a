//! Error handling for the application

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::domain::asset::Asset;

/// Ledger-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient native balance for {holder}: required {required}, available {available}")]
    InsufficientNative {
        holder: Pubkey,
        required: u64,
        available: u64,
    },

    #[error("Insufficient balance of token {token} for {holder}: required {required}, available {available}")]
    InsufficientFungible {
        token: Pubkey,
        holder: Pubkey,
        required: u64,
        available: u64,
    },

    #[error("{holder} does not own {collection}#{id}")]
    NotOwner {
        collection: Pubkey,
        id: u64,
        holder: Pubkey,
    },

    #[error("Unknown token {collection}#{id}")]
    UnknownToken { collection: Pubkey, id: u64 },

    #[error("Token {collection}#{id} already exists")]
    TokenExists { collection: Pubkey, id: u64 },

    #[error("Insufficient allowance of token {token} from {owner} to {spender}: required {required}, available {available}")]
    InsufficientAllowance {
        token: Pubkey,
        owner: Pubkey,
        spender: Pubkey,
        required: u64,
        available: u64,
    },

    #[error("{operator} is not approved for {collection} by {owner}")]
    NotApproved {
        collection: Pubkey,
        owner: Pubkey,
        operator: Pubkey,
    },

    #[error("Non-fungible amount must be 1, got {0}")]
    InvalidNonFungibleAmount(u64),

    #[error("Arithmetic overflow")]
    Overflow,
}

/// Marketplace (external protocol) errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceError {
    #[error("Order {0} has expired")]
    OrderExpired(uuid::Uuid),

    #[error("Invalid signature for order {0}")]
    InvalidSignature(uuid::Uuid),

    #[error("Order {0} is no longer fillable")]
    OrderNotFillable(uuid::Uuid),

    #[error("Order {0} has not been posted")]
    OrderNotPosted(uuid::Uuid),

    #[error("{1} is not the maker of order {0}")]
    NotMaker(uuid::Uuid, Pubkey),

    #[error("Wrong order kind: expected {expected}")]
    WrongOrderKind { expected: &'static str },

    #[error("Partial fills are not supported ({numerator}/{denominator})")]
    PartialFillUnsupported { numerator: u64, denominator: u64 },

    #[error("Unsupported payment asset: {0}")]
    UnsupportedPayment(Asset),

    #[error("Token {token_id} does not satisfy the order criteria")]
    CriteriaMismatch { token_id: u64 },

    #[error("Order criteria require a token id proof")]
    MissingProof,

    #[error("Order fees {fees} exceed price {price}")]
    FeesExceedPrice { fees: u64, price: u64 },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Module (step) errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    #[error("Malformed payload: {0}")]
    Decode(String),

    #[error("Module does not accept value, got {0}")]
    UnexpectedValue(u64),

    #[error("Precondition failed for {asset}: expected {holder} to hold {expected}, found {actual}")]
    PreconditionFailed {
        asset: Asset,
        holder: Pubkey,
        expected: u64,
        actual: u64,
    },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("Unaccounted balance of {leftover} left in module")]
    UnaccountedBalance { leftover: u64 },

    #[error("Price {price} exceeds the configured cap {cap}")]
    PriceAboveCap { price: u64, cap: u64 },

    #[error("Fees {fees} exceed proceeds {proceeds}")]
    FeesExceedProceeds { fees: u64, proceeds: u64 },

    #[error("Module does not hold {0}")]
    ItemNotHeld(Asset),

    #[error("Inbound transfer rejected: {0}")]
    TransferRejected(String),

    #[error("Fill failed: {0}")]
    Fill(#[from] MarketplaceError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Router errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Attached value {attached} does not match the batch total {expected}")]
    ValueMismatch { attached: u64, expected: u128 },

    #[error("Reentrant call into the router")]
    Reentrancy,

    #[error("Unsuccessful execution at step {index} ({module}): {source}")]
    UnsuccessfulExecution {
        index: usize,
        module: Pubkey,
        #[source]
        source: ModuleError,
    },

    #[error("Unknown module: {0}")]
    UnknownModule(Pubkey),

    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    #[error("Callback rejected by {module}: {source}")]
    CallbackRejected {
        module: Pubkey,
        #[source]
        source: ModuleError,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Scenario error: {0}")]
    ScenarioError(String),

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Marketplace error: {0}")]
    Marketplace(#[from] MarketplaceError),
}

impl From<ModuleError> for AppError {
    fn from(err: ModuleError) -> Self {
        AppError::ScenarioError(err.to_string())
    }
}
