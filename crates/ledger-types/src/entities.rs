//! Core ledger entities.
//!
//! Account <-> Transaction <-> Block references form cycles in the schema;
//! here they are arena rows keyed by UUID with the relation carried as a
//! foreign key, hydrated only to the depth an operation needs.

use crate::amount::Amount;
use crate::handles::{new_system_address, new_system_hash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// An invalid currency code.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid currency code: {0:?}")]
pub struct CurrencyError(pub String);

/// Uppercase currency code, e.g. `NGN` or `BTC`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Normalizes and validates a currency code: 2 to 10 ASCII
    /// alphanumerics, stored uppercase.
    pub fn new(code: &str) -> Result<Self, CurrencyError> {
        let trimmed = code.trim();
        if trimmed.len() < 2
            || trimmed.len() > 10
            || !trimmed.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CurrencyError(code.to_string()));
        }
        Ok(Currency(trimmed.to_ascii_uppercase()))
    }

    /// The normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction lifecycle status.
///
/// The legal lattice:
///
/// ```text
/// PENDING ----> PROCESSING ----> CONFIRMED (terminal)
///    |              |
///    |              +----------> FAILED    (terminal)
///    +-------------------------> FAILED    (terminal)
///    +-------------------------> CANCELLED (terminal, operator-driven)
/// ```
///
/// `PROCESSING -> PENDING` is never legal; a stuck PROCESSING row is a
/// recovery concern, not a rollback target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxStatus {
    /// Accepted and funds reserved; waiting in the mempool.
    #[default]
    Pending,
    /// Debit/credit applied; waiting to be sealed into a block.
    Processing,
    /// Sealed into a block. Terminal.
    Confirmed,
    /// Execution failed. Terminal.
    Failed,
    /// Withdrawn before execution. Terminal; never produced by the pipeline.
    Cancelled,
}

impl TxStatus {
    /// True for states that never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed | TxStatus::Cancelled)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: TxStatus) -> bool {
        matches!(
            (self, next),
            (TxStatus::Pending, TxStatus::Processing)
                | (TxStatus::Pending, TxStatus::Failed)
                | (TxStatus::Pending, TxStatus::Cancelled)
                | (TxStatus::Processing, TxStatus::Confirmed)
                | (TxStatus::Processing, TxStatus::Failed)
        )
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxStatus::Pending => "PENDING",
            TxStatus::Processing => "PROCESSING",
            TxStatus::Confirmed => "CONFIRMED",
            TxStatus::Failed => "FAILED",
            TxStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// An illegal status transition.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("illegal status transition {from} -> {to}")]
pub struct StatusError {
    /// Current status.
    pub from: TxStatus,
    /// Rejected target status.
    pub to: TxStatus,
}

/// Kind of ledger movement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxKind {
    /// Account-to-account transfer. The only kind the pipeline drives.
    #[default]
    Transfer,
    /// External funds entering the ledger.
    Deposit,
    /// Funds leaving the ledger.
    Withdrawal,
}

/// Ownership anchor for a user's accounts.
///
/// The collaborator that originates wallets also holds the encrypted
/// mnemonic; the engine only ever needs the `user_id` link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Row id.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
}

impl Wallet {
    /// Creates a wallet for a user.
    pub fn new(user_id: Uuid) -> Self {
        Self { id: Uuid::new_v4(), user_id }
    }
}

/// A currency-scoped balance holder owned by a wallet.
///
/// Invariants: `balance >= locked >= 0`; `(wallet_id, currency)` unique;
/// `system_address` globally unique; `nonce` monotone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Row id.
    pub id: Uuid,
    /// External opaque handle (`acc_<hex>`).
    pub system_address: String,
    /// Owning wallet.
    pub wallet_id: Uuid,
    /// Currency this account holds.
    pub currency: Currency,
    /// Total funds, including the locked portion.
    pub balance: Amount,
    /// Portion of `balance` reserved against outbound transfers.
    pub locked: Amount,
    /// Count of transfers ever accepted from this account.
    pub nonce: u64,
}

impl Account {
    /// Opens an empty account in the given wallet and currency.
    pub fn open(wallet_id: Uuid, currency: Currency) -> Self {
        Self {
            id: Uuid::new_v4(),
            system_address: new_system_address(),
            wallet_id,
            currency,
            balance: Amount::ZERO,
            locked: Amount::ZERO,
            nonce: 0,
        }
    }

    /// Funds not reserved by in-flight transfers: `balance - locked`.
    pub fn available(&self) -> Amount {
        self.balance.saturating_sub(self.locked)
    }
}

/// A single ledger movement between two accounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// Row id.
    pub id: Uuid,
    /// External opaque handle (`txn_<hex>`).
    pub system_hash: String,
    /// Debited account.
    pub from_account_id: Uuid,
    /// Credited account.
    pub to_account_id: Uuid,
    /// Transfer amount; strictly positive.
    pub amount: Amount,
    /// Currency of both endpoints.
    pub currency: Currency,
    /// Fee charged on top of `amount`.
    pub fee: Amount,
    /// Lifecycle status.
    pub status: TxStatus,
    /// Movement kind.
    pub kind: TxKind,
    /// Sender's nonce at submission, before the bump.
    pub account_nonce: u64,
    /// Free-form caller note.
    pub description: Option<String>,
    /// Why the transfer failed, when `status` is FAILED.
    pub failure_reason: Option<String>,
    /// Containing block, set exactly once at confirmation.
    pub block_id: Option<Uuid>,
    /// Height of the containing block.
    pub block_height: Option<u64>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// Builds a PENDING transfer row with a fresh system hash.
    #[allow(clippy::too_many_arguments)]
    pub fn transfer(
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Amount,
        currency: Currency,
        account_nonce: u64,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            system_hash: new_system_hash(),
            from_account_id,
            to_account_id,
            amount,
            currency,
            fee: Amount::ZERO,
            status: TxStatus::Pending,
            kind: TxKind::Transfer,
            account_nonce,
            description,
            failure_reason: None,
            block_id: None,
            block_height: None,
            created_at,
        }
    }

    /// Moves the row along the status lattice, rejecting illegal jumps.
    pub fn transition_to(&mut self, next: TxStatus) -> Result<(), StatusError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusError { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }
}

/// A sealed, immutable batch of confirmed transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Row id.
    pub id: Uuid,
    /// Chain height; 0 for genesis, gapless thereafter.
    pub height: u64,
    /// Lower-case 64-hex commitment over the block fields.
    pub block_hash: String,
    /// Hash of the prior block; `None` only at height 0.
    pub previous_block_hash: Option<String>,
    /// Sealing time (UTC, millisecond precision).
    pub timestamp: DateTime<Utc>,
    /// Commitment to the unordered set of member transaction hashes.
    pub merkle_root: String,
}

/// Cached, user-facing view of one account's funds.
///
/// Serialized as JSON under the `balance:{system_address}` cache key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// `balance - locked`.
    pub available: Amount,
    /// Reserved portion.
    pub locked: Amount,
    /// Total funds.
    pub total: Amount,
    /// Account currency.
    pub currency: Currency,
    /// Current account nonce.
    pub nonce: u64,
}

impl BalanceSnapshot {
    /// Snapshot of an account's current funds.
    pub fn of(account: &Account) -> Self {
        Self {
            available: account.available(),
            locked: account.locked,
            total: account.balance,
            currency: account.currency.clone(),
            nonce: account.nonce,
        }
    }
}
