//! Balance invariants.
//!
//! Every mutation of account funds flows through the three functions
//! below, which uphold, for both endpoints:
//!
//! - `balance >= locked >= 0` at every return point
//! - conservation: a settled transfer moves value, never creates it

use crate::error::EngineError;
use ledger_types::{Account, Amount};
use thiserror::Error;

/// Why a settlement could not be applied.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SettleError {
    /// The sender's lock no longer covers the amount. There is nothing to
    /// revert: the reservation is already gone.
    #[error("Inconsistent locked amount")]
    LockedShortfall {
        /// Sender's current lock.
        locked: Amount,
        /// Transfer amount.
        amount: Amount,
    },

    /// The sender's balance no longer covers the amount; the outstanding
    /// lock must be reverted by the caller.
    #[error("Insufficient balance at execution")]
    BalanceShortfall {
        /// Sender's current balance.
        balance: Amount,
        /// Transfer amount.
        amount: Amount,
    },

    /// Crediting the recipient would leave the (18, 8) range.
    #[error("recipient balance out of range")]
    CreditOverflow,
}

/// Reserves `amount` on the sender: `locked += amount` after an
/// available-funds check. The nonce bump is the intake's concern.
pub fn reserve_funds(sender: &mut Account, amount: Amount) -> Result<(), EngineError> {
    let available = sender.available();
    if available < amount {
        return Err(EngineError::InsufficientFunds { available, requested: amount });
    }
    // available >= amount implies locked + amount <= balance, which is in
    // range whenever balance is; the checked op guards the arithmetic.
    sender.locked = sender
        .locked
        .checked_add(amount)
        .map_err(|e| EngineError::InvariantViolation(e.to_string()))?;
    Ok(())
}

/// Releases a reservation, clamped at zero. Used for compensation after a
/// failed execution, where the lock may already be partially gone.
pub fn release_lock(sender: &mut Account, amount: Amount) {
    sender.locked = sender.locked.saturating_sub(amount);
}

/// Applies the double entry: `sender.balance -= amount`,
/// `sender.locked -= amount`, `recipient.balance += amount`.
///
/// Mutates nothing unless every step is possible.
pub fn settle_transfer(
    sender: &mut Account,
    recipient: &mut Account,
    amount: Amount,
) -> Result<(), SettleError> {
    if sender.locked < amount {
        return Err(SettleError::LockedShortfall { locked: sender.locked, amount });
    }
    if sender.balance < amount {
        return Err(SettleError::BalanceShortfall { balance: sender.balance, amount });
    }
    let credited = recipient
        .balance
        .checked_add(amount)
        .map_err(|_| SettleError::CreditOverflow)?;

    // locked >= amount and balance >= amount were checked above.
    sender.balance = sender.balance.saturating_sub(amount);
    sender.locked = sender.locked.saturating_sub(amount);
    recipient.balance = credited;
    Ok(())
}
