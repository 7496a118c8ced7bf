//! Account origination and transaction visibility.

use crate::error::{EngineError, Result};
use crate::ports::{AccountStore, LockMode, StoreTx};
use ledger_types::{Account, Currency, LedgerTransaction, Wallet};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Opens accounts and answers user-scoped transaction lookups.
pub struct AccountService {
    store: Arc<dyn AccountStore>,
}

impl AccountService {
    /// Creates the service.
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Opens an account for `user_id` in `currency`, creating the user's
    /// wallet on first use. One account per `(wallet, currency)`.
    pub async fn open_account(&self, user_id: Uuid, currency: &str) -> Result<Account> {
        let currency = Currency::new(currency)?;

        let mut tx = self.store.begin().await?;
        let wallet = match tx.wallet_of_user(user_id).await? {
            Some(existing) => existing,
            None => {
                let wallet = Wallet::new(user_id);
                tx.insert_wallet(&wallet).await?;
                wallet
            }
        };
        if tx
            .wallet_account_in_currency(wallet.id, &currency)
            .await?
            .is_some()
        {
            return Err(EngineError::InvalidInput(format!(
                "wallet already holds a {currency} account"
            )));
        }

        let account = Account::open(wallet.id, currency);
        tx.insert_account(&account).await?;
        tx.commit().await?;

        info!(
            "[accounts] opened {} ({}) for user {user_id}",
            account.system_address, account.currency
        );
        Ok(account)
    }

    /// Loads a transaction by its external hash, visible only to users
    /// owning one of its endpoints.
    pub async fn transaction_of(
        &self,
        user_id: Uuid,
        system_hash: &str,
    ) -> Result<LedgerTransaction> {
        let mut tx = self.store.begin().await?;
        let Some(row) = tx.transaction_by_hash(system_hash).await? else {
            return Err(EngineError::NotFound(format!("transaction {system_hash}")));
        };

        let visible = owns_account(tx.as_mut(), row.from_account_id, user_id).await?
            || owns_account(tx.as_mut(), row.to_account_id, user_id).await?;
        tx.commit().await?;

        if !visible {
            return Err(EngineError::Forbidden(format!(
                "transaction {system_hash} is not visible to this user"
            )));
        }
        Ok(row)
    }
}

async fn owns_account(
    tx: &mut dyn StoreTx,
    account_id: Uuid,
    user_id: Uuid,
) -> Result<bool> {
    let Some(account) = tx.account_by_id(account_id, LockMode::None).await? else {
        return Ok(false);
    };
    let Some(wallet) = tx.wallet_by_id(account.wallet_id).await? else {
        return Ok(false);
    };
    Ok(wallet.user_id == user_id)
}
