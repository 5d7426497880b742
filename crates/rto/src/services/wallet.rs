//! Wallet charge gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CompanyId, Money};

use crate::error::{Result, RtoError};

/// Result of a successful wallet charge.
#[derive(Debug, Clone)]
pub struct ChargeReceipt {
    /// Caller-supplied reference echoed back for reconciliation.
    pub reference: String,
    /// Balance after the deduction.
    pub new_balance: Money,
}

/// Trait for the seller wallet.
///
/// The deduction is a single atomic conditional update on the gateway
/// side ("deduct if balance covers the amount"), so concurrent triggers
/// for the same company cannot overdraw.
#[async_trait]
pub trait WalletChargeGateway: Send + Sync {
    /// Returns the company's current balance.
    async fn get_balance(&self, company_id: CompanyId) -> Result<Money>;

    /// Returns true if the balance covers `amount`.
    async fn has_minimum_balance(&self, company_id: CompanyId, amount: Money) -> Result<bool>;

    /// Atomically deducts `amount` if the balance covers it.
    async fn handle_rto_charge(
        &self,
        company_id: CompanyId,
        amount: Money,
        reference: &str,
    ) -> Result<ChargeReceipt>;

    /// Reverses a previous charge, identified by its reference.
    async fn reverse_rto_charge(
        &self,
        company_id: CompanyId,
        amount: Money,
        reference: &str,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryWalletState {
    balances: HashMap<CompanyId, Money>,
    charges: HashMap<String, (CompanyId, Money)>,
    fail_on_charge: bool,
}

/// In-memory wallet gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWalletGateway {
    state: Arc<RwLock<InMemoryWalletState>>,
}

impl InMemoryWalletGateway {
    /// Creates a new in-memory wallet gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a company's balance.
    pub fn set_balance(&self, company_id: CompanyId, balance: Money) {
        self.state
            .write()
            .unwrap()
            .balances
            .insert(company_id, balance);
    }

    /// Returns a company's balance without going through the trait.
    pub fn balance_of(&self, company_id: CompanyId) -> Money {
        self.state
            .read()
            .unwrap()
            .balances
            .get(&company_id)
            .copied()
            .unwrap_or_else(Money::zero)
    }

    /// Configures the gateway to fail the next charge call.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().unwrap().fail_on_charge = fail;
    }

    /// Returns the number of charges currently held (reversals removed).
    pub fn charge_count(&self) -> usize {
        self.state.read().unwrap().charges.len()
    }
}

#[async_trait]
impl WalletChargeGateway for InMemoryWalletGateway {
    async fn get_balance(&self, company_id: CompanyId) -> Result<Money> {
        Ok(self.balance_of(company_id))
    }

    async fn has_minimum_balance(&self, company_id: CompanyId, amount: Money) -> Result<bool> {
        Ok(self.balance_of(company_id) >= amount)
    }

    async fn handle_rto_charge(
        &self,
        company_id: CompanyId,
        amount: Money,
        reference: &str,
    ) -> Result<ChargeReceipt> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_charge {
            return Err(RtoError::WalletChargeFailed(
                "wallet gateway unavailable".to_string(),
            ));
        }

        let balance = state
            .balances
            .get(&company_id)
            .copied()
            .unwrap_or_else(Money::zero);
        if balance < amount {
            return Err(RtoError::InsufficientBalance {
                required: amount,
                available: balance,
            });
        }

        let new_balance = balance - amount;
        state.balances.insert(company_id, new_balance);
        state
            .charges
            .insert(reference.to_string(), (company_id, amount));

        Ok(ChargeReceipt {
            reference: reference.to_string(),
            new_balance,
        })
    }

    async fn reverse_rto_charge(
        &self,
        company_id: CompanyId,
        amount: Money,
        reference: &str,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.charges.remove(reference);
        let balance = state
            .balances
            .get(&company_id)
            .copied()
            .unwrap_or_else(Money::zero);
        state.balances.insert(company_id, balance + amount);
        Ok(())
    }
}
