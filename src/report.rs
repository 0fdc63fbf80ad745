use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::account::{AccountId, AccountNode, AccountStore};
use crate::amount::Amount;
use crate::ledger::Ledger;
use crate::register::Register;

/// Date window for a run: inclusive start, exclusive end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// The immutable result of one replay.
///
/// Owns the final account tree and register; every balance below is
/// derived by scanning the register backward for the most recent snapshot
/// mentioning the account, with zero for accounts never mentioned. The
/// inclusive maps cover non-leaf accounts only: a leaf's inclusive figures
/// equal its leaf figures.
#[derive(Debug)]
pub struct Report {
    accounts: AccountStore,
    register: Register,
    dfs_accounts: Vec<AccountId>,
    balances: BTreeMap<AccountId, Amount>,
    inclusive_balances: BTreeMap<AccountId, Amount>,
    promised_balances: BTreeMap<AccountId, Amount>,
    inclusive_promised_balances: BTreeMap<AccountId, Amount>,
}

impl Report {
    pub(crate) fn derive(ledger: Ledger) -> Report {
        let (accounts, register) = ledger.into_parts();
        let dfs_accounts = accounts.dfs_accounts();

        let mut balances = BTreeMap::new();
        let mut inclusive_balances = BTreeMap::new();
        let mut promised_balances = BTreeMap::new();
        let mut inclusive_promised_balances = BTreeMap::new();

        for &account in &dfs_accounts {
            if !accounts.node(account).is_leaf() {
                let (balance, promised) = register
                    .last_inclusive_figures(account)
                    .unwrap_or((Amount::ZERO, Amount::ZERO));
                inclusive_balances.insert(account, balance);
                inclusive_promised_balances.insert(account, promised);
            }

            let (balance, promised) = register
                .last_leaf_figures(account)
                .unwrap_or((Amount::ZERO, Amount::ZERO));
            balances.insert(account, balance);
            promised_balances.insert(account, promised);
        }

        Report {
            accounts,
            register,
            dfs_accounts,
            balances,
            inclusive_balances,
            promised_balances,
            inclusive_promised_balances,
        }
    }

    /// All accounts in deterministic depth-first order.
    pub fn accounts(&self) -> &[AccountId] {
        &self.dfs_accounts
    }

    pub fn account(&self, id: AccountId) -> &AccountNode {
        self.accounts.node(id)
    }

    pub fn lookup(&self, path: &str) -> Option<AccountId> {
        self.accounts.lookup(path)
    }

    pub fn register(&self) -> &Register {
        &self.register
    }

    pub fn balance(&self, id: AccountId) -> Amount {
        self.balances.get(&id).copied().unwrap_or(Amount::ZERO)
    }

    pub fn inclusive_balance(&self, id: AccountId) -> Amount {
        self.inclusive_balances.get(&id).copied().unwrap_or(Amount::ZERO)
    }

    pub fn promised_balance(&self, id: AccountId) -> Amount {
        self.promised_balances.get(&id).copied().unwrap_or(Amount::ZERO)
    }

    pub fn inclusive_promised_balance(&self, id: AccountId) -> Amount {
        self.inclusive_promised_balances
            .get(&id)
            .copied()
            .unwrap_or(Amount::ZERO)
    }
}
