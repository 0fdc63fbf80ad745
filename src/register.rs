use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::account::AccountId;
use crate::amount::Amount;

/// What kind of movement a register entry records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Transfer { payee: String, comments: Vec<String> },
    Promise,
}

/// Balances of every account an entry touched, as of that entry.
///
/// Leaf maps cover the accounts directly involved; the inclusive maps
/// additionally cover their ancestors, so later point-in-time queries are
/// exact for all affected accounts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub leaf_balances: IndexMap<AccountId, Amount>,
    pub leaf_promised: IndexMap<AccountId, Amount>,
    pub inclusive_balances: IndexMap<AccountId, Amount>,
    pub inclusive_promised: IndexMap<AccountId, Amount>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterEntry {
    pub kind: EntryKind,
    pub date: NaiveDate,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Amount,
    pub snapshot: BalanceSnapshot,
}

/// Append-only history of committed transfers and promises.
///
/// The register is the sole authoritative history: final balances are
/// derived by scanning it backward for the most recent snapshot mentioning
/// an account, never by reading live account state.
#[derive(Clone, Debug, Default)]
pub struct Register {
    entries: Vec<RegisterEntry>,
}

impl Register {
    pub fn new() -> Register {
        Register { entries: Vec::new() }
    }

    pub(crate) fn push(&mut self, entry: RegisterEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[RegisterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent `(balance, promised)` leaf figures for `account`, or
    /// `None` if no entry ever mentioned it.
    pub fn last_leaf_figures(&self, account: AccountId) -> Option<(Amount, Amount)> {
        self.entries.iter().rev().find_map(|entry| {
            let balance = entry.snapshot.leaf_balances.get(&account)?;
            let promised = entry
                .snapshot
                .leaf_promised
                .get(&account)
                .copied()
                .unwrap_or(Amount::ZERO);
            Some((*balance, promised))
        })
    }

    /// Most recent `(balance, promised)` inclusive figures for `account`.
    pub fn last_inclusive_figures(&self, account: AccountId) -> Option<(Amount, Amount)> {
        self.entries.iter().rev().find_map(|entry| {
            let balance = entry.snapshot.inclusive_balances.get(&account)?;
            let promised = entry
                .snapshot
                .inclusive_promised
                .get(&account)
                .copied()
                .unwrap_or(Amount::ZERO);
            Some((*balance, promised))
        })
    }
}
