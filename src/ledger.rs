use chrono::NaiveDate;
use indexmap::IndexSet;
use tracing::trace;

use crate::account::{AccountId, AccountStore};
use crate::amount::Amount;
use crate::error::{Error, Result};
use crate::journal::{Event, Promise, Transaction};
use crate::register::{BalanceSnapshot, EntryKind, Register, RegisterEntry};

/// One account tree plus its register: the replay target for a single run.
///
/// All mutation goes through the `process_*` entrypoints or through
/// [`transfer`][Ledger::transfer] / [`promise`][Ledger::promise] directly;
/// readers derive balances from the register.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: AccountStore,
    register: Register,
}

impl Ledger {
    pub fn new() -> Ledger {
        Ledger {
            accounts: AccountStore::new(),
            register: Register::new(),
        }
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn register(&self) -> &Register {
        &self.register
    }

    pub fn resolve(&mut self, path: &str) -> AccountId {
        self.accounts.resolve(path)
    }

    pub(crate) fn into_parts(self) -> (AccountStore, Register) {
        (self.accounts, self.register)
    }

    pub fn process_event(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::Transaction(transaction) => self.process_transaction(transaction),
            Event::Promise(promise) => self.process_promise(promise),
        }
    }

    /// Resolve a transaction's postings into one transfer per pairing.
    ///
    /// Postings are partitioned by sign (zero amounts ignored). One side
    /// must hold a single posting; the plural side is paired against it.
    pub fn process_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        let postings = transaction.normalized_postings()?;

        let mut from_postings = Vec::new();
        let mut to_postings = Vec::new();
        for (account, amount) in postings {
            if amount.is_negative() {
                from_postings.push((account, amount));
            } else if amount.is_positive() {
                to_postings.push((account, amount));
            }
        }

        if from_postings.len() == 1 {
            let from = self.accounts.resolve(from_postings[0].0);
            for (account, amount) in to_postings {
                let to = self.accounts.resolve(account);
                self.transfer(
                    transaction.date,
                    from,
                    to,
                    amount,
                    &transaction.payee,
                    transaction.comments.clone(),
                );
            }
        } else if to_postings.len() == 1 {
            let to = self.accounts.resolve(to_postings[0].0);
            for (account, amount) in from_postings {
                let from = self.accounts.resolve(account);
                self.transfer(
                    transaction.date,
                    from,
                    to,
                    -amount,
                    &transaction.payee,
                    transaction.comments.clone(),
                );
            }
        } else {
            return Err(Error::AmbiguousPostings);
        }

        Ok(())
    }

    pub fn process_promise(&mut self, promise: &Promise) -> Result<()> {
        if !promise.amount.is_positive() {
            return Err(Error::IncompletePromise("amount must be positive"));
        }
        let from = self.accounts.resolve(&promise.from);
        let to = self.accounts.resolve(&promise.to);
        self.promise(promise.date, from, to, promise.amount);
        Ok(())
    }

    /// Move `amount` from `from` to `to`, propagating through both
    /// ancestor chains, then settle outstanding promises that `from`'s
    /// descendants hold against `to`.
    ///
    /// Settlement visits descendants pre-order with children in name
    /// order, refund-style negative promises before positive ones, and
    /// issues recursive sub-transfers whose register entries precede this
    /// transfer's own entry.
    pub fn transfer(
        &mut self,
        date: NaiveDate,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        payee: &str,
        comments: Vec<String>,
    ) {
        self.debit(from, amount);
        self.credit(to, amount);

        let descendants = self.accounts.descendants(from);
        let mut participants: IndexSet<AccountId> = IndexSet::new();

        // Refund promises only settle against a positive outer transfer;
        // `negative_settled` stays in [-amount, 0] so the refunds retired
        // here can never exceed the amount actually moved.
        let mut negative_settled = Amount::ZERO;
        if amount.is_positive() {
            for &descendant in &descendants {
                let promised = self.accounts.node(descendant).promise_to(to);
                if !promised.is_negative() {
                    continue;
                }
                let capacity = -(amount + negative_settled);
                let settled = capacity.max(promised);
                if settled.is_zero() {
                    continue;
                }
                participants.insert(descendant);
                negative_settled += settled;
                trace!(
                    account = self.accounts.node(descendant).full_name(),
                    settled = %settled,
                    "settling refund promise"
                );
                let label = format!(
                    "PROMISED REFUND TRANSFER - {}",
                    self.accounts.node(descendant).full_name()
                );
                self.transfer(date, descendant, from, settled, &label, Vec::new());
                let node = self.accounts.node_mut(descendant);
                *node.promises.entry(to).or_default() -= settled;
                *node.inclusive_promises.entry(to).or_default() -= settled;
            }
        }

        let mut remaining = amount - negative_settled;
        for &descendant in &descendants {
            if !remaining.is_positive() {
                break;
            }
            let promised = self.accounts.node(descendant).promise_to(to);
            if !promised.is_positive() {
                continue;
            }
            let settled = remaining.min(promised);
            participants.insert(descendant);
            trace!(
                account = self.accounts.node(descendant).full_name(),
                settled = %settled,
                "settling promise"
            );
            let label = format!(
                "PROMISED TRANSFER - {}",
                self.accounts.node(descendant).full_name()
            );
            self.transfer(date, descendant, from, settled, &label, Vec::new());
            remaining -= settled;
            let node = self.accounts.node_mut(descendant);
            *node.promises.entry(to).or_default() -= settled;
            *node.inclusive_promises.entry(to).or_default() -= settled;
            for ancestor in self.accounts.ancestors(descendant).to_vec() {
                *self
                    .accounts
                    .node_mut(ancestor)
                    .inclusive_promises
                    .entry(to)
                    .or_default() -= settled;
            }
        }

        let mut others = IndexSet::new();
        others.insert(to);
        others.extend(participants);
        let snapshot = self.snapshot(from, &others);
        self.register.push(RegisterEntry {
            kind: EntryKind::Transfer {
                payee: payee.to_string(),
                comments,
            },
            date,
            from,
            to,
            amount,
            snapshot,
        });
    }

    /// Record that `from` owes `to` a further `amount`.
    ///
    /// A passive bookkeeping event: no balance moves, but the promise
    /// shows up on `from` and, inclusively, on all of `from`'s ancestors,
    /// where a later transfer to `to` can retire it.
    pub fn promise(&mut self, date: NaiveDate, from: AccountId, to: AccountId, amount: Amount) {
        let node = self.accounts.node_mut(from);
        *node.promises.entry(to).or_default() += amount;
        *node.inclusive_promises.entry(to).or_default() += amount;
        for ancestor in self.accounts.ancestors(from).to_vec() {
            *self
                .accounts
                .node_mut(ancestor)
                .inclusive_promises
                .entry(to)
                .or_default() += amount;
        }

        let mut others = IndexSet::new();
        others.insert(to);
        let snapshot = self.snapshot(from, &others);
        self.register.push(RegisterEntry {
            kind: EntryKind::Promise,
            date,
            from,
            to,
            amount,
            snapshot,
        });
    }

    fn debit(&mut self, account: AccountId, amount: Amount) {
        let node = self.accounts.node_mut(account);
        node.balance -= amount;
        node.inclusive_balance -= amount;
        for ancestor in self.accounts.ancestors(account).to_vec() {
            self.accounts.node_mut(ancestor).inclusive_balance -= amount;
        }
    }

    fn credit(&mut self, account: AccountId, amount: Amount) {
        let node = self.accounts.node_mut(account);
        node.balance += amount;
        node.inclusive_balance += amount;
        for ancestor in self.accounts.ancestors(account).to_vec() {
            self.accounts.node_mut(ancestor).inclusive_balance += amount;
        }
    }

    fn snapshot(&self, from: AccountId, others: &IndexSet<AccountId>) -> BalanceSnapshot {
        let mut leaf_accounts: IndexSet<AccountId> = IndexSet::new();
        leaf_accounts.insert(from);
        leaf_accounts.extend(others.iter().copied());

        let mut inclusive_accounts = leaf_accounts.clone();
        for &account in &leaf_accounts {
            inclusive_accounts.extend(self.accounts.ancestors(account).iter().copied());
        }

        let mut snapshot = BalanceSnapshot::default();
        for &account in &leaf_accounts {
            let node = self.accounts.node(account);
            snapshot.leaf_balances.insert(account, node.balance());
            snapshot.leaf_promised.insert(account, node.total_promised());
        }
        for &account in &inclusive_accounts {
            let node = self.accounts.node(account);
            snapshot
                .inclusive_balances
                .insert(account, node.inclusive_balance());
            snapshot
                .inclusive_promised
                .insert(account, node.inclusive_total_promised());
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::amount::Amount;
    use crate::error::Error;
    use crate::journal::{Posting, Transaction};
    use crate::ledger::Ledger;
    use crate::register::EntryKind;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    fn pennies(p: i64) -> Amount {
        Amount::from_pennies(p)
    }

    fn payee_of(kind: &EntryKind) -> &str {
        match kind {
            EntryKind::Transfer { payee, .. } => payee,
            EntryKind::Promise => "",
        }
    }

    #[test]
    fn transfer_moves_amount_and_propagates_to_ancestors() {
        let mut ledger = Ledger::new();
        let checking = ledger.resolve("assets:bank:checking");
        let rent = ledger.resolve("expenses:rent");
        ledger.transfer(date(), checking, rent, pennies(120_000), "Landlord", Vec::new());

        let accounts = ledger.accounts();
        assert_eq!(accounts.node(checking).balance(), pennies(-120_000));
        assert_eq!(accounts.node(rent).balance(), pennies(120_000));

        let bank = accounts.lookup("assets:bank").unwrap();
        let assets = accounts.lookup("assets").unwrap();
        let expenses = accounts.lookup("expenses").unwrap();
        assert_eq!(accounts.node(bank).inclusive_balance(), pennies(-120_000));
        assert_eq!(accounts.node(assets).inclusive_balance(), pennies(-120_000));
        assert_eq!(accounts.node(expenses).inclusive_balance(), pennies(120_000));
        assert_eq!(accounts.node(bank).balance(), Amount::ZERO);

        assert_eq!(ledger.register().len(), 1);
        let entry = &ledger.register().entries()[0];
        assert_eq!(entry.from, checking);
        assert_eq!(entry.to, rent);
        assert_eq!(entry.amount, pennies(120_000));
        assert_eq!(payee_of(&entry.kind), "Landlord");
    }

    #[test]
    fn promise_is_bookkeeping_only() {
        let mut ledger = Ledger::new();
        let alice = ledger.resolve("family:alice");
        let vendor = ledger.resolve("vendor");
        ledger.promise(date(), alice, vendor, pennies(500));

        let accounts = ledger.accounts();
        assert_eq!(accounts.node(alice).balance(), Amount::ZERO);
        assert_eq!(accounts.node(alice).promise_to(vendor), pennies(500));
        assert_eq!(accounts.node(alice).total_promised(), pennies(500));

        let family = accounts.lookup("family").unwrap();
        assert_eq!(accounts.node(family).inclusive_total_promised(), pennies(500));

        assert_eq!(ledger.register().len(), 1);
        assert_eq!(ledger.register().entries()[0].kind, EntryKind::Promise);
    }

    #[test]
    fn ancestor_transfer_settles_descendant_promise() {
        let mut ledger = Ledger::new();
        let alice = ledger.resolve("family:alice");
        let family = ledger.resolve("family");
        let vendor = ledger.resolve("vendor");

        ledger.promise(date(), alice, vendor, pennies(500));
        ledger.transfer(date(), family, vendor, pennies(500), "Payment", Vec::new());

        let accounts = ledger.accounts();
        assert_eq!(accounts.node(alice).promise_to(vendor), Amount::ZERO);
        assert_eq!(accounts.node(alice).balance(), pennies(-500));
        assert_eq!(accounts.node(family).balance(), Amount::ZERO);
        assert_eq!(accounts.node(family).inclusive_balance(), pennies(-500));
        assert_eq!(accounts.node(vendor).balance(), pennies(500));

        // promise, generated sub-transfer, then the outer transfer
        let entries = ledger.register().entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(payee_of(&entries[1].kind), "PROMISED TRANSFER - family:alice");
        assert_eq!(entries[1].from, alice);
        assert_eq!(entries[1].to, family);
        assert_eq!(entries[1].amount, pennies(500));
        assert_eq!(payee_of(&entries[2].kind), "Payment");
    }

    #[test]
    fn settlement_is_capped_by_transfer_amount() {
        let mut ledger = Ledger::new();
        let alice = ledger.resolve("family:alice");
        let bob = ledger.resolve("family:bob");
        let family = ledger.resolve("family");
        let vendor = ledger.resolve("vendor");

        ledger.promise(date(), alice, vendor, pennies(300));
        ledger.promise(date(), bob, vendor, pennies(400));
        ledger.transfer(date(), family, vendor, pennies(500), "Payment", Vec::new());

        let accounts = ledger.accounts();
        // alice first (name order), fully retired; bob only up to what's left
        assert_eq!(accounts.node(alice).promise_to(vendor), Amount::ZERO);
        assert_eq!(accounts.node(bob).promise_to(vendor), pennies(200));
        assert_eq!(accounts.node(alice).balance(), pennies(-300));
        assert_eq!(accounts.node(bob).balance(), pennies(-200));
    }

    #[test]
    fn exhausted_transfer_settles_nothing_further() {
        let mut ledger = Ledger::new();
        let alice = ledger.resolve("family:alice");
        let bob = ledger.resolve("family:bob");
        let family = ledger.resolve("family");
        let vendor = ledger.resolve("vendor");

        ledger.promise(date(), alice, vendor, pennies(500));
        ledger.promise(date(), bob, vendor, pennies(500));
        ledger.transfer(date(), family, vendor, pennies(500), "Payment", Vec::new());

        let accounts = ledger.accounts();
        assert_eq!(accounts.node(alice).promise_to(vendor), Amount::ZERO);
        assert_eq!(accounts.node(bob).promise_to(vendor), pennies(500));
        assert_eq!(accounts.node(bob).balance(), Amount::ZERO);
    }

    #[test]
    fn negative_promises_settle_first() {
        let mut ledger = Ledger::new();
        let alice = ledger.resolve("family:alice");
        let bob = ledger.resolve("family:bob");
        let family = ledger.resolve("family");
        let vendor = ledger.resolve("vendor");

        // a refund owed back to alice, and a regular debt from bob
        ledger.promise(date(), alice, vendor, pennies(-200));
        ledger.promise(date(), bob, vendor, pennies(400));
        ledger.transfer(date(), family, vendor, pennies(300), "Payment", Vec::new());

        let accounts = ledger.accounts();
        assert_eq!(accounts.node(alice).promise_to(vendor), Amount::ZERO);
        assert_eq!(accounts.node(alice).balance(), pennies(200));
        // refund settlement frees capacity: 300 - (-200) leaves 500 for bob
        assert_eq!(accounts.node(bob).promise_to(vendor), Amount::ZERO);
        assert_eq!(accounts.node(bob).balance(), pennies(-400));

        let payees: Vec<&str> = ledger
            .register()
            .entries()
            .iter()
            .map(|entry| payee_of(&entry.kind))
            .collect();
        let refund = payees
            .iter()
            .position(|p| p.starts_with("PROMISED REFUND TRANSFER"))
            .unwrap();
        let regular = payees
            .iter()
            .position(|p| *p == "PROMISED TRANSFER - family:bob")
            .unwrap();
        assert!(refund < regular);
    }

    #[test]
    fn refund_settlement_is_capped_by_transfer_amount() {
        let mut ledger = Ledger::new();
        let alice = ledger.resolve("family:alice");
        let family = ledger.resolve("family");
        let vendor = ledger.resolve("vendor");

        ledger.promise(date(), alice, vendor, pennies(-800));
        ledger.transfer(date(), family, vendor, pennies(300), "Payment", Vec::new());

        let accounts = ledger.accounts();
        assert_eq!(accounts.node(alice).promise_to(vendor), pennies(-500));
        assert_eq!(accounts.node(alice).balance(), pennies(300));
    }

    #[test]
    fn transaction_pairs_single_destination_with_each_source() {
        let mut ledger = Ledger::new();
        let transaction = Transaction {
            date: date(),
            payee: "Pot".to_string(),
            postings: vec![
                Posting { account: "a".to_string(), amount: Some(pennies(-1000)) },
                Posting { account: "b".to_string(), amount: Some(pennies(-2000)) },
                Posting { account: "c".to_string(), amount: Some(pennies(3000)) },
            ],
            comments: Vec::new(),
        };
        ledger.process_transaction(&transaction).unwrap();

        let entries = ledger.register().entries();
        assert_eq!(entries.len(), 2);
        let accounts = ledger.accounts();
        assert_eq!(accounts.node(entries[0].from).full_name(), "a");
        assert_eq!(accounts.node(entries[0].to).full_name(), "c");
        assert_eq!(entries[0].amount, pennies(1000));
        assert_eq!(accounts.node(entries[1].from).full_name(), "b");
        assert_eq!(entries[1].amount, pennies(2000));
        assert_eq!(accounts.node(entries[1].to).full_name(), "c");
    }

    #[test]
    fn ambiguous_postings_are_rejected() {
        let mut ledger = Ledger::new();
        let transaction = Transaction {
            date: date(),
            payee: "Who paid whom".to_string(),
            postings: vec![
                Posting { account: "a".to_string(), amount: Some(pennies(-1000)) },
                Posting { account: "b".to_string(), amount: Some(pennies(-1500)) },
                Posting { account: "c".to_string(), amount: Some(pennies(1200)) },
                Posting { account: "d".to_string(), amount: Some(pennies(1300)) },
            ],
            comments: Vec::new(),
        };
        assert_eq!(
            ledger.process_transaction(&transaction).unwrap_err(),
            Error::AmbiguousPostings
        );
    }

    #[test]
    fn non_positive_promise_is_rejected() {
        let mut ledger = Ledger::new();
        let promise = crate::journal::Promise {
            date: date(),
            from: "a".to_string(),
            to: "b".to_string(),
            amount: Amount::ZERO,
        };
        assert!(matches!(
            ledger.process_promise(&promise).unwrap_err(),
            Error::IncompletePromise(_)
        ));
    }
}
