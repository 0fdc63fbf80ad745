use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::amount::Amount;

/// Handle to one node inside an [`AccountStore`].
///
/// Ids are handed out on first reference and stay valid for the lifetime
/// of the store; resolving the same full path always yields the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(usize);

/// One account in the hierarchy.
///
/// `balance` is the account's own running total; `inclusive_balance` folds
/// in every descendant and is maintained incrementally on each transfer.
/// The promise maps are keyed by counterparty and hold the signed amount
/// still owed to that counterparty, net of settlements.
#[derive(Clone, Debug)]
pub struct AccountNode {
    name: String,
    full_name: String,
    parent: Option<AccountId>,
    ancestors: Vec<AccountId>,
    children: BTreeMap<String, AccountId>,
    pub(crate) balance: Amount,
    pub(crate) inclusive_balance: Amount,
    pub(crate) promises: IndexMap<AccountId, Amount>,
    pub(crate) inclusive_promises: IndexMap<AccountId, Amount>,
}

impl AccountNode {
    fn new(name: &str, full_name: String, parent: Option<AccountId>, ancestors: Vec<AccountId>) -> AccountNode {
        AccountNode {
            name: name.to_string(),
            full_name,
            parent,
            ancestors,
            children: BTreeMap::new(),
            balance: Amount::ZERO,
            inclusive_balance: Amount::ZERO,
            promises: IndexMap::new(),
            inclusive_promises: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Colon-joined path from the top of the hierarchy down to this node.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn parent(&self) -> Option<AccountId> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn inclusive_balance(&self) -> Amount {
        self.inclusive_balance
    }

    /// Signed amount this account still owes `counterparty`.
    pub fn promise_to(&self, counterparty: AccountId) -> Amount {
        self.promises.get(&counterparty).copied().unwrap_or(Amount::ZERO)
    }

    pub fn total_promised(&self) -> Amount {
        self.promises.values().sum()
    }

    pub fn inclusive_total_promised(&self) -> Amount {
        self.inclusive_promises.values().sum()
    }
}

/// Arena of [`AccountNode`]s addressed by [`AccountId`].
///
/// Accounts form a tree under an internal root; missing nodes are created
/// by [`resolve`][AccountStore::resolve] and never deleted. Lookups never
/// create nodes.
#[derive(Clone, Debug)]
pub struct AccountStore {
    nodes: Vec<AccountNode>,
}

impl AccountStore {
    const ROOT: AccountId = AccountId(0);

    pub fn new() -> AccountStore {
        AccountStore {
            nodes: vec![AccountNode::new("", String::new(), None, Vec::new())],
        }
    }

    /// Walk `path` (colon-separated segments) from the root, creating any
    /// missing nodes along the way.
    pub fn resolve(&mut self, path: &str) -> AccountId {
        let mut account = Self::ROOT;
        for segment in path.split(':') {
            account = self.get_or_create(account, segment);
        }
        account
    }

    /// Find `path` without creating anything.
    pub fn lookup(&self, path: &str) -> Option<AccountId> {
        let mut account = Self::ROOT;
        for segment in path.split(':') {
            account = *self.node(account).children.get(segment)?;
        }
        Some(account)
    }

    fn get_or_create(&mut self, parent: AccountId, name: &str) -> AccountId {
        if let Some(&child) = self.node(parent).children.get(name) {
            return child;
        }

        let full_name = if parent == Self::ROOT {
            name.to_string()
        } else {
            format!("{}:{}", self.node(parent).full_name, name)
        };
        // The parent chain is immutable, so the ancestor list (immediate
        // parent up to, but excluding, the root) is computed once here.
        let mut ancestors = Vec::new();
        if parent != Self::ROOT {
            ancestors.push(parent);
            ancestors.extend_from_slice(&self.node(parent).ancestors);
        }

        let id = AccountId(self.nodes.len());
        self.nodes.push(AccountNode::new(name, full_name, Some(parent), ancestors));
        self.node_mut(parent).children.insert(name.to_string(), id);
        id
    }

    pub fn node(&self, id: AccountId) -> &AccountNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: AccountId) -> &mut AccountNode {
        &mut self.nodes[id.0]
    }

    /// Chain from immediate parent up to, excluding, the root.
    pub fn ancestors(&self, id: AccountId) -> &[AccountId] {
        &self.node(id).ancestors
    }

    /// Every account below `id` (not `id` itself), pre-order, children in
    /// name order. Deterministic regardless of creation order.
    pub fn descendants(&self, id: AccountId) -> Vec<AccountId> {
        let mut accounts = Vec::new();
        self.collect_descendants(id, &mut accounts);
        accounts
    }

    fn collect_descendants(&self, id: AccountId, accounts: &mut Vec<AccountId>) {
        for &child in self.node(id).children.values() {
            accounts.push(child);
            self.collect_descendants(child, accounts);
        }
    }

    /// All non-root accounts in depth-first reporting order.
    pub fn dfs_accounts(&self) -> Vec<AccountId> {
        self.descendants(Self::ROOT)
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}
