//! Earmark - a double-entry ledger engine with promise settlement
//! ---
//!
//! Earmark replays a dated list of transactions and promises against a
//! hierarchical account tree, keeps inclusive balances in sync up the
//! tree, retires outstanding promises automatically as money moves, and
//! answers point-in-time balance queries from an append-only register.
//!
//! Journals can be built directly from [`Event`] values or parsed from a
//! plain-text journal file with [`parse`].

extern crate pest;
#[macro_use]
extern crate pest_derive;

/// The hierarchical account namespace, e.g. `assets:bank:checking`.
///
/// Accounts live in an [`AccountStore`][account::AccountStore] arena and
/// are created on first reference; resolving the same path twice yields
/// the same [`AccountId`][account::AccountId].
pub mod account;

/// Fixed-point dollar amounts.
pub mod amount;

pub mod error;

/// Events, journals, and the replay entrypoint.
pub mod journal;

/// The transfer engine: balance propagation and promise settlement.
pub mod ledger;

/// Our main parser entrypoints.
pub mod parser;

/// The append-only history every balance is derived from.
pub mod register;

pub mod report;

pub use account::{AccountId, AccountNode, AccountStore};
pub use amount::Amount;
pub use error::{Error, Result};
pub use journal::{Event, Journal, Posting, Promise, Transaction};
pub use ledger::Ledger;
pub use parser::{parse, parse_file};
pub use register::{BalanceSnapshot, EntryKind, Register, RegisterEntry};
pub use report::{Report, RunQuery};
