use chrono::NaiveDate;
use tracing::debug;

use crate::amount::Amount;
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::report::{Report, RunQuery};

/// One account/amount pair within a transaction.
///
/// A `None` amount is inferred during normalization as the negation of
/// the sum of the other postings; at most one posting per transaction may
/// omit its amount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Posting {
    pub account: String,
    pub amount: Option<Amount>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub payee: String,
    pub postings: Vec<Posting>,
    pub comments: Vec<String>,
}

impl Transaction {
    /// The postings with every amount made explicit.
    ///
    /// Infers a single elided amount, or checks that fully explicit
    /// postings sum to zero.
    pub fn normalized_postings(&self) -> Result<Vec<(&str, Amount)>> {
        if self.postings.len() < 2 {
            return Err(Error::InvalidTransaction);
        }

        let mut elided = None;
        let mut sum = Amount::ZERO;
        for (index, posting) in self.postings.iter().enumerate() {
            match posting.amount {
                Some(amount) => sum += amount,
                None => {
                    if elided.is_some() {
                        return Err(Error::MultipleOmittedAmounts);
                    }
                    elided = Some(index);
                }
            }
        }
        if elided.is_none() && !sum.is_zero() {
            return Err(Error::UnbalancedPostings);
        }

        Ok(self
            .postings
            .iter()
            .map(|posting| {
                let amount = posting.amount.unwrap_or(-sum);
                (posting.account.as_str(), amount)
            })
            .collect())
    }
}

/// A recorded obligation for `from` to eventually pay `to`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Promise {
    pub date: NaiveDate,
    pub from: String,
    pub to: String,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Transaction(Transaction),
    Promise(Promise),
}

impl Event {
    pub fn date(&self) -> NaiveDate {
        match self {
            Event::Transaction(transaction) => transaction.date,
            Event::Promise(promise) => promise.date,
        }
    }
}

/// An insertion-ordered list of events, ready to replay.
///
/// Input order is the tie-break key when two events share a date, so a
/// journal must be built in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Journal {
    events: Vec<Event>,
}

impl Journal {
    pub fn new() -> Journal {
        Journal { events: Vec::new() }
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Replay against a fresh [`Ledger`] and derive final balances.
    ///
    /// Events are sorted by date, ties keeping declaration order. Events
    /// dated before `start_date` are skipped; replay stops entirely at the
    /// first event dated on or after `end_date`, so the end bound is
    /// strictly exclusive.
    pub fn run(&self, query: &RunQuery) -> Result<Report> {
        let mut ordered: Vec<&Event> = self.events.iter().collect();
        ordered.sort_by_key(|event| event.date());

        let mut ledger = Ledger::new();
        for event in ordered {
            if let Some(end_date) = query.end_date {
                if event.date() >= end_date {
                    break;
                }
            }
            if let Some(start_date) = query.start_date {
                if event.date() < start_date {
                    continue;
                }
            }
            debug!(date = %event.date(), "replaying event");
            ledger.process_event(event)?;
        }

        Ok(Report::derive(ledger))
    }
}

impl From<Vec<Event>> for Journal {
    fn from(events: Vec<Event>) -> Journal {
        Journal { events }
    }
}
