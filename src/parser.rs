use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use pest::iterators::Pair;
use pest::Parser;

use std::fs;
use std::path::Path;

use crate::amount::Amount;
use crate::error::Error;
use crate::journal::{Event, Journal, Posting, Promise, Transaction};

#[derive(Parser)]
#[grammar = "journal.pest"]
pub struct JournalParser;

pub fn parse_file(path: &Path) -> Result<Journal> {
    let fcontent = fs::read_to_string(path)?;
    parse(&fcontent)
}

/// Parse journal text into an ordered event list.
///
/// Only syntax is handled here; balance and ambiguity checks happen when
/// the journal is replayed. Taxonomy errors ([`Error`]) are wrapped and
/// stay downcastable.
pub fn parse(input: &str) -> Result<Journal> {
    let mut pairs = JournalParser::parse(Rule::journal, input)?;
    let journal_pair = pairs
        .next()
        .ok_or(anyhow!("invalid parse result, expected journal"))?;

    let mut journal = Journal::new();
    for entry in journal_pair.into_inner() {
        match entry.as_rule() {
            Rule::transaction => journal.push(Event::Transaction(parse_transaction(entry)?)),
            Rule::promise_decl => journal.push(Event::Promise(parse_promise(entry)?)),
            Rule::directive => return Err(directive_error(entry).into()),
            Rule::EOI => (),
            _ => return Err(anyhow!(format!("unexpected token: {}", entry.as_str()))),
        }
    }

    Ok(journal)
}

fn parse_transaction(token: Pair<Rule>) -> Result<Transaction> {
    let mut pairs = token.into_inner();
    let date = parse_date(
        pairs
            .next()
            .ok_or(anyhow!("invalid next token, expected date"))?,
    )?;
    let payee = inner_str(
        pairs
            .next()
            .ok_or(anyhow!("invalid next token, expected payee"))?,
    )
    .to_string();

    let mut comments = Vec::new();
    let mut postings = Vec::new();
    for pair in pairs {
        match pair.as_rule() {
            Rule::comment => comments.push(pair.as_str().trim_start_matches(';').trim().to_string()),
            Rule::posting => postings.push(parse_posting(pair)?),
            _ => return Err(anyhow!(format!("unexpected token: {}", pair.as_str()))),
        }
    }

    Ok(Transaction {
        date,
        payee,
        postings,
        comments,
    })
}

fn parse_posting(token: Pair<Rule>) -> Result<Posting> {
    let mut pairs = token.into_inner();
    let account = pairs
        .next()
        .ok_or(anyhow!("invalid next token, expected account"))?
        .as_str()
        .to_string();
    let amount = match pairs.next() {
        Some(amount_token) => Some(Amount::parse(amount_token.as_str())?),
        None => None,
    };

    Ok(Posting { account, amount })
}

fn parse_promise(token: Pair<Rule>) -> Result<Promise> {
    let mut pairs = token.into_inner();
    let date = parse_date(
        pairs
            .next()
            .ok_or(anyhow!("invalid next token, expected date"))?,
    )?;
    let mut pairs = pairs.skip(1); // the promise keyword
    let from = pairs
        .next()
        .ok_or(Error::IncompletePromise("missing from account"))?
        .as_str()
        .to_string();
    let to = pairs
        .next()
        .ok_or(Error::IncompletePromise("missing to account"))?
        .as_str()
        .to_string();
    let amount = Amount::parse(
        pairs
            .next()
            .ok_or(Error::IncompletePromise("missing amount"))?
            .as_str(),
    )?;

    Ok(Promise {
        date,
        from,
        to,
        amount,
    })
}

fn parse_date(token: Pair<Rule>) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(token.as_str(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidDate(token.as_str().to_string()))
}

fn directive_error(token: Pair<Rule>) -> Error {
    let keyword = token
        .into_inner()
        .nth(1)
        .map(|pair| pair.as_str().to_string())
        .unwrap_or_default();
    if keyword == "promise" {
        Error::IncompletePromise("expected `from -> to amount'")
    } else {
        Error::UnknownEventType(keyword)
    }
}

pub fn inner_str(token: Pair<Rule>) -> &str {
    token.into_inner().next().unwrap().as_str()
}
