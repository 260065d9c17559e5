//! Order-number allocation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use domain::OrderNumber;
use store::OrderStore;

use crate::Result;

/// Which calendar period restarts the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberPartition {
    /// `<PREFIX>-<YYYY>-<6-digit sequence>`
    #[default]
    Year,
    /// `<PREFIX>-<YYYYMMDD>-<4-digit sequence>`
    Day,
}

impl NumberPartition {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberPartition::Year => "year",
            NumberPartition::Day => "day",
        }
    }

    fn date_format(&self) -> &'static str {
        match self {
            NumberPartition::Year => "%Y",
            NumberPartition::Day => "%Y%m%d",
        }
    }

    fn width(&self) -> usize {
        match self {
            NumberPartition::Year => 6,
            NumberPartition::Day => 4,
        }
    }
}

impl fmt::Display for NumberPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumberPartition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(NumberPartition::Year),
            "day" => Ok(NumberPartition::Day),
            other => Err(format!("unknown order number partition: {other}")),
        }
    }
}

/// Allocates the next order number of a partition.
///
/// The sequence continues from the highest number already stored for the
/// partition. Two concurrent checkouts can pick the same number; the
/// unique constraint on order numbers rejects the later commit and the
/// checkout retries with a fresh read.
#[derive(Debug, Clone)]
pub struct OrderNumberGenerator {
    prefix: String,
    partition: NumberPartition,
}

impl OrderNumberGenerator {
    pub fn new(prefix: impl AsRef<str>, partition: NumberPartition) -> Self {
        Self {
            prefix: prefix.as_ref().trim().to_uppercase(),
            partition,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn partition(&self) -> NumberPartition {
        self.partition
    }

    /// Returns the shared leading part of every number in the partition
    /// containing `now`, such as `ORD-2026-`.
    pub fn partition_prefix(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}-{}-",
            self.prefix,
            now.format(self.partition.date_format())
        )
    }

    /// Formats the number with the given sequence.
    pub fn format(&self, now: DateTime<Utc>, sequence: u32) -> Result<OrderNumber> {
        let number = format!(
            "{}{:0width$}",
            self.partition_prefix(now),
            sequence,
            width = self.partition.width()
        );
        Ok(OrderNumber::parse(&number)?)
    }

    /// Reads the partition's highest sequence and returns the one after it.
    pub async fn next<Tx: OrderStore>(&self, tx: &mut Tx, now: DateTime<Utc>) -> Result<OrderNumber> {
        let prefix = self.partition_prefix(now);
        let last = tx.max_order_sequence(&prefix).await?.unwrap_or(0);
        self.format(now, last.saturating_add(1))
    }
}

impl Default for OrderNumberGenerator {
    fn default() -> Self {
        Self::new("ORD", NumberPartition::Year)
    }
}
