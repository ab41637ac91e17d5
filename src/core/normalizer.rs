//! Input normalization
//!
//! Turns untyped CSV rows into canonical [`Member`], [`Payment`] and
//! [`Booking`] records. Rows that cannot be normalized are collected as
//! [`RejectedRow`]s with a human-readable reason; a bad row never aborts
//! the run.
//!
//! Normalization also handles:
//! - date parsing against the configured format whitelist
//! - tolerant amount parsing (`$`, thousands separators, parentheses
//!   for negatives)
//! - exact-duplicate payment removal, making repeated runs over
//!   re-exported data idempotent
//! - filtering payments and bookings to the configured analysis period

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveTime};
use log::{debug, warn};
use rust_decimal::Decimal;

use crate::config::ReconConfig;
use crate::types::member::{composite_key, normalize_contact};
use crate::types::{
    Booking, FeePeriod, Member, MembershipInterval, MembershipStatus, Payment, RawRow,
    RejectedRow, SourceKind,
};

/// Converts raw rows into typed records under one run's configuration
pub struct Normalizer<'a> {
    config: &'a ReconConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a ReconConfig) -> Self {
        Normalizer { config }
    }

    /// Normalize membership rows into deduplicated members
    ///
    /// Rows sharing a `member_id` are folded into a single [`Member`]
    /// whose intervals are sorted chronologically. A row whose interval
    /// overlaps an already-accepted interval of the same member is
    /// rejected; the earlier row wins.
    pub fn normalize_members(&self, rows: &[RawRow]) -> (Vec<Member>, Vec<RejectedRow>) {
        let mut members: HashMap<String, Member> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut rejected = Vec::new();

        for row in rows {
            match self.member_from_row(row) {
                Ok((member_row, interval)) => {
                    let entry = members.entry(member_row.id.clone()).or_insert_with(|| {
                        order.push(member_row.id.clone());
                        Member {
                            intervals: Vec::new(),
                            ..member_row.clone()
                        }
                    });

                    if entry.display_name != member_row.display_name {
                        warn!(
                            "member {}: conflicting names '{}' and '{}', keeping the first",
                            entry.id, entry.display_name, member_row.display_name
                        );
                    }

                    if entry.intervals.iter().any(|iv| iv.overlaps(&interval)) {
                        rejected.push(reject(
                            SourceKind::Members,
                            row.line,
                            &format!(
                                "interval {}..{} overlaps an existing interval for member {}",
                                interval.start, interval.end, entry.id
                            ),
                        ));
                        continue;
                    }

                    entry.intervals.push(interval);
                    entry.intervals.sort_by_key(|iv| iv.start);
                }
                Err(reason) => rejected.push(reject(SourceKind::Members, row.line, &reason)),
            }
        }

        let members = order
            .into_iter()
            .filter_map(|id| members.remove(&id))
            .collect();
        (members, rejected)
    }

    /// Normalize payment rows
    ///
    /// Duplicates (same identity, amount and date) are dropped after the
    /// first occurrence so re-imported exports do not double-count
    /// revenue.
    pub fn normalize_payments(&self, rows: &[RawRow]) -> (Vec<Payment>, Vec<RejectedRow>) {
        let mut payments = Vec::new();
        let mut rejected = Vec::new();
        let mut seen = HashSet::new();
        let mut duplicates = 0u64;
        let mut out_of_period = 0u64;

        for row in rows {
            match self.payment_from_row(row) {
                Ok(payment) => {
                    if let Some(period) = &self.config.period {
                        if !period.contains(payment.date) {
                            out_of_period += 1;
                            continue;
                        }
                    }
                    // dedup key is identity + date + amount; the same
                    // charge re-exported with a different period label
                    // is still the same charge
                    let key = (
                        payment.member_id.clone(),
                        payment.name.as_deref().map(crate::types::member::normalize_name),
                        payment.contact.clone(),
                        payment.amount,
                        payment.date,
                    );
                    if !seen.insert(key) {
                        duplicates += 1;
                        continue;
                    }
                    payments.push(payment);
                }
                Err(reason) => rejected.push(reject(SourceKind::Payments, row.line, &reason)),
            }
        }

        if duplicates > 0 {
            debug!("dropped {} duplicate payment rows", duplicates);
        }
        if out_of_period > 0 {
            debug!("skipped {} payments outside the analysis period", out_of_period);
        }
        (payments, rejected)
    }

    /// Normalize booking rows
    pub fn normalize_bookings(&self, rows: &[RawRow]) -> (Vec<Booking>, Vec<RejectedRow>) {
        let mut bookings = Vec::new();
        let mut rejected = Vec::new();
        let mut out_of_period = 0u64;

        for row in rows {
            match self.booking_from_row(row) {
                Ok(booking) => {
                    if let Some(period) = &self.config.period {
                        if !period.contains(booking.date) {
                            out_of_period += 1;
                            continue;
                        }
                    }
                    bookings.push(booking);
                }
                Err(reason) => rejected.push(reject(SourceKind::Bookings, row.line, &reason)),
            }
        }

        if out_of_period > 0 {
            debug!("skipped {} bookings outside the analysis period", out_of_period);
        }
        (bookings, rejected)
    }

    fn member_from_row(&self, row: &RawRow) -> Result<(Member, MembershipInterval), String> {
        let id = row
            .get("member_id")
            .ok_or_else(|| "missing member_id".to_string())?
            .to_string();
        let name = row
            .get("full_name")
            .ok_or_else(|| "missing full_name".to_string())?
            .to_string();
        let start = self.require_date(row, "valid_from")?;
        let end = self.require_date(row, "valid_to")?;
        if start > end {
            return Err(format!("valid_from {} is after valid_to {}", start, end));
        }

        let contact = row.get("email").map(normalize_contact);
        let member = Member {
            id,
            composite_key: composite_key(&name, contact.as_deref()),
            display_name: name,
            contact,
            tier: row.get("tier").map(|t| t.to_string()),
            status: row
                .get("status")
                .map(MembershipStatus::parse)
                .unwrap_or(MembershipStatus::Unknown),
            intervals: vec![],
        };
        Ok((member, MembershipInterval { start, end }))
    }

    fn payment_from_row(&self, row: &RawRow) -> Result<Payment, String> {
        let member_id = row.get("member_id").map(|s| s.to_string());
        let name = row.get("full_name").map(|s| s.to_string());
        if member_id.is_none() && name.is_none() {
            return Err("no identity: both member_id and full_name are empty".to_string());
        }

        let raw_amount = row.get("amount").ok_or_else(|| "missing amount".to_string())?;
        let amount = parse_amount(raw_amount)
            .ok_or_else(|| format!("unparseable amount '{}'", raw_amount))?;
        if amount <= Decimal::ZERO {
            return Err(format!("non-positive amount {}", amount));
        }

        let date = self.require_date(row, "payment_date")?;
        let period_start = self.require_date(row, "period_start")?;
        let period_end = self.require_date(row, "period_end")?;
        if period_start > period_end {
            return Err(format!(
                "period_start {} is after period_end {}",
                period_start, period_end
            ));
        }

        Ok(Payment {
            line: row.line,
            member_id,
            name,
            contact: row.get("email").map(normalize_contact),
            amount,
            date,
            period: FeePeriod {
                start: period_start,
                end: period_end,
            },
        })
    }

    fn booking_from_row(&self, row: &RawRow) -> Result<Booking, String> {
        let member_id = row.get("member_id").map(|s| s.to_string());
        let name = row.get("full_name").map(|s| s.to_string());
        if member_id.is_none() && name.is_none() {
            return Err("no identity: both member_id and full_name are empty".to_string());
        }

        let date = self.require_date(row, "date")?;

        let duration_minutes = match row.get("duration_minutes") {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| format!("unparseable duration_minutes '{}'", raw))?,
            None => return Err("missing duration_minutes".to_string()),
        };
        if duration_minutes <= 0 {
            return Err(format!("non-positive duration_minutes {}", duration_minutes));
        }

        let start_time = match row.get("start_time") {
            Some(raw) => Some(
                NaiveTime::parse_from_str(raw, "%H:%M")
                    .map_err(|_| format!("unparseable start_time '{}'", raw))?,
            ),
            None => None,
        };

        Ok(Booking {
            line: row.line,
            booking_id: row.get("booking_id").map(|s| s.to_string()),
            member_id,
            name,
            contact: row.get("email").map(normalize_contact),
            facility: row.get("facility").map(|s| s.to_string()),
            date,
            start_time,
            duration_minutes,
        })
    }

    fn require_date(&self, row: &RawRow, column: &str) -> Result<NaiveDate, String> {
        let raw = row.get(column).ok_or_else(|| format!("missing {}", column))?;
        self.config
            .parse_date(raw)
            .ok_or_else(|| format!("unparseable date '{}' in {}", raw, column))
    }
}

fn reject(source: SourceKind, line: u64, reason: &str) -> RejectedRow {
    RejectedRow {
        source,
        line,
        reason: reason.to_string(),
    }
}

/// Parse a monetary amount tolerating common export quirks: currency
/// symbol, thousands separators, and parentheses for negatives.
fn parse_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let (body, negative) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (&trimmed[1..trimmed.len() - 1], true)
    } else {
        (trimmed, false)
    };
    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    let value: Decimal = cleaned.parse().ok()?;
    Some(if negative { -value } else { value })
}
