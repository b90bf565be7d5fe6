//! Reference Number Generation
//!
//! Format: `TR-{yyyyMMdd}-{NNNN}` with NNNN uniform in 1000..=9999.
//! Uniqueness is the store's job; a collision comes back as a conflict.

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;

pub const REFERENCE_PREFIX: &str = "TR";

const SUFFIX_MIN: u16 = 1000;
const SUFFIX_MAX: u16 = 9999;

/// Generate a reference number for the current UTC date
pub fn generate_reference_number() -> String {
    generate_reference_number_at(Utc::now(), &mut rand::thread_rng())
}

/// Generate a reference number for `now` using the given RNG
pub fn generate_reference_number_at<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix = rng.gen_range(SUFFIX_MIN..=SUFFIX_MAX);
    format!(
        "{}-{}-{:04}",
        REFERENCE_PREFIX,
        now.format("%Y%m%d"),
        suffix
    )
}

/// Parse a reference number into its date and numeric suffix
pub fn parse_reference_number(reference: &str) -> Option<(NaiveDate, u16)> {
    let mut parts = reference.split('-');
    let prefix = parts.next()?;
    let date = parts.next()?;
    let suffix = parts.next()?;
    if parts.next().is_some() || prefix != REFERENCE_PREFIX {
        return None;
    }

    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").ok()?;

    if suffix.len() != 4 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let suffix: u16 = suffix.parse().ok()?;
    if !(SUFFIX_MIN..=SUFFIX_MAX).contains(&suffix) {
        return None;
    }

    Some((date, suffix))
}

#[inline]
pub fn is_valid_reference_number(reference: &str) -> bool {
    parse_reference_number(reference).is_some()
}
