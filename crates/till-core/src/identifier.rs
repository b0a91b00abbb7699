//! # Business Identifiers
//!
//! Human-readable transaction and cart numbers.
//!
//! ## Format
//! ```text
//! TXN-20240315143022-4821
//! ─┬─ ──────┬─────── ──┬─
//!  │        │          └── random suffix 1000..=9999
//!  │        └───────────── UTC timestamp yyyymmddHHMMSS
//!  └────────────────────── prefix (TXN or CART)
//! ```
//!
//! Uniqueness is NOT guaranteed here. The database carries a UNIQUE
//! constraint and the engine retries on collision.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Which namespace an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    Transaction,
    Cart,
}

impl IdentifierKind {
    pub const fn prefix(&self) -> &'static str {
        match self {
            IdentifierKind::Transaction => "TXN",
            IdentifierKind::Cart => "CART",
        }
    }

    /// Column that carries the UNIQUE constraint for this namespace.
    pub const fn column(&self) -> &'static str {
        match self {
            IdentifierKind::Transaction => "transaction_number",
            IdentifierKind::Cart => "cart_number",
        }
    }
}

/// Builds `<PREFIX>-<yyyymmddHHMMSS>-<suffix>`.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use till_core::identifier::{format_identifier, IdentifierKind};
///
/// let at = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 22).unwrap();
/// assert_eq!(format_identifier(IdentifierKind::Cart, at, 4821), "CART-20240315143022-4821");
/// ```
pub fn format_identifier(kind: IdentifierKind, at: DateTime<Utc>, suffix: u16) -> String {
    format!("{}-{}-{}", kind.prefix(), at.format("%Y%m%d%H%M%S"), suffix)
}

/// Source of fresh identifiers.
///
/// Production uses [`RandomIdentifiers`]; tests script collisions.
pub trait IdentifierSource: Send + Sync {
    fn next(&self, kind: IdentifierKind) -> String;
}

/// Timestamp plus a random 4-digit suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdentifiers;

impl IdentifierSource for RandomIdentifiers {
    fn next(&self, kind: IdentifierKind) -> String {
        let suffix = rand::thread_rng().gen_range(1000..=9999);
        format_identifier(kind, Utc::now(), suffix)
    }
}
