//! Hash-chained audit log: canonical hashing, contention-tolerant append,
//! and offline chain validation (spec.md §4.1).

mod canonical;
mod chain;

pub use canonical::{canonical_bytes, entry_hash, format_canonical_timestamp, CanonicalFields};
pub use chain::{AuditChainEngine, ChainValidation, NewEvent, ValidationFailure, ValidationReason};
