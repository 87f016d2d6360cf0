//! `ledgerprint-core`: shared building blocks for the invoice pipeline.
//!
//! This crate contains **pure domain** primitives (no IO, no templating).

pub mod amount;
pub mod entity;
pub mod error;
pub mod id;

pub use amount::{ONE_HUNDRED, fraction, parse_fraction, percent_factor};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, PolicyField};
pub use id::{EntryId, InvoiceId, OwnerId, TaxTableId};
