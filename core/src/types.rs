//! Shared primitive types used across the entire engine.

/// Stable identifier of a counterparty (client) as delivered by ingestion.
pub type CounterpartyId = String;

/// Invoice identifier, unique within one receivables load.
pub type InvoiceId = String;

/// Identifier of a proposed action. Unique across cycles.
pub type ActionId = String;

/// Identifier of one analysis cycle.
pub type CycleId = String;

/// Money amount in the reporting currency.
pub type Amount = f64;

/// Average number of days in a month, used to convert periods to days.
pub const DAYS_PER_PERIOD: f64 = 30.0;
