//! cashdesk-core: receivables risk requalification and quantitative
//! stress engine for small and mid-sized businesses.

pub mod action;
pub mod analytics;
pub mod arbiter;
pub mod bus;
pub mod client_scoring;
pub mod config;
pub mod cycle;
pub mod early_warning;
pub mod engine;
pub mod error;
pub mod event;
pub mod governance;
pub mod monitor;
pub mod narrative;
pub mod payment_pattern;
pub mod portfolio;
pub mod prioritizer;
pub mod receivable;
pub mod requalification;
pub mod rng;
pub mod source;
pub mod state_machine;
pub mod stats;
pub mod store;
pub mod stress;
pub mod trigger;
pub mod types;
