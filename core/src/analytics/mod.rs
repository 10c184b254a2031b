//! Decomposition analyzers. Each one returns a structured breakdown
//! whose parts sum exactly to the total, plus plain-language findings.

pub mod causal;
pub mod margin;
pub mod variance;

pub use causal::{AgingDecomposition, AgingPoint, AgingProfile};
pub use margin::{MarginBridge, ProductLine};
pub use variance::{BudgetLine, LineKind, VarianceReport};
