//! Custody transfer and the terminal consumer claim

pub mod claim;
pub mod classification;
pub mod handover;

pub use claim::{ClaimModule, ClaimOutcome};
pub use classification::{classify, Classification, HandoverWarning};
pub use handover::{HandoverEngine, HandoverReceipt};
