//! Audit Trail
//!
//! Append-only inspection records, kept alongside but independent of custody.

pub mod trail;

pub use trail::AuditTrail;
