pub mod commitment;
pub mod secrets;

pub use commitment::{commit, Commitment};
pub use secrets::{generate_secret, generate_short_secret, SecretPair};
