pub mod api;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod directory;
pub mod error;
pub mod integrity;
pub mod journal;
pub mod ledger;
pub mod mirror;
pub mod roles;
pub mod service;
pub mod transport;

pub use error::CustodyError;
pub use service::CustodyService;
