pub mod payload;

pub use payload::{HandoverPayload, HandoverTransport, JsonTransport, TextTransport};
