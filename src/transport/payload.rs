//! Out-of-band handover payload
//!
//! The revealed secret travels from sender to receiver outside the ledger,
//! typically as a QR code or pasted text. The ledger only ever sees the
//! decoded `secret`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CustodyError;
use crate::ledger::models::{AssetId, Principal};

const HANDOVER_PREFIX: &str = "HANDOVER-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoverPayload {
    #[serde(alias = "productId", alias = "id", deserialize_with = "deserialize_asset_id")]
    pub asset_id: AssetId,
    #[serde(alias = "secretCode")]
    pub secret: String,
    #[serde(rename = "senderPrincipal", alias = "sender", default)]
    pub sender: Option<Principal>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl HandoverPayload {
    pub fn new(asset_id: AssetId, secret: impl Into<String>, sender: Principal) -> Self {
        Self {
            asset_id,
            secret: secret.into(),
            sender: Some(sender),
            timestamp: Some(Utc::now()),
        }
    }
}

/// Accepts `3`, `"3"` and `"HANDOVER-3"`
fn deserialize_asset_id<'de, D>(deserializer: D) -> Result<AssetId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(AssetId),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => {
            let text = text.trim();
            text.strip_prefix(HANDOVER_PREFIX)
                .unwrap_or(text)
                .parse()
                .map_err(|e| serde::de::Error::custom(format!("invalid asset id {}: {}", text, e)))
        }
    }
}

/// A way of turning a payload into something a person or scanner can carry
pub trait HandoverTransport {
    fn encode(&self, payload: &HandoverPayload) -> Result<String, CustodyError>;
    fn decode(&self, raw: &str) -> Result<HandoverPayload, CustodyError>;
}

/// Plain JSON, as embedded in QR images
pub struct JsonTransport;

impl HandoverTransport for JsonTransport {
    fn encode(&self, payload: &HandoverPayload) -> Result<String, CustodyError> {
        Ok(serde_json::to_string(payload)?)
    }

    fn decode(&self, raw: &str) -> Result<HandoverPayload, CustodyError> {
        let payload: HandoverPayload = serde_json::from_str(raw.trim())
            .map_err(|e| CustodyError::Transport(format!("Invalid handover payload: {}", e)))?;
        if payload.secret.trim().is_empty() {
            return Err(CustodyError::Transport(
                "Handover payload carries no secret".to_string(),
            ));
        }
        Ok(payload)
    }
}

/// URL-safe base64 of the JSON form, for copy/paste and short links.
/// Decoding also accepts raw JSON.
pub struct TextTransport;

impl HandoverTransport for TextTransport {
    fn encode(&self, payload: &HandoverPayload) -> Result<String, CustodyError> {
        let json = JsonTransport.encode(payload)?;
        Ok(URL_SAFE_NO_PAD.encode(json.as_bytes()))
    }

    fn decode(&self, raw: &str) -> Result<HandoverPayload, CustodyError> {
        let raw = raw.trim();
        if raw.starts_with('{') {
            return JsonTransport.decode(raw);
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|e| CustodyError::Transport(format!("Invalid base64 payload: {}", e)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| CustodyError::Transport(format!("Payload is not UTF-8: {}", e)))?;
        JsonTransport.decode(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HandoverPayload {
        HandoverPayload::new(12, "H2", Principal::new("0xCarrier").unwrap())
    }

    #[test]
    fn test_json_field_names() {
        let json = JsonTransport.encode(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["assetId"], 12);
        assert_eq!(value["secret"], "H2");
        assert_eq!(value["senderPrincipal"], "0xcarrier");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_text_transport_roundtrip() {
        let payload = sample();
        let text = TextTransport.encode(&payload).unwrap();
        assert!(!text.contains('{'));
        assert_eq!(TextTransport.decode(&text).unwrap(), payload);
    }

    #[test]
    fn test_decodes_creation_qr() {
        let payload = JsonTransport
            .decode(r#"{"productId": "7", "secretCode": "abc123"}"#)
            .unwrap();
        assert_eq!(payload.asset_id, 7);
        assert_eq!(payload.secret, "abc123");
        assert!(payload.sender.is_none());
        assert!(payload.timestamp.is_none());
    }

    #[test]
    fn test_decodes_handover_prefixed_id() {
        let payload = TextTransport
            .decode(r#"{"productId": "HANDOVER-42", "secret": "s3cret"}"#)
            .unwrap();
        assert_eq!(payload.asset_id, 42);
        assert_eq!(payload.secret, "s3cret");
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert!(JsonTransport.decode(r#"{"secret": "x"}"#).is_err());
        assert!(JsonTransport.decode(r#"{"assetId": 1, "secret": "  "}"#).is_err());
        assert!(JsonTransport.decode(r#"{"assetId": "HANDOVER-x", "secret": "s"}"#).is_err());
        assert!(TextTransport.decode("%%%not-base64%%%").is_err());
    }
}
