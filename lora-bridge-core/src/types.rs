use crate::{BridgeError, BridgeResult};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Protocol section name under which LoRa devices carry their properties.
pub const LORA_PROTOCOL: &str = "Lora";
/// Remote device/gateway identifier property key.
pub const LORA_EUI: &str = "eui";
/// Boolean property marking a device as a gateway.
pub const LORA_GATEWAY: &str = "gateway";
/// Optional resource property naming the decoding codec script.
pub const LORA_CODEC: &str = "codec";

/// Event type tag carried by uplink stream messages.
pub const UPLINK_EVENT: &str = "up";

/// Protocol properties as supplied by the framework: one dynamic map
/// per protocol section.
pub type ProtocolProperties = HashMap<String, HashMap<String, Value>>;

/// Typed record extracted from a device's `Lora` protocol section.
///
/// Parsing fails closed: a missing or wrong-typed field is a
/// configuration error, never a silent default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoraProtocolParams {
    /// End-device or gateway EUI on the network server.
    pub eui: String,
    /// Gateways never receive an event stream.
    pub gateway: bool,
}

impl LoraProtocolParams {
    pub fn from_protocols(protocols: &ProtocolProperties) -> BridgeResult<Self> {
        let section = protocols.get(LORA_PROTOCOL).ok_or_else(|| {
            BridgeError::MissingParameter(format!(
                "no '{LORA_PROTOCOL}' parameters defined in the protocol list"
            ))
        })?;

        let eui = match section.get(LORA_EUI) {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(BridgeError::MissingParameter(format!(
                    "'{LORA_EUI}' is not string type"
                )))
            }
            None => {
                return Err(BridgeError::MissingParameter(format!(
                    "'{LORA_EUI}' not found"
                )))
            }
        };

        let gateway = match section.get(LORA_GATEWAY) {
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(BridgeError::MissingParameter(format!(
                    "'{LORA_GATEWAY}' is not boolean type"
                )))
            }
            None => {
                return Err(BridgeError::MissingParameter(format!(
                    "'{LORA_GATEWAY}' not found"
                )))
            }
        };

        Ok(Self { eui, gateway })
    }
}

/// One decoded uplink reading pushed onto the shared sink.
///
/// `origin` is assigned at decode time; the remote payload does not
/// guarantee a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedReading {
    pub device_name: String,
    pub source_name: String,
    pub value: Value,
    pub origin: DateTime<Utc>,
}

impl DecodedReading {
    pub fn new(device_name: impl Into<String>, source_name: impl Into<String>, value: Value) -> Self {
        Self {
            device_name: device_name.into(),
            source_name: source_name.into(),
            value,
            origin: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn protocols(section: Vec<(&str, Value)>) -> ProtocolProperties {
        let mut inner = HashMap::new();
        for (k, v) in section {
            inner.insert(k.to_string(), v);
        }
        let mut outer = HashMap::new();
        outer.insert(LORA_PROTOCOL.to_string(), inner);
        outer
    }

    #[test]
    fn parses_well_formed_section() {
        let props = protocols(vec![(LORA_EUI, json!("a84041000181d9fa")), (LORA_GATEWAY, json!(false))]);
        let params = LoraProtocolParams::from_protocols(&props).unwrap();
        assert_eq!(params.eui, "a84041000181d9fa");
        assert!(!params.gateway);
    }

    #[test]
    fn missing_section_is_an_error() {
        let err = LoraProtocolParams::from_protocols(&HashMap::new()).unwrap_err();
        assert!(matches!(err, BridgeError::MissingParameter(_)));
    }

    #[test]
    fn wrong_typed_eui_fails_closed() {
        let props = protocols(vec![(LORA_EUI, json!(42)), (LORA_GATEWAY, json!(false))]);
        assert!(matches!(
            LoraProtocolParams::from_protocols(&props),
            Err(BridgeError::MissingParameter(_))
        ));
    }

    #[test]
    fn gateway_flag_must_be_boolean() {
        let props = protocols(vec![(LORA_EUI, json!("eui")), (LORA_GATEWAY, json!("true"))]);
        assert!(matches!(
            LoraProtocolParams::from_protocols(&props),
            Err(BridgeError::MissingParameter(_))
        ));
    }
}
