//! JSON text frames exchanged with the live platform, tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use castbot_common::models::{ChatUser, GiftDefinition};

use crate::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundFrame {
    /// Full replacement of the channel's gift catalog.
    GiftList { list: Vec<GiftDefinition> },
    Chat {
        #[serde(default)]
        sender: ChatUser,
        text: String,
    },
    /// Platform data message identified by a numeric code.
    Data {
        code: i64,
        #[serde(default)]
        sender: ChatUser,
        #[serde(default)]
        payload: Value,
    },
}

impl InboundFrame {
    pub fn decode(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundFrame {
    Chat { text: String },
    /// Asks the platform to resend studio configuration (gift list, ...).
    StudioConfig,
}

impl OutboundFrame {
    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_data_frame() {
        let frame = InboundFrame::decode(
            r#"{"type":"data","code":20001,"sender":{"id":3,"nickname":"neko"},"payload":{"Status":1}}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::Data { code, sender, payload } => {
                assert_eq!(code, 20001);
                assert_eq!(sender.nickname, "neko");
                assert_eq!(payload, json!({"Status": 1}));
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_decode_gift_list_keeps_display_fields() {
        let frame = InboundFrame::decode(
            r#"{"type":"giftList","list":[{"id":9,"coins":50,"name":"Heart"}]}"#,
        )
        .unwrap();
        let InboundFrame::GiftList { list } = frame else {
            panic!("expected gift list");
        };
        assert_eq!(list[0].coins, 50);
        assert_eq!(list[0].display.get("name"), Some(&json!("Heart")));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        assert!(InboundFrame::decode(r#"{"type":"bogus"}"#).is_err());
    }

    #[test]
    fn test_encode_outbound() {
        let text = OutboundFrame::Chat { text: "hi".into() }.encode().unwrap();
        assert_eq!(text, r#"{"type":"chat","text":"hi"}"#);
        assert_eq!(OutboundFrame::StudioConfig.encode().unwrap(), r#"{"type":"studioConfig"}"#);
    }
}
