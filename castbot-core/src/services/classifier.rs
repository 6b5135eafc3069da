//! Maps platform data messages (numeric code + payload + sender) to domain
//! events. Apart from updating the caller's [`StreamState`], classification
//! does no I/O: alerts and emote rewards are returned for the session to run.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use castbot_common::models::{ChatUser, GiftDefinition, StreamState};

use crate::Error;
use crate::alerts::Alert;
use crate::eventbus::DomainEvent;
use crate::services::language::LanguageTable;

pub mod codes {
    pub const CHAT_MESSAGE: i64 = 1;
    pub const REACTION: i64 = 4;
    pub const CHANNEL_SHARE: i64 = 10004;
    pub const CHANNEL_FOLLOW: i64 = 10005;
    pub const STREAM_STATUS: i64 = 20000;
    pub const STREAM_STATUS_UPDATE: i64 = 20001;
    pub const MEMBER_JOIN: i64 = 20002;
    pub const MEMBER_QUIT: i64 = 20003;
    pub const MUTE: i64 = 20005;
    pub const GIFT: i64 = 20015;
    pub const AUTHORITY_CHANGE: i64 = 20019;
}

/// Read-only session data the classifier needs.
pub struct ClassifierContext<'a> {
    pub language: &'a LanguageTable,
    pub gifts: &'a [GiftDefinition],
    pub can_reply: bool,
}

/// Gift sent to the channel, resolved against the gift catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotePayload {
    pub id: i64,
    pub amount: i64,
    pub cost: i64,
    pub emote: GiftDefinition,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub events: Vec<DomainEvent>,
    pub emote: Option<EmotePayload>,
    pub alert: Option<Alert>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ViewerCount {
    #[serde(rename = "RealCount")]
    real_count: i64,
    #[serde(rename = "TotalViewCount")]
    total_view_count: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StreamStatus {
    #[serde(rename = "Status")]
    status: i64,
    #[serde(rename = "Title")]
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Mute {
    #[serde(rename = "AdminUin")]
    from: i64,
    #[serde(rename = "GagUin")]
    to: i64,
    #[serde(rename = "GagTimeLne")]
    duration: i64,
    #[serde(rename = "GagExpire")]
    expiry: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthorityChange {
    #[serde(rename = "Access")]
    level: i64,
    #[serde(rename = "AdminUin")]
    admin: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GiftSent {
    #[serde(rename = "GiftId")]
    gift_id: i64,
    #[serde(rename = "Nums")]
    amount: i64,
}

fn decode<T: DeserializeOwned + Default>(payload: &Value) -> Result<T, Error> {
    if payload.is_null() {
        return Ok(T::default());
    }
    Ok(T::deserialize(payload)?)
}

fn stream_update(state: &StreamState) -> Result<DomainEvent, Error> {
    Ok(DomainEvent::new("stream.update", serde_json::to_value(state)?))
}

fn special_chat(sender: &ChatUser, message: String) -> DomainEvent {
    DomainEvent::new(
        "chat.message",
        json!({ "sender": sender, "message": message, "special": true }),
    )
}

pub fn classify(
    code: i64,
    sender: &ChatUser,
    payload: &Value,
    state: &mut StreamState,
    ctx: &ClassifierContext<'_>,
) -> Result<Classification, Error> {
    let mut out = Classification::default();

    // Both member codes carry viewer counts, before the per-code handling below.
    if code == codes::MEMBER_JOIN || code == codes::MEMBER_QUIT {
        let counts: ViewerCount = decode(payload)?;
        state.viewers = counts.real_count;
        state.views = counts.total_view_count;
        out.events.push(stream_update(state)?);
    }

    match code {
        codes::CHAT_MESSAGE | codes::MEMBER_QUIT | codes::REACTION => {}

        codes::MUTE => {
            // No event for mutes yet.
            let mute: Mute = decode(payload)?;
            trace!(
                "[Classifier] mute from={} to={} duration={} expiry={}",
                mute.from, mute.to, mute.duration, mute.expiry
            );
        }

        codes::AUTHORITY_CHANGE => {
            // No event for authority changes yet.
            let change: AuthorityChange = decode(payload)?;
            trace!("[Classifier] authority change level={} admin={}", change.level, change.admin);
        }

        codes::STREAM_STATUS | codes::STREAM_STATUS_UPDATE => {
            let status: StreamStatus = decode(payload)?;
            state.online = status.status == 1;
            state.title = status.title;
            state.started = Utc::now();
            out.events.push(stream_update(state)?);
        }

        codes::MEMBER_JOIN => {
            let message = ctx.language.message("CHAT_JOIN", &json!({ "sender": sender }));
            out.events.push(special_chat(sender, message));
            out.events.push(DomainEvent::new("chat.join", json!({ "sender": sender })));
        }

        codes::GIFT => {
            let gift: GiftSent = decode(payload)?;
            let definition = ctx
                .gifts
                .iter()
                .find(|g| g.id == gift.gift_id)
                .ok_or(Error::UnknownGift(gift.gift_id))?;
            out.emote = Some(EmotePayload {
                id: gift.gift_id,
                amount: gift.amount,
                cost: definition.coins,
                emote: definition.clone(),
            });
        }

        codes::CHANNEL_SHARE => {
            let message = ctx.language.message("CHAT_SHARE", &json!({ "sender": sender }));
            out.events.push(special_chat(sender, message));
            out.events.push(DomainEvent::new("chat.share", json!({ "sender": sender })));
        }

        codes::CHANNEL_FOLLOW => {
            if ctx.can_reply {
                let text = ctx
                    .language
                    .message("CHAT_FOLLOW", &json!({ "sender": sender.nickname }));
                out.alert = Some(Alert {
                    name: sender.nickname.clone(),
                    kind: "subscription".to_string(),
                    message: format!("{} {}", sender.nickname, text),
                });
            }
            let message = ctx.language.message("CHAT_FOLLOW", &json!({ "sender": sender }));
            out.events.push(special_chat(sender, message));
            out.events.push(DomainEvent::new("chat.follow", json!({ "sender": sender })));
        }

        other => {
            debug!("[Classifier] unhandled data message {} {}", other, payload);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use castbot_common::models::LanguageRow;
    use serde_json::Map;

    fn language() -> LanguageTable {
        let rows = vec![
            LanguageRow { language: "en".into(), key: "CHAT_JOIN".into(), value: "${sender} joined".into() },
            LanguageRow { language: "en".into(), key: "CHAT_FOLLOW".into(), value: "followed ${sender}!".into() },
        ];
        LanguageTable::for_language(&rows, "en")
    }

    fn gifts() -> Vec<GiftDefinition> {
        let mut display = Map::new();
        display.insert("name".into(), json!("Heart"));
        vec![GiftDefinition { id: 7, coins: 25, display }]
    }

    fn sender() -> ChatUser {
        ChatUser { id: 1, nickname: "neko".into(), picture: None, tag: None }
    }

    fn run(code: i64, payload: Value, state: &mut StreamState, can_reply: bool) -> Result<Classification, Error> {
        let language = language();
        let gifts = gifts();
        let ctx = ClassifierContext { language: &language, gifts: &gifts, can_reply };
        classify(code, &sender(), &payload, state, &ctx)
    }

    fn event_types(c: &Classification) -> Vec<&str> {
        c.events.iter().map(|e| e.event_type.as_str()).collect()
    }

    #[test]
    fn test_stream_status_sets_state_and_emits_once() {
        let mut state = StreamState::default();
        let before = state.started;

        let out = run(20001, json!({"Status": 1, "Title": "X"}), &mut state, false).unwrap();

        assert!(state.online);
        assert_eq!(state.title.as_deref(), Some("X"));
        assert!(state.started >= before);
        assert_eq!(event_types(&out), vec!["stream.update"]);
        assert_eq!(out.events[0].payload["title"], json!("X"));
    }

    #[test]
    fn test_stream_status_offline() {
        let mut state = StreamState { online: true, ..Default::default() };
        run(20000, json!({"Status": 0, "Title": null}), &mut state, false).unwrap();
        assert!(!state.online);
        assert_eq!(state.title, None);
    }

    #[test]
    fn test_member_join_updates_counts_and_announces() {
        let mut state = StreamState::default();
        let out = run(20002, json!({"RealCount": 12, "TotalViewCount": 340}), &mut state, false).unwrap();

        assert_eq!(state.viewers, 12);
        assert_eq!(state.views, 340);
        assert_eq!(event_types(&out), vec!["stream.update", "chat.message", "chat.join"]);
        assert_eq!(out.events[1].payload["message"], json!("neko joined"));
        assert_eq!(out.events[1].payload["special"], json!(true));
    }

    // 20003 carries viewer counts but is otherwise ignored: exactly one event.
    #[test]
    fn test_member_quit_only_updates_counts() {
        let mut state = StreamState::default();
        let out = run(20003, json!({"RealCount": 4, "TotalViewCount": 9}), &mut state, false).unwrap();
        assert_eq!(state.viewers, 4);
        assert_eq!(event_types(&out), vec!["stream.update"]);
    }

    #[test]
    fn test_ignored_and_placeholder_codes_emit_nothing() {
        let mut state = StreamState::default();
        for (code, payload) in [
            (1, json!({})),
            (4, json!({})),
            (20005, json!({"AdminUin": 1, "GagUin": 2, "GagTimeLne": 60, "GagExpire": 99})),
            (20019, json!({"Access": 3, "AdminUin": 1})),
            (424242, json!({"anything": true})),
        ] {
            let out = run(code, payload, &mut state, true).unwrap();
            assert_eq!(out, Classification::default(), "code {}", code);
        }
        assert_eq!(state, StreamState { started: state.started, ..Default::default() });
    }

    #[test]
    fn test_known_gift_builds_emote() {
        let mut state = StreamState::default();
        let out = run(20015, json!({"GiftId": 7, "Nums": 3}), &mut state, false).unwrap();
        let emote = out.emote.expect("emote payload");
        assert_eq!((emote.id, emote.amount, emote.cost), (7, 3, 25));
        assert_eq!(emote.emote.display["name"], json!("Heart"));
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_unknown_gift_is_an_error() {
        let mut state = StreamState::default();
        let err = run(20015, json!({"GiftId": 99, "Nums": 1}), &mut state, false).unwrap_err();
        assert!(matches!(err, Error::UnknownGift(99)));
    }

    #[test]
    fn test_share_uses_missing_translation_fallback() {
        let mut state = StreamState::default();
        let out = run(10004, json!({}), &mut state, false).unwrap();
        assert_eq!(event_types(&out), vec!["chat.message", "chat.share"]);
        assert_eq!(out.events[0].payload["message"], json!("Missing translation for 'CHAT_SHARE'"));
    }

    #[test]
    fn test_follow_requests_alert_only_when_replies_enabled() {
        let mut state = StreamState::default();

        let quiet = run(10005, Value::Null, &mut state, false).unwrap();
        assert!(quiet.alert.is_none());
        assert_eq!(event_types(&quiet), vec!["chat.message", "chat.follow"]);

        let loud = run(10005, Value::Null, &mut state, true).unwrap();
        assert_eq!(
            loud.alert,
            Some(Alert {
                name: "neko".into(),
                kind: "subscription".into(),
                message: "neko followed neko!".into(),
            })
        );
    }
}
