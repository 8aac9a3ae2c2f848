//! LINE webhook payloads: signature verification and event decoding.
//!
//! LINE signs every callback with `base64(HMAC-SHA256(channel_secret, body))`
//! in the `X-Line-Signature` header. Only text messages are surfaced to the
//! relay; every other event or message type is dropped while parsing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,
    #[error("signature is not valid base64")]
    Malformed,
    #[error("signature mismatch")]
    Mismatch,
}

/// Compute the signature header value for `body`.
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!());
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Check `signature` against the HMAC of the raw request body.
pub fn verify_signature(
    channel_secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<(), SignatureError> {
    let signature = signature.trim();
    if signature.is_empty() {
        return Err(SignatureError::Missing);
    }

    let expected = BASE64
        .decode(signature)
        .map_err(|_| SignatureError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| SignatureError::Mismatch)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Event {
    Message(MessageEvent),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageEvent {
    #[serde(default)]
    reply_token: Option<String>,
    source: Source,
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Source {
    #[serde(rename_all = "camelCase")]
    User { user_id: String },
    #[serde(rename_all = "camelCase")]
    Group {
        group_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Room {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum MessageContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    User,
    Group,
    Room,
}

/// One inbound text message, flattened from a webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingText {
    pub source_kind: SourceKind,
    pub group_id: Option<String>,
    pub sender_id: Option<String>,
    pub reply_token: Option<String>,
    pub text: String,
}

impl IncomingText {
    fn from_event(event: Event) -> Option<Self> {
        let Event::Message(message) = event else {
            return None;
        };
        let MessageContent::Text { text } = message.message else {
            return None;
        };

        let (source_kind, group_id, sender_id) = match message.source {
            Source::User { user_id } => (SourceKind::User, None, Some(user_id)),
            Source::Group { group_id, user_id } => (SourceKind::Group, Some(group_id), user_id),
            Source::Room { user_id, .. } => (SourceKind::Room, None, user_id),
        };

        Some(Self {
            source_kind,
            group_id,
            sender_id,
            reply_token: message.reply_token,
            text,
        })
    }
}

/// Decode a verified webhook body into the text messages it carries.
pub fn parse_events(body: &[u8]) -> Result<Vec<IncomingText>, serde_json::Error> {
    let payload: WebhookPayload = serde_json::from_slice(body)?;
    Ok(payload
        .events
        .into_iter()
        .filter_map(IncomingText::from_event)
        .collect())
}
