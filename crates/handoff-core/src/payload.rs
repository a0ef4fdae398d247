//! Payload shapes carried through the shared store and their JSON codec.
//!
//! The wire keys (`path`, `thumbnail`, `duration`, `type`, `url`, `mediaPath`)
//! are shared with the producer process and must not change.

use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn tag(self) -> u8 {
        match self {
            MediaKind::Image => 0,
            MediaKind::Video => 1,
        }
    }

    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(MediaKind::Image),
            1 => Some(MediaKind::Video),
            _ => None,
        }
    }
}

impl Serialize for MediaKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.tag())
    }
}

impl<'de> Deserialize<'de> for MediaKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MediaKindVisitor;

        impl<'de> Visitor<'de> for MediaKindVisitor {
            type Value = MediaKind;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a media kind tag (0 = image, 1 = video)")
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                MediaKind::from_tag(value)
                    .ok_or_else(|| E::custom(format!("unknown media kind tag: {value}")))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value < 0 {
                    return Err(E::custom(format!("unknown media kind tag: {value}")));
                }
                self.visit_u64(value as u64)
            }
        }

        deserializer.deserialize_u64(MediaKindVisitor)
    }
}

/// One shared image or video.
///
/// `thumbnail_path` and `duration_ms` only carry meaning for videos.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    pub path: String,
    #[serde(rename = "thumbnail", default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
    #[serde(rename = "duration", default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

impl MediaItem {
    pub fn image(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            thumbnail_path: None,
            duration_ms: None,
            kind: MediaKind::Image,
        }
    }

    pub fn video(
        path: impl Into<String>,
        thumbnail_path: Option<String>,
        duration_ms: Option<f64>,
    ) -> Self {
        Self {
            path: path.into(),
            thumbnail_path,
            duration_ms,
            kind: MediaKind::Video,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

/// A shared link, optionally paired with a co-shared media file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrlShare {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        rename = "mediaPath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub media_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload exceeds max size: {size} > {max}")]
    Oversized { size: usize, max: usize },
    #[error("media duration must be finite, got {0}")]
    NonFiniteDuration(String),
    #[error("payload encode failed: {0}")]
    Encode(String),
    #[error("payload decode failed: {0}")]
    Decode(String),
}

pub fn encode_payload<T: Serialize + ?Sized>(
    value: &T,
    max_payload_bytes: usize,
) -> Result<Vec<u8>, PayloadError> {
    let encoded = serde_json::to_vec(value).map_err(|err| PayloadError::Encode(err.to_string()))?;
    if encoded.len() > max_payload_bytes {
        return Err(PayloadError::Oversized {
            size: encoded.len(),
            max: max_payload_bytes,
        });
    }
    Ok(encoded)
}

pub fn decode_payload<T: DeserializeOwned>(
    bytes: &[u8],
    max_payload_bytes: usize,
) -> Result<T, PayloadError> {
    if bytes.len() > max_payload_bytes {
        return Err(PayloadError::Oversized {
            size: bytes.len(),
            max: max_payload_bytes,
        });
    }
    serde_json::from_slice(bytes).map_err(|err| PayloadError::Decode(err.to_string()))
}

pub fn encode_media(items: &[MediaItem]) -> Result<Vec<u8>, PayloadError> {
    // serde_json writes NaN and infinities as `null`, which would decode as absent.
    if let Some(bad) = items
        .iter()
        .filter_map(|item| item.duration_ms)
        .find(|duration| !duration.is_finite())
    {
        return Err(PayloadError::NonFiniteDuration(bad.to_string()));
    }
    encode_payload(items, DEFAULT_MAX_PAYLOAD_BYTES)
}

pub fn decode_media(bytes: &[u8]) -> Result<Vec<MediaItem>, PayloadError> {
    decode_payload(bytes, DEFAULT_MAX_PAYLOAD_BYTES)
}

pub fn encode_text(texts: &[String]) -> Result<Vec<u8>, PayloadError> {
    encode_payload(texts, DEFAULT_MAX_PAYLOAD_BYTES)
}

pub fn decode_text(bytes: &[u8]) -> Result<Vec<String>, PayloadError> {
    decode_payload(bytes, DEFAULT_MAX_PAYLOAD_BYTES)
}

pub fn encode_url(share: &UrlShare) -> Result<Vec<u8>, PayloadError> {
    encode_payload(share, DEFAULT_MAX_PAYLOAD_BYTES)
}

pub fn decode_url(bytes: &[u8]) -> Result<UrlShare, PayloadError> {
    decode_payload(bytes, DEFAULT_MAX_PAYLOAD_BYTES)
}

/// Joins a text batch the way it is exposed to the consumer.
pub fn join_text(texts: &[String]) -> String {
    texts.join(",")
}

/// Encoded media list as handed to the consumer application.
pub fn media_to_json(items: &[MediaItem]) -> Result<String, PayloadError> {
    let bytes = encode_media(items)?;
    String::from_utf8(bytes).map_err(|err| PayloadError::Encode(err.to_string()))
}

/// Encoded link record as handed to the consumer application.
pub fn url_to_json(share: &UrlShare) -> Result<String, PayloadError> {
    serde_json::to_string(share).map_err(|err| PayloadError::Encode(err.to_string()))
}
