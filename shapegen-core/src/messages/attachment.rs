//! Attachments carried by input messages.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{CoreError, Result};

/// An image or file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attachment {
    /// Content referenced by URL.
    Url {
        /// The content URL.
        url: Url,
    },
    /// Inline bytes with their media type.
    Inline {
        /// MIME type, e.g. `image/png`.
        media_type: String,
        /// Raw bytes (base64 on the wire).
        #[serde(with = "base64_serde")]
        data: Vec<u8>,
    },
}

impl Attachment {
    /// Attach content by URL.
    pub fn url(url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| CoreError::invalid_attachment(format!("invalid url: {e}")))?;
        if url.scheme() == "data" {
            return Self::from_data_url(url.as_str());
        }
        Ok(Self::Url { url })
    }

    /// Attach inline bytes.
    pub fn inline(data: Vec<u8>, media_type: impl Into<String>) -> Result<Self> {
        let media_type = media_type.into();
        media_type
            .parse::<mime::Mime>()
            .map_err(|e| CoreError::invalid_attachment(format!("invalid media type '{media_type}': {e}")))?;
        Ok(Self::Inline { media_type, data })
    }

    /// Parse a `data:<media type>;base64,<payload>` URL.
    pub fn from_data_url(data_url: &str) -> Result<Self> {
        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| CoreError::invalid_attachment("not a data url"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| CoreError::invalid_attachment("data url has no payload"))?;
        let media_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| CoreError::invalid_attachment("only base64 data urls are supported"))?;
        let data = STANDARD
            .decode(payload)
            .map_err(|e| CoreError::invalid_attachment(format!("invalid base64 payload: {e}")))?;
        Self::inline(data, media_type)
    }

    /// Whether the attachment is an image.
    #[must_use]
    pub fn is_image(&self) -> bool {
        match self {
            Self::Inline { media_type, .. } => media_type
                .parse::<mime::Mime>()
                .map(|m| m.type_() == mime::IMAGE)
                .unwrap_or(false),
            Self::Url { url } => {
                let path = url.path().to_ascii_lowercase();
                [".png", ".jpg", ".jpeg", ".gif", ".webp"]
                    .iter()
                    .any(|ext| path.ends_with(ext))
            }
        }
    }

    /// Render as a URL string; inline content becomes a data URL.
    #[must_use]
    pub fn to_url_string(&self) -> String {
        match self {
            Self::Url { url } => url.to_string(),
            Self::Inline { media_type, data } => {
                format!("data:{};base64,{}", media_type, STANDARD.encode(data))
            }
        }
    }
}

mod base64_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_inline_data_url() {
        let att = Attachment::inline(vec![1, 2, 3], "image/png").unwrap();
        assert_eq!(att.to_url_string(), "data:image/png;base64,AQID");
        assert!(att.is_image());
    }

    #[test]
    fn test_data_url_roundtrip() {
        let att = Attachment::url("data:image/jpeg;base64,AQID").unwrap();
        assert_eq!(
            att,
            Attachment::Inline {
                media_type: "image/jpeg".into(),
                data: vec![1, 2, 3]
            }
        );
    }

    #[test]
    fn test_remote_url() {
        let att = Attachment::url("https://example.com/cat.PNG").unwrap();
        assert!(att.is_image());
        assert_eq!(att.to_url_string(), "https://example.com/cat.PNG");
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(Attachment::url("not a url").is_err());
        assert!(Attachment::inline(vec![], "nonsense").is_err());
        assert!(Attachment::from_data_url("data:text/plain,hello").is_err());
    }

    #[test]
    fn test_serde_uses_base64() {
        let att = Attachment::inline(vec![1, 2, 3], "image/gif").unwrap();
        let json = serde_json::to_value(&att).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "inline", "media_type": "image/gif", "data": "AQID"})
        );
        let back: Attachment = serde_json::from_value(json).unwrap();
        assert_eq!(back, att);
    }
}
