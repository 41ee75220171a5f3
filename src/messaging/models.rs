use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registration token identifying one app installation.
///
/// Issued by the client-side messaging SDK; this crate only forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRegistrationToken(String);

impl DeviceRegistrationToken {
    /// Trims surrounding whitespace; `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceRegistrationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A foreground notification as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,
}

impl NotificationPayload {
    pub const DEFAULT_TITLE: &'static str = "New Notification";
    pub const DEFAULT_BODY: &'static str = "You have a new message";

    /// Extracts a payload from a raw FCM message (`{notification: {title, body}, data}`).
    ///
    /// Missing title or body fall back to generic text. Non-string data values
    /// are rendered as JSON.
    pub fn from_message(message: &serde_json::Value) -> Self {
        let notification = message.get("notification");
        let text = |key: &str| {
            notification
                .and_then(|n| n.get(key))
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let data = message.get("data").and_then(|d| d.as_object()).map(|object| {
            object
                .iter()
                .map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect()
        });

        Self {
            title: text("title").unwrap_or_else(|| Self::DEFAULT_TITLE.to_string()),
            body: text("body").unwrap_or_else(|| Self::DEFAULT_BODY.to_string()),
            data,
        }
    }
}
