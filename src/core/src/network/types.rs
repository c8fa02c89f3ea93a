use serde::{Deserialize, Serialize};

/// Body of `POST /api/start`.
///
/// Optional tuning knobs are omitted from the JSON when unset so servers that do not know
/// about them keep accepting the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartPayload {
    pub channel: String,
    #[serde(alias = "num_viewers")]
    pub views: u32,
    /// Minutes.
    #[serde(alias = "duration_minutes")]
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rapid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp_up_minutes: Option<u32>,
}

/// Successful answer of `/api/start` and `/api/stop`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body returned alongside any non-2xx status.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: String,
}

/// `GET /api/me` answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub is_premium: Option<bool>,
    #[serde(default)]
    pub max_views: Option<u32>,
}

impl UserProfile {
    /// Display tier: the explicit level when present, otherwise derived from the premium flag.
    pub fn tier(&self) -> String {
        match (&self.level, self.is_premium) {
            (Some(level), _) if !level.is_empty() => level.clone(),
            (_, Some(true)) => String::from("Pro"),
            _ => String::from("Standard"),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_payload_omits_unset_options() {
        let payload = StartPayload {
            channel: "foo".into(),
            views: 50,
            duration: 10,
            rapid: None,
            viewer_speed: None,
            ramp_up_minutes: Some(2),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"channel": "foo", "views": 50, "duration": 10, "ramp_up_minutes": 2})
        );
    }

    #[test]
    fn start_payload_accepts_alternate_field_names() {
        let payload: StartPayload = serde_json::from_str(
            r#"{"channel": "foo", "num_viewers": 5, "duration_minutes": 3}"#,
        )
        .unwrap();
        assert_eq!(payload.views, 5);
        assert_eq!(payload.duration, 3);
    }

    #[test]
    fn profile_tier_and_numeric_id() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id": 1234, "username": "alice", "is_premium": true, "max_views": 1000}"#,
        )
        .unwrap();
        assert_eq!(profile.id, "1234");
        assert_eq!(profile.tier(), "Pro");
        assert_eq!(profile.max_views, Some(1000));

        let profile: UserProfile =
            serde_json::from_str(r#"{"id": "9", "username": "bob", "level": "owner"}"#).unwrap();
        assert_eq!(profile.tier(), "owner");
        assert_eq!(profile.max_views, None);

        assert_eq!(UserProfile::default().tier(), "Standard");
    }
}
