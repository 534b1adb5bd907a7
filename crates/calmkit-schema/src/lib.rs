use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emotional state detected in a single message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Panic,
    Anxious,
    Stressed,
    Sad,
    Neutral,
    Positive,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Panic,
        Emotion::Anxious,
        Emotion::Stressed,
        Emotion::Sad,
        Emotion::Neutral,
        Emotion::Positive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Panic => "panic",
            Emotion::Anxious => "anxious",
            Emotion::Stressed => "stressed",
            Emotion::Sad => "sad",
            Emotion::Neutral => "neutral",
            Emotion::Positive => "positive",
        }
    }

    /// Default intensity assigned by keyword classification.
    pub fn base_intensity(&self) -> u8 {
        match self {
            Emotion::Panic => 5,
            Emotion::Anxious | Emotion::Stressed => 3,
            Emotion::Sad => 2,
            Emotion::Positive => 1,
            Emotion::Neutral => 0,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown emotion: {s}"))
    }
}

pub const MAX_INTENSITY: u8 = 5;

/// Structured emotion judgment for one message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    pub emotion: Emotion,
    pub intensity: u8,
    #[serde(default)]
    pub trigger_tags: Vec<String>,
    pub needs_intervention: bool,
}

impl Classification {
    /// Builds a classification whose intervention flag follows the standard rule.
    pub fn derived(emotion: Emotion, intensity: u8) -> Self {
        Self {
            emotion,
            intensity,
            trigger_tags: Vec::new(),
            needs_intervention: intervention_required(emotion, intensity),
        }
    }

    pub fn neutral() -> Self {
        Self::derived(Emotion::Neutral, 0)
    }
}

pub fn intervention_required(emotion: Emotion, intensity: u8) -> bool {
    intensity >= 4 || emotion == Emotion::Panic
}

/// One persisted row of the mood log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoodEntry {
    pub id: i64,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub emotion: Emotion,
    pub intensity: u8,
    #[serde(default)]
    pub trigger_tags: Vec<String>,
    #[serde(default)]
    pub intervention: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_serializes_lowercase() {
        let json = serde_json::to_string(&Emotion::Stressed).unwrap();
        assert_eq!(json, "\"stressed\"");
        let parsed: Emotion = serde_json::from_str("\"positive\"").unwrap();
        assert_eq!(parsed, Emotion::Positive);
    }

    #[test]
    fn unknown_emotion_is_rejected() {
        assert!(serde_json::from_str::<Emotion>("\"furious\"").is_err());
        assert!("furious".parse::<Emotion>().is_err());
        assert_eq!("  Sad ".parse::<Emotion>().unwrap(), Emotion::Sad);
    }

    #[test]
    fn derived_classification_follows_intervention_rule() {
        for emotion in Emotion::ALL {
            for intensity in 0..=MAX_INTENSITY {
                let c = Classification::derived(emotion, intensity);
                assert_eq!(
                    c.needs_intervention,
                    intensity >= 4 || emotion == Emotion::Panic
                );
                assert!(c.trigger_tags.is_empty());
            }
        }
    }

    #[test]
    fn classification_trigger_tags_default_empty() {
        let c: Classification = serde_json::from_str(
            r#"{"emotion":"sad","intensity":2,"needs_intervention":false}"#,
        )
        .unwrap();
        assert!(c.trigger_tags.is_empty());
    }

    #[test]
    fn mood_entry_uses_z_suffixed_timestamps() {
        let entry = MoodEntry {
            id: 1,
            user_id: "u".into(),
            timestamp: "2024-05-01T10:00:00Z".parse().unwrap(),
            text: "hello".into(),
            emotion: Emotion::Neutral,
            intensity: 0,
            trigger_tags: vec![],
            intervention: None,
            notes: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["timestamp"], "2024-05-01T10:00:00Z");
        assert!(value["intervention"].is_null());
        assert!(value["notes"].is_null());
        for key in [
            "id",
            "user_id",
            "timestamp",
            "text",
            "emotion",
            "intensity",
            "trigger_tags",
            "intervention",
            "notes",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
    }
}
