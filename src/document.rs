//! Typed project document records.
//!
//! Documents arrive as nested JSON (`project.content.sections[].segments[].visuals[]`).
//! They are converted once at the store boundary; keys the engine does not
//! model are kept in each record's `extra` map and written back untouched.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::types::TimingStamp;

/// Record id as stored: documents mix integer and string ids, and lookups
/// compare their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    pub fn matches(&self, other: &str) -> bool {
        match self {
            Self::Text(text) => text == other,
            Self::Number(number) => number.to_string() == other,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// A text key as stored: missing, explicitly `null`, or a string.
///
/// Keeping the three states apart lets a load/save cycle write back exactly
/// what was read, while the engine reads all of them through [`TextField::as_str`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TextField {
    #[default]
    Absent,
    Null,
    Text(String),
}

impl TextField {
    /// The text, or `""` for an absent or `null` key.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Absent | Self::Null => "",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }

    /// Rewrite a present string in place; absent and `null` keys stay as they are.
    pub fn map_text(&mut self, f: impl FnOnce(&str) -> String) {
        if let Self::Text(text) = self {
            *text = f(text);
        }
    }
}

impl From<&str> for TextField {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TextField {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl PartialEq<&str> for TextField {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, Self::Text(text) if text == other)
    }
}

impl Serialize for TextField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Absent | Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for TextField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            Some(text) => Self::Text(text),
            None => Self::Null,
        })
    }
}

/// Engine-owned numbers and lists: a stored `null` reads as the default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A visual shown during a segment.
///
/// Only the reference text, timing and image URL are modelled. Everything
/// else (`description`, `visualType`, `position`, `assetId`, ...) stays in
/// `extra` exactly as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visual {
    pub id: RecordId,
    /// Excerpt of the narration this visual accompanies.
    #[serde(
        rename = "referenceText",
        default,
        skip_serializing_if = "TextField::is_absent"
    )]
    pub reference_text: TextField,
    /// Seconds relative to the segment start.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: f64,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "TextField::is_absent")]
    pub image_url: TextField,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Visual {
    pub fn new(id: impl Into<RecordId>, reference_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reference_text: TextField::Text(reference_text.into()),
            timestamp: 0.0,
            duration: 0.0,
            image_url: TextField::Absent,
            extra: Map::new(),
        }
    }

    pub fn end(&self) -> f64 {
        self.timestamp + self.duration
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: RecordId,
    #[serde(
        rename = "narrationText",
        default,
        skip_serializing_if = "TextField::is_absent"
    )]
    pub narration_text: TextField,
    #[serde(rename = "audioUrl", default, skip_serializing_if = "TextField::is_absent")]
    pub audio_url: TextField,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub visuals: Vec<Visual>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub word_timings: Vec<TimingStamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Segment {
    pub fn new(id: impl Into<RecordId>, duration: f64) -> Self {
        Self {
            id: id.into(),
            narration_text: TextField::Absent,
            audio_url: TextField::Absent,
            duration,
            visuals: Vec::new(),
            word_timings: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn has_narration_audio(&self) -> bool {
        !self.audio_url.is_blank() && !self.narration_text.is_blank()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: RecordId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub segments: Vec<Segment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectContent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sections: Vec<Section>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub id: RecordId,
    /// Bumped by the store on every successful save.
    #[serde(default, deserialize_with = "null_as_default")]
    pub revision: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: ProjectContent,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectDocument {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            revision: 0,
            content: ProjectContent::default(),
            extra: Map::new(),
        }
    }

    pub fn from_json(project_id: &str, value: Value) -> Result<Self, SyncError> {
        let document: Self =
            serde_json::from_value(value).map_err(|err| SyncError::InvalidDocument {
                project_id: project_id.to_string(),
                message: err.to_string(),
            })?;
        document.validate()?;
        Ok(document)
    }

    pub fn to_json(&self) -> Result<Value, SyncError> {
        serde_json::to_value(self).map_err(|e| SyncError::json("serialize project document", e))
    }

    /// Rejects timing values the engine could not reason about.
    pub fn validate(&self) -> Result<(), SyncError> {
        let invalid = |message: String| SyncError::InvalidDocument {
            project_id: self.id.to_string(),
            message,
        };
        for section in &self.content.sections {
            for segment in &section.segments {
                if !segment.duration.is_finite() || segment.duration < 0.0 {
                    return Err(invalid(format!(
                        "segment '{}' has invalid duration {}",
                        segment.id, segment.duration
                    )));
                }
                for visual in &segment.visuals {
                    if !visual.timestamp.is_finite() || !visual.duration.is_finite() {
                        return Err(invalid(format!(
                            "visual '{}' in segment '{}' has non-finite timing",
                            visual.id, segment.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_document() -> Value {
        json!({
            "id": 42,
            "title": "Volcanoes",
            "content": {
                "sections": [{
                    "id": "s1",
                    "title": "Intro",
                    "segments": [{
                        "id": 7,
                        "narrationText": "Lava flows downhill.",
                        "audioUrl": "/audio/seg7.flac",
                        "duration": 4.2,
                        "visuals": [{
                            "id": "v1",
                            "description": "lava",
                            "referenceText": "Lava flows",
                            "timestamp": 0.0,
                            "duration": 2.0,
                            "imageUrl": "images/lava.png",
                            "visualType": "image",
                            "position": "center",
                            "transition": "fade",
                            "removeBackground": true,
                            "removeBackgroundMethod": "rembg",
                            "assetId": 9,
                            "zoom": 1.2
                        }],
                        "speaker": "narrator"
                    }]
                }]
            }
        })
    }

    #[test]
    fn record_ids_compare_by_string_form() {
        assert!(RecordId::Number(7).matches("7"));
        assert!(RecordId::from("abc").matches("abc"));
        assert!(!RecordId::Number(7).matches("07"));
        assert_eq!(RecordId::Number(12).to_string(), "12");
    }

    #[test]
    fn document_round_trip_preserves_unknown_keys() {
        let raw = sample_document();
        let document = ProjectDocument::from_json("42", raw.clone()).unwrap();
        let segment = &document.content.sections[0].segments[0];
        assert_eq!(segment.visuals[0].reference_text, "Lava flows");
        assert_eq!(segment.visuals[0].extra.get("assetId"), Some(&json!(9)));
        assert_eq!(segment.extra.get("speaker"), Some(&json!("narrator")));

        let written = document.to_json().unwrap();
        assert_eq!(written["title"], raw["title"]);
        assert_eq!(written["content"]["sections"][0]["title"], json!("Intro"));
        let visual = &written["content"]["sections"][0]["segments"][0]["visuals"][0];
        assert_eq!(visual["zoom"], json!(1.2));
        assert_eq!(visual["removeBackgroundMethod"], json!("rembg"));
        assert_eq!(visual["position"], json!("center"));
        assert_eq!(visual["removeBackground"], json!(true));
    }

    #[test]
    fn null_fields_load_as_empty() {
        let document = ProjectDocument::from_json(
            "p",
            json!({
                "id": "p",
                "revision": null,
                "content": {"sections": [{"id": 1, "segments": [{
                    "id": 2,
                    "narrationText": null,
                    "audioUrl": null,
                    "duration": null,
                    "word_timings": null,
                    "visuals": [{
                        "id": "v1",
                        "description": null,
                        "referenceText": null,
                        "timestamp": null,
                        "duration": null,
                        "imageUrl": null
                    }]
                }]}]}
            }),
        )
        .unwrap();
        let segment = &document.content.sections[0].segments[0];
        assert_eq!(segment.duration, 0.0);
        assert!(!segment.has_narration_audio());
        let visual = &segment.visuals[0];
        assert_eq!(visual.reference_text.as_str(), "");
        assert_eq!(visual.image_url, TextField::Null);
        assert_eq!(visual.timestamp, 0.0);
        assert_eq!(document.revision, 0);
    }

    #[test]
    fn round_trip_keeps_null_and_absent_keys_apart() {
        let raw = json!({
            "id": "p",
            "content": {"sections": [{"id": 1, "segments": [{
                "id": 2,
                "narrationText": "hello",
                "audioUrl": null,
                "visuals": [
                    {"id": "a", "imageUrl": null, "description": null},
                    {"id": "b", "referenceText": "hello"}
                ]
            }]}]}
        });
        let written = ProjectDocument::from_json("p", raw).unwrap().to_json().unwrap();
        let segment = &written["content"]["sections"][0]["segments"][0];
        assert_eq!(segment.get("audioUrl"), Some(&Value::Null));

        let first = segment["visuals"][0].as_object().unwrap();
        assert_eq!(first.get("imageUrl"), Some(&Value::Null));
        assert_eq!(first.get("description"), Some(&Value::Null));
        assert!(!first.contains_key("referenceText"));

        let second = segment["visuals"][1].as_object().unwrap();
        assert!(!second.contains_key("imageUrl"));
        assert!(!second.contains_key("removeBackground"));
        assert!(!second.contains_key("description"));
    }

    #[test]
    fn text_field_rewrites_only_present_strings() {
        let mut present = TextField::from("a.png");
        present.map_text(|url| format!("/img/{url}"));
        assert_eq!(present, "/img/a.png");

        let mut null = TextField::Null;
        null.map_text(|url| format!("/img/{url}"));
        assert_eq!(null, TextField::Null);
        assert!(TextField::Absent.is_blank());
    }

    #[test]
    fn missing_optional_fields_default() {
        let document = ProjectDocument::from_json(
            "p",
            json!({"id": "p", "content": {"sections": [{"id": 1, "segments": [{"id": 2}]}]}}),
        )
        .unwrap();
        let segment = &document.content.sections[0].segments[0];
        assert_eq!(segment.duration, 0.0);
        assert!(segment.visuals.is_empty());
        assert!(segment.word_timings.is_empty());
        assert!(!segment.has_narration_audio());
        assert_eq!(document.revision, 0);
    }

    #[test]
    fn negative_segment_duration_is_rejected() {
        let err = ProjectDocument::from_json(
            "p",
            json!({"id": "p", "content": {"sections": [{"id": 1, "segments": [{"id": 2, "duration": -1.0}]}]}}),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::InvalidDocument { .. }));
    }

    #[test]
    fn malformed_document_is_invalid() {
        let err = ProjectDocument::from_json("p", json!({"content": []})).unwrap_err();
        assert!(matches!(err, SyncError::InvalidDocument { ref project_id, .. } if project_id == "p"));
    }
}
