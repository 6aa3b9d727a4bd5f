//! Pipeline DTOs for backend communication

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::backend::BackendIndex;
use crate::domain::pipeline::SourceType;

/// Pipeline as reported by a backend
///
/// Backends attach extra fields (valves, filter targets, ...) that the
/// client does not interpret; those are ignored. Fields with unexpected
/// shapes degrade to `None` instead of failing the whole listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub pipeline_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,

    /// Backend index reported by the backend itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idx: Option<BackendIndex>,

    #[serde(
        default,
        deserialize_with = "lenient_source",
        skip_serializing_if = "Option::is_none"
    )]
    pub source: Option<SourceType>,

    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// Request to install a pipeline from a remote location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallFromUrl {
    pub url: String,
    #[serde(rename = "urlIdx")]
    pub url_idx: BackendIndex,
}

/// Request to delete exactly one pipeline at one backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePipeline {
    pub id: String,
    #[serde(rename = "urlIdx")]
    pub url_idx: BackendIndex,
}

/// Partial update of pipeline metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePipeline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl UpdatePipeline {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.priority.is_none()
    }
}

/// Routing query attached to every pipeline-scoped request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackendQuery {
    #[serde(rename = "urlIdx")]
    pub url_idx: BackendIndex,
}

/// Parses the timestamp shapes backends are known to send
///
/// Accepts RFC 3339, naive ISO 8601 (interpreted as UTC) and integer or
/// fractional epoch seconds.
pub fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|secs| secs as i64))
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp))
}

fn lenient_source<'de, D>(deserializer: D) -> Result<Option<SourceType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_ignores_unknown_fields() {
        let summary: PipelineSummary = serde_json::from_value(json!({
            "id": "pipeline-1",
            "name": "Test Pipeline",
            "description": "A test pipeline",
            "type": "pipe",
            "pipelines": ["step1", "step2"],
            "priority": 1,
            "valves": {},
            "created_at": "2023-01-01T00:00:00",
            "updated_at": "2023-01-01T00:00:00"
        }))
        .unwrap();

        assert_eq!(summary.id, "pipeline-1");
        assert_eq!(summary.pipeline_type.as_deref(), Some("pipe"));
        assert_eq!(summary.priority, Some(1));
        assert_eq!(
            summary.created_at.map(|dt| dt.to_rfc3339()),
            Some("2023-01-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_summary_degrades_unexpected_shapes() {
        let summary: PipelineSummary = serde_json::from_value(json!({
            "id": "odd",
            "source": "carrier-pigeon",
            "created_at": {"when": "yesterday"}
        }))
        .unwrap();

        assert_eq!(summary.source, None);
        assert_eq!(summary.created_at, None);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp(&json!("2024-05-01T10:00:00Z")).is_some());
        assert!(parse_timestamp(&json!("2024-05-01T10:00:00.123456")).is_some());
        assert_eq!(
            parse_timestamp(&json!(0)).map(|dt| dt.timestamp()),
            Some(0)
        );
        assert!(parse_timestamp(&json!("not a date")).is_none());
    }

    #[test]
    fn test_requests_use_url_idx_on_the_wire() {
        let body = serde_json::to_value(InstallFromUrl {
            url: "https://example.com/p.py".to_string(),
            url_idx: 1,
        })
        .unwrap();
        assert_eq!(body, json!({"url": "https://example.com/p.py", "urlIdx": 1}));

        let body = serde_json::to_value(DeletePipeline {
            id: "summarizer".to_string(),
            url_idx: 0,
        })
        .unwrap();
        assert_eq!(body, json!({"id": "summarizer", "urlIdx": 0}));
    }

    #[test]
    fn test_update_skips_unset_fields() {
        let update = UpdatePipeline {
            priority: Some(3),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert_eq!(serde_json::to_value(update).unwrap(), json!({"priority": 3}));
        assert!(UpdatePipeline::default().is_empty());
    }
}
