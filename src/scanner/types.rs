//! Scanner Types
//!
//! Source descriptors as configured by the host, the immutable identity the
//! scanners work with, and the documents they write.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Kind of external source
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    Git,
    Github,
    Travis,
}

/// A source as the host configures it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub source_id: String,
    pub organisation: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Local clone; defaults to the scratch layout when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub issues_only: bool,
}

impl SourceDescriptor {
    /// Freeze the descriptor into the identity handed to every component
    pub fn identity(&self) -> SourceIdentity {
        SourceIdentity {
            organisation: self.organisation.clone(),
            source_id: self.source_id.clone(),
            source_url: self.url.clone(),
            credential: self.token.clone().map(Credential::new),
        }
    }
}

/// Access token, kept out of debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Immutable identity of the source being scanned
#[derive(Debug, Clone, PartialEq)]
pub struct SourceIdentity {
    pub organisation: String,
    pub source_id: String,
    pub source_url: String,
    pub credential: Option<Credential>,
}

impl SourceIdentity {
    pub fn new(
        organisation: impl Into<String>,
        source_id: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            organisation: organisation.into(),
            source_id: source_id.into(),
            source_url: source_url.into(),
            credential: None,
        }
    }

    pub fn with_credential(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(Credential::new(token));
        self
    }
}

/// A named step entry in the host's source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStep {
    pub time: i64,
    pub status: String,
    pub running: bool,
    pub good: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

/// Line counts of one language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageLines {
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub comment: u64,
    #[serde(default)]
    pub blank: u64,
}

/// Measured snapshot of a working tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    pub languages: BTreeMap<String, LanguageLines>,
    pub code_lines: u64,
    pub comment_lines: u64,
    pub blank_lines: u64,
    pub person_years: f64,
    pub estimated_cost: f64,
}

/// One quarter's measured snapshot, written once under its key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub time: i64,
    #[serde(rename = "sourceID")]
    pub source_id: String,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    pub organisation: String,
    pub loc: u64,
    pub comments: u64,
    pub blank: u64,
    pub years: f64,
    pub cost: f64,
    pub languages: BTreeMap<String, LanguageLines>,
}

impl Checkpoint {
    pub fn new(key: String, instant: i64, identity: &SourceIdentity, measured: Measurement) -> Self {
        Self {
            id: key,
            time: instant,
            source_id: identity.source_id.clone(),
            source_url: identity.source_url.clone(),
            organisation: identity.organisation.clone(),
            loc: measured.code_lines,
            comments: measured.comment_lines,
            blank: measured.blank_lines,
            years: measured.person_years,
            cost: measured.estimated_cost,
            languages: measured.languages,
        }
    }
}

/// Canonical build status
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BuildStatus {
    Building,
    Success,
    Failed,
    Aborted,
}

impl BuildStatus {
    /// Map a raw remote lifecycle state; unknown states are still building
    pub fn from_raw(state: &str) -> Self {
        match state {
            "finished" | "passed" => BuildStatus::Success,
            "failed" | "errored" => BuildStatus::Failed,
            "aborted" | "canceled" => BuildStatus::Aborted,
            _ => BuildStatus::Building,
        }
    }
}

/// A counter the remote may not report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tally {
    Known(u64),
    #[default]
    Unknown,
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tally::Known(value) => write!(f, "{}", value),
            Tally::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tally::Known(value) => serializer.serialize_u64(*value),
            Tally::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

impl<'de> Deserialize<'de> for Tally {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(value) => Ok(Tally::Known(value)),
            Raw::Text(text) if text == "unknown" => Ok(Tally::Unknown),
            Raw::Text(text) => Err(serde::de::Error::custom(format!(
                "expected a count or \"unknown\", got \"{}\"",
                text
            ))),
        }
    }
}

/// A single build as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: String,
    #[serde(rename = "buildID")]
    pub build_id: u64,
    #[serde(rename = "job")]
    pub job_slug: String,
    #[serde(rename = "jobURL")]
    pub job_url: String,
    #[serde(rename = "started")]
    pub started_at: i64,
    #[serde(rename = "finished")]
    pub finished_at: i64,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub date: String,
    pub status: BuildStatus,
    pub completed: bool,
    pub ci: String,
    pub queuetime: Tally,
    #[serde(rename = "sourceID")]
    pub source_id: String,
    pub organisation: String,
}

/// Queue state at the start of a CI scan pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub id: String,
    pub time: i64,
    pub date: String,
    pub jobs: u64,
    pub building: u64,
    pub size: Tally,
    pub blocked: Tally,
    pub stuck: Tally,
    pub avgwait: Tally,
    pub ci: String,
    #[serde(rename = "sourceID")]
    pub source_id: String,
    pub organisation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_table() {
        let table = [
            ("finished", BuildStatus::Success),
            ("passed", BuildStatus::Success),
            ("failed", BuildStatus::Failed),
            ("errored", BuildStatus::Failed),
            ("aborted", BuildStatus::Aborted),
            ("canceled", BuildStatus::Aborted),
            ("started", BuildStatus::Building),
            ("", BuildStatus::Building),
        ];
        for (raw, expected) in table {
            assert_eq!(BuildStatus::from_raw(raw), expected, "state {:?}", raw);
        }
    }

    #[test]
    fn test_status_serialises_lowercase() {
        assert_eq!(
            serde_json::to_value(BuildStatus::Aborted).unwrap(),
            serde_json::json!("aborted")
        );
        assert_eq!(BuildStatus::Building.to_string(), "building");
    }

    #[test]
    fn test_tally_sentinel_is_explicit() {
        assert_eq!(
            serde_json::to_value(Tally::Unknown).unwrap(),
            serde_json::json!("unknown")
        );
        assert_eq!(
            serde_json::to_value(Tally::Known(0)).unwrap(),
            serde_json::json!(0)
        );
        let parsed: Tally = serde_json::from_value(serde_json::json!("unknown")).unwrap();
        assert_eq!(parsed, Tally::Unknown);
        let parsed: Tally = serde_json::from_value(serde_json::json!(12)).unwrap();
        assert_eq!(parsed, Tally::Known(12));
        assert!(serde_json::from_value::<Tally>(serde_json::json!("lots")).is_err());
    }

    #[test]
    fn test_descriptor_from_toml() {
        let descriptor: SourceDescriptor = toml::from_str(
            r#"
            type = "travis"
            source_id = "abc"
            organisation = "apache"
            url = "https://travis-ci.org/apache"
            token = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(descriptor.kind, SourceKind::Travis);
        assert!(!descriptor.issues_only);

        let identity = descriptor.identity();
        assert_eq!(identity.source_url, "https://travis-ci.org/apache");
        assert_eq!(identity.credential.as_ref().map(|c| c.expose()), Some("s3cret"));
        assert!(!format!("{:?}", identity).contains("s3cret"));
    }

    #[test]
    fn test_build_record_document_shape() {
        let record = BuildRecord {
            id: "k".into(),
            build_id: 9,
            job_slug: "apache/thing".into(),
            job_url: "https://api.travis-ci.org/repo/1/builds".into(),
            started_at: 0,
            finished_at: 120,
            duration_ms: 120_000,
            date: "1970/01/01 00:02:00".into(),
            status: BuildStatus::Success,
            completed: true,
            ci: "travis".into(),
            queuetime: Tally::Unknown,
            source_id: "abc".into(),
            organisation: "apache".into(),
        };
        let document = serde_json::to_value(&record).unwrap();
        assert_eq!(document["buildID"], 9);
        assert_eq!(document["duration"], 120_000);
        assert_eq!(document["completed"], true);
        assert_eq!(document["status"], "success");
        assert_eq!(document["queuetime"], "unknown");
    }
}
