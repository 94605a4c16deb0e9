//! Idempotency keys
//!
//! Every record written by a scanner is addressed by a key derived from the
//! identity of the unit of work. Identical identities always produce the same
//! key, so a re-run can test for existence before doing any work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};
use std::fmt;

/// Record kinds, each with a literal discriminator mixed into its key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum RecordKind {
    Checkpoint,
    Build,
    Queue,
}

/// One identity field contributing to a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyField<'a> {
    Text(&'a str),
    Number(i64),
}

impl fmt::Display for KeyField<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyField::Text(text) => f.write_str(text),
            KeyField::Number(number) => write!(f, "{}", number),
        }
    }
}

impl<'a> From<&'a str> for KeyField<'a> {
    fn from(value: &'a str) -> Self {
        KeyField::Text(value)
    }
}

impl From<i64> for KeyField<'_> {
    fn from(value: i64) -> Self {
        KeyField::Number(value)
    }
}

/// Derive a key from ordered identity fields and the record kind.
///
/// Each field, then the discriminator, is written as `<byte length>:<text>`
/// so no two field lists share an encoding. The UTF-8 bytes are hashed with
/// SHA-224.
pub fn idempotency_key(fields: &[KeyField<'_>], kind: RecordKind) -> String {
    let mut encoded = String::new();
    for field in fields {
        push_length_prefixed(&mut encoded, &field.to_string());
    }
    push_length_prefixed(&mut encoded, kind.as_ref());
    digest_hex(&encoded)
}

fn push_length_prefixed(buffer: &mut String, text: &str) {
    buffer.push_str(&text.len().to_string());
    buffer.push(':');
    buffer.push_str(text);
}

/// Replace every non-ASCII character with `?`
pub fn ascii_normalise(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

fn digest_hex(input: &str) -> String {
    let mut hasher = Sha224::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The identity of a record, as seen by the key schemes
#[derive(Debug, Clone)]
pub enum KeySubject<'a> {
    Checkpoint {
        organisation: &'a str,
        source_id: &'a str,
        instant: DateTime<Utc>,
    },
    Build {
        organisation: &'a str,
        source_url: &'a str,
        job_id: &'a str,
        build_id: u64,
    },
    Queue {
        organisation: &'a str,
        source_url: &'a str,
        taken_at: i64,
    },
}

impl KeySubject<'_> {
    pub fn kind(&self) -> RecordKind {
        match self {
            KeySubject::Checkpoint { .. } => RecordKind::Checkpoint,
            KeySubject::Build { .. } => RecordKind::Build,
            KeySubject::Queue { .. } => RecordKind::Queue,
        }
    }
}

/// Key derivation scheme.
///
/// `Canonical` hashes the length-prefixed identity fields plus the record
/// discriminator. `Legacy` reproduces the hyphen-joined, ASCII-normalised
/// key strings of stores populated by the older scanners so existing
/// checkpoints and builds are recognised.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyScheme {
    #[default]
    Canonical,
    Legacy,
}

impl KeyScheme {
    pub fn key(&self, subject: &KeySubject<'_>) -> String {
        match self {
            KeyScheme::Canonical => Self::canonical(subject),
            KeyScheme::Legacy => Self::legacy(subject),
        }
    }

    fn canonical(subject: &KeySubject<'_>) -> String {
        let kind = subject.kind();
        match subject {
            KeySubject::Checkpoint {
                organisation,
                source_id,
                instant,
            } => idempotency_key(
                &[
                    (*organisation).into(),
                    (*source_id).into(),
                    instant.timestamp().into(),
                ],
                kind,
            ),
            KeySubject::Build {
                organisation,
                source_url,
                job_id,
                build_id,
            } => {
                let build = build_id.to_string();
                idempotency_key(
                    &[
                        (*organisation).into(),
                        (*source_url).into(),
                        (*job_id).into(),
                        build.as_str().into(),
                    ],
                    kind,
                )
            }
            KeySubject::Queue {
                organisation,
                source_url,
                taken_at,
            } => idempotency_key(
                &[
                    (*organisation).into(),
                    (*source_url).into(),
                    (*taken_at).into(),
                ],
                kind,
            ),
        }
    }

    fn legacy(subject: &KeySubject<'_>) -> String {
        let raw = match subject {
            KeySubject::Checkpoint {
                source_id, instant, ..
            } => format!("{}{}", source_id, instant.format("%Y-%b-%d 0:00")),
            KeySubject::Build {
                organisation,
                source_url,
                job_id,
                build_id,
            } => format!("{}-{}-{}-{}", organisation, source_url, job_id, build_id),
            KeySubject::Queue {
                organisation,
                source_url,
                taken_at,
            } => format!("{}-{}-queue-{}", organisation, source_url, taken_at),
        };
        // Older stores hashed ASCII only
        digest_hex(&ascii_normalise(&raw))
    }
}
