use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::StoreError;

/// Discriminator for the six annotation variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Note,
    Url,
    Image,
    Video,
    File,
    Connection,
}

impl AnnotationKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "note" => Some(Self::Note),
            "url" => Some(Self::Url),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "file" => Some(Self::File),
            "connection" => Some(Self::Connection),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Url => "url",
            Self::Image => "image",
            Self::Video => "video",
            Self::File => "file",
            Self::Connection => "connection",
        }
    }
}

impl std::fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant payload as a tagged union: exactly one payload shape per kind,
/// instead of a row of mostly-null columns. Image and video share the url
/// payload shape; file annotations also go through the url-like path until
/// real upload handling exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnnotationBody {
    Note {
        note: String,
    },
    Url {
        url: String,
        description: Option<String>,
    },
    Image {
        url: String,
        description: Option<String>,
    },
    Video {
        url: String,
        description: Option<String>,
    },
    File {
        filename: Option<String>,
        url: String,
        description: Option<String>,
    },
    Connection {
        /// Hash of the second dragable. Never equal to the owning dragable.
        connected_to: String,
    },
}

impl AnnotationBody {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Self::Note { .. } => AnnotationKind::Note,
            Self::Url { .. } => AnnotationKind::Url,
            Self::Image { .. } => AnnotationKind::Image,
            Self::Video { .. } => AnnotationKind::Video,
            Self::File { .. } => AnnotationKind::File,
            Self::Connection { .. } => AnnotationKind::Connection,
        }
    }
}

/// Typed metadata attached to a dragable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub hash: String,
    /// Hash of the owning dragable.
    pub dragable: String,
    pub created_by: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub body: AnnotationBody,
}

/// Flat relational shape: one row per annotation, kind discriminator plus
/// nullable payload columns. Only the storage layer touches this.
#[derive(Debug, Clone, FromRow)]
pub struct AnnotationRow {
    pub hash: String,
    pub dragable: String,
    pub created_by: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub kind: String,
    pub note: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub filename: Option<String>,
    pub connected_to: Option<String>,
}

impl From<&Annotation> for AnnotationRow {
    fn from(annotation: &Annotation) -> Self {
        let mut row = AnnotationRow {
            hash: annotation.hash.clone(),
            dragable: annotation.dragable.clone(),
            created_by: annotation.created_by.clone(),
            created: annotation.created,
            updated: annotation.updated,
            kind: annotation.body.kind().as_str().to_string(),
            note: None,
            url: None,
            description: None,
            filename: None,
            connected_to: None,
        };
        match &annotation.body {
            AnnotationBody::Note { note } => row.note = Some(note.clone()),
            AnnotationBody::Url { url, description }
            | AnnotationBody::Image { url, description }
            | AnnotationBody::Video { url, description } => {
                row.url = Some(url.clone());
                row.description = description.clone();
            }
            AnnotationBody::File {
                filename,
                url,
                description,
            } => {
                row.filename = filename.clone();
                row.url = Some(url.clone());
                row.description = description.clone();
            }
            AnnotationBody::Connection { connected_to } => {
                row.connected_to = Some(connected_to.clone());
            }
        }
        row
    }
}

impl TryFrom<AnnotationRow> for Annotation {
    type Error = StoreError;

    fn try_from(row: AnnotationRow) -> Result<Self, Self::Error> {
        let missing = |field: &str| {
            StoreError::Corrupt(format!(
                "annotation '{}' of kind '{}' is missing '{}'",
                row.hash, row.kind, field
            ))
        };

        let kind = AnnotationKind::parse(&row.kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown annotation kind '{}'", row.kind)))?;

        let body = match kind {
            AnnotationKind::Note => AnnotationBody::Note {
                note: row.note.clone().ok_or_else(|| missing("note"))?,
            },
            AnnotationKind::Url => AnnotationBody::Url {
                url: row.url.clone().ok_or_else(|| missing("url"))?,
                description: row.description.clone(),
            },
            AnnotationKind::Image => AnnotationBody::Image {
                url: row.url.clone().ok_or_else(|| missing("url"))?,
                description: row.description.clone(),
            },
            AnnotationKind::Video => AnnotationBody::Video {
                url: row.url.clone().ok_or_else(|| missing("url"))?,
                description: row.description.clone(),
            },
            AnnotationKind::File => AnnotationBody::File {
                filename: row.filename.clone(),
                url: row.url.clone().ok_or_else(|| missing("url"))?,
                description: row.description.clone(),
            },
            AnnotationKind::Connection => AnnotationBody::Connection {
                connected_to: row
                    .connected_to
                    .clone()
                    .ok_or_else(|| missing("connected_to"))?,
            },
        };

        Ok(Annotation {
            hash: row.hash,
            dragable: row.dragable,
            created_by: row.created_by,
            created: row.created,
            updated: row.updated,
            body,
        })
    }
}
