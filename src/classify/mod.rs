//! Discipline Classifier
//!
//! Pure classification of scanned plan files into disciplines using
//! folder-name and filename-prefix heuristics. No I/O — the plan
//! builder in `plan` feeds it file and folder names and groups the
//! results.

pub mod patterns;
pub mod plan;

use serde::{Deserialize, Serialize};

use patterns::{match_folder, match_prefix};

/// Logical category of construction documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisciplineCode {
    Architectural,
    Structural,
    Mep,
    Civil,
    Kitchen,
    VaporMitigation,
    Canopy,
    General,
    Unknown,
}

impl DisciplineCode {
    /// Stable identifier used in storage paths and the service request body.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Architectural => "architectural",
            Self::Structural => "structural",
            Self::Mep => "mep",
            Self::Civil => "civil",
            Self::Kitchen => "kitchen",
            Self::VaporMitigation => "vapor_mitigation",
            Self::Canopy => "canopy",
            Self::General => "general",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable name for UI labels and conflict messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Architectural => "Architectural",
            Self::Structural => "Structural",
            Self::Mep => "Mechanical/Electrical/Plumbing",
            Self::Civil => "Civil",
            Self::Kitchen => "Kitchen",
            Self::VaporMitigation => "Vapor Mitigation",
            Self::Canopy => "Canopy",
            Self::General => "General",
            Self::Unknown => "Unknown",
        }
    }
}

/// How sure the classifier is about its verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    NeedsReview,
}

/// Which heuristic decided the discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Folder,
    Prefix,
    None,
}

/// Verdict for a single file. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub discipline: DisciplineCode,
    pub confidence: Confidence,
    pub source: ClassificationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_reason: Option<String>,
}

/// Classify one file by its name and the name of its containing folder.
///
/// Deterministic and side-effect free. Resolution policy:
/// 1. Folder and prefix agree — that discipline, high confidence.
/// 2. They disagree — the prefix wins (it is more specific), flagged
///    for review with a reason citing both.
/// 3. Only one matches — that one, high confidence.
/// 4. Neither matches — `Unknown`, flagged for review.
///
/// Never fails: unrecognized input resolves to `Unknown`/needs-review.
pub fn classify(file_name: &str, folder_name: &str) -> Classification {
    let folder_match = match_folder(folder_name);
    let prefix_match = match_prefix(file_name);

    match (folder_match, prefix_match) {
        (Some(folder), Some(prefix)) if folder == prefix => Classification {
            discipline: folder,
            confidence: Confidence::High,
            source: ClassificationSource::Folder,
            conflict_reason: None,
        },
        (Some(folder), Some(prefix)) => Classification {
            discipline: prefix,
            confidence: Confidence::NeedsReview,
            source: ClassificationSource::Prefix,
            conflict_reason: Some(format!(
                "folder \"{}\" suggests {} but filename \"{}\" has a {} prefix",
                folder_name,
                folder.display_name(),
                file_name,
                prefix.display_name()
            )),
        },
        (Some(folder), None) => Classification {
            discipline: folder,
            confidence: Confidence::High,
            source: ClassificationSource::Folder,
            conflict_reason: None,
        },
        (None, Some(prefix)) => Classification {
            discipline: prefix,
            confidence: Confidence::High,
            source: ClassificationSource::Prefix,
            conflict_reason: None,
        },
        (None, None) => Classification {
            discipline: DisciplineCode::Unknown,
            confidence: Confidence::NeedsReview,
            source: ClassificationSource::None,
            conflict_reason: None,
        },
    }
}
