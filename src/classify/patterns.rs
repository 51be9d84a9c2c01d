//! Discipline pattern tables and the file skip predicate.
//!
//! Two independent heuristic sets: folder-name regexes (evaluated in
//! order, first match wins) and filename prefixes (longest first, so a
//! two-letter code is never shadowed by its one-letter substring).

use once_cell::sync::Lazy;
use regex::Regex;

use super::DisciplineCode;

/// Ordered folder-name patterns. More specific disciplines come first.
static FOLDER_PATTERNS: Lazy<Vec<(Regex, DisciplineCode)>> = Lazy::new(|| {
    let table: &[(&str, DisciplineCode)] = &[
        (r"(?i)vapou?r", DisciplineCode::VaporMitigation),
        (r"(?i)canop", DisciplineCode::Canopy),
        (r"(?i)kitchen|food\s*service", DisciplineCode::Kitchen),
        (r"(?i)arch", DisciplineCode::Architectural),
        (r"(?i)struct", DisciplineCode::Structural),
        (
            r"(?i)mep|mech|elec|plumb|hvac|fire\s*protection",
            DisciplineCode::Mep,
        ),
        (r"(?i)civil|site|grading|survey", DisciplineCode::Civil),
        (r"(?i)general|cover|misc", DisciplineCode::General),
    ];
    table
        .iter()
        .map(|(pattern, code)| {
            (
                Regex::new(pattern).expect("invalid discipline folder pattern"),
                *code,
            )
        })
        .collect()
});

/// Filename sheet prefixes, longest first.
static PREFIX_TABLE: &[(&str, DisciplineCode)] = &[
    ("VM", DisciplineCode::VaporMitigation),
    ("CN", DisciplineCode::Canopy),
    ("FS", DisciplineCode::Kitchen),
    ("A", DisciplineCode::Architectural),
    ("S", DisciplineCode::Structural),
    ("M", DisciplineCode::Mep),
    ("E", DisciplineCode::Mep),
    ("P", DisciplineCode::Mep),
    ("C", DisciplineCode::Civil),
    ("K", DisciplineCode::Kitchen),
    ("G", DisciplineCode::General),
];

/// OS metadata files that never belong in a plan set.
const METADATA_NAMES: &[&str] = &["thumbs.db", "desktop.ini", "__macosx"];

/// Match a folder name against the discipline patterns.
pub fn match_folder(folder_name: &str) -> Option<DisciplineCode> {
    if folder_name.is_empty() {
        return None;
    }
    FOLDER_PATTERNS
        .iter()
        .find(|(regex, _)| regex.is_match(folder_name))
        .map(|(_, code)| *code)
}

/// Match a filename against the sheet-prefix table.
///
/// Case-insensitive; the prefix must be followed by a separator or a
/// digit ("A-101.pdf" matches, "Archive.pdf" does not).
pub fn match_prefix(file_name: &str) -> Option<DisciplineCode> {
    let upper = file_name.to_uppercase();
    for (prefix, code) in PREFIX_TABLE {
        if let Some(rest) = upper.strip_prefix(prefix) {
            let boundary = rest
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '_' | '.' | ' '));
            if boundary {
                return Some(*code);
            }
        }
    }
    None
}

/// Whether a file should be excluded from the plan entirely.
///
/// Hidden files, OS metadata, and anything that is not a PDF or raster
/// image is skipped before counting.
pub fn should_skip(file_name: &str) -> bool {
    if file_name.starts_with('.') {
        return true;
    }
    let lower = file_name.to_lowercase();
    if METADATA_NAMES.contains(&lower.as_str()) {
        return true;
    }
    match mime_guess::from_path(file_name).first() {
        Some(mime) => {
            mime != mime_guess::mime::APPLICATION_PDF && mime.type_() != mime_guess::mime::IMAGE
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_patterns() {
        assert_eq!(match_folder("Structural"), Some(DisciplineCode::Structural));
        assert_eq!(match_folder("03 - Architectural"), Some(DisciplineCode::Architectural));
        assert_eq!(match_folder("Electrical"), Some(DisciplineCode::Mep));
        assert_eq!(match_folder("Mechanical"), Some(DisciplineCode::Mep));
        assert_eq!(match_folder("Civil & Survey"), Some(DisciplineCode::Civil));
        assert_eq!(match_folder("Vapor Mitigation"), Some(DisciplineCode::VaporMitigation));
        assert_eq!(match_folder("Canopy Drawings"), Some(DisciplineCode::Canopy));
        assert_eq!(match_folder("Food Service"), Some(DisciplineCode::Kitchen));
        assert_eq!(match_folder("Random Scans"), None);
        assert_eq!(match_folder(""), None);
    }

    #[test]
    fn test_prefix_table_order_longest_first() {
        let mut prev = usize::MAX;
        for (prefix, _) in PREFIX_TABLE {
            assert!(prefix.len() <= prev, "prefix table must be longest-first");
            prev = prefix.len();
        }
    }

    #[test]
    fn test_prefix_matches() {
        assert_eq!(match_prefix("A-101.pdf"), Some(DisciplineCode::Architectural));
        assert_eq!(match_prefix("s201.pdf"), Some(DisciplineCode::Structural));
        assert_eq!(match_prefix("M_301.pdf"), Some(DisciplineCode::Mep));
        assert_eq!(match_prefix("VM-100.pdf"), Some(DisciplineCode::VaporMitigation));
        assert_eq!(match_prefix("plan.pdf"), None);
        assert_eq!(match_prefix("Archive.pdf"), None);
    }

    #[test]
    fn test_skip_predicate() {
        assert!(should_skip(".DS_Store"));
        assert!(should_skip("Thumbs.db"));
        assert!(should_skip("desktop.ini"));
        assert!(should_skip("notes.txt"));
        assert!(should_skip("specs.docx"));
        assert!(should_skip("noextension"));
        assert!(!should_skip("A-101.pdf"));
        assert!(!should_skip("scan.png"));
        assert!(!should_skip("sheet.TIF"));
        assert!(!should_skip("photo.jpeg"));
    }
}
