use crate::domain::generation::DedupMode;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Label patterns tried in order. Group 2 is the candidate diagnosis and
/// stops at the first period on its line, or at the end of the text
/// (a single trailing newline is allowed before the end).
static DIAGNOSIS_PATTERNS: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)(diagnos\w+):?\s*(.*?)(?:\.|\n?\z)").unwrap(),
        Regex::new(r"(?i)(impression):?\s*(.*?)(?:\.|\n?\z)").unwrap(),
        Regex::new(r"(?i)(\d+\.\s*)(.*?)(?:\.|\n?\z)").unwrap(),
        Regex::new(r"(?i)(assessment):?\s*(.*?)(?:\.|\n?\z)").unwrap(),
    ]
});

const MIN_DIAGNOSIS_CHARS: usize = 4;

/// Heuristic scan of an assessment for diagnosis names.
///
/// Results follow pattern order, then match order. When nothing matches,
/// the text before the first period is returned as the only candidate.
pub fn extract_diagnoses(assessment: &str, mode: DedupMode) -> Vec<String> {
    let mut diagnoses: Vec<String> = Vec::new();

    for pattern in DIAGNOSIS_PATTERNS.iter() {
        for caps in pattern.captures_iter(assessment) {
            let Some(candidate) = caps.get(2) else {
                continue;
            };
            let candidate = candidate.as_str().trim();
            if candidate.chars().count() >= MIN_DIAGNOSIS_CHARS {
                diagnoses.push(candidate.to_string());
            }
        }
    }

    if diagnoses.is_empty() {
        let first_sentence = assessment.split('.').next().unwrap_or_default().trim();
        if !first_sentence.is_empty() {
            diagnoses.push(first_sentence.to_string());
        }
    }

    if mode == DedupMode::Deduplicate {
        let mut seen = HashSet::new();
        diagnoses.retain(|name| seen.insert(name.clone()));
    }

    diagnoses
}
