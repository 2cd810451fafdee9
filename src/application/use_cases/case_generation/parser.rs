use crate::domain::medical_case::{CaseSection, CaseSections};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static SECTION_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"##\s+(.*?)\s*\n").unwrap());

static NEXT_SECTION_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n##\s").unwrap());

pub const TITLE_KEY: &str = "title";

/// Splits generated markdown into a title plus `## Heading` sections.
///
/// The first line becomes `title` with leading `#` stripped. Each heading is
/// keyed lower-case with spaces turned into underscores, and its body runs
/// until the next line-initial `##` heading or the end of the text. Later
/// duplicates overwrite earlier ones. Text without headings yields only the
/// title, which is a valid outcome rather than an error.
pub fn parse_case_content(content: &str) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();

    let title = content
        .trim()
        .split('\n')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches('#')
        .trim();
    sections.insert(TITLE_KEY.to_string(), title.to_string());

    let mut cursor = 0;
    while let Some(caps) = SECTION_HEADING.captures_at(content, cursor) {
        let (Some(whole), Some(heading)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let body_start = whole.end();
        let body_end = NEXT_SECTION_HEADING
            .find_at(content, body_start)
            .map(|m| m.start())
            .unwrap_or(content.len());

        let key = heading.as_str().trim().to_lowercase().replace(' ', "_");
        sections.insert(key, content[body_start..body_end].trim().to_string());
        cursor = body_end;
    }

    sections
}

/// Copies recognized section keys onto case fields. Unknown keys are ignored.
pub fn case_sections(parsed: &BTreeMap<String, String>) -> CaseSections {
    let mut sections = CaseSections::default();
    for section in CaseSection::ALL {
        let value = match section {
            CaseSection::HistoryPresentIllness => parsed
                .get("history_of_present_illness")
                .filter(|value| !value.is_empty())
                .or_else(|| parsed.get(section.key())),
            _ => parsed.get(section.key()),
        };
        if let Some(value) = value {
            sections.set(section, value.clone());
        }
    }
    sections
}
