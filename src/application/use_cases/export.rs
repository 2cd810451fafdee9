use crate::domain::error::{AppError, Result};
use crate::domain::medical_case::{CaseSection, MedicalCaseDetail};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

const NOT_SPECIFIED: &str = "未指定 / Not specified";
const DISCLAIMER: &str = "注意：本病例為AI輔助生成，僅供教育和培訓目的使用。 / Note: this case was generated with AI assistance for education and training purposes only.";
const DIAGNOSES_HEADING: &str = "診斷 / Diagnoses";
const RULE_HEAVY: &str = "==================================================";
const RULE_LIGHT: &str = "--------------------------------------------------";

/// Report order of the clinical sections with their bilingual headings.
static SECTION_HEADINGS: [(CaseSection, &str); 13] = [
    (CaseSection::ChiefComplaint, "主訴 / Chief Complaint"),
    (CaseSection::HistoryPresentIllness, "現病史 / History of Present Illness"),
    (CaseSection::PastMedicalHistory, "過去病史 / Past Medical History"),
    (CaseSection::Medications, "目前用藥 / Current Medications"),
    (CaseSection::Allergies, "過敏史 / Allergies"),
    (CaseSection::FamilyHistory, "家族史 / Family History"),
    (CaseSection::SocialHistory, "社會史 / Social History"),
    (CaseSection::PhysicalExamination, "體格檢查 / Physical Examination"),
    (CaseSection::VitalSigns, "生命體徵 / Vital Signs"),
    (CaseSection::LaboratoryResults, "實驗室結果 / Laboratory Results"),
    (CaseSection::ImagingResults, "影像結果 / Imaging Results"),
    (CaseSection::Assessment, "評估 / Assessment"),
    (CaseSection::Plan, "治療計劃 / Treatment Plan"),
];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[serde(alias = "text")]
    Txt,
    Html,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Html => "html",
            ExportFormat::Json => "json",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "text/plain; charset=utf-8",
            ExportFormat::Html => "text/html; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Txt),
            "html" => Ok(ExportFormat::Html),
            "json" => Ok(ExportFormat::Json),
            other => Err(AppError::ValidationError(format!(
                "Unsupported export format: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub content: String,
    pub media_type: &'static str,
    pub filename: String,
}

/// Renders a stored case. The filename carries the export time, not the
/// creation time of the case.
pub fn export_case(detail: &MedicalCaseDetail, format: ExportFormat) -> Result<ExportedDocument> {
    render_at(detail, format, Local::now())
}

fn render_at(
    detail: &MedicalCaseDetail,
    format: ExportFormat,
    exported_at: DateTime<Local>,
) -> Result<ExportedDocument> {
    let content = match format {
        ExportFormat::Txt => render_text(detail),
        ExportFormat::Html => render_html(detail),
        ExportFormat::Json => serde_json::to_string_pretty(&detail.record())
            .map_err(|e| AppError::Internal(format!("Failed to serialize case: {}", e)))?,
    };

    Ok(ExportedDocument {
        content,
        media_type: format.media_type(),
        filename: format!(
            "medical_case_{}_{}.{}",
            detail.case.id,
            exported_at.format("%Y%m%d_%H%M%S"),
            format.extension()
        ),
    })
}

/// Sections with text, in report order.
fn present_sections(detail: &MedicalCaseDetail) -> impl Iterator<Item = (CaseSection, &'static str, &str)> {
    SECTION_HEADINGS.iter().filter_map(move |(section, heading)| {
        let body = detail.case.sections.get(*section).trim();
        (!body.is_empty()).then_some((*section, *heading, body))
    })
}

fn diagnosis_lines(detail: &MedicalCaseDetail) -> Vec<String> {
    detail
        .diagnoses
        .iter()
        .map(|diagnosis| match diagnosis.icd_code.as_deref() {
            Some(code) if !code.trim().is_empty() => format!("{} (ICD: {})", diagnosis.name, code),
            _ => diagnosis.name.clone(),
        })
        .collect()
}

fn demographic(value: Option<String>) -> String {
    value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

fn render_text(detail: &MedicalCaseDetail) -> String {
    let case = &detail.case;
    let mut out = String::new();

    let _ = writeln!(out, "醫療病例記錄 / Medical Case Record");
    let _ = writeln!(out, "{}\n", RULE_HEAVY);
    let _ = writeln!(out, "標題 / Title: {}", case.title);
    let _ = writeln!(out, "生成日期 / Created: {}", case.created_at.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out, "專科 / Specialty: {}\n", demographic(detail.specialty.clone()));

    let _ = writeln!(out, "患者資訊 / Patient Information");
    let _ = writeln!(out, "{}", RULE_LIGHT);
    let _ = writeln!(out, "年齡 / Age: {}", demographic(case.patient_age.map(|age| age.to_string())));
    let _ = writeln!(out, "性別 / Gender: {}\n", demographic(case.patient_gender.clone()));

    for (section, heading, body) in present_sections(detail) {
        let _ = writeln!(out, "{}", heading);
        let _ = writeln!(out, "{}", RULE_LIGHT);
        let _ = writeln!(out, "{}\n", body);

        let diagnoses = diagnosis_lines(detail);
        if section == CaseSection::Assessment && !diagnoses.is_empty() {
            let _ = writeln!(out, "{}:", DIAGNOSES_HEADING);
            for line in diagnoses {
                let _ = writeln!(out, "- {}", line);
            }
            out.push('\n');
        }
    }

    let _ = writeln!(out, "{}", RULE_HEAVY);
    let _ = writeln!(out, "{}", DISCLAIMER);
    out
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn html_paragraph(value: &str) -> String {
    escape_html(value).replace('\n', "<br>")
}

const HTML_STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 800px; margin: 0 auto; padding: 20px; }
h1 { color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 10px; }
h2 { color: #2980b9; margin-top: 25px; border-bottom: 1px solid #ddd; padding-bottom: 5px; }
.patient-info { background-color: #f8f9fa; padding: 15px; border-radius: 5px; margin-bottom: 20px; }
.section { margin-bottom: 20px; }
.footer { margin-top: 40px; border-top: 1px solid #ddd; padding-top: 10px; font-size: 0.8em; color: #777; }
@media print { body { max-width: 100%; padding: 0; } .no-print { display: none; } }";

fn render_html(detail: &MedicalCaseDetail) -> String {
    let case = &detail.case;
    let created = case.created_at.format("%Y-%m-%d %H:%M").to_string();
    let mut out = String::new();

    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"zh\">\n<head>\n<meta charset=\"UTF-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
<title>醫療病例報告 / Medical Case Report</title>\n<style>\n{}\n</style>\n</head>\n<body>\n\
<h1>醫療病例報告 / Medical Case Report</h1>\n",
        HTML_STYLE
    );

    let _ = write!(
        out,
        "<div class=\"patient-info\">\n<h2>患者資訊 / Patient Information</h2>\n\
<p><strong>病例標題 / Title:</strong> {}</p>\n\
<p><strong>生成日期 / Created:</strong> {}</p>\n\
<p><strong>專科 / Specialty:</strong> {}</p>\n\
<p><strong>年齡 / Age:</strong> {}</p>\n\
<p><strong>性別 / Gender:</strong> {}</p>\n</div>\n",
        escape_html(&case.title),
        created,
        escape_html(&demographic(detail.specialty.clone())),
        escape_html(&demographic(case.patient_age.map(|age| age.to_string()))),
        escape_html(&demographic(case.patient_gender.clone())),
    );

    for (section, heading, body) in present_sections(detail) {
        let _ = write!(
            out,
            "<div class=\"section\">\n<h2>{}</h2>\n<p>{}</p>\n",
            heading,
            html_paragraph(body)
        );

        let diagnoses = diagnosis_lines(detail);
        if section == CaseSection::Assessment && !diagnoses.is_empty() {
            let _ = write!(out, "<div>\n<h3>{}:</h3>\n<ul>\n", DIAGNOSES_HEADING);
            for line in diagnoses {
                let _ = writeln!(out, "<li class=\"diagnosis-item\">{}</li>", escape_html(&line));
            }
            out.push_str("</ul>\n</div>\n");
        }
        out.push_str("</div>\n");
    }

    let _ = write!(
        out,
        "<div class=\"footer\">\n<p>{}</p>\n<p class=\"no-print\">生成日期 / Created: {}</p>\n</div>\n</body>\n</html>\n",
        DISCLAIMER, created
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::medical_case::{CaseSections, Diagnosis, MedicalCase};
    use chrono::{TimeZone, Utc};
    use regex::Regex;
    use std::collections::BTreeSet;

    fn detail(allergies: &str) -> MedicalCaseDetail {
        let mut sections = CaseSections::default();
        sections.chief_complaint = "Fever & cough <3 days>".to_string();
        sections.allergies = allergies.to_string();
        sections.assessment = "Likely pneumonia.\nRule out TB.".to_string();
        sections.plan = "Start antibiotics.".to_string();
        MedicalCaseDetail {
            case: MedicalCase {
                id: 7,
                title: "Febrile cough".to_string(),
                patient_age: Some(45),
                patient_gender: None,
                sections,
                specialty_id: Some(1),
                prompt_used: None,
                system_message: None,
                ai_model: Some("gpt-4o".to_string()),
                questionnaire_flow: None,
                created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
                updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
            },
            specialty: Some("Pulmonology".to_string()),
            diagnoses: vec![Diagnosis {
                id: 1,
                case_id: 7,
                name: "Community acquired pneumonia".to_string(),
                description: None,
                icd_code: Some("J18.9".to_string()),
            }],
        }
    }

    #[test]
    fn test_json_export_has_record_key_set() {
        let case = detail("Penicillin");
        let exported = export_case(&case, ExportFormat::Json).unwrap();
        assert_eq!(exported.media_type, "application/json");

        let parsed: serde_json::Value = serde_json::from_str(&exported.content).unwrap();
        let expected = serde_json::to_value(case.record()).unwrap();
        let keys = |value: &serde_json::Value| -> BTreeSet<String> {
            value.as_object().unwrap().keys().cloned().collect()
        };
        assert_eq!(keys(&parsed), keys(&expected));
        assert!(keys(&parsed).contains("allergies"));
        assert_eq!(parsed["diagnoses"][0], "Community acquired pneumonia");
    }

    #[test]
    fn test_empty_allergies_section_is_omitted() {
        let case = detail("");
        for format in [ExportFormat::Txt, ExportFormat::Html] {
            let exported = export_case(&case, format).unwrap();
            assert!(!exported.content.contains("過敏史"), "{:?}", format);
            assert!(!exported.content.contains("Allergies"), "{:?}", format);
            assert!(exported.content.contains("治療計劃 / Treatment Plan"));
        }

        let with_allergies = export_case(&detail("Penicillin"), ExportFormat::Txt).unwrap();
        assert!(with_allergies.content.contains("過敏史 / Allergies\n"));
    }

    #[test]
    fn test_text_sections_follow_report_order_with_diagnoses() {
        let text = export_case(&detail("Penicillin"), ExportFormat::Txt).unwrap().content;
        let chief = text.find("主訴").unwrap();
        let allergies = text.find("過敏史").unwrap();
        let assessment = text.find("評估").unwrap();
        let diagnoses = text.find("- Community acquired pneumonia (ICD: J18.9)").unwrap();
        let plan = text.find("治療計劃").unwrap();
        let disclaimer = text.find("注意").unwrap();
        assert!(chief < allergies && allergies < assessment);
        assert!(assessment < diagnoses && diagnoses < plan && plan < disclaimer);
        assert!(text.contains("性別 / Gender: 未指定 / Not specified"));
    }

    #[test]
    fn test_html_escapes_and_breaks_lines() {
        let html = export_case(&detail(""), ExportFormat::Html).unwrap().content;
        assert!(html.contains("Fever &amp; cough &lt;3 days&gt;"));
        assert!(html.contains("Likely pneumonia.<br>Rule out TB."));
        assert!(!html.contains("<3 days>"));
    }

    #[test]
    fn test_filename_uses_export_time() {
        let exported_at = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let exported = render_at(&detail(""), ExportFormat::Html, exported_at).unwrap();
        assert_eq!(exported.filename, "medical_case_7_20250102_030405.html");

        let now = export_case(&detail(""), ExportFormat::Txt).unwrap();
        let pattern = Regex::new(r"^medical_case_7_\d{8}_\d{6}\.txt$").unwrap();
        assert!(pattern.is_match(&now.filename));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("TXT".parse::<ExportFormat>().unwrap(), ExportFormat::Txt);
        assert_eq!("text".parse::<ExportFormat>().unwrap(), ExportFormat::Txt);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!("pdf".parse::<ExportFormat>(), Err(AppError::ValidationError(_))));
    }
}
