use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Free-text clinical fields of a case, in report order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CaseSection {
    ChiefComplaint,
    HistoryPresentIllness,
    PastMedicalHistory,
    Medications,
    Allergies,
    FamilyHistory,
    SocialHistory,
    PhysicalExamination,
    VitalSigns,
    LaboratoryResults,
    ImagingResults,
    Assessment,
    Plan,
}

impl CaseSection {
    pub const ALL: [CaseSection; 13] = [
        CaseSection::ChiefComplaint,
        CaseSection::HistoryPresentIllness,
        CaseSection::PastMedicalHistory,
        CaseSection::Medications,
        CaseSection::Allergies,
        CaseSection::FamilyHistory,
        CaseSection::SocialHistory,
        CaseSection::PhysicalExamination,
        CaseSection::VitalSigns,
        CaseSection::LaboratoryResults,
        CaseSection::ImagingResults,
        CaseSection::Assessment,
        CaseSection::Plan,
    ];

    /// Sections requested from the model when the caller does not choose.
    pub const DEFAULT_GENERATED: [CaseSection; 12] = [
        CaseSection::ChiefComplaint,
        CaseSection::HistoryPresentIllness,
        CaseSection::PastMedicalHistory,
        CaseSection::Medications,
        CaseSection::Allergies,
        CaseSection::FamilyHistory,
        CaseSection::SocialHistory,
        CaseSection::PhysicalExamination,
        CaseSection::VitalSigns,
        CaseSection::LaboratoryResults,
        CaseSection::Assessment,
        CaseSection::Plan,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            CaseSection::ChiefComplaint => "chief_complaint",
            CaseSection::HistoryPresentIllness => "history_present_illness",
            CaseSection::PastMedicalHistory => "past_medical_history",
            CaseSection::Medications => "medications",
            CaseSection::Allergies => "allergies",
            CaseSection::FamilyHistory => "family_history",
            CaseSection::SocialHistory => "social_history",
            CaseSection::PhysicalExamination => "physical_examination",
            CaseSection::VitalSigns => "vital_signs",
            CaseSection::LaboratoryResults => "laboratory_results",
            CaseSection::ImagingResults => "imaging_results",
            CaseSection::Assessment => "assessment",
            CaseSection::Plan => "plan",
        }
    }

    /// Heading as requested in generation prompts, e.g. "Vital Signs".
    pub fn heading(&self) -> String {
        self.key()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct CaseSections {
    pub chief_complaint: String,
    pub history_present_illness: String,
    pub past_medical_history: String,
    pub medications: String,
    pub allergies: String,
    pub family_history: String,
    pub social_history: String,
    pub physical_examination: String,
    pub vital_signs: String,
    pub laboratory_results: String,
    pub imaging_results: String,
    pub assessment: String,
    pub plan: String,
}

impl CaseSections {
    pub fn get(&self, section: CaseSection) -> &str {
        match section {
            CaseSection::ChiefComplaint => &self.chief_complaint,
            CaseSection::HistoryPresentIllness => &self.history_present_illness,
            CaseSection::PastMedicalHistory => &self.past_medical_history,
            CaseSection::Medications => &self.medications,
            CaseSection::Allergies => &self.allergies,
            CaseSection::FamilyHistory => &self.family_history,
            CaseSection::SocialHistory => &self.social_history,
            CaseSection::PhysicalExamination => &self.physical_examination,
            CaseSection::VitalSigns => &self.vital_signs,
            CaseSection::LaboratoryResults => &self.laboratory_results,
            CaseSection::ImagingResults => &self.imaging_results,
            CaseSection::Assessment => &self.assessment,
            CaseSection::Plan => &self.plan,
        }
    }

    pub fn set(&mut self, section: CaseSection, value: String) {
        let slot = match section {
            CaseSection::ChiefComplaint => &mut self.chief_complaint,
            CaseSection::HistoryPresentIllness => &mut self.history_present_illness,
            CaseSection::PastMedicalHistory => &mut self.past_medical_history,
            CaseSection::Medications => &mut self.medications,
            CaseSection::Allergies => &mut self.allergies,
            CaseSection::FamilyHistory => &mut self.family_history,
            CaseSection::SocialHistory => &mut self.social_history,
            CaseSection::PhysicalExamination => &mut self.physical_examination,
            CaseSection::VitalSigns => &mut self.vital_signs,
            CaseSection::LaboratoryResults => &mut self.laboratory_results,
            CaseSection::ImagingResults => &mut self.imaging_results,
            CaseSection::Assessment => &mut self.assessment,
            CaseSection::Plan => &mut self.plan,
        };
        *slot = value;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MedicalSpecialty {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct NewSpecialty {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MedicalCase {
    pub id: i64,
    pub title: String,
    pub patient_age: Option<i64>,
    pub patient_gender: Option<String>,
    #[serde(flatten)]
    pub sections: CaseSections,
    pub specialty_id: Option<i64>,
    pub prompt_used: Option<String>,
    pub system_message: Option<String>,
    pub ai_model: Option<String>,
    pub questionnaire_flow: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row values for inserting a case; ids and timestamps come from the store.
#[derive(Debug, Clone, Default)]
pub struct NewMedicalCase {
    pub title: String,
    pub patient_age: Option<i64>,
    pub patient_gender: Option<String>,
    pub sections: CaseSections,
    pub specialty_name: Option<String>,
    pub prompt_used: Option<String>,
    pub system_message: Option<String>,
    pub ai_model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Diagnosis {
    pub id: i64,
    pub case_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icd_code: Option<String>,
}

/// Listing row for a case, without clinical text.
#[derive(Debug, Serialize, Clone)]
pub struct CaseSummary {
    pub id: i64,
    pub title: String,
    pub patient_age: Option<i64>,
    pub patient_gender: Option<String>,
    pub specialty: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A case together with the rows it owns or references.
#[derive(Debug, Clone)]
pub struct MedicalCaseDetail {
    pub case: MedicalCase,
    pub specialty: Option<String>,
    pub diagnoses: Vec<Diagnosis>,
}

/// Flat dictionary view of a case, used for JSON export and API responses.
#[derive(Debug, Serialize, Clone)]
pub struct CaseRecord<'a> {
    pub id: i64,
    pub title: &'a str,
    pub patient_age: Option<i64>,
    pub patient_gender: Option<&'a str>,
    #[serde(flatten)]
    pub sections: &'a CaseSections,
    pub specialty: Option<&'a str>,
    pub diagnoses: Vec<&'a str>,
    pub created_at: String,
    pub updated_at: String,
}

impl MedicalCaseDetail {
    pub fn record(&self) -> CaseRecord<'_> {
        CaseRecord {
            id: self.case.id,
            title: &self.case.title,
            patient_age: self.case.patient_age,
            patient_gender: self.case.patient_gender.as_deref(),
            sections: &self.case.sections,
            specialty: self.specialty.as_deref(),
            diagnoses: self.diagnoses.iter().map(|d| d.name.as_str()).collect(),
            created_at: self.case.created_at.to_rfc3339(),
            updated_at: self.case.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaseTemplate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub system_message: Option<String>,
    pub prompt_template: String,
    pub specialty_id: Option<i64>,
    pub specialty: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct NewCaseTemplate {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub system_message: Option<String>,
    #[validate(length(min = 1))]
    pub prompt_template: String,
    #[serde(default)]
    pub specialty_id: Option<i64>,
}
