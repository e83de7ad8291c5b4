//! Admission record model
//!
//! Every field the survey may omit is an `Option`; `None` is the single
//! "unknown" value and is stored as SQL `NULL`.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::fmt;

/// Reported admission decision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Decision {
    Accepted,
    Rejected,
    WaitListed,
    Interview,
    Other(String),
}

impl Decision {
    /// Classifies free text such as `Accepted`, `Wait listed`, `Rejected`
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let lower = text.to_ascii_lowercase();
        let decision = if lower.starts_with("accept") {
            Self::Accepted
        } else if lower.starts_with("reject") {
            Self::Rejected
        } else if lower.starts_with("wait") {
            Self::WaitListed
        } else if lower.starts_with("interview") {
            Self::Interview
        } else {
            Self::Other(text.to_string())
        };
        Some(decision)
    }

    /// Inverse of [`Decision::as_str`]
    pub fn from_db_string(s: &str) -> Self {
        match s {
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            "wait_listed" => Self::WaitListed,
            "interview" => Self::Interview,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::WaitListed => "wait_listed",
            Self::Interview => "interview",
            Self::Other(text) => text,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Degree level from the program column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DegreeLevel {
    Masters,
    PhD,
    Mfa,
    Mba,
    Jd,
    EdD,
    PsyD,
    Other(String),
}

impl DegreeLevel {
    /// Recognizes the degree names used by the survey
    ///
    /// Returns `None` for text that does not look like a degree.
    pub fn recognize(text: &str) -> Option<Self> {
        let degree = match text.trim().to_ascii_lowercase().as_str() {
            "masters" | "master's" | "ms" | "ma" | "msc" => Self::Masters,
            "phd" | "ph.d." | "ph.d" => Self::PhD,
            "mfa" => Self::Mfa,
            "mba" => Self::Mba,
            "jd" => Self::Jd,
            "edd" => Self::EdD,
            "psyd" => Self::PsyD,
            "other" => Self::Other("Other".to_string()),
            _ => return None,
        };
        Some(degree)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Masters => "Masters",
            Self::PhD => "PhD",
            Self::Mfa => "MFA",
            Self::Mba => "MBA",
            Self::Jd => "JD",
            Self::EdD => "EdD",
            Self::PsyD => "PsyD",
            Self::Other(text) => text,
        }
    }
}

impl fmt::Display for DegreeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applicant residency code reported with a posting
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApplicantStatus {
    /// `A`
    American,
    /// `I`
    International,
    /// `U`: international applicant holding a US degree
    InternationalWithUsDegree,
    /// `O`
    Other,
    Unrecognized(String),
}

impl ApplicantStatus {
    pub fn from_code(code: &str) -> Option<Self> {
        let status = match code.trim() {
            "" => return None,
            "A" => Self::American,
            "I" => Self::International,
            "U" => Self::InternationalWithUsDegree,
            "O" => Self::Other,
            other => Self::Unrecognized(other.to_string()),
        };
        Some(status)
    }

    pub fn as_code(&self) -> &str {
        match self {
            Self::American => "A",
            Self::International => "I",
            Self::InternationalWithUsDegree => "U",
            Self::Other => "O",
            Self::Unrecognized(code) => code,
        }
    }
}

/// One admission result posting
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionRecord {
    /// Stable identity used for deduplication across runs
    pub natural_key: String,
    pub post_id: Option<u64>,
    pub institution: Option<String>,
    pub program: Option<String>,
    pub degree: Option<DegreeLevel>,
    /// Admission season, e.g. `F21`
    pub season: Option<String>,
    pub decision: Option<Decision>,
    /// How the decision arrived, e.g. `E-mail`
    pub decision_medium: Option<String>,
    pub decision_date: Option<NaiveDate>,
    pub applicant_status: Option<ApplicantStatus>,
    pub posted_on: Option<NaiveDate>,
    pub comment: Option<String>,
    pub gpa: Option<f64>,
    pub gre_verbal: Option<f64>,
    pub gre_quant: Option<f64>,
    pub gre_writing: Option<f64>,
    pub gre_subject: Option<String>,
    /// Page the record was scraped from; not part of its identity
    pub source_url: String,
}

impl AdmissionRecord {
    /// Derives the natural key: the survey's post id when present,
    /// otherwise a hash of the fields that identify a posting.
    pub fn derive_natural_key(
        post_id: Option<u64>,
        institution: Option<&str>,
        program: Option<&str>,
        decision: Option<&Decision>,
        decision_date: Option<NaiveDate>,
        posted_on: Option<NaiveDate>,
        comment: Option<&str>,
    ) -> String {
        if let Some(id) = post_id {
            return format!("gradcafe:{}", id);
        }

        let mut hasher = Sha256::new();
        for part in [
            institution.map(str::to_string),
            program.map(str::to_string),
            decision.map(|d| d.as_str().to_string()),
            decision_date.map(|d| d.to_string()),
            posted_on.map(|d| d.to_string()),
            comment.map(str::to_string),
        ] {
            hash_field(&mut hasher, part.as_deref());
        }
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    /// SHA-256 over every stored field except `source_url`
    ///
    /// Two scrapes of an unchanged posting produce the same hash.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        let fields = [
            Some(self.natural_key.clone()),
            self.post_id.map(|v| v.to_string()),
            self.institution.clone(),
            self.program.clone(),
            self.degree.as_ref().map(|v| v.as_str().to_string()),
            self.season.clone(),
            self.decision.as_ref().map(|v| v.as_str().to_string()),
            self.decision_medium.clone(),
            self.decision_date.map(|v| v.to_string()),
            self.applicant_status.as_ref().map(|v| v.as_code().to_string()),
            self.posted_on.map(|v| v.to_string()),
            self.comment.clone(),
            self.gpa.map(|v| v.to_string()),
            self.gre_verbal.map(|v| v.to_string()),
            self.gre_quant.map(|v| v.to_string()),
            self.gre_writing.map(|v| v.to_string()),
            self.gre_subject.clone(),
        ];
        for field in &fields {
            hash_field(&mut hasher, field.as_deref());
        }
        hex::encode(hasher.finalize())
    }
}

/// Feeds one optional field; the tag byte keeps `None` distinct from `Some("")`
fn hash_field(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            hasher.update((v.len() as u64).to_le_bytes());
            hasher.update(v.as_bytes());
        }
        None => hasher.update([0u8]),
    }
}
