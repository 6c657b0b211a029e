use medrag_core::{Condition, TriageConfig};

const DIABETES: &[&str] = &[
    "glucose",
    "blood sugar",
    "insulin",
    "diabetic",
    "hypoglycemia",
    "hyperglycemia",
    "ketoacidosis",
    "dka",
    "metformin",
    "hba1c",
    "glucometer",
    "shaky",
    "sweating",
    "gestational diabetes",
    "type 1",
    "type 2",
    "mg/dl",
    "fasting glucose",
];

const CARDIAC: &[&str] = &[
    "chest pain",
    "heart",
    "cardiac",
    "angina",
    "myocardial",
    "infarction",
    "crushing pain",
    "left arm",
    "nitroglycerin",
    "aspirin",
    "cpr",
    "defibrillation",
    "heart attack",
    "heart failure",
    "edema",
    "shortness of breath",
    "ankles swelling",
];

const RENAL: &[&str] = &[
    "kidney",
    "renal",
    "creatinine",
    "urine",
    "potassium",
    "dialysis",
    "aki",
    "ckd",
    "acute kidney injury",
    "chronic kidney disease",
    "nephrotoxic",
    "barely urinated",
    "ibuprofen",
    "nsaids",
    "flank pain",
    "mmol/l",
];

const URGENCY: &[&str] = &[
    "unconscious",
    "crushing",
    "severe",
    "emergency",
    "call 112",
    "ambulance",
    "cannot breathe",
    "chest pain",
    "left arm",
    "barely urinated",
];

/// The immutable vocabularies triage matches against.
///
/// Every keyword is stored trimmed, lowercased, and deduplicated, so callers
/// only need to lowercase the query.
///
/// # Examples
///
/// ```
/// use medrag_core::Condition;
/// use medrag_triage::KeywordTables;
///
/// let tables = KeywordTables::default();
/// assert!(tables.condition(Condition::Diabetes).iter().any(|k| k == "mg/dl"));
/// assert!(tables.urgency().iter().any(|k| k == "ambulance"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTables {
    diabetes: Vec<String>,
    cardiac: Vec<String>,
    renal: Vec<String>,
    urgency: Vec<String>,
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            diabetes: normalize(DIABETES.iter().copied()),
            cardiac: normalize(CARDIAC.iter().copied()),
            renal: normalize(RENAL.iter().copied()),
            urgency: normalize(URGENCY.iter().copied()),
        }
    }
}

impl KeywordTables {
    /// Built-in tables with any lists from `config` swapped in.
    pub fn with_overrides(config: &TriageConfig) -> Self {
        let mut tables = Self::default();
        if let Some(list) = &config.diabetes {
            tables.diabetes = normalize(list.iter().map(String::as_str));
        }
        if let Some(list) = &config.cardiac {
            tables.cardiac = normalize(list.iter().map(String::as_str));
        }
        if let Some(list) = &config.renal {
            tables.renal = normalize(list.iter().map(String::as_str));
        }
        if let Some(list) = &config.urgency {
            tables.urgency = normalize(list.iter().map(String::as_str));
        }
        tables
    }

    /// Vocabulary for one condition.
    pub fn condition(&self, condition: Condition) -> &[String] {
        match condition {
            Condition::Diabetes => &self.diabetes,
            Condition::Cardiac => &self.cardiac,
            Condition::Renal => &self.renal,
        }
    }

    /// Danger-signal vocabulary.
    pub fn urgency(&self) -> &[String] {
        &self.urgency
    }
}

fn normalize<'a>(keywords: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !out.contains(&keyword) {
            out.push(keyword);
        }
    }
    out
}
