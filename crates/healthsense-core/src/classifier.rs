//! Keyword-based intent classification
//!
//! Maps a free-text message to an [`IntentCategory`] by walking an ordered
//! rule table. Each rule pairs a category with a keyword set; the first rule
//! with any keyword appearing as a substring of the lower-cased message wins.
//! Messages that match no rule are `General`.
//!
//! Overlaps are settled purely by rule order: "hospital emergency room"
//! routes to `Emergency` because the emergency rule comes first.

use tracing::debug;

use crate::types::IntentCategory;

pub const EMERGENCY_KEYWORDS: &[&str] = &[
    "emergency",
    "urgent",
    "911",
    "ambulance",
    "critical",
    "heart attack",
    "stroke",
    "accident",
    "trauma",
];

pub const DOCTOR_KEYWORDS: &[&str] = &[
    "doctor",
    "appointment",
    "book",
    "schedule",
    "available slot",
    "consultation",
    "visit",
    "check-up",
    "specialist",
];

pub const DIAGNOSTIC_KEYWORDS: &[&str] = &[
    "test",
    "lab",
    "blood",
    "screening",
    "diagnostic",
    "package",
    "checkup",
    "examination",
    "scan",
    "x-ray",
    "mri",
    "ct",
];

pub const HOSPITAL_KEYWORDS: &[&str] = &[
    "hospital",
    "compare",
    "facility",
    "medical center",
    "healthcare",
    "clinic",
];

/// One row of the rule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub category: IntentCategory,
    /// Stored lower-cased so matching stays case-insensitive
    keywords: Vec<String>,
}

impl ClassificationRule {
    pub fn new<I, S>(category: IntentCategory, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            category,
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// First keyword contained in an already lower-cased message
    fn first_match(&self, lower: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| lower.contains(k.as_str()))
            .map(String::as_str)
    }
}

/// Prioritized rule table
#[derive(Debug, Clone)]
pub struct QueryClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::with_rules(default_rules())
    }
}

impl QueryClassifier {
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Append a rule with the lowest priority
    pub fn push_rule(&mut self, rule: ClassificationRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify a message. Never fails; empty input is `General`.
    pub fn classify(&self, message: &str) -> IntentCategory {
        let lower = message.to_lowercase();

        for rule in &self.rules {
            if let Some(keyword) = rule.first_match(&lower) {
                debug!("Classified query as {} (keyword {:?})", rule.category, keyword);
                return rule.category;
            }
        }

        debug!("No keyword matched, classified query as general");
        IntentCategory::General
    }
}

/// The built-in table: emergency, doctor, diagnostic, hospital
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::new(IntentCategory::Emergency, EMERGENCY_KEYWORDS),
        ClassificationRule::new(IntentCategory::Doctor, DOCTOR_KEYWORDS),
        ClassificationRule::new(IntentCategory::Diagnostic, DIAGNOSTIC_KEYWORDS),
        ClassificationRule::new(IntentCategory::Hospital, HOSPITAL_KEYWORDS),
    ]
}

/// Classify with the built-in table
pub fn classify_query(message: &str) -> IntentCategory {
    QueryClassifier::default().classify(message)
}
