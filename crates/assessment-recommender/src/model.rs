use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sentinel written to the index and to API responses when a duration is unknown.
pub const UNKNOWN_DURATION: i64 = -1;

/// One of the fixed assessment categories ("test types") of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestType {
    AbilityAptitude,
    BiodataSituationalJudgement,
    Competencies,
    Development360,
    AssessmentExercises,
    KnowledgeSkills,
    PersonalityBehavior,
    Simulations,
}

/// Code/name table in catalog order.
const TEST_TYPES: [(TestType, char, &str); 8] = [
    (TestType::AbilityAptitude, 'A', "Ability & Aptitude"),
    (TestType::BiodataSituationalJudgement, 'B', "Biodata & Situational Judgement"),
    (TestType::Competencies, 'C', "Competencies"),
    (TestType::Development360, 'D', "Development & 360"),
    (TestType::AssessmentExercises, 'E', "Assessment Exercises"),
    (TestType::KnowledgeSkills, 'K', "Knowledge & Skills"),
    (TestType::PersonalityBehavior, 'P', "Personality & Behavior"),
    (TestType::Simulations, 'S', "Simulations"),
];

impl TestType {
    pub fn all() -> impl Iterator<Item = TestType> {
        TEST_TYPES.iter().map(|(t, _, _)| *t)
    }

    /// Single-letter code, e.g. `'K'`.
    pub fn code(self) -> char {
        TEST_TYPES
            .iter()
            .find(|(t, _, _)| *t == self)
            .map(|(_, c, _)| *c)
            .unwrap_or('?')
    }

    /// Display name as it appears in the catalog, e.g. "Knowledge & Skills".
    pub fn name(self) -> &'static str {
        TEST_TYPES
            .iter()
            .find(|(t, _, _)| *t == self)
            .map(|(_, _, n)| *n)
            .unwrap_or("")
    }

    /// Parse a code such as `"k"` or `" P "`. Case and surrounding whitespace are ignored.
    pub fn from_code(code: &str) -> Option<TestType> {
        let mut chars = code.trim().chars();
        let c = chars.next()?.to_ascii_uppercase();
        if chars.next().is_some() {
            return None;
        }
        TEST_TYPES
            .iter()
            .find(|(_, code, _)| *code == c)
            .map(|(t, _, _)| *t)
    }

    /// Parse a comma-separated list of codes, e.g. `"K,P,A"`. Unknown codes are skipped.
    pub fn parse_code_list(raw: &str) -> Vec<TestType> {
        let mut out = Vec::new();
        for t in raw.split(',').filter_map(TestType::from_code) {
            if !out.contains(&t) {
                out.push(t);
            }
        }
        out
    }
}

impl std::fmt::Display for TestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A catalog assessment as retrieved from the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    /// Product page URL, the identity of an item across the pipeline.
    pub url: String,
    pub name: String,
    pub description: String,
    /// Duration in minutes, when the catalog lists one.
    pub duration: Option<u32>,
    pub adaptive_support: bool,
    pub remote_support: bool,
    /// Category names in catalog order.
    pub test_type: Vec<String>,
}

impl CatalogItem {
    pub fn has_test_type(&self, name: &str) -> bool {
        self.test_type.iter().any(|t| t == name)
    }
}

/// One recommended assessment in the shape consumers receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssessmentRecord {
    pub url: String,
    pub name: String,
    /// "Yes" or "No".
    pub adaptive_support: String,
    pub description: String,
    /// Minutes, or -1 when unknown.
    pub duration: i64,
    /// "Yes" or "No".
    pub remote_support: String,
    /// Full category names, e.g. "Knowledge & Skills".
    pub test_type: Vec<String>,
}

impl From<CatalogItem> for AssessmentRecord {
    fn from(item: CatalogItem) -> Self {
        Self {
            url: item.url,
            name: item.name,
            adaptive_support: yes_no(item.adaptive_support).to_string(),
            description: item.description,
            duration: item.duration.map(i64::from).unwrap_or(UNKNOWN_DURATION),
            remote_support: yes_no(item.remote_support).to_string(),
            test_type: item.test_type,
        }
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Parse a catalog "Yes"/"No" flag. Anything other than a case-insensitive "yes" is `false`.
pub fn parse_yes_no(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("yes")
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RecommendParams {
    /// Free-text job description or requirement.
    pub query: String,
    /// Maximum number of assessments to return (default: 10, max: 50).
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecommendResponse {
    pub recommended_assessments: Vec<AssessmentRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_and_name_lookup_are_consistent() {
        for t in TestType::all() {
            assert_eq!(TestType::from_code(&t.code().to_string()), Some(t));
            assert!(!t.name().is_empty());
        }
        assert_eq!(TestType::KnowledgeSkills.name(), "Knowledge & Skills");
        assert_eq!(TestType::PersonalityBehavior.code(), 'P');
    }

    #[test]
    fn from_code_ignores_case_and_rejects_junk() {
        assert_eq!(TestType::from_code(" k "), Some(TestType::KnowledgeSkills));
        assert_eq!(TestType::from_code("KP"), None);
        assert_eq!(TestType::from_code("Z"), None);
        assert_eq!(TestType::from_code(""), None);
    }

    #[test]
    fn parse_code_list_dedups_in_order() {
        assert_eq!(
            TestType::parse_code_list("K, p ,x,K,A"),
            vec![
                TestType::KnowledgeSkills,
                TestType::PersonalityBehavior,
                TestType::AbilityAptitude
            ]
        );
    }

    #[test]
    fn record_uses_sentinel_and_yes_no_strings() {
        let item = CatalogItem {
            url: "https://example.com/java".to_string(),
            name: "Java 8".to_string(),
            description: "Core Java".to_string(),
            duration: None,
            adaptive_support: true,
            remote_support: false,
            test_type: vec!["Knowledge & Skills".to_string()],
        };
        let record = AssessmentRecord::from(item);
        assert_eq!(record.duration, UNKNOWN_DURATION);
        assert_eq!(record.adaptive_support, "Yes");
        assert_eq!(record.remote_support, "No");
    }
}
