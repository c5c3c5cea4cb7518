//! Case search predicate

use serde::{Deserialize, Serialize};

/// A user assigned to a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReference {
    pub id: String,
    pub name: String,
}

/// Structured filters and pagination of a case search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CasesSearchPredicate {
    pub case_number: Option<String>,
    pub case_ids: Option<Vec<String>>,
    pub chapters: Option<Vec<String>>,
    pub division_codes: Option<Vec<String>>,
    pub exclude_member_consolidations: Option<bool>,
    pub excluded_case_ids: Option<Vec<String>>,
    pub exclude_closed_cases: Option<bool>,
    pub include_only_unassigned: Option<bool>,
    pub assignments: Option<Vec<UserReference>>,
    /// Free text for fuzzy name search
    pub name: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl CasesSearchPredicate {
    /// The pagination window, if both parts are present and `limit > 0`
    pub fn page(&self) -> Option<(u64, u64)> {
        match (self.offset, self.limit) {
            (Some(offset), Some(limit)) if limit > 0 => Some((offset, limit)),
            _ => None,
        }
    }

    /// Trimmed free-text name, if any
    pub fn search_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// `Some(list)` only for a non-empty list
pub(crate) fn non_empty(list: &Option<Vec<String>>) -> Option<&[String]> {
    list.as_deref().filter(|items| !items.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserializes_camel_case() {
        let predicate: CasesSearchPredicate = serde_json::from_value(json!({
            "divisionCodes": ["081"],
            "excludeClosedCases": true,
            "name": "  John Smith ",
            "limit": 25,
            "offset": 0
        }))
        .unwrap();

        assert_eq!(predicate.division_codes, Some(vec!["081".to_string()]));
        assert_eq!(predicate.exclude_closed_cases, Some(true));
        assert_eq!(predicate.search_name(), Some("John Smith"));
        assert_eq!(predicate.page(), Some((0, 25)));
    }

    #[test]
    fn test_page_requires_limit_and_offset() {
        let mut predicate = CasesSearchPredicate {
            limit: Some(25),
            ..Default::default()
        };
        assert_eq!(predicate.page(), None);

        predicate.offset = Some(0);
        predicate.limit = Some(0);
        assert_eq!(predicate.page(), None);
    }

    #[test]
    fn test_blank_name_is_ignored() {
        let predicate = CasesSearchPredicate {
            name: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(predicate.search_name(), None);
    }
}
