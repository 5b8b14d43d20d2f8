// src/role_classifier.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "FOH")]
    FrontOfHouse,
    #[serde(rename = "BOH")]
    BackOfHouse,
    /// Tracked for visibility, never pooled.
    #[serde(rename = "EXEC")]
    Executive,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::FrontOfHouse => "FOH",
            Role::BackOfHouse => "BOH",
            Role::Executive => "EXEC",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides which pool an employee draws from. Matching rules are business
/// policy, so the allocation engine only ever sees this trait.
pub trait RoleClassifier {
    fn classify(&self, employee: &str, department: &str) -> Role;
}

static EXECUTIVE_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(owner|general\s+manager|gm|executive\s+chef|director|partner)\b")
        .expect("executive title pattern is valid")
});

static BACK_OF_HOUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(kitchen|\bboh\b|back\s+of\s+house|cook|chef|prep|dish|\bline\b|bak|pastry)")
        .expect("back-of-house pattern is valid")
});

/// Department-label classifier: executive titles and named executives win,
/// kitchen departments are BOH, everything else is FOH.
#[derive(Debug, Clone, Default)]
pub struct DepartmentRoleClassifier {
    executives: BTreeSet<String>,
}

impl DepartmentRoleClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executives<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            executives: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }
}

impl RoleClassifier for DepartmentRoleClassifier {
    fn classify(&self, employee: &str, department: &str) -> Role {
        if self.executives.contains(&employee.trim().to_lowercase())
            || EXECUTIVE_TITLE.is_match(department)
        {
            Role::Executive
        } else if BACK_OF_HOUSE.is_match(department) {
            Role::BackOfHouse
        } else {
            Role::FrontOfHouse
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kitchen_departments_are_boh() {
        let classifier = DepartmentRoleClassifier::new();
        for dept in ["Kitchen", "Line Cook", "Prep", "Dishwasher", "BOH", "Pastry", "Bakery"] {
            assert_eq!(classifier.classify("Ana Ruiz", dept), Role::BackOfHouse, "{}", dept);
        }
    }

    #[test]
    fn unknown_departments_default_to_foh() {
        let classifier = DepartmentRoleClassifier::new();
        for dept in ["Server", "Bartender", "Host", "", "Misc"] {
            assert_eq!(classifier.classify("Ana Ruiz", dept), Role::FrontOfHouse, "{}", dept);
        }
    }

    #[test]
    fn executive_title_takes_precedence_over_kitchen() {
        let classifier = DepartmentRoleClassifier::new();
        assert_eq!(classifier.classify("Ana Ruiz", "Executive Chef"), Role::Executive);
        assert_eq!(classifier.classify("Ana Ruiz", "General Manager"), Role::Executive);
        assert_eq!(classifier.classify("Ana Ruiz", "Owner"), Role::Executive);
    }

    #[test]
    fn named_executive_is_matched_case_insensitively() {
        let classifier = DepartmentRoleClassifier::with_executives(["Dana Park"]);
        assert_eq!(classifier.classify("dana park", "Kitchen"), Role::Executive);
        assert_eq!(classifier.classify("Dan Park", "Kitchen"), Role::BackOfHouse);
    }
}
