use std::{fmt, str::FromStr};

use crate::{Labels, ModelError};

/// A single label constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Exists(String),
    NotExists(String),
}

impl Requirement {
    pub fn matches(&self, labels: &Labels) -> bool {
        match self {
            Requirement::Equals { key, value } => labels.get(key) == Some(value),
            Requirement::NotEquals { key, value } => labels.get(key) != Some(value),
            Requirement::Exists(key) => labels.contains_key(key),
            Requirement::NotExists(key) => !labels.contains_key(key),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Equals { key, value } => write!(f, "{key}={value}"),
            Requirement::NotEquals { key, value } => write!(f, "{key}!={value}"),
            Requirement::Exists(key) => write!(f, "{key}"),
            Requirement::NotExists(key) => write!(f, "!{key}"),
        }
    }
}

/// Equality-based label selector (`app=web,tier!=db,canary,!legacy`).
///
/// An empty selector matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn with(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn equals(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(Requirement::Equals {
            key: key.into(),
            value: value.into(),
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for req in &self.requirements {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{req}")?;
        }
        Ok(())
    }
}

impl FromStr for LabelSelector {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let requirements = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(parse_requirement)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }
}

fn parse_requirement(part: &str) -> Result<Requirement, ModelError> {
    let invalid = || ModelError::InvalidSelector(part.to_string());

    if let Some(key) = part.strip_prefix('!') {
        return valid_key(key.trim())
            .map(|k| Requirement::NotExists(k.to_string()))
            .ok_or_else(invalid);
    }
    if let Some((key, value)) = part.split_once("!=") {
        let key = valid_key(key.trim()).ok_or_else(invalid)?;
        let value = valid_value(value.trim()).ok_or_else(invalid)?;
        return Ok(Requirement::NotEquals {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    let split = part.split_once("==").or_else(|| part.split_once('='));
    match split {
        Some((key, value)) => {
            let key = valid_key(key.trim()).ok_or_else(invalid)?;
            let value = valid_value(value.trim()).ok_or_else(invalid)?;
            Ok(Requirement::Equals {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
        None => valid_key(part)
            .map(|k| Requirement::Exists(k.to_string()))
            .ok_or_else(invalid),
    }
}

fn valid_key(key: &str) -> Option<&str> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    ok.then_some(key)
}

fn valid_value(value: &str) -> Option<&str> {
    let ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    ok.then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_selector_matches_everything() {
        let sel: LabelSelector = "".parse().unwrap();
        assert!(sel.is_empty());
        assert!(sel.matches(&labels(&[])));
        assert!(sel.matches(&labels(&[("app", "x")])));
    }

    #[test]
    fn equality_selector() {
        let sel: LabelSelector = "app=wr-manager".parse().unwrap();
        assert!(sel.matches(&labels(&[("app", "wr-manager")])));
        assert!(!sel.matches(&labels(&[("app", "jupyter")])));
        assert!(!sel.matches(&labels(&[])));
    }

    #[test]
    fn mixed_requirements() {
        let sel: LabelSelector = "app==web, tier!=db, canary, !legacy".parse().unwrap();
        assert_eq!(sel.requirements().len(), 4);

        assert!(sel.matches(&labels(&[("app", "web"), ("canary", "")])));
        assert!(!sel.matches(&labels(&[("app", "web"), ("canary", ""), ("tier", "db")])));
        assert!(!sel.matches(&labels(&[("app", "web"), ("canary", ""), ("legacy", "1")])));
        assert!(!sel.matches(&labels(&[("app", "web")])));
    }

    #[test]
    fn renders_back_to_query_form() {
        let sel: LabelSelector = "app==web,tier!=db,canary,!legacy".parse().unwrap();
        assert_eq!(sel.to_string(), "app=web,tier!=db,canary,!legacy");
    }

    #[test]
    fn rejects_malformed_parts() {
        assert!("=web".parse::<LabelSelector>().is_err());
        assert!("app=we b".parse::<LabelSelector>().is_err());
        assert!("!".parse::<LabelSelector>().is_err());
    }

    #[test]
    fn builder_matches_parsed() {
        let built = LabelSelector::everything().equals("app", "wr-manager");
        let parsed: LabelSelector = "app=wr-manager".parse().unwrap();
        assert_eq!(built, parsed);
    }
}
