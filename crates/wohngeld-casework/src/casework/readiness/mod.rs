mod rules;
mod warnings;

pub use rules::{ClientField, FieldRule, Requirement, RuleSet};

use serde::{Deserialize, Serialize};

use super::domain::{Client, DeadlineKind};

/// Completeness verdict for one client and one document type. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessVerdict {
    #[serde(rename = "vollstaendig")]
    pub ready: bool,
    #[serde(rename = "prozentVollstaendig")]
    pub percent_complete: u8,
    #[serde(rename = "fehlendeFelder")]
    pub missing_fields: Vec<String>,
    #[serde(rename = "warnungen")]
    pub warnings: Vec<String>,
}

/// Stateless evaluator that applies a rule set to a client snapshot.
#[derive(Debug, Clone, Default)]
pub struct ReadinessEvaluator {
    rules: RuleSet,
}

impl ReadinessEvaluator {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn evaluate(&self, client: &Client, kind: DeadlineKind) -> ReadinessVerdict {
        let mut total = 0usize;
        let mut filled = 0usize;
        let mut missing_fields = Vec::new();
        let mut recommended_missing = Vec::new();

        for rule in self.rules.rules_for(kind) {
            let present = rule.field.is_filled(client);
            if rule.is_required_for(client) {
                total += 1;
                if present {
                    filled += 1;
                } else {
                    missing_fields.push(rule.field.label().to_string());
                }
            } else if rule.is_recommended() && !present {
                recommended_missing.push(rule.field.label());
            }
        }

        let mut warnings = warnings::consistency_warnings(client);
        warnings.extend(
            recommended_missing
                .into_iter()
                .map(|label| format!("Empfohlene Angabe fehlt: {label}")),
        );

        ReadinessVerdict {
            ready: missing_fields.is_empty(),
            percent_complete: percent(filled, total),
            missing_fields,
            warnings,
        }
    }
}

/// Rounded half up; an empty requirement list counts as complete.
fn percent(filled: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let rounded = (filled * 200 + total) / (2 * total);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(18, 20), 90);
    }
}
