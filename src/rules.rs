//! Alert rule engine
//!
//! An ordered list of (predicate, action set) rules mapping alert
//! attributes to remediation actions. Rules are independent and
//! additive: every matching rule contributes its actions and the
//! results are unioned, with no priority or suppression between rules.
//! Executing the decided actions is the collaborator's job.

use crate::models::{Alert, AlertSeverity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Remediation action decided for an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    NotifyTeam,
    MarkNeedsReview,
    QueueReplay,
    CreateTicket,
    Escalate,
}

/// One rule: a named predicate with the actions it contributes
pub struct Rule {
    pub name: &'static str,
    predicate: Box<dyn Fn(&Alert) -> bool + Send + Sync>,
    actions: Vec<Action>,
}

impl Rule {
    pub fn new(
        name: &'static str,
        predicate: impl Fn(&Alert) -> bool + Send + Sync + 'static,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            name,
            predicate: Box::new(predicate),
            actions,
        }
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        (self.predicate)(alert)
    }
}

/// Evaluates alerts against an ordered rule list
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The union of actions from every matching rule. Empty when no
    /// rule matches.
    pub fn actions_for(&self, alert: &Alert) -> BTreeSet<Action> {
        let mut actions = BTreeSet::new();
        for rule in self.rules.iter().filter(|r| r.matches(alert)) {
            actions.extend(rule.actions.iter().copied());
        }
        actions
    }

    /// Names of the rules an alert matched, for audit trails
    pub fn matching_rule_names(&self, alert: &Alert) -> Vec<&'static str> {
        self.rules
            .iter()
            .filter(|r| r.matches(alert))
            .map(|r| r.name)
            .collect()
    }
}

impl Default for RuleEngine {
    /// The stock rule set
    fn default() -> Self {
        Self::new(vec![
            Rule::new(
                "system-critical",
                |a| a.severity == AlertSeverity::Critical,
                vec![Action::NotifyTeam, Action::Escalate],
            ),
            Rule::new(
                "webhook-failure",
                |a| a.alert_type == "webhook_failure",
                vec![Action::QueueReplay, Action::MarkNeedsReview],
            ),
            Rule::new(
                "predictive-capacity",
                |a| a.alert_type == "predictive_capacity",
                vec![Action::NotifyTeam, Action::CreateTicket],
            ),
            Rule::new(
                "slo-violation",
                |a| a.alert_type == "slo_violation",
                vec![Action::NotifyTeam, Action::MarkNeedsReview],
            ),
            Rule::new(
                "error-severity",
                |a| a.severity == AlertSeverity::Error,
                vec![Action::MarkNeedsReview],
            ),
        ])
    }
}
