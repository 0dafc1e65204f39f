// src/rule/set.rs

//! Ordered rule collections and their tallies

use super::{CheckContext, Outcome, Rule};
use crate::error::Result;
use serde::Serialize;
use std::fmt;
use tracing::info;

/// A rule and, once checked, its outcome
#[derive(Debug, Clone)]
pub struct RuleResult {
    pub rule: Rule,
    pub outcome: Option<Outcome>,
}

impl fmt::Display for RuleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.outcome.map(|o| o.label()).unwrap_or("----");
        write!(f, "[{}] {}", label, self.rule.text())
    }
}

/// Outcome counts of a rule set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::Failure => self.failure += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.success + self.failure + self.skipped
    }

    /// A test passes when none of its rules failed
    pub fn passed(&self) -> bool {
        self.failure == 0
    }
}

impl std::ops::AddAssign for Tally {
    fn add_assign(&mut self, other: Self) {
        self.success += other.success;
        self.failure += other.failure;
        self.skipped += other.skipped;
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OK = {:2} KO = {:2} SKIP = {:2}",
            self.success, self.failure, self.skipped
        )
    }
}

/// The rules of one test case, in the order they were added
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<RuleResult>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(RuleResult {
            rule,
            outcome: None,
        });
    }

    /// Parse and append a rule
    pub fn add(&mut self, rule: &str) -> Result<()> {
        self.push(rule.parse()?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleResult> {
        self.rules.iter()
    }

    /// Whether any rule inspects modification state
    ///
    /// Timestamps have a coarse granularity on some filesystems, so callers
    /// wait before running the subject when this is true.
    pub fn checks_modification(&self) -> bool {
        self.rules.iter().any(|r| r.rule.text().contains("MODIFIED"))
    }

    /// Evaluate every rule, storing each outcome
    pub fn check(&mut self, ctx: &CheckContext<'_>) -> Tally {
        for entry in &mut self.rules {
            let outcome = entry.rule.evaluate(ctx);
            entry.outcome = Some(outcome);
            info!("[{}] {}", outcome.label(), entry.rule.text());
        }
        self.tally()
    }

    /// Counts of the outcomes recorded so far
    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for outcome in self.rules.iter().filter_map(|r| r.outcome) {
            tally.record(outcome);
        }
        tally
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        for rule in iter {
            set.push(rule);
        }
        set
    }
}
