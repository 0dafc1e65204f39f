// src/rule/mod.rs

//! Assertion rules
//!
//! A rule is a one-line assertion about the outcome of a test run:
//!
//! ```text
//! [!]KIND_CASE=KEY[|VALUE]
//! ```
//!
//! - `PACMAN_RETCODE=0`, `PACMAN_OUTPUT=warning`
//! - `PKG_EXIST=dummy`, `PKG_VERSION=dummy|1.0-1`, `PKG_REASON=dep1|1`, ...
//! - `FILE_EXIST=etc/dummy.conf`, `FILE_PACSAVE=etc/dummy.conf`, ...
//! - `LINK_EXIST=usr/lib/libdummy.so`
//!
//! A leading `!` inverts the outcome. Rules whose kind or case is unknown
//! parse fine and evaluate to `Skipped`; text that does not fit the grammar
//! at all is a `ParseRuleError`.

mod check;
mod set;

pub use check::CheckContext;
pub use set::{RuleResult, RuleSet, Tally};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Result of evaluating a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Success,
    Failure,
    Skipped,
}

impl Outcome {
    pub fn from_bool(ok: bool) -> Self {
        if ok { Outcome::Success } else { Outcome::Failure }
    }

    /// Swap success and failure; skipped stays skipped
    pub fn negate(self) -> Self {
        match self {
            Outcome::Success => Outcome::Failure,
            Outcome::Failure => Outcome::Success,
            Outcome::Skipped => Outcome::Skipped,
        }
    }

    /// Short label used in test reports
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "PASS",
            Outcome::Failure => "FAIL",
            Outcome::Skipped => "SKIP",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "SUCCESS"),
            Outcome::Failure => write!(f, "FAILURE"),
            Outcome::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Rule text that does not fit the grammar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseRuleError {
    #[error("missing '=' in rule {0:?}")]
    MissingArgument(String),

    #[error("missing '_' between kind and case in rule {0:?}")]
    MissingCase(String),

    #[error("empty key in rule {0:?}")]
    EmptyKey(String),

    #[error("rule {0:?} requires a value after '|'")]
    MissingValue(String),

    #[error("rule {rule:?}: {value:?} is not an integer")]
    NotAnInteger { rule: String, value: String },
}

/// Checks against the subject's process result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacmanCheck {
    /// Exit code equals
    Retcode(i32),
    /// Some log line contains
    Output(String),
}

/// Checks against a package of the `local` repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkgCheck {
    Exist,
    Modified,
    Version(String),
    Group(String),
    Depends(String),
    RequiredBy(String),
    Reason(i32),
    File(String),
    Backup(String),
}

/// Checks against a path under the test root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCheck {
    Exist,
    Modified,
    PacNew,
    PacOrig,
    PacSave,
}

/// Parsed body of a rule, without negation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Pacman(PacmanCheck),
    Pkg { name: String, check: PkgCheck },
    File { path: String, check: FileCheck },
    Link { path: String },
    /// Kind or case this harness does not know about
    Unrecognized { kind: String, case: String },
}

/// A parsed assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    text: String,
    negated: bool,
    predicate: Predicate,
}

impl Rule {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Evaluate the rule, applying negation
    pub fn evaluate(&self, ctx: &CheckContext<'_>) -> Outcome {
        let outcome = ctx.evaluate(&self.predicate);
        if self.negated { outcome.negate() } else { outcome }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule = {}", self.text)
    }
}

impl FromStr for Rule {
    type Err = ParseRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (test, args) = s
            .split_once('=')
            .ok_or_else(|| ParseRuleError::MissingArgument(s.to_string()))?;
        let (negated, test) = match test.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, test),
        };
        let (kind, case) = test
            .split_once('_')
            .ok_or_else(|| ParseRuleError::MissingCase(s.to_string()))?;
        let (key, value) = match args.split_once('|') {
            Some((key, value)) => (key, Some(value)),
            None => (args, None),
        };
        if key.is_empty() {
            return Err(ParseRuleError::EmptyKey(s.to_string()));
        }

        let predicate = parse_predicate(s, kind, case, key, value)?;
        Ok(Self {
            text: s.to_string(),
            negated,
            predicate,
        })
    }
}

fn parse_predicate(
    rule: &str,
    kind: &str,
    case: &str,
    key: &str,
    value: Option<&str>,
) -> Result<Predicate, ParseRuleError> {
    let integer = |text: &str| {
        text.trim().parse::<i32>().map_err(|_| ParseRuleError::NotAnInteger {
            rule: rule.to_string(),
            value: text.to_string(),
        })
    };
    let required = || {
        value
            .map(str::to_string)
            .ok_or_else(|| ParseRuleError::MissingValue(rule.to_string()))
    };
    let unrecognized = || Predicate::Unrecognized {
        kind: kind.to_string(),
        case: case.to_string(),
    };

    let predicate = match kind {
        "PACMAN" => match case {
            "RETCODE" => Predicate::Pacman(PacmanCheck::Retcode(integer(key)?)),
            "OUTPUT" => Predicate::Pacman(PacmanCheck::Output(key.to_string())),
            _ => unrecognized(),
        },
        "PKG" => {
            let check = match case {
                "EXIST" => PkgCheck::Exist,
                "MODIFIED" => PkgCheck::Modified,
                "VERSION" => PkgCheck::Version(required()?),
                "GROUPS" => PkgCheck::Group(required()?),
                "DEPENDS" => PkgCheck::Depends(required()?),
                "REQUIREDBY" => PkgCheck::RequiredBy(required()?),
                "REASON" => PkgCheck::Reason(integer(&required()?)?),
                "FILES" => PkgCheck::File(required()?),
                "BACKUP" => PkgCheck::Backup(required()?),
                _ => return Ok(unrecognized()),
            };
            Predicate::Pkg {
                name: key.to_string(),
                check,
            }
        }
        "FILE" => {
            let check = match case {
                "EXIST" => FileCheck::Exist,
                "MODIFIED" => FileCheck::Modified,
                "PACNEW" => FileCheck::PacNew,
                "PACORIG" => FileCheck::PacOrig,
                "PACSAVE" => FileCheck::PacSave,
                _ => return Ok(unrecognized()),
            };
            Predicate::File {
                path: key.to_string(),
                check,
            }
        }
        "LINK" => match case {
            "EXIST" => Predicate::Link {
                path: key.to_string(),
            },
            _ => unrecognized(),
        },
        _ => unrecognized(),
    };
    Ok(predicate)
}
