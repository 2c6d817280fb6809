//! Static restriction checker
//!
//! A lexical scan of submitted source for constructs the exercise forbids.
//! This is a heuristic gate, not a sandbox: aliasing can hide a construct
//! and prose inside string literals can trigger one. Line comments are
//! stripped before scanning.

use std::collections::BTreeMap;

use tracing::info;

/// A known restriction flag and the token that triggers it
struct Rule {
    flag: &'static str,
    trigger: &'static str,
    message: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        flag: "prohibir_import",
        trigger: "import ",
        message: "No está permitido usar import",
    },
    Rule {
        flag: "prohibir_while",
        trigger: "while ",
        message: "No está permitido usar bucles while",
    },
    Rule {
        flag: "prohibir_for",
        trigger: "for ",
        message: "No está permitido usar bucles for",
    },
    Rule {
        flag: "prohibir_eval",
        trigger: "eval(",
        message: "No está permitido usar eval()",
    },
    Rule {
        flag: "prohibir_exec",
        trigger: "exec(",
        message: "No está permitido usar exec()",
    },
];

/// Result of a restriction scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestrictionReport {
    pub blocked: bool,
    pub violations: Vec<String>,
}

/// Scans candidate source for forbidden tokens
#[derive(Debug, Clone)]
pub struct RestrictionChecker {
    comment_prefix: String,
}

impl RestrictionChecker {
    pub fn new(comment_prefix: impl Into<String>) -> Self {
        Self {
            comment_prefix: comment_prefix.into(),
        }
    }

    /// Check `source` against every enabled restriction, in rule order.
    ///
    /// Flags that are not known rules are ignored.
    pub fn check(&self, source: &str, restrictions: &BTreeMap<String, bool>) -> RestrictionReport {
        let code = self.strip_comments(source);

        let violations: Vec<String> = RULES
            .iter()
            .filter(|rule| restrictions.get(rule.flag).copied().unwrap_or(false))
            .filter(|rule| code.contains(rule.trigger))
            .map(|rule| format!("{} ('{}')", rule.message, rule.trigger.trim_end()))
            .collect();

        if !violations.is_empty() {
            info!("Restriction check blocked submission: {:?}", violations);
        }

        RestrictionReport {
            blocked: !violations.is_empty(),
            violations,
        }
    }

    fn strip_comments(&self, source: &str) -> String {
        if self.comment_prefix.is_empty() {
            return source.to_string();
        }
        source
            .lines()
            .map(|line| match line.find(self.comment_prefix.as_str()) {
                Some(idx) => &line[..idx],
                None => line,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for RestrictionChecker {
    fn default() -> Self {
        Self::new("#")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(names: &[&str]) -> BTreeMap<String, bool> {
        names.iter().map(|n| (n.to_string(), true)).collect()
    }

    #[test]
    fn test_while_blocked() {
        let report = RestrictionChecker::default().check(
            "n = 0\nwhile n < 3:\n    n += 1\n",
            &flags(&["prohibir_while"]),
        );
        assert!(report.blocked);
        assert_eq!(report.violations.len(), 1);
        assert!(report.violations[0].contains("while"));
    }

    #[test]
    fn test_comment_is_ignored() {
        let report = RestrictionChecker::default().check(
            "x = 1  # no uso while aqui\n",
            &flags(&["prohibir_while"]),
        );
        assert!(!report.blocked);
    }

    #[test]
    fn test_disabled_flag_allows() {
        let mut restrictions = flags(&["prohibir_for"]);
        restrictions.insert("prohibir_while".into(), false);
        let report = RestrictionChecker::default().check("while True:\n    break\n", &restrictions);
        assert!(!report.blocked);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_multiple_violations_in_rule_order() {
        let report = RestrictionChecker::default().check(
            "import os\nfor i in range(3):\n    eval('1')\n",
            &flags(&["prohibir_eval", "prohibir_for", "prohibir_import", "prohibir_exec"]),
        );
        assert!(report.blocked);
        assert_eq!(report.violations.len(), 3);
        assert!(report.violations[0].contains("import"));
        assert!(report.violations[1].contains("for"));
        assert!(report.violations[2].contains("eval"));
    }

    #[test]
    fn test_unknown_flag_is_ignored() {
        let report = RestrictionChecker::default().check("goto x", &flags(&["prohibir_goto"]));
        assert!(!report.blocked);
    }

    #[test]
    fn test_custom_comment_prefix() {
        let report = RestrictionChecker::new("//").check("x := 1 // while ", &flags(&["prohibir_while"]));
        assert!(!report.blocked);
    }
}
