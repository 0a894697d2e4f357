use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::MAX_QUERY_LEN;

/// Verdict of the policy check. Malformed-but-parseable SQL never errors
/// here; only structurally empty input and denylist matches reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { reason: String },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"--[^\n]*").unwrap());
static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

// Denylist, not an allowlist grammar. Keywords hidden inside string
// literals still match; keywords inside comments do not (comments are
// stripped first). Vendor syntax the patterns don't know about slips
// through to the read-only database connection.
static FORBIDDEN: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|DROP|ALTER|TRUNCATE|CREATE|GRANT|REVOKE)\b")
            .unwrap(),
        Regex::new(r"(?i)\bEXECUTE\s+BLOCK\b").unwrap(),
        Regex::new(r"(?i)\bEXECUTE\s+PROCEDURE\b").unwrap(),
        // Two or more semicolon-delimited statements on one line.
        Regex::new(r";.*;\s*").unwrap(),
    ]
});

/// Validate SQL text against the read-only policy.
///
/// Pure function: no I/O, no state, same input always yields the same
/// verdict.
pub fn validate(query: &str) -> Verdict {
    if query.trim().is_empty() {
        return rejected("Empty query not allowed");
    }
    if query.chars().count() > MAX_QUERY_LEN {
        return rejected(format!(
            "Query exceeds maximum length of {MAX_QUERY_LEN} characters"
        ));
    }

    let stripped = strip_comments(query);

    for pattern in FORBIDDEN.iter() {
        if let Some(m) = pattern.find(&stripped) {
            return rejected(format!(
                "Forbidden operation detected: {}",
                m.as_str().trim()
            ));
        }
    }

    let upper = stripped.trim().to_uppercase();
    if !(upper.starts_with("SELECT") || upper.starts_with("WITH")) {
        return rejected("Only SELECT and WITH queries are allowed");
    }

    Verdict::Accepted
}

/// Remove `-- ...` line comments and `/* ... */` spans so that keywords
/// appearing only inside comments stay inert.
fn strip_comments(query: &str) -> String {
    let no_line = LINE_COMMENT.replace_all(query, "");
    BLOCK_COMMENT.replace_all(&no_line, "").into_owned()
}

fn rejected(reason: impl Into<String>) -> Verdict {
    Verdict::Rejected {
        reason: reason.into(),
    }
}
