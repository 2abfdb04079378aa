//! Redaction of sensitive substrings.
//!
//! These patterns prevent credentials from leaking into the audit journal
//! or terminal output. The pattern set is fixed; every match collapses to
//! the literal [`REDACTION_MARKER`], leaving the caller's field structure
//! untouched.

use std::sync::OnceLock;

use regex::Regex;

/// Literal substituted for every redacted match.
pub const REDACTION_MARKER: &str = "[REDACTED]";

struct PatternRedactor {
    api_key_assignment: Regex,
    authorization_assignment: Regex,
    sk_token: Regex,
}

impl PatternRedactor {
    fn new() -> Self {
        Self {
            api_key_assignment: Regex::new(r#"(?i)api[_-]?key\s*[:=]\s*['"][^'"]+['"]"#)
                .expect("valid api key assignment regex"),
            authorization_assignment: Regex::new(r#"(?i)authorization\s*[:=]\s*['"][^'"]+['"]"#)
                .expect("valid authorization assignment regex"),
            sk_token: Regex::new(r"sk-[A-Za-z0-9]{20,}").expect("valid sk token regex"),
        }
    }

    fn redact(&self, raw: &str) -> String {
        let mut output = raw.to_string();
        for re in [
            &self.api_key_assignment,
            &self.authorization_assignment,
            &self.sk_token,
        ] {
            if re.is_match(&output) {
                output = re.replace_all(&output, REDACTION_MARKER).into_owned();
            }
        }
        output
    }
}

static PATTERN_REDACTOR: OnceLock<PatternRedactor> = OnceLock::new();

/// Return `text` with every sensitive match replaced by the marker.
#[must_use]
pub fn redact_text(text: &str) -> String {
    PATTERN_REDACTOR.get_or_init(PatternRedactor::new).redact(text)
}
