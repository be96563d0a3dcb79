// Regex-driven detection and redaction of sensitive values in free text

use std::borrow::Cow;
use std::collections::HashSet;

use regex::{NoExpand, Regex};
use tracing::debug;

use super::config::PiiDetectionConfig;
use super::error::{PiiError, PiiResult};
use super::types::{PiiMatch, PiiType, Redaction};

pub(crate) const EMAIL_PATTERN: &str = r"(?u)\b[\p{L}\p{N}._%+-]+@[\p{L}\p{N}.-]+\.[\p{L}]{2,}\b";
const CREDIT_CARD_PATTERN: &str = r"\b(?:\d[ -]?){12,18}\d\b";
const SSN_PATTERN: &str = r"\b\d{3}-\d{2}-\d{4}\b";
const PHONE_PATTERN: &str = r"(?:\+\d{1,3}[ .-]?)?(?:\(\d{3}\)[ .-]?|\b\d{3}[ .-])\d{3}[ .-]\d{4}\b";
const IP_ADDRESS_PATTERN: &str = r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b";
const ACCOUNT_NUMBER_PATTERN: &str = r"\b\d{8,}\b";

fn built_in_pattern(kind: &PiiType) -> Option<&'static str> {
    match kind {
        PiiType::Email => Some(EMAIL_PATTERN),
        PiiType::CreditCard => Some(CREDIT_CARD_PATTERN),
        PiiType::Ssn => Some(SSN_PATTERN),
        PiiType::Phone => Some(PHONE_PATTERN),
        PiiType::IpAddress => Some(IP_ADDRESS_PATTERN),
        PiiType::AccountNumber => Some(ACCOUNT_NUMBER_PATTERN),
        PiiType::Custom(_) => None,
    }
}

#[derive(Debug, Clone)]
struct Rule {
    kind: PiiType,
    regex: Regex,
    placeholder: String,
}

/// Compiled, ordered set of detection rules.
///
/// Rules run in a fixed order (built-ins first, in [`PiiType::BUILT_IN`]
/// order, then custom patterns as declared), so redaction is deterministic.
/// Construction rejects any rule that would match a placeholder, which makes
/// [`redact`](Self::redact) idempotent.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    rules: Vec<Rule>,
}

impl PatternMatcher {
    /// Matcher with every built-in kind enabled
    pub fn with_defaults() -> PiiResult<Self> {
        Self::new(&PiiDetectionConfig::default())
    }

    pub fn new(config: &PiiDetectionConfig) -> PiiResult<Self> {
        let enabled: HashSet<&PiiType> = config.enabled_types.iter().collect();
        let mut rules = Vec::new();

        for kind in PiiType::BUILT_IN.iter().filter(|kind| enabled.contains(kind)) {
            if let Some(pattern) = built_in_pattern(kind) {
                rules.push(compile(kind.clone(), pattern)?);
            }
        }

        let mut seen: HashSet<PiiType> = rules.iter().map(|rule| rule.kind.clone()).collect();
        for custom in &config.custom_patterns {
            let kind = match custom.name.parse::<PiiType>() {
                Ok(kind @ PiiType::Custom(_)) => kind,
                Ok(_) => return Err(PiiError::DuplicateKind(custom.name.clone())),
                Err(message) => {
                    return Err(PiiError::PatternCompilation { kind: custom.name.clone(), message })
                }
            };
            if !seen.insert(kind.clone()) {
                return Err(PiiError::DuplicateKind(custom.name.clone()));
            }
            rules.push(compile(kind, &custom.pattern)?);
        }

        for rule in &rules {
            if let Some(placeholder) =
                rules.iter().map(|other| &other.placeholder).find(|p| rule.regex.is_match(p))
            {
                return Err(PiiError::PlaceholderCollision {
                    kind: rule.kind.to_string(),
                    placeholder: placeholder.clone(),
                });
            }
        }

        debug!(rules = rules.len(), "Compiled PII pattern matcher");
        Ok(Self { rules })
    }

    /// Kinds this matcher detects, in application order
    pub fn kinds(&self) -> impl Iterator<Item = &PiiType> {
        self.rules.iter().map(|rule| &rule.kind)
    }

    pub fn contains_pii(&self, text: &str) -> bool {
        self.rules.iter().any(|rule| rule.regex.is_match(text))
    }

    /// Every match of every rule against the original text.
    ///
    /// Rules scan independently, so matches of different kinds may overlap.
    pub fn find_all(&self, text: &str) -> Vec<PiiMatch> {
        let mut matches: Vec<PiiMatch> = self
            .rules
            .iter()
            .flat_map(|rule| {
                rule.regex.find_iter(text).map(|m| PiiMatch {
                    kind: rule.kind.clone(),
                    start: m.start(),
                    end: m.end(),
                })
            })
            .collect();
        matches.sort_by_key(|m| (m.start, m.end));
        matches
    }

    /// Replace every match with its kind's placeholder.
    ///
    /// Returns the input borrowed and untouched when nothing matched.
    pub fn redact<'a>(&self, text: &'a str) -> Redaction<'a> {
        let mut current = Cow::Borrowed(text);
        let mut count = 0;

        for rule in &self.rules {
            let found = rule.regex.find_iter(&current).count();
            if found == 0 {
                continue;
            }
            count += found;
            let replaced = rule.regex.replace_all(&current, NoExpand(&rule.placeholder)).into_owned();
            current = Cow::Owned(replaced);
        }

        Redaction { text: current, count }
    }
}

fn compile(kind: PiiType, pattern: &str) -> PiiResult<Rule> {
    let regex = Regex::new(pattern).map_err(|e| PiiError::PatternCompilation {
        kind: kind.to_string(),
        message: e.to_string(),
    })?;
    let placeholder = kind.placeholder();
    Ok(Rule { kind, regex, placeholder })
}

#[cfg(test)]
mod tests {
    //! Unit tests for pattern detection and redaction.

    use super::*;

    fn matcher() -> PatternMatcher {
        PatternMatcher::with_defaults().expect("built-in patterns compile")
    }

    /// Validates each built-in kind is replaced by its placeholder.
    #[test]
    fn test_redacts_built_in_kinds() {
        let m = matcher();
        let cases = [
            ("mail jane.doe@example.com now", "mail [EMAIL] now"),
            ("card 4111 1111 1111 1111 used", "card [CREDIT_CARD] used"),
            ("ssn 123-45-6789 on file", "ssn [SSN] on file"),
            ("call (555) 123-4567 today", "call [PHONE] today"),
            ("call 555-123-4567 today", "call [PHONE] today"),
            ("host 10.0.12.7 down", "host [IP_ADDRESS] down"),
            ("customer 004512345678 affected", "customer [ACCOUNT_NUMBER] affected"),
        ];
        for (input, expected) in cases {
            let out = m.redact(input);
            assert_eq!(out.text, expected, "input: {input}");
            assert_eq!(out.count, 1, "input: {input}");
        }
    }

    /// Validates clean text comes back borrowed and byte-identical.
    #[test]
    fn test_clean_text_is_borrowed() {
        let m = matcher();
        let input = "Printer on floor 3 jams; see INC0012345 from 2024-01-15.";
        let out = m.redact(input);
        assert!(out.is_clean());
        assert!(matches!(out.text, Cow::Borrowed(s) if std::ptr::eq(s, input)));
    }

    /// Validates redaction is idempotent.
    #[test]
    fn test_redaction_is_idempotent() {
        let m = matcher();
        let input = "Reach bob@corp.io or +1 555.123.4567, acct 99887766, ip 192.168.1.1";
        let once = m.redact(input).text.into_owned();
        let twice = m.redact(&once);
        assert!(twice.is_clean());
        assert_eq!(twice.text, once);
    }

    /// Validates multiple matches are counted.
    #[test]
    fn test_counts_every_match() {
        let m = matcher();
        let out = m.redact("a@b.co, c@d.co and 123-45-6789");
        assert_eq!(out.count, 3);
        assert_eq!(out.text, "[EMAIL], [EMAIL] and [SSN]");
    }

    /// Validates custom patterns and their validation rules.
    ///
    /// Assertions:
    /// - Custom rules redact with their uppercase placeholder.
    /// - Rules matching a placeholder are rejected.
    /// - Invalid regexes and duplicate names are rejected.
    #[test]
    fn test_custom_patterns() {
        let config = PiiDetectionConfig::with_types([PiiType::Email]).custom("badge_id", r"\bB-\d{5}\b");
        let m = PatternMatcher::new(&config).expect("valid custom pattern");
        assert_eq!(m.redact("badge B-12345").text, "badge [BADGE_ID]");

        let colliding = PiiDetectionConfig::default().custom("shout", r"[A-Z]{4,}");
        assert!(matches!(
            PatternMatcher::new(&colliding),
            Err(PiiError::PlaceholderCollision { .. })
        ));

        let broken = PiiDetectionConfig::default().custom("broken", r"(unclosed");
        assert!(matches!(PatternMatcher::new(&broken), Err(PiiError::PatternCompilation { .. })));

        let dup = PiiDetectionConfig::default().custom("email", r"x");
        assert!(matches!(PatternMatcher::new(&dup), Err(PiiError::DuplicateKind(_))));
    }

    /// Validates disabled kinds are left alone.
    #[test]
    fn test_disabled_kinds_not_redacted() {
        let m = PatternMatcher::new(&PiiDetectionConfig::with_types([PiiType::Email]))
            .expect("matcher");
        let input = "ip 10.1.1.1 and x@y.org";
        assert_eq!(m.redact(input).text, "ip 10.1.1.1 and [EMAIL]");
        assert_eq!(m.kinds().count(), 1);
    }

    /// Validates `find_all` reports ordered byte ranges.
    #[test]
    fn test_find_all_ranges() {
        let m = matcher();
        let text = "x@y.org then 123-45-6789";
        let found = m.find_all(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, PiiType::Email);
        assert_eq!(&text[found[0].start..found[0].end], "x@y.org");
        assert_eq!(found[1].kind, PiiType::Ssn);
        assert!(m.contains_pii(text));
    }
}
