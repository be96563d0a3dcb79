//! Ticket sanitization
//!
//! Replaces detectable sensitive values in the configured text fields with
//! typed placeholders before tickets reach analysis or reporting. Only the
//! number of replacements is reported, never the replaced values.

use std::collections::BTreeSet;

use tixlens_common::privacy::patterns::{PatternMatcher, PiiDetectionConfig, PiiResult, PiiType};
use tixlens_domain::{SanitizedField, SanitizerSettings, Ticket, TixLensError};
use tracing::debug;

/// A sanitized ticket plus how many values were replaced in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationResult {
    pub ticket: Ticket,
    pub redactions: usize,
}

impl SanitizationResult {
    pub fn is_clean(&self) -> bool {
        self.redactions == 0
    }
}

/// Deterministic, idempotent field scrubber
#[derive(Debug, Clone)]
pub struct Sanitizer {
    matcher: PatternMatcher,
    fields: BTreeSet<SanitizedField>,
}

impl Sanitizer {
    pub fn new(matcher: PatternMatcher, fields: impl IntoIterator<Item = SanitizedField>) -> Self {
        Self { matcher, fields: fields.into_iter().collect() }
    }

    /// All built-in kinds over the default field set
    pub fn with_defaults() -> PiiResult<Self> {
        let matcher = PatternMatcher::with_defaults()?;
        Ok(Self::new(matcher, SanitizerSettings::default().fields))
    }

    /// # Errors
    /// `TixLensError::Config` for unknown kind names or custom patterns that
    /// fail to compile.
    pub fn from_settings(settings: &SanitizerSettings) -> Result<Self, TixLensError> {
        let mut config = if settings.enabled_kinds.is_empty() {
            PiiDetectionConfig::default()
        } else {
            let kinds = settings
                .enabled_kinds
                .iter()
                .map(|name| match name.parse::<PiiType>() {
                    Ok(PiiType::Custom(_)) | Err(_) => Err(TixLensError::Config(format!(
                        "sanitizer.enabled_kinds: unknown built-in kind '{name}'"
                    ))),
                    Ok(kind) => Ok(kind),
                })
                .collect::<Result<Vec<_>, _>>()?;
            PiiDetectionConfig::with_types(kinds)
        };
        for custom in &settings.custom_patterns {
            config = config.custom(custom.name.clone(), custom.pattern.clone());
        }

        let matcher = PatternMatcher::new(&config)
            .map_err(|err| TixLensError::Config(format!("sanitizer: {err}")))?;
        Ok(Self::new(matcher, settings.fields.iter().copied()))
    }

    pub fn fields(&self) -> impl Iterator<Item = SanitizedField> + '_ {
        self.fields.iter().copied()
    }

    /// Scrub one ticket. Fields outside the configured set are untouched.
    pub fn sanitize(&self, mut ticket: Ticket) -> SanitizationResult {
        let mut redactions = 0;
        for field in &self.fields {
            redactions += match field {
                SanitizedField::Title => self.scrub(&mut ticket.title),
                SanitizedField::Description => self.scrub(&mut ticket.description),
                SanitizedField::Assignee => ticket.assignee.as_mut().map_or(0, |v| self.scrub(v)),
                SanitizedField::ResolverGroup => {
                    ticket.resolver_group.as_mut().map_or(0, |v| self.scrub(v))
                }
                SanitizedField::Tags => ticket.tags.iter_mut().map(|tag| self.scrub(tag)).sum(),
            };
        }
        if redactions > 0 {
            debug!(ticket_id = %ticket.id, redactions, "Sanitized ticket");
        }
        SanitizationResult { ticket, redactions }
    }

    /// Scrub a batch, returning the tickets and the total replacement count
    pub fn sanitize_all(&self, tickets: Vec<Ticket>) -> (Vec<Ticket>, usize) {
        let mut total = 0;
        let sanitized = tickets
            .into_iter()
            .map(|ticket| {
                let result = self.sanitize(ticket);
                total += result.redactions;
                result.ticket
            })
            .collect();
        (sanitized, total)
    }

    fn scrub(&self, value: &mut String) -> usize {
        let redaction = self.matcher.redact(value);
        if redaction.count == 0 {
            return 0;
        }
        let count = redaction.count;
        let text = redaction.text.into_owned();
        *value = text;
        count
    }
}
