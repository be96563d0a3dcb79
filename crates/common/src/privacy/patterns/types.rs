use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kinds of sensitive data the pattern matcher can detect.
///
/// Each kind maps to a fixed placeholder that replaces every match, so
/// redacted text still shows *what* was removed without showing the value.
///
/// # Examples
/// ```
/// use tixlens_common::privacy::patterns::PiiType;
///
/// assert_eq!(PiiType::Email.placeholder(), "[EMAIL]");
/// assert_eq!("ip_address".parse::<PiiType>(), Ok(PiiType::IpAddress));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum PiiType {
    Email,
    CreditCard,
    Ssn,
    Phone,
    IpAddress,
    /// Long purely numeric identifiers (customer, account, badge numbers)
    AccountNumber,
    /// Operator-supplied pattern, named in snake_case
    Custom(String),
}

impl PiiType {
    /// Built-in kinds in the order they are applied
    pub const BUILT_IN: [PiiType; 6] = [
        PiiType::Email,
        PiiType::CreditCard,
        PiiType::Ssn,
        PiiType::Phone,
        PiiType::IpAddress,
        PiiType::AccountNumber,
    ];

    /// Replacement text for matches of this kind
    pub fn placeholder(&self) -> String {
        match self {
            PiiType::Custom(name) => format!("[{}]", name.to_uppercase()),
            other => format!("[{}]", other.to_string().to_uppercase()),
        }
    }
}

impl fmt::Display for PiiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PiiType::Email => write!(f, "email"),
            PiiType::CreditCard => write!(f, "credit_card"),
            PiiType::Ssn => write!(f, "ssn"),
            PiiType::Phone => write!(f, "phone"),
            PiiType::IpAddress => write!(f, "ip_address"),
            PiiType::AccountNumber => write!(f, "account_number"),
            PiiType::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for PiiType {
    type Err = String;

    /// Parses built-in names; anything else that is a valid snake_case
    /// identifier becomes `Custom`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        match lowered.as_str() {
            "email" => Ok(PiiType::Email),
            "credit_card" => Ok(PiiType::CreditCard),
            "ssn" => Ok(PiiType::Ssn),
            "phone" => Ok(PiiType::Phone),
            "ip_address" => Ok(PiiType::IpAddress),
            "account_number" => Ok(PiiType::AccountNumber),
            name if is_snake_case(name) => Ok(PiiType::Custom(name.to_string())),
            _ => Err(format!("Invalid PiiType: {s}")),
        }
    }
}

fn is_snake_case(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
}

/// One detected occurrence inside a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiiMatch {
    pub kind: PiiType,
    /// Byte range into the scanned text
    pub start: usize,
    pub end: usize,
}

/// Output of [`PatternMatcher::redact`](super::PatternMatcher::redact)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redaction<'a> {
    /// Borrowed unchanged input when nothing matched
    pub text: std::borrow::Cow<'a, str>,
    pub count: usize,
}

impl Redaction<'_> {
    pub fn is_clean(&self) -> bool {
        self.count == 0
    }
}
