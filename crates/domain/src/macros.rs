//! Display/FromStr generation for the domain's string-backed enums
//!
//! Ticket statuses and severities travel as lowercase strings in wire
//! payloads, configuration files, and metric keys. This macro keeps those
//! spellings in one place per enum.
//!
//! # Example
//!
//! ```rust
//! use tixlens_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Priority {
//!     Urgent,
//!     Normal,
//! }
//!
//! impl_domain_status_conversions!(Priority {
//!     Urgent => "urgent",
//!     Normal => "normal",
//! });
//!
//! assert_eq!("URGENT".parse::<Priority>(), Ok(Priority::Urgent));
//! ```

/// Implements `Display` (lowercase) and case-insensitive `FromStr`
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Channel {
        Email,
        Portal,
        WalkUp,
    }

    impl_domain_status_conversions!(Channel {
        Email => "email",
        Portal => "portal",
        WalkUp => "walk_up",
    });

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(Channel::WalkUp.to_string(), "walk_up");
        assert_eq!(Channel::Email.to_string(), "email");
    }

    #[test]
    fn test_parse_ignores_case_and_whitespace() {
        assert_eq!(Channel::from_str(" Portal "), Ok(Channel::Portal));
        assert_eq!(Channel::from_str("WALK_UP"), Ok(Channel::WalkUp));
    }

    #[test]
    fn test_parse_invalid() {
        let err = Channel::from_str("fax").unwrap_err();
        assert_eq!(err, "Invalid Channel: fax");
        assert!(Channel::from_str("").is_err());
    }
}
