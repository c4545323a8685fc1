//! Macro for implementing Display and FromStr for string-backed enums
//!
//! Each variant has one canonical spelling used by `Display`, plus optional
//! aliases that `FromStr` also accepts. Parsing is case-insensitive.
//!
//! # Example
//!
//! ```rust
//! use logrelay_domain::impl_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Outcome {
//!     Done,
//!     Cancelled,
//! }
//!
//! impl_status_conversions!(Outcome {
//!     Done => "done",
//!     Cancelled => "cancelled" | "canceled",
//! });
//!
//! assert_eq!(Outcome::Cancelled.to_string(), "cancelled");
//! assert_eq!("CANCELED".parse::<Outcome>(), Ok(Outcome::Cancelled));
//! ```

/// Implements `Display` and `FromStr` for an enum of string-backed variants
///
/// `FromStr` errors are `String` messages naming the enum and the input.
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical string form
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($str) $(|| s.eq_ignore_ascii_case($alias))* {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
