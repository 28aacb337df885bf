//! Macro for implementing Display and FromStr for keyword enums
//!
//! Configuration selectors such as the cache backend are read from
//! environment variables as bare keywords. This macro gives such an enum a
//! lowercase `Display` and a case-insensitive `FromStr` from one mapping.
//!
//! # Example
//!
//! ```rust
//! use keystore_domain::impl_keyword_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Mode {
//!     Fast,
//!     Safe,
//! }
//!
//! impl_keyword_conversions!(Mode {
//!     Fast => "fast",
//!     Safe => "safe",
//! });
//!
//! assert_eq!("SAFE".parse::<Mode>(), Ok(Mode::Safe));
//! ```

/// Implements Display and FromStr traits for keyword enums
///
/// Parsing is case-insensitive; the error names the enum and echoes the
/// rejected input.
#[macro_export]
macro_rules! impl_keyword_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => ::std::write!(f, $str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => ::std::result::Result::Ok(Self::$variant),)+
                    _ => ::std::result::Result::Err(::std::format!(
                        "Invalid {}: {}",
                        ::std::stringify!($enum_name),
                        s
                    )),
                }
            }
        }
    };
}
