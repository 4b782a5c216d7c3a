//! Domain models for the radcase system.

/// Implements `as_str`, `Display` and case-insensitive `FromStr` for a
/// unit-only enum using its wire names.
macro_rules! impl_str_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($ty), other)),
                }
            }
        }
    };
}

mod attempt;
mod case;
mod clinical;
mod evaluation;
mod imaging;
mod scoring;

pub use attempt::*;
pub use case::*;
pub use clinical::*;
pub use evaluation::*;
pub use imaging::*;
pub use scoring::*;
