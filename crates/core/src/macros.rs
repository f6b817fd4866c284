// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for reducing boilerplate.
//!
//! - [`simple_display!`] — `Display` impl mapping enum variants to string literals
//! - [`int_enum!`] — `From`/`TryFrom` between a unit enum and its wire code

/// Generate a `Display` impl that maps enum variants to string literals.
///
/// Unit variants match directly; data-carrying variants use `(..)` to ignore fields.
///
/// ```ignore
/// atlas_core::simple_display! {
///     MyEnum {
///         Foo => "foo",
///         Bar(..) => "bar",
///     }
/// }
/// ```
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident $(( $($ignore:tt)* ))? => $str:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant $(( $($ignore)* ))? => $str, )+
                })
            }
        }
    };
}

/// Map a unit enum onto the integer codes it uses on the wire.
///
/// Generates `From<$enum> for $int` and `TryFrom<$int> for $enum` (with a
/// `String` error naming the offending code), which is what
/// `#[serde(into = "u8", try_from = "u8")]` needs.
///
/// ```ignore
/// atlas_core::int_enum! {
///     MyEnum: u8 {
///         Foo = 0,
///         Bar = 1,
///     }
/// }
/// ```
#[macro_export]
macro_rules! int_enum {
    ($enum:ident : $int:ty { $( $variant:ident = $code:literal ),+ $(,)? }) => {
        impl From<$enum> for $int {
            fn from(v: $enum) -> $int {
                match v {
                    $( $enum::$variant => $code, )+
                }
            }
        }

        impl TryFrom<$int> for $enum {
            type Error = String;

            fn try_from(code: $int) -> Result<Self, <Self as TryFrom<$int>>::Error> {
                match code {
                    $( $code => Ok($enum::$variant), )+
                    other => Err(format!(
                        "unknown {} code: {}",
                        stringify!($enum),
                        other
                    )),
                }
            }
        }
    };
}
