use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::duration;
use crate::setting::{Setting, Slot};

/// The fixed set of value kinds a setting can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Bool,
    String,
    Int,
    Int64,
    Uint,
    Uint64,
    Float64,
    Duration,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Int => "int",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint64 => "uint64",
            Self::Float64 => "float64",
            Self::Duration => "duration",
        }
    }

    /// Placeholder shown next to the flag in usage output.
    pub(crate) fn value_name(&self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::String => "STRING",
            Self::Int | Self::Int64 => "INT",
            Self::Uint | Self::Uint64 => "UINT",
            Self::Float64 => "FLOAT",
            Self::Duration => "DURATION",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type that can back a setting.
///
/// Implemented for exactly the eight kinds in [`Kind`]: `bool`, `String`,
/// `isize` (int), `i64`, `usize` (uint), `u64`, `f64` and
/// `std::time::Duration`.
pub trait FlagValue: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: Kind;

    /// Convert the textual form used on the command line, in the
    /// environment, and for coerced file values.
    fn parse_flag(text: &str) -> Result<Self, String>;

    /// Textual form for usage output and summaries.
    fn format_flag(&self) -> String;

    /// Whether this is the zero value, whose default is left out of usage.
    fn is_zero(&self) -> bool;

    #[doc(hidden)]
    fn into_slot(setting: Setting<Self>) -> Slot;
}

/// Accepts `1/t/true/yes/on` and `0/f/false/no/off`, case-insensitively.
pub(crate) fn parse_bool(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("invalid boolean {text:?}")),
    }
}

impl FlagValue for bool {
    const KIND: Kind = Kind::Bool;

    fn parse_flag(text: &str) -> Result<Self, String> {
        parse_bool(text)
    }

    fn format_flag(&self) -> String {
        self.to_string()
    }

    fn is_zero(&self) -> bool {
        !*self
    }

    fn into_slot(setting: Setting<Self>) -> Slot {
        Slot::Bool(setting)
    }
}

impl FlagValue for String {
    const KIND: Kind = Kind::String;

    fn parse_flag(text: &str) -> Result<Self, String> {
        Ok(text.to_string())
    }

    fn format_flag(&self) -> String {
        format!("{self:?}")
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn into_slot(setting: Setting<Self>) -> Slot {
        Slot::String(setting)
    }
}

macro_rules! integer_flag_value {
    ($ty:ty, $kind:ident) => {
        impl FlagValue for $ty {
            const KIND: Kind = Kind::$kind;

            fn parse_flag(text: &str) -> Result<Self, String> {
                text.trim()
                    .parse::<$ty>()
                    .map_err(|err| format!("invalid {} {text:?}: {err}", Kind::$kind))
            }

            fn format_flag(&self) -> String {
                self.to_string()
            }

            fn is_zero(&self) -> bool {
                *self == 0
            }

            fn into_slot(setting: Setting<Self>) -> Slot {
                Slot::$kind(setting)
            }
        }
    };
}

integer_flag_value!(isize, Int);
integer_flag_value!(i64, Int64);
integer_flag_value!(usize, Uint);
integer_flag_value!(u64, Uint64);

impl FlagValue for f64 {
    const KIND: Kind = Kind::Float64;

    fn parse_flag(text: &str) -> Result<Self, String> {
        text.trim()
            .parse::<f64>()
            .map_err(|err| format!("invalid float64 {text:?}: {err}"))
    }

    fn format_flag(&self) -> String {
        self.to_string()
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }

    fn into_slot(setting: Setting<Self>) -> Slot {
        Slot::Float64(setting)
    }
}

impl FlagValue for Duration {
    const KIND: Kind = Kind::Duration;

    fn parse_flag(text: &str) -> Result<Self, String> {
        duration::parse(text.trim())
    }

    fn format_flag(&self) -> String {
        duration::format(*self)
    }

    fn is_zero(&self) -> bool {
        self.is_zero()
    }

    fn into_slot(setting: Setting<Self>) -> Slot {
        Slot::Duration(setting)
    }
}
