use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use clap::ArgMatches;
use clap::builder::ValueParser;

use crate::value::{FlagValue, Kind};

/// Shared handle to one resolved setting.
///
/// The registry keeps the other end and writes through it while parsing;
/// read it once `parse` has returned.
#[derive(Debug)]
pub struct Setting<T> {
    cell: Arc<RwLock<T>>,
}

impl<T> Clone for Setting<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone> Setting<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            cell: Arc::new(RwLock::new(value)),
        }
    }

    /// Copy of the current value.
    pub fn get(&self) -> T {
        self.read().clone()
    }

    /// Borrow the current value without cloning it.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.cell.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, value: T) {
        *self.cell.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

/// A setting with its type erased to one of the eight kinds.
#[doc(hidden)]
#[derive(Debug, Clone)]
pub enum Slot {
    Bool(Setting<bool>),
    String(Setting<String>),
    Int(Setting<isize>),
    Int64(Setting<i64>),
    Uint(Setting<usize>),
    Uint64(Setting<u64>),
    Float64(Setting<f64>),
    Duration(Setting<Duration>),
}

macro_rules! with_setting {
    ($slot:expr, $setting:ident => $body:expr) => {
        match $slot {
            Slot::Bool($setting) => $body,
            Slot::String($setting) => $body,
            Slot::Int($setting) => $body,
            Slot::Int64($setting) => $body,
            Slot::Uint($setting) => $body,
            Slot::Uint64($setting) => $body,
            Slot::Float64($setting) => $body,
            Slot::Duration($setting) => $body,
        }
    };
}

fn set_from_text<T: FlagValue>(setting: &Setting<T>, text: &str) -> Result<(), String> {
    setting.set(T::parse_flag(text)?);
    Ok(())
}

fn capture_from<T: FlagValue>(setting: &Setting<T>, matches: &ArgMatches, id: &str) -> bool {
    match matches.get_one::<T>(id) {
        Some(value) => {
            setting.set(value.clone());
            true
        }
        None => false,
    }
}

fn parser_for<T: FlagValue>(_: &Setting<T>) -> ValueParser {
    ValueParser::new(T::parse_flag)
}

impl Slot {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Bool(_) => Kind::Bool,
            Self::String(_) => Kind::String,
            Self::Int(_) => Kind::Int,
            Self::Int64(_) => Kind::Int64,
            Self::Uint(_) => Kind::Uint,
            Self::Uint64(_) => Kind::Uint64,
            Self::Float64(_) => Kind::Float64,
            Self::Duration(_) => Kind::Duration,
        }
    }

    /// Parse `text` with the kind's parser and store it.
    pub(crate) fn set_text(&self, text: &str) -> Result<(), String> {
        with_setting!(self, setting => set_from_text(setting, text))
    }

    /// Copy a value the command line parsed for `id` into the cell.
    pub(crate) fn capture(&self, matches: &ArgMatches, id: &str) -> bool {
        with_setting!(self, setting => capture_from(setting, matches, id))
    }

    /// Command-line parser producing the kind's native type.
    pub(crate) fn value_parser(&self) -> ValueParser {
        with_setting!(self, setting => parser_for(setting))
    }

    pub(crate) fn display(&self) -> String {
        with_setting!(self, setting => setting.read().format_flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_cell() {
        let setting = Setting::new(1u64);
        let other = setting.clone();
        other.set(7);
        assert_eq!(setting.get(), 7);
    }

    #[test]
    fn slot_sets_through_the_kind_parser() {
        let timeout = Setting::new(Duration::ZERO);
        let slot = Duration::into_slot(timeout.clone());
        assert_eq!(slot.kind(), Kind::Duration);

        slot.set_text("1500ms").unwrap();
        assert_eq!(timeout.get(), Duration::from_millis(1_500));
        assert_eq!(slot.display(), "1.5s");

        assert!(slot.set_text("soon").is_err());
        assert_eq!(timeout.get(), Duration::from_millis(1_500));
    }
}
