//! # Control State
//!
//! Three flags that outside code flips to steer the arena:
//! - `display`: when off, no events are produced (computation continues)
//! - `resume`: advisory, for the consumer side
//! - `stop`: no new jobs are dispatched; running jobs still finish
//!
//! Readers take the shared lock, the control interface writes all three flags
//! at once under the exclusive lock. The text form is `"d r s\n"` with each
//! flag `'0'` or `'1'`.

use crate::error::ControlError;
use parking_lot::RwLock;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFlags {
    pub display: bool,
    pub resume: bool,
    pub stop: bool,
}

impl Default for ControlFlags {
    fn default() -> Self {
        Self {
            display: true,
            resume: true,
            stop: false,
        }
    }
}

fn parse_flag(token: &str) -> Result<bool, ControlError> {
    match token {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(ControlError::Token(other.to_string())),
    }
}

impl FromStr for ControlFlags {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(ControlError::FieldCount(tokens.len()));
        }
        Ok(Self {
            display: parse_flag(tokens[0])?,
            resume: parse_flag(tokens[1])?,
            stop: parse_flag(tokens[2])?,
        })
    }
}

impl fmt::Display for ControlFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} {}",
            self.display as u8, self.resume as u8, self.stop as u8
        )
    }
}

#[derive(Debug, Default)]
pub struct ControlState {
    flags: RwLock<ControlFlags>,
}

impl ControlState {
    pub fn snapshot(&self) -> ControlFlags {
        *self.flags.read()
    }

    pub fn display_enabled(&self) -> bool {
        self.flags.read().display
    }

    pub fn resume(&self) -> bool {
        self.flags.read().resume
    }

    pub fn stop_requested(&self) -> bool {
        self.flags.read().stop
    }

    /// Replaces all three flags at once.
    pub fn update(&self, flags: ControlFlags) {
        *self.flags.write() = flags;
    }

    /// Changes one flag under the write lock.
    pub fn modify(&self, f: impl FnOnce(&mut ControlFlags)) {
        f(&mut *self.flags.write());
    }

    /// Parses and applies a control record. Nothing changes on error.
    pub fn store_record(&self, record: &str) -> Result<(), ControlError> {
        let flags = record.parse::<ControlFlags>()?;
        self.update(flags);
        Ok(())
    }

    /// Current flags in record form.
    pub fn show_record(&self) -> String {
        self.snapshot().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let control = ControlState::default();
        assert_eq!(control.show_record(), "1 1 0\n");
        assert!(control.display_enabled());
        assert!(!control.stop_requested());
    }

    #[test]
    fn test_store_record() {
        let control = ControlState::default();
        control.store_record("0 1 1\n").unwrap();
        assert!(!control.display_enabled());
        assert!(control.resume());
        assert!(control.stop_requested());
        assert_eq!(control.show_record(), "0 1 1\n");
    }

    #[test]
    fn test_bad_record_leaves_flags() {
        let control = ControlState::default();
        assert_eq!(
            control.store_record("1 1"),
            Err(ControlError::FieldCount(2))
        );
        assert_eq!(
            control.store_record("1 y 0"),
            Err(ControlError::Token("y".to_string()))
        );
        assert_eq!(control.snapshot(), ControlFlags::default());
    }

    #[test]
    fn test_modify_single_flag() {
        let control = ControlState::default();
        control.modify(|f| f.stop = true);
        assert!(control.stop_requested());
        assert!(control.display_enabled());
    }
}
