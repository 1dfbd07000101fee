//! Schedule types
//!
//! A [`Schedule`] is the operator's ordered list of entries. Each entry keeps
//! the text as typed; when a run starts the whole list is compiled with the
//! active escape scheme into an immutable snapshot of [`Action`]s. Editing the
//! schedule afterwards never reaches a run that is already in flight.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use rig_escape::EscapeScheme;

use crate::error::ValidationError;
use crate::hold::parse_hold;

/// One compiled (hold, payload) unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Time from the start of this action's write until the next action
    pub hold: Duration,
    /// Decoded bytes, before line-ending adjustments
    pub payload: Vec<u8>,
}

impl Action {
    pub fn new(hold: Duration, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            hold,
            payload: payload.into(),
        }
    }
}

/// One operator-entered schedule row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub hold: Duration,
    pub text: String,
}

impl ScheduleEntry {
    /// Validate a hold string and payload text against `scheme`
    pub fn parse(hold: &str, text: &str, scheme: EscapeScheme) -> Result<Self, ValidationError> {
        let hold = parse_hold(hold)?;
        scheme.decode(text)?;
        Ok(Self {
            hold,
            text: text.to_string(),
        })
    }

    /// Decode this entry with `scheme`
    pub fn compile(&self, scheme: EscapeScheme) -> Result<Action, ValidationError> {
        Ok(Action::new(self.hold, scheme.decode(&self.text)?))
    }
}

/// Ordered, editable list of schedule entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ScheduleEntry) {
        self.entries.push(entry);
    }

    /// Remove the entry at `index`
    pub fn remove(&mut self, index: usize) -> Result<ScheduleEntry, ValidationError> {
        if index >= self.entries.len() {
            return Err(ValidationError::NoSuchEntry {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode every entry into a run snapshot
    ///
    /// Fails on the first entry the scheme rejects, so a run either gets every
    /// payload or none.
    pub fn snapshot(&self, scheme: EscapeScheme) -> Result<Arc<[Action]>, ValidationError> {
        self.entries
            .iter()
            .map(|entry| entry.compile(scheme))
            .collect::<Result<Vec<_>, _>>()
            .map(Arc::from)
    }
}

/// Line-ending adjustments applied to each payload right before it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEnding {
    /// Replace every `\n` with `\r\n`
    pub precede_lf_with_cr: bool,
    /// Terminate non-empty payloads that do not already end in `\n`
    pub append_missing_newline: bool,
}

impl Default for LineEnding {
    fn default() -> Self {
        Self {
            precede_lf_with_cr: false,
            append_missing_newline: true,
        }
    }
}

impl LineEnding {
    /// Send payloads exactly as decoded
    pub const NONE: LineEnding = LineEnding {
        precede_lf_with_cr: false,
        append_missing_newline: false,
    };

    pub fn apply<'a>(&self, payload: &'a [u8]) -> Cow<'a, [u8]> {
        let mut out = Cow::Borrowed(payload);

        if self.precede_lf_with_cr && payload.contains(&b'\n') {
            let mut crlf = Vec::with_capacity(payload.len() + 8);
            for &b in payload {
                if b == b'\n' {
                    crlf.push(b'\r');
                }
                crlf.push(b);
            }
            out = Cow::Owned(crlf);
        }

        if self.append_missing_newline && out.last().is_some_and(|&b| b != b'\n') {
            let terminated = out.to_mut();
            if self.precede_lf_with_cr {
                terminated.push(b'\r');
            }
            terminated.push(b'\n');
        }

        out
    }
}
