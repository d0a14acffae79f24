//! Response grammars for Haas Q-command replies.
//!
//! Every grammar is anchored to the whole line and includes the leading
//! `>` marker the controller puts in front of each reply.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// A named, anchored reply pattern.
#[derive(Debug)]
pub struct Grammar {
    name: &'static str,
    pattern: Regex,
}

impl Grammar {
    /// Compile a grammar. Panics on an invalid pattern, so only use this
    /// for the built-in grammars below.
    fn builtin(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("built-in grammar must compile"),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Match `text` against the grammar.
    ///
    /// Returns the captured fields only if the whole of `text` matches.
    pub fn matches<'t>(&self, text: &'t str) -> Option<Fields<'t>> {
        let captures = self.pattern.captures(text)?;
        let whole = captures.get(0)?;
        if whole.start() != 0 || whole.end() != text.len() {
            return None;
        }
        Some(Fields(captures))
    }
}

/// Named captures from a successful match.
#[derive(Debug)]
pub struct Fields<'t>(Captures<'t>);

impl<'t> Fields<'t> {
    /// Get a named capture. Participating groups that matched nothing
    /// return an empty string.
    pub fn get(&self, name: &str) -> Option<&'t str> {
        self.0.name(name).map(|m| m.as_str())
    }
}

/// `?Q100` reply: `>SERIAL NUMBER, <serial>`.
pub static SERIAL_NUMBER: Lazy<Grammar> =
    Lazy::new(|| Grammar::builtin("SERIAL_NUMBER", r"^>SERIAL NUMBER, (?P<serial>.*)$"));

/// `?Q104` reply: `>MODE, <mode>`.
pub static MODE: Lazy<Grammar> = Lazy::new(|| Grammar::builtin("MODE", r"^>MODE, (?P<mode>.*)$"));

/// `?Q500` reply while a program is loaded:
/// `>PROGRAM, <name>, <state>, PARTS, <parts>`.
pub static PROGRAM: Lazy<Grammar> = Lazy::new(|| {
    Grammar::builtin(
        "PROGRAM",
        r"^>PROGRAM, (?P<name>.*), (?P<state>.*), PARTS, (?P<parts>[0-9]*)$",
    )
});

/// `?Q500` reply while the control is busy: `>STATUS <word>`.
pub static STATUS: Lazy<Grammar> =
    Lazy::new(|| Grammar::builtin("STATUS", r"^>STATUS (?P<word>.*)$"));

/// `?Q600 <n>` reply: `>MACRO, <value>`.
pub static MACRO: Lazy<Grammar> =
    Lazy::new(|| Grammar::builtin("MACRO", r"^>MACRO, (?P<value>.*)$"));
