//! Session settings file parsing.
//!
//! The file uses the session engine's INI dialect:
//!
//! ```text
//! [DEFAULT]
//! BeginString=FIX.4.4
//! SenderCompID=ACCEPTOR
//! SocketAcceptPort=5001
//!
//! [SESSION]
//! TargetCompID=INIT1
//! ```
//!
//! Every `[SESSION]` section inherits the `[DEFAULT]` keys and may override
//! them. Lines starting with `#` or `;` are comments.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::SessionError;
use crate::result::Result;
use crate::session::SessionId;

/// Key/value pairs of one section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    values: HashMap<String, String>,
}

impl Dictionary {
    /// Raw value for `key`.
    pub fn setting(&self, key: &str) -> Result<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| SessionError::Config(format!("setting {} not found", key)))
    }

    /// Whether `key` is present.
    pub fn has_setting(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Boolean value; accepts `Y`/`N` and `true`/`false`.
    pub fn bool_setting(&self, key: &str) -> Result<bool> {
        match self.setting(key)?.to_ascii_uppercase().as_str() {
            "Y" | "TRUE" => Ok(true),
            "N" | "FALSE" => Ok(false),
            other => Err(SessionError::Config(format!(
                "setting {} is not a boolean: {}",
                key, other
            ))),
        }
    }

    /// Integer value.
    pub fn int_setting(&self, key: &str) -> Result<i64> {
        let raw = self.setting(key)?;
        raw.parse::<i64>().map_err(|e| {
            SessionError::Config(format!("setting {} is not an integer ({}): {}", key, raw, e))
        })
    }

    /// Insert or replace `key`.
    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(String::from(key), String::from(value));
    }

    fn merged_over(&self, defaults: &Dictionary) -> Dictionary {
        let mut values = defaults.values.clone();
        values.extend(self.values.clone());
        Dictionary { values }
    }
}

/// Parsed settings file: global section plus one dictionary per session.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    global: Dictionary,
    sessions: Vec<Dictionary>,
}

/// Trait providing settings parsing from a buffered reader.
pub trait SettingsParser: Sized {
    /// Parse a settings file from `reader`.
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Self>;
}

enum Section {
    None,
    Default,
    Session,
}

impl SettingsParser for Settings {
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut global = Dictionary::default();
        let mut raw_sessions: Vec<Dictionary> = Vec::new();
        let mut section = Section::None;

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result.map_err(SessionError::Io)?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') || trimmed_line.starts_with(';') {
                continue;
            }

            if let Some(name) = trimmed_line
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
            {
                section = match name.trim().to_ascii_uppercase().as_str() {
                    "DEFAULT" => Section::Default,
                    "SESSION" => {
                        raw_sessions.push(Dictionary::default());
                        Section::Session
                    }
                    other => {
                        return Err(SessionError::Config(format!(
                            "line {}: unknown section [{}]",
                            index + 1,
                            other
                        )));
                    }
                };
                continue;
            }

            let (key, value) = trimmed_line.split_once('=').ok_or_else(|| {
                SessionError::Config(format!("line {}: expected Key=Value", index + 1))
            })?;
            let target = match section {
                Section::Default => &mut global,
                Section::Session => match raw_sessions.last_mut() {
                    Some(session) => session,
                    None => &mut global,
                },
                Section::None => {
                    return Err(SessionError::Config(format!(
                        "line {}: setting outside of a section",
                        index + 1
                    )));
                }
            };
            target.set(key.trim(), value.trim());
        }

        let sessions = raw_sessions
            .iter()
            .map(|session| session.merged_over(&global))
            .collect();
        Ok(Settings { global, sessions })
    }
}

impl Settings {
    /// Parse the settings file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            SessionError::Config(format!("error opening {}: {}", path.display(), e))
        })?;
        Self::parse_from_reader(BufReader::new(file))
    }

    /// The `[DEFAULT]` section.
    pub fn global_settings(&self) -> &Dictionary {
        &self.global
    }

    /// Session sections with defaults applied, in file order.
    pub fn session_settings(&self) -> &[Dictionary] {
        &self.sessions
    }

    /// Session identities declared by the session sections, seen locally.
    pub fn session_ids(&self) -> Result<Vec<SessionId>> {
        self.sessions
            .iter()
            .map(|session| {
                Ok(SessionId::new(
                    session.setting("BeginString")?,
                    session.setting("SenderCompID")?,
                    session.setting("TargetCompID")?,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "\
# publisher
[DEFAULT]
BeginString=FIX.4.4
SenderCompID=ACCEPTOR
HeartBtInt=30
LoggingPrice=Y

[SESSION]
TargetCompID=INIT1

[SESSION]
TargetCompID=INIT2
HeartBtInt=10
";

    #[test]
    fn sessions_inherit_defaults() {
        let settings = Settings::parse_from_reader(Cursor::new(SAMPLE)).unwrap();
        assert!(settings.global_settings().bool_setting("LoggingPrice").unwrap());
        assert_eq!(settings.session_settings().len(), 2);
        let second = &settings.session_settings()[1];
        assert_eq!(second.int_setting("HeartBtInt").unwrap(), 10);
        assert_eq!(second.setting("SenderCompID").unwrap(), "ACCEPTOR");

        let ids = settings.session_ids().unwrap();
        assert_eq!(ids[0], SessionId::new("FIX.4.4", "ACCEPTOR", "INIT1"));
    }

    #[test]
    fn missing_and_malformed_values_are_config_errors() {
        let settings = Settings::parse_from_reader(Cursor::new(SAMPLE)).unwrap();
        let global = settings.global_settings();
        assert!(matches!(global.setting("Nope"), Err(SessionError::Config(_))));
        assert!(matches!(global.int_setting("BeginString"), Err(SessionError::Config(_))));

        let broken = Settings::parse_from_reader(Cursor::new("Key=Value\n"));
        assert!(matches!(broken, Err(SessionError::Config(_))));
    }
}
