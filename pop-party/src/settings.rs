/*!
Process-wide settings.

Settings are read from a TOML file in which every field is optional:

```toml
config_dir = "~/.config/pop"
debug = 1
schedule_file = "tracks.json"
votes_file = "votes.json"
sessions_file = "sessions.json"
vote_context = "33c3 track vote"
```

Relative file names resolve against the configuration directory; a leading `~` expands to
`$HOME`.
*/

use crate::{persist, Error};
use serde::*;
use std::path::{Path, PathBuf};

/// Settings for an organizer, an attendee or a voting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the party configuration and the ledgers.
    pub config_dir: PathBuf,
    /// Debug level from 0 (terse) to 5 (maximal).
    pub debug: u8,
    /// Name of the party configuration file.
    pub config_file: String,
    /// The schedule the vote ledger is created from.
    pub schedule_file: String,
    /// Where votes are saved.
    pub votes_file: String,
    /// Where sessions and nonces are saved.
    pub sessions_file: String,
    /// Signing context of logins and votes. Tags are only linkable within one context.
    pub vote_context: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("~/.config/pop"),
            debug: 0,
            config_file: "config.bin".into(),
            schedule_file: "tracks.json".into(),
            votes_file: "votes.json".into(),
            sessions_file: "sessions.json".into(),
            vote_context: "33c3 track vote".into(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Parse {
            what: "settings",
            reason: e.to_string(),
        })
    }

    /// Read settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        Self::from_toml(&persist::read_text(path)?)
    }

    /// The configuration directory with `~` expanded.
    pub fn config_dir(&self) -> PathBuf {
        expand_tilde(&self.config_dir)
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let name = expand_tilde(Path::new(name));
        if name.is_absolute() {
            name
        } else {
            self.config_dir().join(name)
        }
    }

    /// The party configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.resolve(&self.config_file)
    }

    /// The schedule file.
    pub fn schedule_file(&self) -> PathBuf {
        self.resolve(&self.schedule_file)
    }

    /// The vote ledger file.
    pub fn votes_file(&self) -> PathBuf {
        self.resolve(&self.votes_file)
    }

    /// The session registry file.
    pub fn sessions_file(&self) -> PathBuf {
        self.resolve(&self.sessions_file)
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings = Settings::from_toml("debug = 3\nvotes_file = \"/srv/votes.json\"").unwrap();
        assert_eq!(settings.debug, 3);
        assert_eq!(settings.votes_file(), PathBuf::from("/srv/votes.json"));
        assert_eq!(settings.config_file, "config.bin");
        assert_eq!(settings.vote_context, Settings::default().vote_context);
    }

    #[test]
    fn relative_files_live_in_the_config_dir() {
        let settings = Settings {
            config_dir: PathBuf::from("/etc/pop"),
            ..Settings::default()
        };
        assert_eq!(settings.config_file(), PathBuf::from("/etc/pop/config.bin"));
        assert_eq!(settings.sessions_file(), PathBuf::from("/etc/pop/sessions.json"));
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = std::env::var_os("HOME") {
            let dir = Settings::default().config_dir();
            assert_eq!(dir, PathBuf::from(home).join(".config/pop"));
        }
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            Settings::from_toml("debug = \"loud\""),
            Err(Error::Parse { what: "settings", .. })
        ));
    }
}
