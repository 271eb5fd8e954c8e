//! Loads and validates the account table and mapping list from a TOML configuration file
//!
//! The config path is resolved the same way as the original prototype this crate reconciles
//! calendars for: `$SYNC_CONFIG` wins if set, otherwise it falls back to this platform's standard
//! config directory (`directories::ProjectDirs`) rather than a literal XDG-only path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Which reconciliation mode a mapping runs under. `Mode::Busy` implicitly also runs the
/// [`crate::reconcile::full_oneway`] companion in the opposite direction (see [`Mapping`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Full,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Account {
    Caldav {
        name: String,
        url: String,
        username: String,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        password_cmd: Option<String>,
    },
    Google {
        name: String,
        credentials_path: String,
        token_path: String,
    },
}

impl Account {
    pub fn name(&self) -> &str {
        match self {
            Account::Caldav { name, .. } => name,
            Account::Google { name, .. } => name,
        }
    }

    /// Resolve the CalDAV password, running `password_cmd` through the shell when `password`
    /// itself was not given directly.
    fn resolve_password(&self) -> Result<Option<String>> {
        match self {
            Account::Caldav { password: Some(p), .. } => Ok(Some(p.clone())),
            Account::Caldav { password_cmd: Some(cmd), .. } => {
                let output = std::process::Command::new("sh").arg("-c").arg(cmd).output()?;
                if !output.status.success() {
                    return Err(SyncError::Config(format!("password_cmd for account failed: {}", cmd)));
                }
                let password = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok(Some(password))
            }
            Account::Caldav { .. } => Ok(None),
            Account::Google { .. } => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRef {
    pub account: String,
    pub calendar: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub source: CalendarRef,
    pub target: CalendarRef,
    #[serde(default = "default_mode")]
    pub mode: Mode,
}

fn default_mode() -> Mode {
    Mode::Full
}

impl Mapping {
    /// The stable identity of this mapping, used to derive state file names
    pub fn identity(&self, mode: Mode) -> String {
        let tag = match mode {
            Mode::Full => "full",
            Mode::Busy => "busy",
        };
        format!(
            "{}__{}__{}__{}__{}",
            self.source.account, self.source.calendar, self.target.account, self.target.calendar, tag
        )
    }

    /// The companion FULL_ONEWAY state identity, reversed (target -> source), used by busy mode
    pub fn companion_identity(&self) -> String {
        format!(
            "{}__{}__{}__{}__full",
            self.target.account, self.target.calendar, self.source.account, self.source.calendar
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(default)]
    state_dir: Option<String>,
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    sync: RawSync,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawSync {
    #[serde(default)]
    mappings: Vec<Mapping>,
}

/// The fully loaded and validated configuration
pub struct Config {
    pub state_dir: PathBuf,
    pub accounts: HashMap<String, Account>,
    pub mappings: Vec<Mapping>,
    pub passwords: HashMap<String, String>,
}

/// Resolve the config file path: `$SYNC_CONFIG` if set, else the platform config dir.
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SYNC_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let dirs = directories::ProjectDirs::from("", "", "calsync")
        .ok_or_else(|| SyncError::Config("could not determine a config directory for this platform".into()))?;
    Ok(dirs.config_dir().join("config.toml"))
}

fn default_state_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "calsync")
        .ok_or_else(|| SyncError::Config("could not determine a data directory for this platform".into()))?;
    Ok(dirs.data_dir().join("state"))
}

/// Load and validate configuration from `path`
pub fn load(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path).map_err(|err| SyncError::Config(format!("could not read {}: {}", path.display(), err)))?;
    load_str(&text)
}

/// Load and validate configuration from a TOML string, the shape it takes on disk.
pub fn load_str(text: &str) -> Result<Config> {
    let raw: RawConfig = toml::from_str(text).map_err(|err| SyncError::Config(format!("malformed config: {}", err)))?;

    let mut accounts = HashMap::new();
    for account in raw.accounts {
        if accounts.contains_key(account.name()) {
            return Err(SyncError::Config(format!("duplicate account name '{}'", account.name())));
        }
        accounts.insert(account.name().to_string(), account);
    }

    if raw.sync.mappings.is_empty() {
        return Err(SyncError::Config("no sync mappings defined".into()));
    }

    for mapping in &raw.sync.mappings {
        for account_name in [&mapping.source.account, &mapping.target.account] {
            if !accounts.contains_key(account_name) {
                return Err(SyncError::Config(format!("mapping references unknown account '{}'", account_name)));
            }
        }
    }

    let mut passwords = HashMap::new();
    for account in accounts.values() {
        if let Some(password) = account.resolve_password()? {
            passwords.insert(account.name().to_string(), password);
        }
    }

    let state_dir = match raw.state_dir {
        Some(dir) => PathBuf::from(shellexpand::tilde(&dir).into_owned()),
        None => default_state_dir()?,
    };

    Ok(Config {
        state_dir,
        accounts,
        mappings: raw.sync.mappings,
        passwords,
    })
}
