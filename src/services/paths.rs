//! Path variables such as `%GAME_DIR%` and `%MO_PROFILE%`.
//!
//! Every path stored in the schema or in `config.json` starts with exactly one
//! variable token. The [`PathVariableTable`] maps the tokens known in this run
//! to absolute paths and resolves templates against them, refusing anything
//! that climbs out of the token's own directory.
//!
//! Tokens are built in a fixed order, each one only from tokens built before
//! it:
//!
//! 1. `GAME_DIR`, `DOCUMENTS` from the anchor paths
//! 2. `DOCS_GAME` from `documentsPath`
//! 3. `MO_DIR`, `MO_INI` from the `modOrganizer` block
//! 4. `MO_MODS`, `MO_PROFILE` from `ModOrganizer.ini`

use crate::adapters::{Codec, IniDocument};
use crate::error::{IoError, read_file};
use crate::models::{LauncherConfig, ModOrganizerConfig};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static LEADING_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%([A-Z_]+)%").expect("Invalid path variable regex"));

const MO_BASE_DIR: &str = "%BASE_DIR%";
const MO_DEFAULT_PROFILE: &str = "Default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathVariable {
    GameDir,
    Documents,
    DocsGame,
    MoDir,
    MoIni,
    MoMods,
    MoProfile,
}

impl PathVariable {
    pub const ALL: [PathVariable; 7] = [
        Self::GameDir,
        Self::Documents,
        Self::DocsGame,
        Self::MoDir,
        Self::MoIni,
        Self::MoMods,
        Self::MoProfile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::GameDir => "GAME_DIR",
            Self::Documents => "DOCUMENTS",
            Self::DocsGame => "DOCS_GAME",
            Self::MoDir => "MO_DIR",
            Self::MoIni => "MO_INI",
            Self::MoMods => "MO_MODS",
            Self::MoProfile => "MO_PROFILE",
        }
    }

    /// The token as written in templates, e.g. `%GAME_DIR%`.
    pub fn token(self) -> String {
        format!("%{}%", self.name())
    }

    pub fn is_mod_organizer(self) -> bool {
        matches!(
            self,
            Self::MoDir | Self::MoIni | Self::MoMods | Self::MoProfile
        )
    }
}

impl fmt::Display for PathVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PathVariable {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.name() == s).ok_or(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Path '{path}' does not start with a path variable")]
    MissingVariable { path: String },

    #[error("Unknown path variable %{variable}% in '{path}'")]
    UnknownVariable { path: String, variable: String },

    #[error("Path variable in '{path}' must be followed by a separator")]
    Malformed { path: String },

    #[error("Path '{path}' points outside of '{root}'")]
    NotAvailable { path: String, root: String },
}

/// OS-provided starting points for path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorPaths {
    /// Launcher working directory, i.e. the game folder.
    pub game_dir: Utf8PathBuf,
    /// The user's documents folder.
    pub documents: Utf8PathBuf,
}

impl AnchorPaths {
    /// Anchors of the running process: the working directory and the
    /// platform documents folder (the home directory when there is none).
    pub fn from_environment() -> anyhow::Result<Self> {
        use anyhow::Context;

        let cwd = std::env::current_dir().context("Failed to read working directory")?;
        let game_dir = Utf8PathBuf::try_from(cwd).context("Working directory is not UTF-8")?;
        let documents = dirs::document_dir()
            .or_else(dirs::home_dir)
            .context("Failed to locate the documents folder")?;
        let documents = Utf8PathBuf::try_from(documents).context("Documents folder is not UTF-8")?;

        Ok(Self {
            game_dir,
            documents,
        })
    }
}

/// Values read from Mod Organizer's own `ModOrganizer.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModOrganizerSettings {
    pub selected_profile: Option<String>,
    /// `[Settings] mod_directory`; may contain `%BASE_DIR%`.
    pub mod_directory: Option<String>,
    /// `[Settings] profiles_directory`; may contain `%BASE_DIR%`.
    pub profiles_directory: Option<String>,
}

impl ModOrganizerSettings {
    pub fn from_ini(text: &str) -> Self {
        let ini = IniDocument::parse(text);
        let read = |section: &str, key: &str| {
            ini.value(section, key)
                .ok()
                .map(unwrap_byte_array)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            selected_profile: read("General", "selected_profile"),
            mod_directory: read("Settings", "mod_directory"),
            profiles_directory: read("Settings", "profiles_directory"),
        }
    }

    pub async fn load(path: &Utf8Path) -> Result<Self, IoError> {
        let bytes = read_file(path).await?;
        let text = match Codec::for_label("utf-8") {
            Ok(codec) => codec.decode(&bytes),
            Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
        };
        Ok(Self::from_ini(&text))
    }
}

/// Mod Organizer 2 stores strings as `@ByteArray(...)`.
fn unwrap_byte_array(value: &str) -> &str {
    value
        .strip_prefix("@ByteArray(")
        .and_then(|v| v.strip_suffix(')'))
        .unwrap_or(value)
}

/// Resolved path variables of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVariableTable {
    values: IndexMap<PathVariable, String>,
    active_profile: Option<String>,
}

impl PathVariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build `GAME_DIR`, `DOCUMENTS`, `DOCS_GAME` and, when Mod Organizer is
    /// used, `MO_DIR` and `MO_INI`.
    ///
    /// `MO_MODS` and `MO_PROFILE` need `ModOrganizer.ini` and are added by
    /// [`apply_mod_organizer`](Self::apply_mod_organizer).
    pub fn from_anchors(anchors: &AnchorPaths, config: &LauncherConfig) -> Result<Self, PathError> {
        let mut table = Self::new();
        table.insert(PathVariable::GameDir, anchors.game_dir.as_str());
        table.insert(PathVariable::Documents, anchors.documents.as_str());

        if !config.documents_path.trim().is_empty() {
            let docs_game = table.resolve(config.documents_path.trim())?;
            table.insert(PathVariable::DocsGame, docs_game.as_str());
        }

        if config.mod_organizer.is_used {
            let mo = &config.mod_organizer;
            let mo_dir = table.resolve(&mo.path_to_mo_folder)?;
            table.insert(PathVariable::MoDir, mo_dir.as_str());
            let mo_ini = table.resolve(&mo.path_to_ini)?;
            table.insert(PathVariable::MoIni, mo_ini.as_str());
        }

        tracing::debug!("Path variables: {:?}", table.values);
        Ok(table)
    }

    /// Add `MO_MODS` and `MO_PROFILE` from Mod Organizer's own settings.
    pub fn apply_mod_organizer(
        &mut self,
        config: &ModOrganizerConfig,
        settings: &ModOrganizerSettings,
    ) -> Result<(), PathError> {
        let mo_dir = self
            .get(PathVariable::MoDir)
            .map(str::to_string)
            .ok_or_else(|| PathError::UnknownVariable {
                path: config.path_to_mods.clone(),
                variable: PathVariable::MoDir.name().to_string(),
            })?;

        let mods = match &settings.mod_directory {
            Some(dir) => dir.replace(MO_BASE_DIR, &mo_dir),
            None => self.resolve(&config.path_to_mods)?.into_string(),
        };
        let profiles = match &settings.profiles_directory {
            Some(dir) => dir.replace(MO_BASE_DIR, &mo_dir),
            None => self.resolve(&config.path_to_profiles)?.into_string(),
        };

        let profile = match &settings.selected_profile {
            Some(profile) => profile.clone(),
            None => {
                tracing::warn!(
                    "No selected profile in ModOrganizer.ini, using '{}'",
                    MO_DEFAULT_PROFILE
                );
                MO_DEFAULT_PROFILE.to_string()
            }
        };

        self.insert(PathVariable::MoMods, &mods);
        self.insert(PathVariable::MoProfile, &join(&profiles, &profile));
        tracing::info!("Mod Organizer profile: {}", profile);
        self.active_profile = Some(profile);
        Ok(())
    }

    /// Drop every Mod Organizer token.
    pub fn clear_mod_organizer(&mut self) {
        self.values.retain(|variable, _| !variable.is_mod_organizer());
        self.active_profile = None;
    }

    pub fn insert(&mut self, variable: PathVariable, value: &str) {
        self.values.insert(variable, value.to_string());
    }

    pub fn get(&self, variable: PathVariable) -> Option<&str> {
        self.values.get(&variable).map(String::as_str)
    }

    pub fn contains(&self, variable: PathVariable) -> bool {
        self.values.contains_key(&variable)
    }

    pub fn active_profile(&self) -> Option<&str> {
        self.active_profile.as_deref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PathVariable, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Whether `raw` starts with a token of a variable present in the table.
    pub fn has_known_token(&self, raw: &str) -> bool {
        leading_variable(raw)
            .and_then(|name| name.parse::<PathVariable>().ok())
            .is_some_and(|v| self.contains(v))
    }

    /// Resolve a template such as `%DOCS_GAME%\Skyrim.ini`.
    ///
    /// The token is substituted and the remainder appended unchanged, so
    /// `%MO_DIR%\mods\x.ini` with `MO_DIR = C:\G\MO` becomes
    /// `C:\G\MO\mods\x.ini`.
    ///
    /// # Errors
    ///
    /// - [`PathError::MissingVariable`] if `raw` has no leading token
    /// - [`PathError::UnknownVariable`] if the token is not in the table
    /// - [`PathError::Malformed`] if the token is not followed by a separator
    /// - [`PathError::NotAvailable`] if `..` segments leave the token's folder
    pub fn resolve(&self, raw: &str) -> Result<Utf8PathBuf, PathError> {
        let name = leading_variable(raw).ok_or_else(|| PathError::MissingVariable {
            path: raw.to_string(),
        })?;

        let root = name
            .parse::<PathVariable>()
            .ok()
            .and_then(|v| self.get(v))
            .ok_or_else(|| PathError::UnknownVariable {
                path: raw.to_string(),
                variable: name.to_string(),
            })?;

        let rest = &raw[name.len() + 2..];
        if !(rest.is_empty() || rest.starts_with(['/', '\\'])) {
            return Err(PathError::Malformed {
                path: raw.to_string(),
            });
        }

        let resolved = format!("{}{}", root, rest);
        if !within_allowed_root(&resolved, root) {
            return Err(PathError::NotAvailable {
                path: raw.to_string(),
                root: root.to_string(),
            });
        }

        Ok(Utf8PathBuf::from(resolved))
    }

    /// [`resolve`](Self::resolve), with separators converted for the host.
    pub fn resolve_native(&self, raw: &str) -> Result<Utf8PathBuf, PathError> {
        self.resolve(raw).map(|p| to_native(p.as_str()))
    }
}

fn leading_variable(raw: &str) -> Option<&str> {
    LEADING_TOKEN
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Whether `resolved` stays inside `root` once `.` and `..` are applied.
/// Both `/` and `\` count as separators; comparison ignores ASCII case.
pub fn within_allowed_root(resolved: &str, root: &str) -> bool {
    let (Some(resolved), Some(root)) = (normalize(resolved), normalize(root)) else {
        return false;
    };
    resolved.len() >= root.len()
        && root
            .iter()
            .zip(&resolved)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

/// Whether two paths name the same file, ignoring separators and ASCII case.
pub fn same_location(a: &str, b: &str) -> bool {
    match (normalize(a), normalize(b)) {
        (Some(a), Some(b)) => {
            a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.eq_ignore_ascii_case(y))
        }
        _ => false,
    }
}

/// Lexical normalization; `None` if `..` climbs above the first component.
fn normalize(path: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts)
}

fn join(base: &str, name: &str) -> String {
    let separator = if base.contains('\\') { '\\' } else { '/' };
    format!(
        "{}{}{}",
        base.trim_end_matches(['/', '\\']),
        separator,
        name
    )
}

/// Convert a resolved path to the host's separator.
pub fn to_native(path: &str) -> Utf8PathBuf {
    if cfg!(windows) {
        Utf8PathBuf::from(path.replace('/', "\\"))
    } else {
        Utf8PathBuf::from(path.replace('\\', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(PathVariable, &str)]) -> PathVariableTable {
        let mut table = PathVariableTable::new();
        for (variable, value) in entries {
            table.insert(*variable, value);
        }
        table
    }

    #[test]
    fn test_resolve_mod_organizer_path() {
        let table = table(&[
            (PathVariable::GameDir, "C:\\G"),
            (PathVariable::MoDir, "C:\\G\\MO"),
        ]);

        let resolved = table.resolve("%MO_DIR%\\mods\\x.ini").unwrap();
        assert_eq!(resolved.as_str(), "C:\\G\\MO\\mods\\x.ini");
        assert_eq!(table.resolve("%GAME_DIR%").unwrap().as_str(), "C:\\G");
    }

    #[test]
    fn test_resolve_errors() {
        let table = table(&[(PathVariable::GameDir, "C:\\G")]);

        assert!(matches!(
            table.resolve("%FOO%\\x"),
            Err(PathError::UnknownVariable { ref variable, .. }) if variable == "FOO"
        ));
        assert!(matches!(
            table.resolve("%MO_DIR%\\x"),
            Err(PathError::UnknownVariable { .. })
        ));
        assert!(matches!(
            table.resolve("C:\\G\\x"),
            Err(PathError::MissingVariable { .. })
        ));
        assert!(matches!(
            table.resolve("%GAME_DIR%x"),
            Err(PathError::Malformed { .. })
        ));
        assert!(matches!(
            table.resolve("%GAME_DIR%\\..\\Windows\\x.ini"),
            Err(PathError::NotAvailable { .. })
        ));
        assert!(table.resolve("%GAME_DIR%\\Data\\..\\x.ini").is_ok());
    }

    #[test]
    fn test_within_allowed_root() {
        assert!(within_allowed_root("C:\\G\\a\\.\\b", "C:\\G"));
        assert!(within_allowed_root("c:/g/a", "C:\\G"));
        assert!(!within_allowed_root("C:\\G\\..\\H", "C:\\G"));
        assert!(!within_allowed_root("C:\\Games", "C:\\G"));
        assert!(!within_allowed_root("..\\..", "C:\\G"));
    }

    #[test]
    fn test_same_location() {
        assert!(same_location("C:\\G\\Prefs.ini", "c:/g/sub/../Prefs.INI"));
        assert!(!same_location("C:\\G\\Prefs.ini", "C:\\G\\User.ini"));
        assert!(!same_location("C:\\G", "C:\\G\\Prefs.ini"));
    }

    #[test]
    fn test_from_anchors_build_order() {
        let anchors = AnchorPaths {
            game_dir: Utf8PathBuf::from("C:\\Games\\Skyrim"),
            documents: Utf8PathBuf::from("C:\\Users\\me\\Documents"),
        };
        let mut config = LauncherConfig {
            documents_path: "%DOCUMENTS%\\My Games\\Skyrim".to_string(),
            ..LauncherConfig::default()
        };

        let table = PathVariableTable::from_anchors(&anchors, &config).unwrap();
        assert_eq!(
            table.get(PathVariable::DocsGame),
            Some("C:\\Users\\me\\Documents\\My Games\\Skyrim")
        );
        assert!(!table.contains(PathVariable::MoDir));

        config.mod_organizer.is_used = true;
        let table = PathVariableTable::from_anchors(&anchors, &config).unwrap();
        assert_eq!(
            table.get(PathVariable::MoDir),
            Some("C:\\Games\\Skyrim\\Mod Organizer")
        );
        assert_eq!(
            table.get(PathVariable::MoIni),
            Some("C:\\Games\\Skyrim\\Mod Organizer\\ModOrganizer.ini")
        );
    }

    #[test]
    fn test_documents_path_may_not_use_later_tokens() {
        let anchors = AnchorPaths {
            game_dir: Utf8PathBuf::from("/games/skyrim"),
            documents: Utf8PathBuf::from("/home/me/Documents"),
        };
        let config = LauncherConfig {
            documents_path: "%MO_PROFILE%/x".to_string(),
            ..LauncherConfig::default()
        };
        assert!(matches!(
            PathVariableTable::from_anchors(&anchors, &config),
            Err(PathError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_mod_organizer_settings() {
        let ini = "[General]\nselected_profile=@ByteArray(Survival)\n\n[Settings]\nmod_directory=%BASE_DIR%/my-mods\n";
        let settings = ModOrganizerSettings::from_ini(ini);

        assert_eq!(settings.selected_profile.as_deref(), Some("Survival"));
        assert_eq!(settings.mod_directory.as_deref(), Some("%BASE_DIR%/my-mods"));
        assert_eq!(settings.profiles_directory, None);

        let mut table = table(&[
            (PathVariable::GameDir, "C:\\G"),
            (PathVariable::MoDir, "C:\\G\\MO"),
        ]);
        table
            .apply_mod_organizer(&ModOrganizerConfig::default(), &settings)
            .unwrap();

        assert_eq!(table.get(PathVariable::MoMods), Some("C:\\G\\MO/my-mods"));
        assert_eq!(
            table.get(PathVariable::MoProfile),
            Some("C:\\G\\MO\\profiles\\Survival")
        );
        assert_eq!(table.active_profile(), Some("Survival"));

        table.clear_mod_organizer();
        assert!(!table.contains(PathVariable::MoDir));
        assert!(table.contains(PathVariable::GameDir));
        assert_eq!(table.active_profile(), None);
    }

    #[test]
    fn test_plain_profile_name() {
        let settings = ModOrganizerSettings::from_ini("[General]\nselected_profile=Default\n");
        assert_eq!(settings.selected_profile.as_deref(), Some("Default"));
    }

    #[test]
    fn test_load_mod_organizer_settings_from_disk() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().join("ModOrganizer.ini")).unwrap();
        std::fs::write(
            &path,
            "[General]\r\nselected_profile=@ByteArray(Survival)\r\n[Settings]\r\nmod_directory=D:/Mods\r\n",
        )
        .unwrap();

        let settings = tokio_test::block_on(ModOrganizerSettings::load(&path)).unwrap();
        assert_eq!(settings.selected_profile.as_deref(), Some("Survival"));
        assert_eq!(settings.mod_directory.as_deref(), Some("D:/Mods"));
        assert_eq!(settings.profiles_directory, None);

        let missing = tokio_test::block_on(ModOrganizerSettings::load(&path.with_file_name("none.ini")));
        assert!(missing.unwrap_err().is_not_found());
    }

    #[test]
    fn test_has_known_token() {
        let table = table(&[(PathVariable::GameDir, "/g")]);
        assert!(table.has_known_token("%GAME_DIR%/x"));
        assert!(!table.has_known_token("%DOCS_GAME%/x"));
        assert!(!table.has_known_token("/g/x"));
    }

    #[test]
    fn test_to_native() {
        let native = to_native("/tmp/game\\Data\\x.ini");
        if cfg!(windows) {
            assert_eq!(native.as_str(), "\\tmp\\game\\Data\\x.ini");
        } else {
            assert_eq!(native.as_str(), "/tmp/game/Data/x.ini");
        }
    }
}
