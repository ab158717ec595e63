use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Files: projections produced by the path sandbox
// ---------------------------------------------------------------------------

/// Coarse classification of a directory entry, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Folder,
    Jar,
    Yaml,
    Json,
    Properties,
    Text,
    Log,
    Config,
    File,
}

impl FileKind {
    /// Classify by lowercase extension including the dot (".yml").
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            ".jar" => FileKind::Jar,
            ".yml" | ".yaml" => FileKind::Yaml,
            ".json" => FileKind::Json,
            ".properties" => FileKind::Properties,
            ".txt" => FileKind::Text,
            ".log" => FileKind::Log,
            ".conf" | ".cfg" | ".toml" => FileKind::Config,
            _ => FileKind::File,
        }
    }
}

/// Extensions the control panel may open in its text editor.
pub const EDITABLE_EXTENSIONS: &[&str] = &[
    ".txt",
    ".yml",
    ".yaml",
    ".json",
    ".properties",
    ".log",
    ".conf",
    ".cfg",
    ".toml",
];

/// One child of a listed directory. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub is_directory: bool,
    /// Root-relative, always `/`-separated.
    pub path: String,
    pub size: u64,
    /// Epoch milliseconds; 0 for directories or unreadable metadata.
    pub modified: u64,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub editable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    pub items: Vec<FileEntry>,
    pub current_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub content: String,
    pub encoding: ContentEncoding,
    pub size: u64,
    pub modified: u64,
    pub is_text: bool,
}

// ---------------------------------------------------------------------------
// Host records: plain data handed out by the host collaborator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub uuid: String,
    pub name: String,
    pub online: bool,
    /// Epoch milliseconds of the last time the player was seen online.
    pub last_seen: u64,
    /// Seconds played.
    pub play_time: u64,
    pub banned: bool,
    pub op: bool,
}

/// Name/uuid pair used by the whitelist, ban list and operator list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListEntry {
    pub name: String,
    pub uuid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub author: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldInfo {
    pub name: String,
    pub environment: String,
    pub seed: i64,
    pub difficulty: String,
    pub pvp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub minecraft_version: String,
    pub online_mode: bool,
    pub max_players: u32,
    pub current_players: usize,
    pub port: u16,
    pub ip: String,
    pub motd: String,
    pub whitelist_enabled: bool,
    pub allow_flight: bool,
    pub allow_nether: bool,
    pub allow_end: bool,
    pub worlds: Vec<WorldInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub properties: BTreeMap<String, serde_json::Value>,
    pub gamerules: BTreeMap<String, String>,
}

/// One periodic metrics sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Epoch milliseconds.
    pub timestamp: u64,
    pub players: usize,
    pub tps: f64,
    pub memory: f64,
    pub cpu: f64,
}

// ---------------------------------------------------------------------------
// PlayerAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerAction {
    Ban,
    Unban,
    Kick,
    Op,
    Deop,
}

impl FromStr for PlayerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ban" => Ok(PlayerAction::Ban),
            "unban" => Ok(PlayerAction::Unban),
            "kick" => Ok(PlayerAction::Kick),
            "op" => Ok(PlayerAction::Op),
            "deop" => Ok(PlayerAction::Deop),
            other => Err(format!("Unknown action: {}", other)),
        }
    }
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlayerAction::Ban => "ban",
            PlayerAction::Unban => "unban",
            PlayerAction::Kick => "kick",
            PlayerAction::Op => "op",
            PlayerAction::Deop => "deop",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Epoch milliseconds for a file modification time, 0 when unavailable.
pub fn system_time_millis(time: std::time::SystemTime) -> u64 {
    time.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
