//! In-process host model used when the service runs standalone.
//!
//! Only [`HostLoop`](crate::HostLoop) mutates a model; everything else reads
//! published clones of it.

use crate::command::HostCommand;
use crate::logs::LogHub;
use mccontrol_core::{
    now_millis, ListEntry, PlayerAction, PlayerRecord, PluginInfo, ServerInfo, Settings,
    WorldInfo,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const STATE_FILE: &str = "host-state.json";

const KICK_REASON: &str = "Kicked via MC Control";
const BAN_REASON: &str = "Banned via MC Control";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GameRuleValue {
    Bool(bool),
    Int(i64),
}

impl GameRuleValue {
    /// Parse `raw` as the same kind of value as `self`.
    fn parse_like(&self, raw: &str) -> Option<GameRuleValue> {
        match self {
            GameRuleValue::Bool(_) => match raw.trim() {
                "true" => Some(GameRuleValue::Bool(true)),
                "false" => Some(GameRuleValue::Bool(false)),
                _ => None,
            },
            GameRuleValue::Int(_) => raw.trim().parse().ok().map(GameRuleValue::Int),
        }
    }
}

impl fmt::Display for GameRuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameRuleValue::Bool(b) => write!(f, "{}", b),
            GameRuleValue::Int(i) => write!(f, "{}", i),
        }
    }
}

const DEFAULT_GAMERULES: &[(&str, GameRuleValue)] = &[
    ("announceAdvancements", GameRuleValue::Bool(true)),
    ("commandBlockOutput", GameRuleValue::Bool(true)),
    ("disableElytraMovementCheck", GameRuleValue::Bool(false)),
    ("disableRaids", GameRuleValue::Bool(false)),
    ("doDaylightCycle", GameRuleValue::Bool(true)),
    ("doEntityDrops", GameRuleValue::Bool(true)),
    ("doFireTick", GameRuleValue::Bool(true)),
    ("doImmediateRespawn", GameRuleValue::Bool(false)),
    ("doInsomnia", GameRuleValue::Bool(true)),
    ("doLimitedCrafting", GameRuleValue::Bool(false)),
    ("doMobLoot", GameRuleValue::Bool(true)),
    ("doMobSpawning", GameRuleValue::Bool(true)),
    ("doPatrolSpawning", GameRuleValue::Bool(true)),
    ("doTileDrops", GameRuleValue::Bool(true)),
    ("doTraderSpawning", GameRuleValue::Bool(true)),
    ("doWeatherCycle", GameRuleValue::Bool(true)),
    ("drowningDamage", GameRuleValue::Bool(true)),
    ("fallDamage", GameRuleValue::Bool(true)),
    ("fireDamage", GameRuleValue::Bool(true)),
    ("forgiveDeadPlayers", GameRuleValue::Bool(true)),
    ("freezeDamage", GameRuleValue::Bool(true)),
    ("keepInventory", GameRuleValue::Bool(false)),
    ("logAdminCommands", GameRuleValue::Bool(true)),
    ("maxCommandChainLength", GameRuleValue::Int(65536)),
    ("maxEntityCramming", GameRuleValue::Int(24)),
    ("mobGriefing", GameRuleValue::Bool(true)),
    ("naturalRegeneration", GameRuleValue::Bool(true)),
    ("playersSleepingPercentage", GameRuleValue::Int(100)),
    ("randomTickSpeed", GameRuleValue::Int(3)),
    ("reducedDebugInfo", GameRuleValue::Bool(false)),
    ("sendCommandFeedback", GameRuleValue::Bool(true)),
    ("showDeathMessages", GameRuleValue::Bool(true)),
    ("spawnRadius", GameRuleValue::Int(10)),
    ("spectatorsGenerateChunks", GameRuleValue::Bool(true)),
    ("universalAnger", GameRuleValue::Bool(false)),
];

fn default_properties() -> BTreeMap<String, Value> {
    let defaults = [
        ("motd", json!("A Minecraft Server")),
        ("max-players", json!(20)),
        ("online-mode", json!(true)),
        ("allow-flight", json!(false)),
        ("allow-nether", json!(true)),
        ("allow-end", json!(true)),
        ("difficulty", json!("easy")),
        ("gamemode", json!("survival")),
        ("pvp", json!(true)),
        ("whitelist", json!(false)),
        ("server-ip", json!("")),
        ("server-port", json!(25565)),
        ("spawn-protection", json!(16)),
        ("view-distance", json!(10)),
    ];
    defaults
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn default_worlds() -> Vec<WorldInfo> {
    let seed = now_millis() as i64;
    [
        ("world", "NORMAL"),
        ("world_nether", "NETHER"),
        ("world_the_end", "THE_END"),
    ]
    .into_iter()
    .map(|(name, environment)| WorldInfo {
        name: name.to_string(),
        environment: environment.to_string(),
        seed,
        difficulty: "EASY".to_string(),
        pvp: true,
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub name: String,
    pub online: bool,
    pub last_seen: u64,
    /// Seconds, not counting the current session.
    pub play_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_start: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostModel {
    pub server_name: String,
    pub version: String,
    pub minecraft_version: String,
    /// Keyed by UUID.
    pub players: BTreeMap<String, PlayerState>,
    /// UUID to name.
    pub whitelist: BTreeMap<String, String>,
    pub banned: BTreeMap<String, String>,
    pub operators: BTreeMap<String, String>,
    pub properties: BTreeMap<String, Value>,
    pub gamerules: BTreeMap<String, GameRuleValue>,
    pub worlds: Vec<WorldInfo>,
}

impl Default for HostModel {
    fn default() -> Self {
        Self {
            server_name: "MCControl".to_string(),
            version: concat!("mccontrol ", env!("CARGO_PKG_VERSION")).to_string(),
            minecraft_version: "1.21.1".to_string(),
            players: BTreeMap::new(),
            whitelist: BTreeMap::new(),
            banned: BTreeMap::new(),
            operators: BTreeMap::new(),
            properties: default_properties(),
            gamerules: DEFAULT_GAMERULES
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            worlds: default_worlds(),
        }
    }
}

/// What applying one command did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    /// Persisted state changed.
    pub changed: bool,
    /// The host should stop.
    pub stop: bool,
}

impl Applied {
    fn changed(changed: bool) -> Self {
        Self {
            changed,
            stop: false,
        }
    }

    fn stop() -> Self {
        Self {
            changed: false,
            stop: true,
        }
    }
}

impl HostModel {
    /// Load `host-state.json`; a missing or unreadable file yields the
    /// default model. Players are never online after a reload.
    pub fn load(path: &Path) -> Self {
        let mut model = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<HostModel>(&raw) {
                Ok(model) => {
                    info!(path = %path.display(), players = model.players.len(), "host state loaded");
                    model
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "host state unreadable, using defaults");
                    HostModel::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HostModel::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read host state, using defaults");
                HostModel::default()
            }
        };

        for player in model.players.values_mut() {
            player.online = false;
            player.session_start = None;
        }
        for (name, value) in DEFAULT_GAMERULES {
            model.gamerules.entry(name.to_string()).or_insert(*value);
        }
        for (name, value) in default_properties() {
            model.properties.entry(name).or_insert(value);
        }
        if model.worlds.is_empty() {
            model.worlds = default_worlds();
        }
        model
    }

    pub fn apply(&mut self, command: HostCommand, logs: &LogHub) -> Applied {
        match command {
            HostCommand::Player { uuid, action } => {
                Applied::changed(self.player_action(&uuid, action, logs))
            }
            HostCommand::WhitelistAdd(entry) => {
                let name = self.entry_name(&entry);
                logs.console(format!("Added {} to the whitelist", name));
                Applied::changed(self.whitelist.insert(entry.uuid, name).is_none())
            }
            HostCommand::WhitelistRemove { uuid } => {
                let removed = self.whitelist.remove(&uuid);
                if let Some(name) = &removed {
                    logs.console(format!("Removed {} from the whitelist", name));
                }
                Applied::changed(removed.is_some())
            }
            HostCommand::BanAdd(entry) => {
                let uuid = entry.uuid.clone();
                if entry.name.trim().is_empty() {
                    Applied::changed(self.player_action(&uuid, PlayerAction::Ban, logs))
                } else {
                    self.banned.insert(uuid.clone(), entry.name.clone());
                    self.disconnect(&uuid, BAN_REASON, logs);
                    logs.console(format!("Banned {}: {}", entry.name, BAN_REASON));
                    Applied::changed(true)
                }
            }
            HostCommand::BanRemove { uuid } => {
                Applied::changed(self.player_action(&uuid, PlayerAction::Unban, logs))
            }
            HostCommand::OpAdd(entry) => {
                let name = self.entry_name(&entry);
                logs.console(format!("Made {} a server operator", name));
                Applied::changed(self.operators.insert(entry.uuid, name).is_none())
            }
            HostCommand::OpRemove { uuid } => {
                Applied::changed(self.player_action(&uuid, PlayerAction::Deop, logs))
            }
            HostCommand::Console { command } => self.dispatch_console(&command, logs),
            HostCommand::Chat { message } => self.send_chat(&message, logs),
            HostCommand::UpdateProperties(properties) => {
                Applied::changed(self.update_properties(properties))
            }
            HostCommand::UpdateGameRules(rules) => Applied::changed(self.update_gamerules(rules)),
            HostCommand::PlayerJoined(entry) => Applied::changed(self.join(entry, logs)),
            HostCommand::PlayerLeft { uuid } => {
                let changed = match self.players.get(&uuid) {
                    Some(player) if player.online => {
                        let name = player.name.clone();
                        self.disconnect(&uuid, "", logs);
                        logs.console(format!("[QUIT] {} left the game", name));
                        true
                    }
                    _ => false,
                };
                Applied::changed(changed)
            }
            HostCommand::PlayerChat { uuid, message } => {
                let name = self.name_of(&uuid);
                logs.chat(format!("<{}> {}", name, message));
                Applied::default()
            }
            HostCommand::Shutdown => {
                logs.console("Stopping the server");
                Applied::stop()
            }
        }
    }

    fn player_action(&mut self, uuid: &str, action: PlayerAction, logs: &LogHub) -> bool {
        let name = self.name_of(uuid);
        match action {
            PlayerAction::Ban => {
                self.banned.insert(uuid.to_string(), name.clone());
                self.disconnect(uuid, BAN_REASON, logs);
                logs.console(format!("Banned {}: {}", name, BAN_REASON));
                true
            }
            PlayerAction::Unban => {
                let removed = self.banned.remove(uuid).is_some();
                if removed {
                    logs.console(format!("Unbanned {}", name));
                }
                removed
            }
            PlayerAction::Kick => {
                let kicked = self.disconnect(uuid, KICK_REASON, logs);
                if kicked {
                    logs.console(format!("Kicked {}: {}", name, KICK_REASON));
                }
                kicked
            }
            PlayerAction::Op => {
                logs.console(format!("Made {} a server operator", name));
                self.operators.insert(uuid.to_string(), name).is_none()
            }
            PlayerAction::Deop => {
                let removed = self.operators.remove(uuid).is_some();
                if removed {
                    logs.console(format!("Made {} no longer a server operator", name));
                }
                removed
            }
        }
    }

    /// Mark an online player offline, crediting the session's play time.
    /// Returns whether the player was online.
    fn disconnect(&mut self, uuid: &str, reason: &str, logs: &LogHub) -> bool {
        let Some(player) = self.players.get_mut(uuid) else {
            return false;
        };
        if !player.online {
            return false;
        }
        let now = now_millis();
        if let Some(start) = player.session_start.take() {
            player.play_time += now.saturating_sub(start) / 1000;
        }
        player.online = false;
        player.last_seen = now;
        if !reason.is_empty() {
            logs.console(format!("{} lost connection: {}", player.name, reason));
        }
        logs.chat(format!("[-] {} left the server", player.name));
        true
    }

    fn join(&mut self, entry: ListEntry, logs: &LogHub) -> bool {
        let name = self.entry_name(&entry);
        if self.banned.contains_key(&entry.uuid) {
            logs.console(format!("{} was refused: banned", name));
            return false;
        }
        if self.whitelist_enabled() && !self.whitelist.contains_key(&entry.uuid) {
            logs.console(format!("{} was refused: not whitelisted", name));
            return false;
        }

        let now = now_millis();
        let player = self
            .players
            .entry(entry.uuid)
            .or_insert_with(|| PlayerState {
                name: name.clone(),
                online: false,
                last_seen: now,
                play_time: 0,
                session_start: None,
            });
        if player.online {
            return false;
        }
        player.name = name.clone();
        player.online = true;
        player.last_seen = now;
        player.session_start = Some(now);

        logs.console(format!("[JOIN] {} joined the game", name));
        logs.chat(format!("[+] {} joined the server", name));
        true
    }

    fn send_chat(&mut self, message: &str, logs: &LogHub) -> Applied {
        if message.starts_with('/') {
            logs.chat(format!("[Server executed: {}]", message));
            self.dispatch_console(message, logs)
        } else {
            logs.chat(format!("[Server] {}", message));
            Applied::default()
        }
    }

    /// The standalone console: a handful of vanilla commands acting on the
    /// model. Targets are looked up by player name.
    fn dispatch_console(&mut self, line: &str, logs: &LogHub) -> Applied {
        let line = line.trim().trim_start_matches('/');
        if line.is_empty() {
            return Applied::default();
        }
        logs.console(format!("Console issued server command: /{}", line));

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb.to_ascii_lowercase(), rest.trim()),
            None => (line.to_ascii_lowercase(), ""),
        };

        match verb.as_str() {
            "stop" => {
                logs.console("Stopping the server");
                Applied::stop()
            }
            "say" => {
                logs.chat(format!("[Server] {}", rest));
                logs.console(format!("[Server] {}", rest));
                Applied::default()
            }
            "list" => {
                let online: Vec<String> = self
                    .players
                    .values()
                    .filter(|p| p.online)
                    .map(|p| p.name.clone())
                    .collect();
                logs.console(format!(
                    "There are {} of a max of {} players online: {}",
                    online.len(),
                    self.max_players(),
                    online.join(", ")
                ));
                Applied::default()
            }
            "whitelist" => match rest.to_ascii_lowercase().as_str() {
                "on" => {
                    logs.console("Whitelist is now turned on");
                    Applied::changed(self.set_whitelist_enabled(true))
                }
                "off" => {
                    logs.console("Whitelist is now turned off");
                    Applied::changed(self.set_whitelist_enabled(false))
                }
                "list" => {
                    let names: Vec<&str> = self.whitelist.values().map(String::as_str).collect();
                    logs.console(format!(
                        "There are {} whitelisted player(s): {}",
                        names.len(),
                        names.join(", ")
                    ));
                    Applied::default()
                }
                _ => {
                    logs.console("Usage: whitelist <on|off|list>");
                    Applied::default()
                }
            },
            "op" | "deop" | "kick" | "ban" | "pardon" => {
                let target = rest.split_whitespace().next().unwrap_or("");
                let Some(uuid) = self.uuid_by_name(target) else {
                    logs.console("That player does not exist");
                    return Applied::default();
                };
                let action = match verb.as_str() {
                    "op" => PlayerAction::Op,
                    "deop" => PlayerAction::Deop,
                    "kick" => PlayerAction::Kick,
                    "ban" => PlayerAction::Ban,
                    _ => PlayerAction::Unban,
                };
                Applied::changed(self.player_action(&uuid, action, logs))
            }
            _ => {
                logs.console("Unknown command. Type \"help\" for help.");
                Applied::default()
            }
        }
    }

    /// Merge keys into the properties. `whitelist` is coerced to a boolean.
    fn update_properties(&mut self, properties: BTreeMap<String, Value>) -> bool {
        let mut changed = false;
        for (key, value) in properties {
            let value = if key == "whitelist" {
                match as_bool(&value) {
                    Some(b) => Value::Bool(b),
                    None => {
                        warn!(value = %value, "ignoring non-boolean whitelist property");
                        continue;
                    }
                }
            } else {
                value
            };
            if self.properties.get(&key) != Some(&value) {
                self.properties.insert(key, value);
                changed = true;
            }
        }
        if changed {
            info!("server properties updated; most take effect after a restart");
        }
        changed
    }

    /// Change known rules only, each parsed as its rule's type.
    fn update_gamerules(&mut self, rules: BTreeMap<String, Value>) -> bool {
        let mut changed = false;
        for (name, value) in rules {
            let Some(current) = self.gamerules.get(&name).copied() else {
                warn!(rule = %name, "unknown game rule skipped");
                continue;
            };
            let raw = match &value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            match current.parse_like(&raw) {
                Some(parsed) => {
                    if parsed != current {
                        self.gamerules.insert(name, parsed);
                        changed = true;
                    }
                }
                None => warn!(rule = %name, value = %raw, "invalid game rule value skipped"),
            }
        }
        changed
    }

    fn set_whitelist_enabled(&mut self, enabled: bool) -> bool {
        let previous = self
            .properties
            .insert("whitelist".to_string(), Value::Bool(enabled));
        previous != Some(Value::Bool(enabled))
    }

    fn entry_name(&self, entry: &ListEntry) -> String {
        if entry.name.trim().is_empty() {
            self.name_of(&entry.uuid)
        } else {
            entry.name.clone()
        }
    }

    /// Best known name for a UUID, falling back to the UUID itself.
    fn name_of(&self, uuid: &str) -> String {
        self.players
            .get(uuid)
            .map(|p| p.name.clone())
            .or_else(|| self.whitelist.get(uuid).cloned())
            .or_else(|| self.banned.get(uuid).cloned())
            .or_else(|| self.operators.get(uuid).cloned())
            .unwrap_or_else(|| uuid.to_string())
    }

    fn uuid_by_name(&self, name: &str) -> Option<String> {
        if name.is_empty() {
            return None;
        }
        self.players
            .iter()
            .find(|(_, p)| p.name.eq_ignore_ascii_case(name))
            .map(|(uuid, _)| uuid.clone())
    }

    // ---------------------------------------------------------------------
    // Read projections
    // ---------------------------------------------------------------------

    fn record(&self, uuid: &str, player: &PlayerState) -> PlayerRecord {
        let live = player
            .session_start
            .filter(|_| player.online)
            .map(|start| now_millis().saturating_sub(start) / 1000)
            .unwrap_or(0);
        PlayerRecord {
            uuid: uuid.to_string(),
            name: player.name.clone(),
            online: player.online,
            last_seen: player.last_seen,
            play_time: player.play_time + live,
            banned: self.banned.contains_key(uuid),
            op: self.operators.contains_key(uuid),
        }
    }

    /// Sorted case-insensitively by name.
    pub fn player_records(&self) -> Vec<PlayerRecord> {
        let mut records: Vec<PlayerRecord> = self
            .players
            .iter()
            .map(|(uuid, p)| self.record(uuid, p))
            .collect();
        records.sort_by_key(|r| r.name.to_lowercase());
        records
    }

    pub fn player_record(&self, uuid: &str) -> Option<PlayerRecord> {
        self.players.get(uuid).map(|p| self.record(uuid, p))
    }

    pub fn online_count(&self) -> usize {
        self.players.values().filter(|p| p.online).count()
    }

    pub fn whitelist_enabled(&self) -> bool {
        self.properties
            .get("whitelist")
            .and_then(as_bool)
            .unwrap_or(false)
    }

    pub fn list_entries(list: &BTreeMap<String, String>) -> Vec<ListEntry> {
        let mut entries: Vec<ListEntry> = list
            .iter()
            .map(|(uuid, name)| ListEntry {
                name: name.clone(),
                uuid: uuid.clone(),
            })
            .collect();
        entries.sort_by_key(|e| e.name.to_lowercase());
        entries
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        vec![PluginInfo {
            name: "MCControl".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            enabled: true,
            author: String::new(),
        }]
    }

    fn max_players(&self) -> u32 {
        self.prop_u64("max-players")
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(20)
    }

    fn prop_bool(&self, key: &str, default: bool) -> bool {
        self.properties.get(key).and_then(as_bool).unwrap_or(default)
    }

    fn prop_u64(&self, key: &str) -> Option<u64> {
        self.properties.get(key).and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    fn prop_str(&self, key: &str) -> String {
        match self.properties.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    pub fn server_info(&self) -> ServerInfo {
        let difficulty = self.prop_str("difficulty").to_uppercase();
        let pvp = self.prop_bool("pvp", true);
        ServerInfo {
            name: self.server_name.clone(),
            version: self.version.clone(),
            minecraft_version: self.minecraft_version.clone(),
            online_mode: self.prop_bool("online-mode", true),
            max_players: self.max_players(),
            current_players: self.online_count(),
            port: self
                .prop_u64("server-port")
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(25565),
            ip: self.prop_str("server-ip"),
            motd: self.prop_str("motd"),
            whitelist_enabled: self.whitelist_enabled(),
            allow_flight: self.prop_bool("allow-flight", false),
            allow_nether: self.prop_bool("allow-nether", true),
            allow_end: self.prop_bool("allow-end", true),
            worlds: self
                .worlds
                .iter()
                .map(|w| WorldInfo {
                    difficulty: difficulty.clone(),
                    pvp,
                    ..w.clone()
                })
                .collect(),
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            properties: self.properties.clone(),
            gamerules: self
                .gamerules
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
        }
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STEVE: &str = "8667ba71-b85a-4004-af54-457a9734eed7";
    const ALEX: &str = "ec561538-f3fd-461d-aff5-086b22154bce";

    fn entry(name: &str, uuid: &str) -> ListEntry {
        ListEntry {
            name: name.into(),
            uuid: uuid.into(),
        }
    }

    fn with_steve_online() -> (HostModel, LogHub) {
        let mut model = HostModel::default();
        let logs = LogHub::in_memory();
        model.apply(HostCommand::PlayerJoined(entry("Steve", STEVE)), &logs);
        (model, logs)
    }

    #[test]
    fn test_default_model() {
        let model = HostModel::default();
        assert_eq!(model.worlds.len(), 3);
        assert!(!model.whitelist_enabled());
        assert_eq!(model.gamerules["keepInventory"], GameRuleValue::Bool(false));
        assert_eq!(model.settings().gamerules["randomTickSpeed"], "3");
        assert_eq!(model.server_info().max_players, 20);
        assert_eq!(model.server_info().worlds[0].difficulty, "EASY");
    }

    #[test]
    fn test_join_and_leave() {
        let (mut model, logs) = with_steve_online();
        assert_eq!(model.online_count(), 1);
        assert!(logs.chat_lines().contains(&"[+] Steve joined the server".to_string()));
        assert!(logs
            .console_lines()
            .contains(&"[JOIN] Steve joined the game".to_string()));

        let applied = model.apply(
            HostCommand::PlayerLeft {
                uuid: STEVE.into(),
            },
            &logs,
        );
        assert!(applied.changed);
        assert_eq!(model.online_count(), 0);
        assert!(logs.chat_lines().contains(&"[-] Steve left the server".to_string()));
        let record = model.player_record(STEVE).unwrap();
        assert!(!record.online);
        assert!(record.last_seen > 0);
    }

    #[test]
    fn test_ban_kicks_and_blocks_join() {
        let (mut model, logs) = with_steve_online();
        model.apply(
            HostCommand::Player {
                uuid: STEVE.into(),
                action: PlayerAction::Ban,
            },
            &logs,
        );
        assert_eq!(model.online_count(), 0);
        assert!(model.player_record(STEVE).unwrap().banned);
        assert_eq!(
            HostModel::list_entries(&model.banned),
            vec![entry("Steve", STEVE)]
        );

        let applied = model.apply(HostCommand::PlayerJoined(entry("Steve", STEVE)), &logs);
        assert!(!applied.changed);
        assert_eq!(model.online_count(), 0);

        model.apply(
            HostCommand::BanRemove {
                uuid: STEVE.into(),
            },
            &logs,
        );
        assert!(model.banned.is_empty());
    }

    #[test]
    fn test_kick_offline_player_is_noop() {
        let mut model = HostModel::default();
        let logs = LogHub::in_memory();
        let applied = model.apply(
            HostCommand::Player {
                uuid: ALEX.into(),
                action: PlayerAction::Kick,
            },
            &logs,
        );
        assert!(!applied.changed);
    }

    #[test]
    fn test_op_and_deop() {
        let (mut model, logs) = with_steve_online();
        model.apply(
            HostCommand::Player {
                uuid: STEVE.into(),
                action: PlayerAction::Op,
            },
            &logs,
        );
        assert!(model.player_record(STEVE).unwrap().op);
        model.apply(
            HostCommand::OpRemove {
                uuid: STEVE.into(),
            },
            &logs,
        );
        assert!(!model.player_record(STEVE).unwrap().op);
    }

    #[test]
    fn test_whitelist_enforced_on_join() {
        let mut model = HostModel::default();
        let logs = LogHub::in_memory();
        model.apply(HostCommand::Console { command: "whitelist on".into() }, &logs);
        assert!(model.whitelist_enabled());

        model.apply(HostCommand::PlayerJoined(entry("Alex", ALEX)), &logs);
        assert_eq!(model.online_count(), 0);

        model.apply(HostCommand::WhitelistAdd(entry("Alex", ALEX)), &logs);
        model.apply(HostCommand::PlayerJoined(entry("Alex", ALEX)), &logs);
        assert_eq!(model.online_count(), 1);
    }

    #[test]
    fn test_chat_message_broadcast() {
        let mut model = HostModel::default();
        let logs = LogHub::in_memory();
        model.apply(
            HostCommand::Chat {
                message: "hello all".into(),
            },
            &logs,
        );
        assert_eq!(logs.chat_lines(), vec!["[Server] hello all"]);
    }

    #[test]
    fn test_chat_slash_runs_command() {
        let (mut model, logs) = with_steve_online();
        model.apply(
            HostCommand::Chat {
                message: "/op Steve".into(),
            },
            &logs,
        );
        assert!(logs
            .chat_lines()
            .contains(&"[Server executed: /op Steve]".to_string()));
        assert!(model.operators.contains_key(STEVE));
    }

    #[test]
    fn test_console_commands() {
        let (mut model, logs) = with_steve_online();
        model.apply(HostCommand::Console { command: "say restarting soon".into() }, &logs);
        assert!(logs.chat_lines().contains(&"[Server] restarting soon".to_string()));

        model.apply(HostCommand::Console { command: "kick steve".into() }, &logs);
        assert_eq!(model.online_count(), 0);

        model.apply(HostCommand::Console { command: "ban Nobody".into() }, &logs);
        assert!(logs
            .console_lines()
            .contains(&"That player does not exist".to_string()));

        model.apply(HostCommand::Console { command: "frobnicate".into() }, &logs);
        assert!(logs
            .console_lines()
            .last()
            .unwrap()
            .starts_with("Unknown command"));

        let applied = model.apply(HostCommand::Console { command: "stop".into() }, &logs);
        assert!(applied.stop);
    }

    #[test]
    fn test_gamerule_typing() {
        let mut model = HostModel::default();
        let logs = LogHub::in_memory();
        let mut rules = BTreeMap::new();
        rules.insert("keepInventory".to_string(), json!("true"));
        rules.insert("randomTickSpeed".to_string(), json!(10));
        rules.insert("doFireTick".to_string(), json!("maybe"));
        rules.insert("spawnRadius".to_string(), json!("far"));
        rules.insert("notARule".to_string(), json!(true));

        let applied = model.apply(HostCommand::UpdateGameRules(rules), &logs);
        assert!(applied.changed);
        assert_eq!(model.gamerules["keepInventory"], GameRuleValue::Bool(true));
        assert_eq!(model.gamerules["randomTickSpeed"], GameRuleValue::Int(10));
        assert_eq!(model.gamerules["doFireTick"], GameRuleValue::Bool(true));
        assert_eq!(model.gamerules["spawnRadius"], GameRuleValue::Int(10));
        assert!(!model.gamerules.contains_key("notARule"));
    }

    #[test]
    fn test_properties_merge_and_whitelist_toggle() {
        let mut model = HostModel::default();
        let logs = LogHub::in_memory();
        let mut props = BTreeMap::new();
        props.insert("motd".to_string(), json!("Welcome"));
        props.insert("whitelist".to_string(), json!("true"));

        assert!(model.apply(HostCommand::UpdateProperties(props), &logs).changed);
        assert_eq!(model.server_info().motd, "Welcome");
        assert!(model.whitelist_enabled());
        assert_eq!(model.properties["max-players"], json!(20));
    }

    #[test]
    fn test_out_of_range_numeric_properties_use_defaults() {
        let mut model = HostModel::default();
        let logs = LogHub::in_memory();
        let mut props = BTreeMap::new();
        props.insert("server-port".to_string(), json!(70000));
        props.insert("max-players".to_string(), json!(5_000_000_000u64));
        model.apply(HostCommand::UpdateProperties(props), &logs);

        let info = model.server_info();
        assert_eq!(info.port, 25565);
        assert_eq!(info.max_players, 20);

        let mut props = BTreeMap::new();
        props.insert("server-port".to_string(), json!("25570"));
        model.apply(HostCommand::UpdateProperties(props), &logs);
        assert_eq!(model.server_info().port, 25570);
    }

    #[test]
    fn test_players_sorted_case_insensitive() {
        let mut model = HostModel::default();
        let logs = LogHub::in_memory();
        model.apply(HostCommand::PlayerJoined(entry("zed", ALEX)), &logs);
        model.apply(HostCommand::PlayerJoined(entry("Amy", STEVE)), &logs);
        let names: Vec<String> = model.player_records().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Amy", "zed"]);
    }

    #[test]
    fn test_load_round_trip_marks_players_offline() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(STATE_FILE);
        let (model, _logs) = with_steve_online();
        fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();

        let loaded = HostModel::load(&path);
        assert_eq!(loaded.players.len(), 1);
        assert_eq!(loaded.online_count(), 0);
        assert_eq!(loaded.gamerules.len(), DEFAULT_GAMERULES.len());
    }

    #[test]
    fn test_load_missing_or_corrupt_gives_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(STATE_FILE);
        assert!(HostModel::load(&path).players.is_empty());
        fs::write(&path, "{{{").unwrap();
        assert_eq!(HostModel::load(&path).worlds.len(), 3);
    }
}
