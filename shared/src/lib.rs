//! Wire protocol shared by the proxy, the demo world server and tests.
//!
//! Every frame exchanged between a game client, the proxy and a backend is a
//! [`Packet`]. Frames are serialized with bincode and length-prefixed on the
//! stream (see [`codec`]).

use serde::{Deserialize, Serialize};

pub mod chunk;
pub mod codec;

/// Event data sent with [`LevelEventType::StopRaining`] to fade rain out.
pub const STOP_RAIN_DATA: i32 = 10_000;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Handshake
    Login {
        identity: IdentityData,
        token: String,
    },
    StartGame(GameData),
    RequestSpawn,
    PlayStatus {
        status: PlayStatus,
    },
    Disconnect {
        message: String,
    },

    // Proxy control
    Transfer {
        address: String,
    },
    /// Latency probe. Peers answer a probe by echoing it back with
    /// `response` set.
    Latency {
        timestamp: i64,
        response: bool,
    },

    // World state
    SetActorData {
        runtime_id: u64,
        metadata: EntityMetadata,
    },
    LevelChunk {
        dimension: Dimension,
        position: ChunkPos,
        sub_chunk_count: u32,
        payload: Vec<u8>,
    },
    MovePlayer {
        runtime_id: u64,
        position: Vec3,
        pitch: f32,
        yaw: f32,
        head_yaw: f32,
        mode: MoveMode,
    },
    LevelEvent {
        event: LevelEventType,
        data: i32,
    },
    SetDifficulty {
        difficulty: Difficulty,
    },
    SetPlayerGameType {
        game_mode: GameMode,
    },
    GameRulesChanged {
        rules: Vec<GameRule>,
    },
    ChangeDimension {
        dimension: Dimension,
        position: Vec3,
    },
    StopSound {
        name: String,
        stop_all: bool,
    },
    MobEffect {
        runtime_id: u64,
        operation: EffectOperation,
        effect_type: i32,
        amplifier: i32,
        duration: i32,
    },
    AddActor {
        unique_id: i64,
        runtime_id: u64,
        entity_type: String,
        position: Vec3,
    },
    AddPlayer {
        uuid: String,
        username: String,
        unique_id: i64,
        runtime_id: u64,
        position: Vec3,
    },
    RemoveActor {
        unique_id: i64,
    },
    BossEvent {
        boss_id: i64,
        event: BossEventType,
        title: String,
    },
    PlayerList {
        action: PlayerListAction,
        entries: Vec<PlayerListEntry>,
    },
    SetDisplayObjective {
        display_slot: String,
        objective_name: String,
        display_name: String,
    },
    RemoveObjective {
        objective_name: String,
    },
    Text {
        source: String,
        message: String,
    },
}

impl Packet {
    /// Short variant name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Login { .. } => "Login",
            Packet::StartGame(_) => "StartGame",
            Packet::RequestSpawn => "RequestSpawn",
            Packet::PlayStatus { .. } => "PlayStatus",
            Packet::Disconnect { .. } => "Disconnect",
            Packet::Transfer { .. } => "Transfer",
            Packet::Latency { .. } => "Latency",
            Packet::SetActorData { .. } => "SetActorData",
            Packet::LevelChunk { .. } => "LevelChunk",
            Packet::MovePlayer { .. } => "MovePlayer",
            Packet::LevelEvent { .. } => "LevelEvent",
            Packet::SetDifficulty { .. } => "SetDifficulty",
            Packet::SetPlayerGameType { .. } => "SetPlayerGameType",
            Packet::GameRulesChanged { .. } => "GameRulesChanged",
            Packet::ChangeDimension { .. } => "ChangeDimension",
            Packet::StopSound { .. } => "StopSound",
            Packet::MobEffect { .. } => "MobEffect",
            Packet::AddActor { .. } => "AddActor",
            Packet::AddPlayer { .. } => "AddPlayer",
            Packet::RemoveActor { .. } => "RemoveActor",
            Packet::BossEvent { .. } => "BossEvent",
            Packet::PlayerList { .. } => "PlayerList",
            Packet::SetDisplayObjective { .. } => "SetDisplayObjective",
            Packet::RemoveObjective { .. } => "RemoveObjective",
            Packet::Text { .. } => "Text",
        }
    }
}

/// Identity a client presents on login.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct IdentityData {
    pub xuid: String,
    pub display_name: String,
}

impl IdentityData {
    pub fn new(xuid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            xuid: xuid.into(),
            display_name: display_name.into(),
        }
    }
}

/// World-start data a backend hands out at the end of the connect sequence.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct GameData {
    pub world_name: String,
    pub entity_unique_id: i64,
    pub entity_runtime_id: u64,
    pub player_position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub dimension: Dimension,
    pub difficulty: Difficulty,
    pub game_mode: GameMode,
    pub game_rules: Vec<GameRule>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Position of the chunk column containing this point.
    pub fn chunk_pos(&self) -> ChunkPos {
        ChunkPos {
            x: (self.x.floor() as i32) >> 4,
            z: (self.z.floor() as i32) >> 4,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    #[default]
    Overworld,
    Nether,
    End,
}

impl Dimension {
    /// Number of 16-block sub-chunks making up one chunk column.
    pub fn sub_chunk_count(&self) -> u32 {
        match self {
            Dimension::Overworld => 24,
            Dimension::Nether => 8,
            Dimension::End => 16,
        }
    }

    /// Biome every empty chunk of this dimension is filled with.
    pub fn default_biome(&self) -> u32 {
        match self {
            Dimension::Overworld => 1,
            Dimension::Nether => 8,
            Dimension::End => 9,
        }
    }
}

impl std::str::FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overworld" => Ok(Dimension::Overworld),
            "nether" => Ok(Dimension::Nether),
            "end" => Ok(Dimension::End),
            other => Err(format!("unknown dimension '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Difficulty {
    Peaceful,
    Easy,
    #[default]
    Normal,
    Hard,
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "peaceful" => Ok(Difficulty::Peaceful),
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl std::str::FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "survival" => Ok(GameMode::Survival),
            "creative" => Ok(GameMode::Creative),
            "adventure" => Ok(GameMode::Adventure),
            "spectator" => Ok(GameMode::Spectator),
            other => Err(format!("unknown game mode '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GameRule {
    pub name: String,
    pub value: GameRuleValue,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum GameRuleValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    LoginSuccess,
    LoginFailed,
    PlayerSpawn,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum MoveMode {
    Normal,
    Reset,
    Teleport,
    Rotation,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LevelEventType {
    StartRaining,
    StartThunderstorm,
    StopRaining,
    StopThunderstorm,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EffectOperation {
    Add,
    Modify,
    Remove,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum BossEventType {
    Show,
    Hide,
    Update,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PlayerListAction {
    Add,
    Remove,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerListEntry {
    pub uuid: String,
    pub username: String,
}

/// Bit positions inside [`EntityMetadata::flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityFlag {
    OnFire = 0,
    Sneaking = 1,
    Invisible = 5,
    NoAi = 16,
    Breathing = 35,
    HasGravity = 48,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityMetadata {
    pub flags: u64,
}

impl EntityMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_flag(&mut self, flag: EntityFlag) {
        self.flags |= 1u64 << flag as u64;
    }

    pub fn has_flag(&self, flag: EntityFlag) -> bool {
        self.flags & (1u64 << flag as u64) != 0
    }
}
