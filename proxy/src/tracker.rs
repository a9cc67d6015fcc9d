//! Per-session cache of transient world state.
//!
//! Everything a server spawned on the client that the client will not forget
//! by itself on a server swap is remembered here, so the session can remove
//! it before the next server takes over.

use crate::conn::ClientConnection;
use parking_lot::Mutex;
use shared::{BossEventType, EffectOperation, Packet, PlayerListAction, PlayerListEntry};
use std::collections::HashSet;

#[derive(Debug, Default)]
struct TrackedState {
    effects: HashSet<i32>,
    entities: HashSet<i64>,
    boss_bars: HashSet<i64>,
    players: HashSet<String>,
    scoreboards: HashSet<String>,
}

/// Number of tracked elements per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackerCounts {
    pub effects: usize,
    pub entities: usize,
    pub boss_bars: usize,
    pub players: usize,
    pub scoreboards: usize,
}

#[derive(Debug, Default)]
pub struct WorldStateTracker {
    state: Mutex<TrackedState>,
}

impl WorldStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the effect of a server packet on the client's world.
    pub fn observe(&self, packet: &Packet) {
        let mut state = self.state.lock();
        match packet {
            Packet::MobEffect {
                operation,
                effect_type,
                ..
            } => match operation {
                EffectOperation::Add | EffectOperation::Modify => {
                    state.effects.insert(*effect_type);
                }
                EffectOperation::Remove => {
                    state.effects.remove(effect_type);
                }
            },
            Packet::AddActor { unique_id, .. } | Packet::AddPlayer { unique_id, .. } => {
                state.entities.insert(*unique_id);
            }
            Packet::RemoveActor { unique_id } => {
                state.entities.remove(unique_id);
            }
            Packet::BossEvent { boss_id, event, .. } => match event {
                BossEventType::Show => {
                    state.boss_bars.insert(*boss_id);
                }
                BossEventType::Hide => {
                    state.boss_bars.remove(boss_id);
                }
                BossEventType::Update => {}
            },
            Packet::PlayerList { action, entries } => {
                for entry in entries {
                    match action {
                        PlayerListAction::Add => state.players.insert(entry.uuid.clone()),
                        PlayerListAction::Remove => state.players.remove(&entry.uuid),
                    };
                }
            }
            Packet::SetDisplayObjective { objective_name, .. } => {
                state.scoreboards.insert(objective_name.clone());
            }
            Packet::RemoveObjective { objective_name } => {
                state.scoreboards.remove(objective_name);
            }
            _ => {}
        }
    }

    /// Removes every tracked effect from the player's entity.
    pub async fn clear_effects(&self, client: &dyn ClientConnection, runtime_id: u64) {
        let effects = std::mem::take(&mut self.state.lock().effects);
        for effect_type in effects {
            let _ = client
                .write_packet(Packet::MobEffect {
                    runtime_id,
                    operation: EffectOperation::Remove,
                    effect_type,
                    amplifier: 0,
                    duration: 0,
                })
                .await;
        }
    }

    pub async fn clear_entities(&self, client: &dyn ClientConnection) {
        let entities = std::mem::take(&mut self.state.lock().entities);
        for unique_id in entities {
            let _ = client.write_packet(Packet::RemoveActor { unique_id }).await;
        }
    }

    pub async fn clear_boss_bars(&self, client: &dyn ClientConnection) {
        let boss_bars = std::mem::take(&mut self.state.lock().boss_bars);
        for boss_id in boss_bars {
            let _ = client
                .write_packet(Packet::BossEvent {
                    boss_id,
                    event: BossEventType::Hide,
                    title: String::new(),
                })
                .await;
        }
    }

    /// Removes every tracked player from the client's player list in one packet.
    pub async fn clear_players(&self, client: &dyn ClientConnection) {
        let players = std::mem::take(&mut self.state.lock().players);
        if players.is_empty() {
            return;
        }

        let entries = players
            .into_iter()
            .map(|uuid| PlayerListEntry {
                uuid,
                username: String::new(),
            })
            .collect();
        let _ = client
            .write_packet(Packet::PlayerList {
                action: PlayerListAction::Remove,
                entries,
            })
            .await;
    }

    pub async fn clear_scoreboards(&self, client: &dyn ClientConnection) {
        let scoreboards = std::mem::take(&mut self.state.lock().scoreboards);
        for objective_name in scoreboards {
            let _ = client
                .write_packet(Packet::RemoveObjective { objective_name })
                .await;
        }
    }

    /// Forgets everything without telling the client.
    pub fn reset(&self) {
        *self.state.lock() = TrackedState::default();
    }

    pub fn counts(&self) -> TrackerCounts {
        let state = self.state.lock();
        TrackerCounts {
            effects: state.effects.len(),
            entities: state.entities.len(),
            boss_bars: state.boss_bars.len(),
            players: state.players.len(),
            scoreboards: state.scoreboards.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts() == TrackerCounts::default()
    }
}
