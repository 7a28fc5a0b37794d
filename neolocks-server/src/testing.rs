//! In-memory host fakes for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use neolocks_core::error::{NeoLocksError, Result};
use neolocks_core::{
    Capability, EntityRef, EntityStore, HologramSpawn, Identity, NeoLocksConfig, Permissions,
    PlayerId, PositionKey, Storage, WorldView,
};

use crate::host::{Host, PlayerSurface};
use crate::pages::{Message, Page};
use crate::runtime::NeoLocks;

#[derive(Default)]
pub(crate) struct FakeWorld {
    blocks: HashMap<PositionKey, String>,
}

impl WorldView for FakeWorld {
    fn block_id(&self, position: &PositionKey) -> Option<String> {
        self.blocks.get(position).cloned()
    }
}

#[derive(Default)]
pub(crate) struct FakePermissions {
    grants: Mutex<HashSet<(PlayerId, Capability)>>,
}

impl Permissions for FakePermissions {
    fn has_capability(&self, player: PlayerId, capability: Capability) -> bool {
        self.grants.lock().contains(&(player, capability))
    }
}

#[derive(Default)]
pub(crate) struct FakePlayers {
    messages: Mutex<HashMap<PlayerId, Vec<Message>>>,
    pages: Mutex<HashMap<PlayerId, Vec<Page>>>,
    closed: Mutex<HashMap<PlayerId, usize>>,
}

impl FakePlayers {
    pub(crate) fn last_message(&self, player: PlayerId) -> Option<Message> {
        self.messages.lock().get(&player).and_then(|m| m.last().cloned())
    }

    pub(crate) fn last_page(&self, player: PlayerId) -> Option<Page> {
        self.pages.lock().get(&player).and_then(|p| p.last().cloned())
    }

    pub(crate) fn closed(&self, player: PlayerId) -> usize {
        self.closed.lock().get(&player).copied().unwrap_or(0)
    }
}

impl PlayerSurface for FakePlayers {
    fn send_message(&self, player: PlayerId, message: &Message) {
        self.messages.lock().entry(player).or_default().push(message.clone());
    }

    fn open_page(&self, player: PlayerId, page: &Page) {
        self.pages.lock().entry(player).or_default().push(page.clone());
    }

    fn close_page(&self, player: PlayerId) {
        *self.closed.lock().entry(player).or_default() += 1;
    }
}

#[derive(Default)]
pub(crate) struct FakeHost {
    world: FakeWorld,
    permissions: FakePermissions,
    pub(crate) players: FakePlayers,
}

impl FakeHost {
    pub(crate) fn chest(mut self, position: &PositionKey) -> Self {
        self.world
            .blocks
            .insert(position.clone(), "hytale:chest".to_string());
        self
    }

    pub(crate) fn player(&self, name: &str, capabilities: &[Capability]) -> Identity {
        let identity = Identity::new(PlayerId::new(), name);
        let mut grants = self.permissions.grants.lock();
        for capability in capabilities {
            grants.insert((identity.id, *capability));
        }
        identity
    }

    pub(crate) fn host(&self) -> Host<'_> {
        Host::new(&self.world, &self.permissions, &self.players)
    }

    pub(crate) fn plugin(&self) -> NeoLocks {
        self.plugin_with(NeoLocksConfig::default())
    }

    #[allow(clippy::unused_self)]
    pub(crate) fn plugin_with(&self, config: NeoLocksConfig) -> NeoLocks {
        let storage = Arc::new(Storage::open_in_memory().expect("open storage"));
        NeoLocks::with_storage(config, storage).expect("start plugin")
    }
}

#[derive(Default)]
pub(crate) struct Entities {
    live: HashMap<EntityRef, HologramSpawn>,
}

impl Entities {
    /// Live line texts, top to bottom.
    pub(crate) fn texts(&self) -> Vec<String> {
        let mut spawns: Vec<_> = self.live.values().collect();
        spawns.sort_by(|a, b| b.y.total_cmp(&a.y));
        spawns.into_iter().map(|s| s.text.clone()).collect()
    }
}

impl EntityStore for Entities {
    fn spawn_text(&mut self, spawn: &HologramSpawn) -> Result<EntityRef> {
        let entity = EntityRef::new();
        self.live.insert(entity, spawn.clone());
        Ok(entity)
    }

    fn remove(&mut self, entity: EntityRef) -> Result<()> {
        self.live
            .remove(&entity)
            .map(|_| ())
            .ok_or(NeoLocksError::StaleEntity(entity))
    }
}
