//! What the plugin needs from the host server at event time.

use neolocks_core::{Permissions, PlayerId, WorldView};

use crate::pages::{Message, Page};

/// Chat and UI access to connected players.
pub trait PlayerSurface {
    /// Send a chat message.
    fn send_message(&self, player: PlayerId, message: &Message);

    /// Show a page, replacing whatever page the player had open.
    fn open_page(&self, player: PlayerId, page: &Page);

    /// Close the player's current page.
    fn close_page(&self, player: PlayerId);
}

/// Borrowed host services for one event.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    /// Block lookups in the event's world.
    pub world: &'a dyn WorldView,
    /// Capability lookups.
    pub permissions: &'a dyn Permissions,
    /// Chat and pages.
    pub players: &'a dyn PlayerSurface,
}

impl<'a> Host<'a> {
    /// Bundle host services.
    #[must_use]
    pub fn new(
        world: &'a dyn WorldView,
        permissions: &'a dyn Permissions,
        players: &'a dyn PlayerSurface,
    ) -> Self {
        Self {
            world,
            permissions,
            players,
        }
    }
}
