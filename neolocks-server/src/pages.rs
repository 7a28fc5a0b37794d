//! Player-facing text: chat messages, pages, and page button payloads.
//!
//! Pages are described, not rendered; the host maps a [`Page`] onto its own
//! UI toolkit. Button presses come back as a small JSON object which is
//! decoded exactly once into [`PageEvent`].

use serde::Deserialize;

use neolocks_core::error::{NeoLocksError, Result};
use neolocks_core::types::PositionKey;

// ---------------------------------------------------------------------------
// Chat messages
// ---------------------------------------------------------------------------

/// Chat message colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Failures and denials.
    Red,
    /// Success.
    Green,
}

impl Color {
    /// Hex color code.
    #[must_use]
    pub fn hex(self) -> &'static str {
        match self {
            Self::Red => "#FF0000",
            Self::Green => "#00FF00",
        }
    }
}

/// A colored chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Text shown.
    pub text: String,
    /// Text color.
    pub color: Color,
}

impl Message {
    fn new(text: &str, color: Color) -> Self {
        Self {
            text: text.to_string(),
            color,
        }
    }

    /// Requester may not create locks.
    #[must_use]
    pub fn no_permission() -> Self {
        Self::new("You don't have permission to lock chests.", Color::Red)
    }

    /// Owner removed their lock.
    #[must_use]
    pub fn unlocked() -> Self {
        Self::new("Chest unlocked!", Color::Green)
    }

    /// Lock confirmed.
    #[must_use]
    pub fn locked() -> Self {
        Self::new("Chest locked!", Color::Green)
    }

    /// Someone else owns the chest.
    #[must_use]
    pub fn locked_by_other() -> Self {
        Self::new("This chest is already locked by another player.", Color::Red)
    }

    /// Storage failed while changing a lock.
    #[must_use]
    pub fn storage_failed() -> Self {
        Self::new("Could not save the chest lock. Please try again.", Color::Red)
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// A page the plugin asks the host to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// "Lock this chest?" with confirm and cancel.
    LockConfirm {
        /// Block the trigger was placed against.
        position: PositionKey,
        /// Blocks in the structure (1 or 2).
        blocks: usize,
    },
    /// Informational view shown when a locked chest refuses to open.
    LockedChest {
        /// Cached owner name; `None` shows "Unknown".
        owner_name: Option<String>,
        /// Position that was opened.
        position: PositionKey,
    },
    /// Label form for a freshly placed sign.
    SignText {
        /// Sign position.
        position: PositionKey,
        /// Number of input fields.
        lines: usize,
        /// Characters kept per line.
        max_line_length: usize,
    },
}

impl Page {
    /// Title line.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::LockConfirm { .. } => "Lock Chest?",
            Self::LockedChest { .. } => "Chest Locked!",
            Self::SignText { .. } => "Sign Text",
        }
    }

    /// Body text.
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Self::LockConfirm { position, blocks } => {
                let kind = if *blocks > 1 { "double chest" } else { "chest" };
                let size = if *blocks > 1 {
                    format!("({blocks} blocks)\n")
                } else {
                    String::new()
                };
                format!(
                    "Do you want to lock this {kind}?\nLocation: {}\n{size}\nOnly you will be able to open it.",
                    coords(position)
                )
            }
            Self::LockedChest {
                owner_name,
                position,
            } => format!(
                "This chest is locked by:\n{}\nLocation: {}",
                owner_name.as_deref().unwrap_or("Unknown"),
                coords(position)
            ),
            Self::SignText {
                lines,
                max_line_length,
                ..
            } => format!("Enter up to {lines} lines ({max_line_length} characters each)."),
        }
    }

    /// Buttons, in display order.
    #[must_use]
    pub fn buttons(&self) -> &'static [(&'static str, ButtonAction)] {
        match self {
            Self::LockConfirm { .. } => &[
                ("Confirm Lock", ButtonAction::Confirm),
                ("Cancel", ButtonAction::Cancel),
            ],
            Self::LockedChest { .. } => &[("OK", ButtonAction::Ok)],
            Self::SignText { .. } => &[
                ("Confirm", ButtonAction::Confirm),
                ("Cancel", ButtonAction::Cancel),
            ],
        }
    }
}

fn coords(position: &PositionKey) -> String {
    format!("{}, {}, {}", position.x, position.y, position.z)
}

// ---------------------------------------------------------------------------
// Page events
// ---------------------------------------------------------------------------

/// Button a page event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonAction {
    /// Confirm.
    Confirm,
    /// Cancel.
    Cancel,
    /// Acknowledge.
    Ok,
}

/// Decoded page event payload.
///
/// Line fields are only sent by the sign form; absent fields stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageEvent {
    /// Button pressed.
    #[serde(rename = "ButtonAction")]
    pub action: ButtonAction,
    /// First text field.
    #[serde(rename = "@Line1", default)]
    pub line1: Option<String>,
    /// Second text field.
    #[serde(rename = "@Line2", default)]
    pub line2: Option<String>,
    /// Third text field.
    #[serde(rename = "@Line3", default)]
    pub line3: Option<String>,
}

impl PageEvent {
    /// Decode a raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`NeoLocksError::Serialization`] for malformed JSON, a
    /// missing `ButtonAction`, or an unknown action.
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| NeoLocksError::Serialization(e.to_string()))
    }

    /// Text fields in order.
    #[must_use]
    pub fn lines(&self) -> Vec<Option<String>> {
        vec![self.line1.clone(), self.line2.clone(), self.line3.clone()]
    }
}
