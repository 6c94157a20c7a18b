//! Inter-loop message: a tagged union passed between the update and I/O
//! loops over a two-slot mailbox with a ready/processed handshake (spec
//! §3, §4.12), grounded on `server/src/game_loop.rs`'s `GameState`
//! struct-of-arrays root for the "two owned loops share a small typed
//! channel" shape.

use crate::keyboard::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterMsgModFlags {
    None,
    MessageMenu,
    InputMenu,
}

#[derive(Debug, Clone)]
pub enum InterMsgPayload {
    None,
    Key(Key),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterMsgKind {
    Uninitialized,
    Noop,
    KeyInput,
    Menu,
    StringInput,
}

/// `{kind, modflags, ready, processed, payload}` (spec §3).
#[derive(Debug, Clone)]
pub struct InterMsg {
    pub kind: InterMsgKind,
    pub modflags: InterMsgModFlags,
    pub ready: bool,
    pub processed: bool,
    pub payload: InterMsgPayload,
}

impl InterMsg {
    pub fn uninitialized() -> Self {
        Self {
            kind: InterMsgKind::Uninitialized,
            modflags: InterMsgModFlags::None,
            ready: false,
            processed: true,
            payload: InterMsgPayload::None,
        }
    }

    pub fn noop() -> Self {
        Self {
            kind: InterMsgKind::Noop,
            modflags: InterMsgModFlags::None,
            ready: true,
            processed: false,
            payload: InterMsgPayload::None,
        }
    }

    pub fn key_input(key: Key) -> Self {
        Self {
            kind: InterMsgKind::KeyInput,
            modflags: InterMsgModFlags::None,
            ready: true,
            processed: false,
            payload: InterMsgPayload::Key(key),
        }
    }

    pub fn menu(text: String, input_menu: bool) -> Self {
        Self {
            kind: InterMsgKind::Menu,
            modflags: if input_menu {
                InterMsgModFlags::InputMenu
            } else {
                InterMsgModFlags::MessageMenu
            },
            ready: true,
            processed: false,
            payload: InterMsgPayload::Text(text),
        }
    }

    pub fn string_input(text: String) -> Self {
        Self {
            kind: InterMsgKind::StringInput,
            modflags: InterMsgModFlags::None,
            ready: true,
            processed: false,
            payload: InterMsgPayload::Text(text),
        }
    }

    pub fn mark_processed(&mut self) {
        self.processed = true;
    }
}

/// A one-slot mailbox in one direction. The producer calls `post` after
/// filling the payload; if the previous message was never processed, the
/// producer first replies with a `noop` to unstick the consumer (spec
/// §4.12).
#[derive(Debug, Clone)]
pub struct Mailbox {
    slot: InterMsg,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            slot: InterMsg::uninitialized(),
        }
    }

    pub fn post(&mut self, msg: InterMsg) {
        if self.slot.ready && !self.slot.processed {
            self.slot = InterMsg::noop();
        } else {
            self.slot = msg;
        }
    }

    /// Consumer reads the current message if `ready`, marking it
    /// processed.
    pub fn take(&mut self) -> Option<InterMsg> {
        if self.slot.ready && !self.slot.processed {
            self.slot.processed = true;
            Some(self.slot.clone())
        } else {
            None
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
