use std::fmt;

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Modifier keys held while an input happened.
    ///
    /// Combine with bitwise OR: `Modifiers::SHIFT | Modifiers::CTRL`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const META = 1 << 2;
        const ALT = 1 << 3;
        const ALT_GRAPH = 1 << 4;
    }
}

impl Modifiers {
    /// `"SHIFT+CTRL"` style label, empty when no modifier is held.
    pub fn describe(&self) -> String {
        self.iter_names()
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// Which family of device a [`Shortcut`] belongs to. Used to filter bulk
/// removal and descriptions; it is part of the shortcut's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShortcutKind {
    Generic,
    Keyboard,
    Click,
    Motion,
}

impl ShortcutKind {
    /// Header used when bindings are listed grouped by kind.
    pub fn title(self) -> &'static str {
        match self {
            Self::Generic => "Generic shortcuts",
            Self::Keyboard => "Keyboard shortcuts",
            Self::Click => "Click shortcuts",
            Self::Motion => "Motion shortcuts",
        }
    }
}

/// Hashable fingerprint of an input combination: a device id (key code,
/// button, or motion device), a modifier mask and, for clicks, the click
/// count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shortcut {
    kind: ShortcutKind,
    id: i32,
    #[serde(default)]
    modifiers: Modifiers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    clicks: Option<u8>,
}

impl Shortcut {
    pub fn generic(id: i32, modifiers: Modifiers) -> Self {
        Self {
            kind: ShortcutKind::Generic,
            id,
            modifiers,
            clicks: None,
        }
    }

    pub fn keyboard(key: i32, modifiers: Modifiers) -> Self {
        Self {
            kind: ShortcutKind::Keyboard,
            id: key,
            modifiers,
            clicks: None,
        }
    }

    /// Click shortcut. A click count of zero is stored as one.
    pub fn click(button: i32, modifiers: Modifiers, clicks: u8) -> Self {
        Self {
            kind: ShortcutKind::Click,
            id: button,
            modifiers,
            clicks: Some(clicks.max(1)),
        }
    }

    pub fn motion(id: i32, modifiers: Modifiers) -> Self {
        Self {
            kind: ShortcutKind::Motion,
            id,
            modifiers,
            clicks: None,
        }
    }

    pub fn kind(&self) -> ShortcutKind {
        self.kind
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn clicks(&self) -> Option<u8> {
        self.clicks
    }

    /// Human-readable label, e.g. `SHIFT+button(1) x2`.
    pub fn describe(&self) -> String {
        let base = match self.kind {
            ShortcutKind::Generic => format!("id({})", self.id),
            ShortcutKind::Keyboard => format!("key({})", self.id),
            ShortcutKind::Click => match self.clicks {
                Some(clicks) if clicks > 1 => format!("button({}) x{clicks}", self.id),
                _ => format!("button({})", self.id),
            },
            ShortcutKind::Motion => format!("motion({})", self.id),
        };

        if self.modifiers.is_empty() {
            base
        } else {
            format!("{}+{base}", self.modifiers.describe())
        }
    }

    /// Ordering key used to list bindings deterministically.
    pub(crate) fn sort_key(&self) -> (ShortcutKind, i32, u32, u8) {
        (
            self.kind,
            self.id,
            self.modifiers.bits(),
            self.clicks.unwrap_or(0),
        )
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
