use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Shortcut;

/// Device category of an [`Event`]. Fixed at construction; the dispatch
/// engine selects stage handlers from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Generic,
    Keyboard,
    Click,
    Motion,
    Dof1,
    Dof2,
    Dof3,
    Dof6,
}

impl Category {
    /// Every category, in stage-name order.
    pub const ALL: [Category; 8] = [
        Category::Generic,
        Category::Keyboard,
        Category::Click,
        Category::Motion,
        Category::Dof1,
        Category::Dof2,
        Category::Dof3,
        Category::Dof6,
    ];

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Generic => 0,
            Self::Keyboard => 1,
            Self::Click => 2,
            Self::Motion => 3,
            Self::Dof1 => 4,
            Self::Dof2 => 5,
            Self::Dof3 => 6,
            Self::Dof6 => 7,
        }
    }

    /// Motion proper plus the 1/2/3/6 degrees-of-freedom categories.
    pub fn is_motion(self) -> bool {
        matches!(
            self,
            Self::Motion | Self::Dof1 | Self::Dof2 | Self::Dof3 | Self::Dof6
        )
    }

    /// Whether a handler declared to take `self` events can be called with an
    /// event of category `other`. Generic handlers take anything and motion
    /// handlers take every multi-axis category.
    pub fn admits(self, other: Category) -> bool {
        match self {
            Self::Generic => true,
            Self::Motion => other.is_motion(),
            _ => self == other,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Generic => "generic",
            Self::Keyboard => "keyboard",
            Self::Click => "click",
            Self::Motion => "motion",
            Self::Dof1 => "1-DOF motion",
            Self::Dof2 => "2-DOF motion",
            Self::Dof3 => "3-DOF motion",
            Self::Dof6 => "6-DOF motion",
        };
        f.write_str(label)
    }
}

/// One input occurrence, already normalised by whatever agent captured it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    shortcut: Shortcut,
    category: Category,
    /// Set on the event that ends a gesture, e.g. a button release.
    #[serde(default)]
    terminal: bool,
}

impl Event {
    pub fn new(shortcut: Shortcut, category: Category) -> Self {
        Self {
            shortcut,
            category,
            terminal: false,
        }
    }

    pub fn keyboard(shortcut: Shortcut) -> Self {
        Self::new(shortcut, Category::Keyboard)
    }

    pub fn click(shortcut: Shortcut) -> Self {
        Self::new(shortcut, Category::Click)
    }

    /// Motion event with the given degrees-of-freedom category. A category
    /// that is not a motion one is kept as given, so such an event only
    /// reaches handlers declared for that category or generic ones.
    pub fn motion(shortcut: Shortcut, category: Category) -> Self {
        Self::new(shortcut, category)
    }

    /// Returns a copy of this event marked as the end of its gesture.
    pub fn ending(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn shortcut(&self) -> &Shortcut {
        &self.shortcut
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }
}
