use std::{collections::HashMap, fmt};

use crate::{HandlerRef, Owner, Registration, Shortcut, ShortcutKind};

/// Shortcut → handler map owned by a profile.
///
/// Keys are unique: inserting over an existing binding replaces it, logging a
/// warning when the handler differs and doing nothing when it is the same.
pub struct BindingTable<G> {
    entries: HashMap<Shortcut, HandlerRef<G>>,
}

impl<G> BindingTable<G> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, shortcut: Shortcut, handler: HandlerRef<G>) -> Registration {
        if let Some(current) = self.entries.get(&shortcut) {
            if current.same_as(&handler) {
                tracing::info!(%shortcut, handler = current.name(), "shortcut already bound");
                return Registration::Unchanged;
            }
        }

        match self.entries.insert(shortcut, handler) {
            Some(previous) => {
                tracing::warn!(
                    %shortcut,
                    previous = previous.name(),
                    "overwriting shortcut binding"
                );
                Registration::Replaced {
                    previous: previous.name().to_string(),
                }
            }
            None => Registration::Added,
        }
    }

    pub fn get(&self, shortcut: &Shortcut) -> Option<&HandlerRef<G>> {
        self.entries.get(shortcut)
    }

    pub fn contains(&self, shortcut: &Shortcut) -> bool {
        self.entries.contains_key(shortcut)
    }

    /// Name of the handler bound to `shortcut`.
    pub fn action_name(&self, shortcut: &Shortcut) -> Option<&str> {
        self.get(shortcut).map(HandlerRef::name)
    }

    /// Whether `name` is bound to at least one shortcut, for `owner` or for
    /// any owner when none is given.
    pub fn is_action_bound(&self, owner: Option<&Owner>, name: &str) -> bool {
        self.entries.values().any(|handler| {
            handler.name() == name
                && match owner {
                    Some(owner) => handler.owner() == owner,
                    None => true,
                }
        })
    }

    pub fn remove(&mut self, shortcut: &Shortcut) -> Option<HandlerRef<G>> {
        self.entries.remove(shortcut)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Removes every binding of the given kind, returning how many went.
    pub fn remove_kind(&mut self, kind: ShortcutKind) -> usize {
        self.remove_matching(|shortcut| shortcut.kind() == kind)
    }

    /// Removes bindings of the given kind whose shortcut id is in `ids`.
    pub fn remove_kind_ids(&mut self, kind: ShortcutKind, ids: &[i32]) -> usize {
        self.remove_matching(|shortcut| shortcut.kind() == kind && ids.contains(&shortcut.id()))
    }

    fn remove_matching(&mut self, matches: impl Fn(&Shortcut) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|shortcut, _| !matches(shortcut));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every binding, one `"<shortcut> -> <handler>"` line each, grouped by
    /// shortcut kind with a header before the first line of each group.
    pub fn describe(&self) -> String {
        self.describe_matching(|_| true)
    }

    pub fn describe_kind(&self, kind: ShortcutKind) -> String {
        self.describe_matching(|shortcut| shortcut.kind() == kind)
    }

    pub fn describe_kind_ids(&self, kind: ShortcutKind, ids: &[i32]) -> String {
        self.describe_matching(|shortcut| shortcut.kind() == kind && ids.contains(&shortcut.id()))
    }

    fn describe_matching(&self, matches: impl Fn(&Shortcut) -> bool) -> String {
        let mut rows: Vec<_> = self
            .entries
            .iter()
            .filter(|(shortcut, _)| matches(*shortcut))
            .collect();
        rows.sort_by_key(|(shortcut, _)| shortcut.sort_key());

        let mut out = String::new();
        let mut group = None;
        for (shortcut, handler) in rows {
            if group != Some(shortcut.kind()) {
                group = Some(shortcut.kind());
                out.push_str(shortcut.kind().title());
                out.push_str(":\n");
            }
            out.push_str(&format!("{shortcut} -> {}\n", handler.name()));
        }
        out
    }
}

impl<G> Clone for BindingTable<G> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<G> Default for BindingTable<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> fmt::Debug for BindingTable<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingTable")
            .field("entries", &self.entries.len())
            .finish()
    }
}
