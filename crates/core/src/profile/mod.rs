//! The dispatch engine of one interactive object.
//!
//! A [`Profile`] owns a [`BindingTable`] (shortcut → action) and a
//! [`StageTable`] (stage → handler) and turns incoming events into handler
//! calls. Every event first goes through a three-tempi gesture state machine:
//!
//! - **init**: no gesture is in progress and a non-terminal event arrives
//!   whose shortcut is bound. The bound action's name becomes the current
//!   gesture and the matching `init*` stage runs.
//! - **exec**: a gesture is in progress and another non-terminal event for
//!   the same action arrives. The matching `exec*` stage runs.
//! - **flush**: the gesture ends, either with a terminal event or because a
//!   non-terminal event resolves to a different action. The matching
//!   `flush*` stage runs; an abrupt change then starts the new gesture.
//!
//! Init and exec handlers report whether they consumed the event. When they
//! did not (or none is registered) the bound action itself is invoked, so
//! simple one-shot bindings work without any stage handler at all.
//!
//! Handler failures are logged and treated as "not consumed"; nothing a
//! handler does can make [`Profile::handle`] fail.

use std::{fmt, rc::Rc};

use crate::{
    config::EngineConfig, handler::Shape, stage::Phase, BindingTable, Category, Event,
    HandlerRef, HandlerRegistry, Owner, Registration, Result, Shortcut, ShortcutKind, Stage,
    StageTable,
};

/// What consumed an event passed to [`Profile::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The gesture state machine took it.
    Stage,
    /// It fell through to the bound action, which ran.
    Action,
    /// Nothing was bound, or the bound action failed.
    Ignored,
}

/// Shortcut and stage bindings of one grabber type `G`, plus the gesture in
/// progress.
pub struct Profile<G> {
    registry: Rc<HandlerRegistry<G>>,
    bindings: BindingTable<G>,
    stages: StageTable<G>,
    init_action: Option<String>,
}

impl<G> Profile<G> {
    pub fn new(registry: Rc<HandlerRegistry<G>>) -> Self {
        Self {
            registry,
            bindings: BindingTable::new(),
            stages: StageTable::new(),
            init_action: None,
        }
    }

    pub fn registry(&self) -> &Rc<HandlerRegistry<G>> {
        &self.registry
    }

    pub fn bindings(&self) -> &BindingTable<G> {
        &self.bindings
    }

    pub fn stages(&self) -> &StageTable<G> {
        &self.stages
    }

    /// Replaces both tables with copies of `other`'s. Handlers owned by the
    /// grabber act on whichever grabber this profile is dispatched for.
    pub fn copy_from(&mut self, other: &Profile<G>) {
        self.registry = other.registry.clone();
        self.bindings = other.bindings.clone();
        self.stages = other.stages.clone();
        self.init_action = None;
    }

    // Bindings

    /// Binds `shortcut` to the handler `name` of `owner`, which must be an
    /// action declared for `accepts` events.
    ///
    /// Failures are logged and returned; the table is left untouched.
    pub fn bind(
        &mut self,
        owner: Owner,
        shortcut: Shortcut,
        name: &str,
        accepts: Category,
    ) -> Result<Registration> {
        if let Some(current) = self.bindings.get(&shortcut) {
            if current.owner() == &owner && current.name() == name && current.accepts() == accepts
            {
                tracing::info!(%shortcut, handler = name, "shortcut already bound");
                return Ok(Registration::Unchanged);
            }
        }

        let handler = self
            .registry
            .resolve(&owner, name, Shape::Action, accepts)
            .inspect_err(|err| {
                tracing::warn!(%shortcut, handler = name, %err, "could not register binding");
            })?;
        Ok(self.bindings.insert(shortcut, handler))
    }

    /// Binds a handler declared for generic events.
    pub fn set_binding(&mut self, owner: Owner, shortcut: Shortcut, name: &str) -> Result<Registration> {
        self.bind(owner, shortcut, name, Category::Generic)
    }

    pub fn set_keyboard_binding(
        &mut self,
        owner: Owner,
        shortcut: Shortcut,
        name: &str,
    ) -> Result<Registration> {
        self.bind(owner, shortcut, name, Category::Keyboard)
    }

    pub fn set_click_binding(
        &mut self,
        owner: Owner,
        shortcut: Shortcut,
        name: &str,
    ) -> Result<Registration> {
        self.bind(owner, shortcut, name, Category::Click)
    }

    pub fn set_motion_binding(
        &mut self,
        owner: Owner,
        shortcut: Shortcut,
        name: &str,
    ) -> Result<Registration> {
        self.bind(owner, shortcut, name, Category::Motion)
    }

    pub fn set_dof1_binding(&mut self, owner: Owner, shortcut: Shortcut, name: &str) -> Result<Registration> {
        self.bind(owner, shortcut, name, Category::Dof1)
    }

    pub fn set_dof2_binding(&mut self, owner: Owner, shortcut: Shortcut, name: &str) -> Result<Registration> {
        self.bind(owner, shortcut, name, Category::Dof2)
    }

    pub fn set_dof3_binding(&mut self, owner: Owner, shortcut: Shortcut, name: &str) -> Result<Registration> {
        self.bind(owner, shortcut, name, Category::Dof3)
    }

    pub fn set_dof6_binding(&mut self, owner: Owner, shortcut: Shortcut, name: &str) -> Result<Registration> {
        self.bind(owner, shortcut, name, Category::Dof6)
    }

    pub fn remove_binding(&mut self, shortcut: &Shortcut) {
        if self.bindings.remove(shortcut).is_some() {
            tracing::debug!(%shortcut, "binding removed");
        }
    }

    pub fn remove_bindings(&mut self) {
        self.bindings.clear();
    }

    pub fn remove_keyboard_bindings(&mut self) -> usize {
        self.bindings.remove_kind(ShortcutKind::Keyboard)
    }

    pub fn remove_keyboard_bindings_for(&mut self, ids: &[i32]) -> usize {
        self.bindings.remove_kind_ids(ShortcutKind::Keyboard, ids)
    }

    pub fn remove_click_bindings(&mut self) -> usize {
        self.bindings.remove_kind(ShortcutKind::Click)
    }

    pub fn remove_click_bindings_for(&mut self, ids: &[i32]) -> usize {
        self.bindings.remove_kind_ids(ShortcutKind::Click, ids)
    }

    pub fn remove_motion_bindings(&mut self) -> usize {
        self.bindings.remove_kind(ShortcutKind::Motion)
    }

    pub fn remove_motion_bindings_for(&mut self, ids: &[i32]) -> usize {
        self.bindings.remove_kind_ids(ShortcutKind::Motion, ids)
    }

    pub fn has_binding(&self, shortcut: &Shortcut) -> bool {
        self.bindings.contains(shortcut)
    }

    /// Handler bound to `shortcut`.
    pub fn action(&self, shortcut: &Shortcut) -> Option<&HandlerRef<G>> {
        self.bindings.get(shortcut)
    }

    pub fn action_name(&self, shortcut: &Shortcut) -> Option<&str> {
        self.bindings.action_name(shortcut)
    }

    pub fn owner(&self, shortcut: &Shortcut) -> Option<&Owner> {
        self.bindings.get(shortcut).map(HandlerRef::owner)
    }

    /// Whether `name` is bound anywhere; pass an owner to only count its
    /// handlers.
    pub fn is_action_bound(&self, owner: Option<&Owner>, name: &str) -> bool {
        self.bindings.is_action_bound(owner, name)
    }

    /// Description of every binding, grouped by shortcut kind.
    pub fn info(&self) -> String {
        self.bindings.describe()
    }

    pub fn keyboard_bindings_info(&self) -> String {
        self.bindings.describe_kind(ShortcutKind::Keyboard)
    }

    pub fn keyboard_bindings_info_for(&self, ids: &[i32]) -> String {
        self.bindings.describe_kind_ids(ShortcutKind::Keyboard, ids)
    }

    pub fn click_bindings_info(&self) -> String {
        self.bindings.describe_kind(ShortcutKind::Click)
    }

    pub fn click_bindings_info_for(&self, ids: &[i32]) -> String {
        self.bindings.describe_kind_ids(ShortcutKind::Click, ids)
    }

    pub fn motion_bindings_info(&self) -> String {
        self.bindings.describe_kind(ShortcutKind::Motion)
    }

    pub fn motion_bindings_info_for(&self, ids: &[i32]) -> String {
        self.bindings.describe_kind_ids(ShortcutKind::Motion, ids)
    }

    // Stage handlers

    /// Registers the handler named like the stage (`initMotion`,
    /// `flushDOF2`, ...) of `owner` for that stage.
    ///
    /// Unknown stage names and unresolvable handlers are logged and returned.
    pub fn add_stage_handler(&mut self, owner: Owner, stage_name: &str) -> Result<Registration> {
        let stage: Stage = stage_name.parse().inspect_err(|err| {
            tracing::warn!(%err, "stage handler not added");
        })?;

        let handler = self
            .registry
            .resolve(&owner, stage.name(), stage.phase().shape(), stage.category())
            .inspect_err(|err| {
                tracing::warn!(stage = stage.name(), %err, "could not register stage handler");
            })?;
        Ok(self.stages.insert(stage, handler))
    }

    pub fn has_stage_handler(&self, stage_name: &str) -> bool {
        stage_name
            .parse::<Stage>()
            .is_ok_and(|stage| self.stages.contains(&stage))
    }

    pub fn remove_stage_handler(&mut self, stage_name: &str) -> bool {
        match stage_name.parse::<Stage>() {
            Ok(stage) => self.stages.remove(&stage).is_some(),
            Err(_) => false,
        }
    }

    /// Registers every binding and stage handler declared in `config`,
    /// returning how many registrations succeeded. Failures are logged.
    pub fn apply_config(&mut self, config: &EngineConfig) -> usize {
        let bindings = config
            .bindings
            .iter()
            .filter(|binding| {
                self.bind(binding.owner(), binding.shortcut, &binding.handler, binding.accepts)
                    .is_ok()
            })
            .count();
        let stages = config
            .stages
            .iter()
            .filter(|stage| self.add_stage_handler(stage.owner(), &stage.stage).is_ok())
            .count();
        bindings + stages
    }

    // Dispatch

    /// Action of the gesture in progress, if any.
    pub fn current_action(&self) -> Option<&str> {
        self.init_action.as_deref()
    }

    /// Forgets the gesture in progress without running its flush stage.
    pub fn reset_gesture(&mut self) {
        self.init_action = None;
    }

    /// Dispatches `event` on behalf of `grabber`.
    pub fn handle(&mut self, grabber: &mut G, event: &Event) -> Dispatch {
        if self.process_stage(grabber, event) {
            Dispatch::Stage
        } else if self.invoke_action(grabber, event) {
            Dispatch::Action
        } else {
            Dispatch::Ignored
        }
    }

    fn process_stage(&mut self, grabber: &mut G, event: &Event) -> bool {
        let Some(current) = self.init_action.as_deref() else {
            if event.is_terminal() {
                // Nothing in progress: a stray release is ignored.
                return true;
            }
            return self.init_stage(grabber, event);
        };

        if event.is_terminal() {
            tracing::trace!(action = current, "gesture ended");
            self.invoke_stage(Phase::Flush, grabber, event);
            self.init_action = None;
            return true;
        }

        if self.bindings.action_name(event.shortcut()) == Some(current) {
            self.invoke_stage(Phase::Exec, grabber, event)
        } else {
            tracing::trace!(action = current, "gesture interrupted by another action");
            self.invoke_stage(Phase::Flush, grabber, event);
            self.init_stage(grabber, event)
        }
    }

    fn init_stage(&mut self, grabber: &mut G, event: &Event) -> bool {
        self.init_action = self
            .bindings
            .action_name(event.shortcut())
            .map(str::to_owned);
        match self.init_action.as_deref() {
            Some(action) => {
                tracing::trace!(action, "gesture started");
                self.invoke_stage(Phase::Init, grabber, event)
            }
            None => false,
        }
    }

    /// Runs the stage handler for `phase` that fits the event's category.
    fn invoke_stage(&self, phase: Phase, grabber: &mut G, event: &Event) -> bool {
        let Some((stage, handler)) = self.stages.lookup(phase, event.category()) else {
            return false;
        };

        match handler.call(grabber, event) {
            Ok(consumed) => consumed,
            Err(err) => {
                tracing::error!(
                    stage = stage.name(),
                    handler = handler.name(),
                    %err,
                    "stage handler failed"
                );
                false
            }
        }
    }

    fn invoke_action(&self, grabber: &mut G, event: &Event) -> bool {
        let Some(handler) = self.bindings.get(event.shortcut()) else {
            return false;
        };

        match handler.call(grabber, event) {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(handler = handler.name(), %err, "action failed");
                false
            }
        }
    }
}

impl<G> Clone for Profile<G> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            bindings: self.bindings.clone(),
            stages: self.stages.clone(),
            init_action: self.init_action.clone(),
        }
    }
}

impl<G> fmt::Debug for Profile<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("bindings", &self.bindings)
            .field("stages", &self.stages)
            .field("init_action", &self.init_action)
            .finish()
    }
}
