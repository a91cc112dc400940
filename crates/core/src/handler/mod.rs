//! Named handlers and the registry they are resolved from.
//!
//! Bindings and stage handlers are registered by *name*. The application
//! builds one [`HandlerRegistry`] per grabber type at startup, filling it with
//! closures, and every [`Profile`](crate::Profile) resolves names against it
//! when a binding is made. Resolution checks three things: the owner has a
//! handler with that name, the handler has the expected [`Shape`], and its
//! declared [`Category`] matches the slot it is bound to.
//!
//! Every handler is called with the grabber and the event. For handlers owned
//! by the grabber itself the grabber plays the role of `self`; delegate
//! handlers capture their own state and receive the grabber they act on.

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    rc::Rc,
};

use serde::{Deserialize, Serialize};

use crate::{BiasError, Category, Event, HandlerResult, Result};

/// Plain action: bound to a shortcut, or used as a flush stage.
pub type ActionFn<G> = Rc<dyn Fn(&mut G, &Event) -> HandlerResult<()>>;

/// Init/exec stage: returns whether the event was consumed.
pub type StageFn<G> = Rc<dyn Fn(&mut G, &Event) -> HandlerResult<bool>>;

/// Who a handler belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Owner {
    /// The interactive object the profile dispatches for.
    #[default]
    Grabber,
    /// Another object registered under a name.
    Delegate(String),
}

impl Owner {
    pub fn delegate(name: impl Into<String>) -> Self {
        Self::Delegate(name.into())
    }
}

impl From<Option<String>> for Owner {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Grabber, Self::Delegate)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grabber => f.write_str("the grabber"),
            Self::Delegate(name) => write!(f, "delegate `{name}`"),
        }
    }
}

/// Call shape of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Action,
    Stage,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => f.write_str("an action"),
            Self::Stage => f.write_str("a stage handler"),
        }
    }
}

enum Callback<G> {
    Action(ActionFn<G>),
    Stage(StageFn<G>),
}

impl<G> Clone for Callback<G> {
    fn clone(&self) -> Self {
        match self {
            Self::Action(action) => Self::Action(action.clone()),
            Self::Stage(stage) => Self::Stage(stage.clone()),
        }
    }
}

/// A resolved handler: owner, name, declared category and the callable.
/// Cloning only bumps a reference count.
pub struct HandlerRef<G> {
    owner: Owner,
    name: Rc<str>,
    accepts: Category,
    callback: Callback<G>,
}

impl<G> HandlerRef<G> {
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event category the handler was declared to take.
    pub fn accepts(&self) -> Category {
        self.accepts
    }

    pub fn shape(&self) -> Shape {
        match self.callback {
            Callback::Action(_) => Shape::Action,
            Callback::Stage(_) => Shape::Stage,
        }
    }

    /// Same owner and name, i.e. the same registry entry.
    pub fn same_as(&self, other: &Self) -> bool {
        self.owner == other.owner && self.name == other.name && self.accepts == other.accepts
    }

    /// Invokes the handler. Actions report `true` once they ran; stages report
    /// their own verdict. Events the handler was not declared for are refused.
    pub fn call(&self, grabber: &mut G, event: &Event) -> HandlerResult<bool> {
        if !self.accepts.admits(event.category()) {
            return Err(BiasError::CategoryMismatch {
                name: self.name.to_string(),
                expected: event.category(),
                found: self.accepts,
            });
        }

        match &self.callback {
            Callback::Action(action) => action(grabber, event).map(|()| true),
            Callback::Stage(stage) => stage(grabber, event),
        }
    }
}

impl<G> Clone for HandlerRef<G> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            name: self.name.clone(),
            accepts: self.accepts,
            callback: self.callback.clone(),
        }
    }
}

impl<G> fmt::Debug for HandlerRef<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRef")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("accepts", &self.accepts)
            .field("shape", &self.shape())
            .finish()
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// A different handler was bound before and has been overwritten.
    Replaced { previous: String },
    /// The identical handler was already bound; nothing changed.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HandlerKey {
    owner: Owner,
    name: String,
    accepts: Category,
}

/// Lookup table from `(owner, name, category)` to a typed handler.
///
/// The same name may be registered several times for one owner with
/// different categories, e.g. a `zoom` for 1-DOF wheels and another for
/// 2-DOF drags.
pub struct HandlerRegistry<G> {
    handlers: HashMap<HandlerKey, HandlerRef<G>>,
}

impl<G> HandlerRegistry<G> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registers a grabber action.
    pub fn action<F>(&mut self, name: &str, accepts: Category, f: F) -> &mut Self
    where
        F: Fn(&mut G, &Event) -> HandlerResult<()> + 'static,
    {
        self.insert(Owner::Grabber, name, accepts, Callback::Action(Rc::new(f)))
    }

    /// Registers a grabber init/exec stage handler.
    pub fn stage<F>(&mut self, name: &str, accepts: Category, f: F) -> &mut Self
    where
        F: Fn(&mut G, &Event) -> HandlerResult<bool> + 'static,
    {
        self.insert(Owner::Grabber, name, accepts, Callback::Stage(Rc::new(f)))
    }

    /// Registers an action owned by `target`, a delegate acting on the
    /// grabber. The delegate is borrowed mutably for the duration of the call.
    pub fn delegate_action<D, F>(
        &mut self,
        owner: &str,
        target: Rc<RefCell<D>>,
        name: &str,
        accepts: Category,
        f: F,
    ) -> &mut Self
    where
        G: 'static,
        D: 'static,
        F: Fn(&mut D, &mut G, &Event) -> HandlerResult<()> + 'static,
    {
        let label = owner.to_string();
        let callback = Callback::Action(Rc::new(move |grabber: &mut G, event: &Event| {
            let mut delegate = borrow_delegate(&target, &label)?;
            f(&mut delegate, grabber, event)
        }));
        self.insert(Owner::delegate(owner), name, accepts, callback)
    }

    /// Registers an init/exec stage handler owned by a delegate.
    pub fn delegate_stage<D, F>(
        &mut self,
        owner: &str,
        target: Rc<RefCell<D>>,
        name: &str,
        accepts: Category,
        f: F,
    ) -> &mut Self
    where
        G: 'static,
        D: 'static,
        F: Fn(&mut D, &mut G, &Event) -> HandlerResult<bool> + 'static,
    {
        let label = owner.to_string();
        let callback = Callback::Stage(Rc::new(move |grabber: &mut G, event: &Event| {
            let mut delegate = borrow_delegate(&target, &label)?;
            f(&mut delegate, grabber, event)
        }));
        self.insert(Owner::delegate(owner), name, accepts, callback)
    }

    pub fn contains(&self, owner: &Owner, name: &str) -> bool {
        self.handlers
            .keys()
            .any(|key| &key.owner == owner && key.name == name)
    }

    /// Resolves `name` on `owner` for a slot that needs `shape` and `accepts`.
    pub fn resolve(
        &self,
        owner: &Owner,
        name: &str,
        shape: Shape,
        accepts: Category,
    ) -> Result<HandlerRef<G>> {
        let key = HandlerKey {
            owner: owner.clone(),
            name: name.to_string(),
            accepts,
        };

        if let Some(handler) = self.handlers.get(&key) {
            if handler.shape() != shape {
                return Err(BiasError::ShapeMismatch {
                    name: name.to_string(),
                    expected: shape,
                    found: handler.shape(),
                });
            }
            return Ok(handler.clone());
        }

        match self
            .handlers
            .values()
            .find(|handler| handler.owner() == owner && handler.name() == name)
        {
            Some(other) => Err(BiasError::CategoryMismatch {
                name: name.to_string(),
                expected: accepts,
                found: other.accepts(),
            }),
            None => Err(BiasError::UnknownHandler {
                owner: owner.clone(),
                name: name.to_string(),
            }),
        }
    }

    fn insert(
        &mut self,
        owner: Owner,
        name: &str,
        accepts: Category,
        callback: Callback<G>,
    ) -> &mut Self {
        let key = HandlerKey {
            owner: owner.clone(),
            name: name.to_string(),
            accepts,
        };
        let handler = HandlerRef {
            owner,
            name: Rc::from(name),
            accepts,
            callback,
        };
        if self.handlers.insert(key, handler).is_some() {
            tracing::debug!(name, %accepts, "handler re-registered in registry");
        }
        self
    }
}

impl<G> Default for HandlerRegistry<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G> fmt::Debug for HandlerRegistry<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

fn borrow_delegate<'a, D>(
    target: &'a Rc<RefCell<D>>,
    owner: &str,
) -> Result<std::cell::RefMut<'a, D>> {
    target
        .try_borrow_mut()
        .map_err(|_| BiasError::msg(format!("delegate `{owner}` is already in use")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Modifiers, Shortcut};

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    fn motion_event() -> Event {
        Event::motion(Shortcut::motion(0, Modifiers::empty()), Category::Dof2)
    }

    #[test]
    fn resolves_by_owner_name_and_category() {
        let mut registry = HandlerRegistry::<Counter>::new();
        registry.action("rotate", Category::Motion, |counter, _| {
            counter.hits += 1;
            Ok(())
        });

        let handler = registry
            .resolve(&Owner::Grabber, "rotate", Shape::Action, Category::Motion)
            .unwrap();
        let mut counter = Counter::default();

        assert!(handler.call(&mut counter, &motion_event()).unwrap());
        assert_eq!(counter.hits, 1);
    }

    #[test]
    fn reports_why_resolution_failed() {
        let mut registry = HandlerRegistry::<Counter>::new();
        registry.stage("initMotion", Category::Motion, |_, _| Ok(true));

        let unknown = registry
            .resolve(&Owner::Grabber, "spin", Shape::Action, Category::Motion)
            .unwrap_err();
        assert!(matches!(unknown, BiasError::UnknownHandler { .. }));

        let shape = registry
            .resolve(&Owner::Grabber, "initMotion", Shape::Action, Category::Motion)
            .unwrap_err();
        assert!(matches!(shape, BiasError::ShapeMismatch { .. }));

        let category = registry
            .resolve(&Owner::Grabber, "initMotion", Shape::Stage, Category::Click)
            .unwrap_err();
        assert!(matches!(category, BiasError::CategoryMismatch { .. }));

        let owner = registry
            .resolve(&Owner::delegate("hud"), "initMotion", Shape::Stage, Category::Motion)
            .unwrap_err();
        assert!(matches!(owner, BiasError::UnknownHandler { .. }));
    }

    #[test]
    fn delegates_receive_their_state_and_the_grabber() {
        let hud = Rc::new(RefCell::new(Vec::<String>::new()));
        let mut registry = HandlerRegistry::<Counter>::new();
        registry.delegate_action("hud", hud.clone(), "trace", Category::Generic, |log, counter, event| {
            counter.hits += 1;
            log.push(event.shortcut().describe());
            Ok(())
        });

        let handler = registry
            .resolve(&Owner::delegate("hud"), "trace", Shape::Action, Category::Generic)
            .unwrap();
        let mut counter = Counter::default();
        handler.call(&mut counter, &motion_event()).unwrap();

        assert_eq!(counter.hits, 1);
        assert_eq!(hud.borrow().as_slice(), ["motion(0)"]);
    }

    #[test]
    fn delegate_stages_report_their_verdict() {
        let armed = Rc::new(RefCell::new(false));
        let mut registry = HandlerRegistry::<Counter>::new();
        registry.delegate_stage("guard", armed.clone(), "initMotion", Category::Motion, |armed, _, _| {
            Ok(*armed)
        });
        let handler = registry
            .resolve(&Owner::delegate("guard"), "initMotion", Shape::Stage, Category::Motion)
            .unwrap();

        assert!(!handler.call(&mut Counter::default(), &motion_event()).unwrap());
        *armed.borrow_mut() = true;
        assert!(handler.call(&mut Counter::default(), &motion_event()).unwrap());
    }

    #[test]
    fn busy_delegate_is_an_error_not_a_panic() {
        let state = Rc::new(RefCell::new(0_u32));
        let mut registry = HandlerRegistry::<Counter>::new();
        registry.delegate_action("hud", state.clone(), "bump", Category::Generic, |n, _, _| {
            *n += 1;
            Ok(())
        });
        let handler = registry
            .resolve(&Owner::delegate("hud"), "bump", Shape::Action, Category::Generic)
            .unwrap();

        let _held = state.borrow_mut();
        let err = handler
            .call(&mut Counter::default(), &motion_event())
            .unwrap_err();
        assert!(format!("{err}").contains("hud"));
    }

    #[test]
    fn refuses_events_outside_the_declared_category() {
        let mut registry = HandlerRegistry::<Counter>::new();
        registry.action("press", Category::Keyboard, |_, _| Ok(()));
        let handler = registry
            .resolve(&Owner::Grabber, "press", Shape::Action, Category::Keyboard)
            .unwrap();

        let err = handler
            .call(&mut Counter::default(), &motion_event())
            .unwrap_err();
        assert!(matches!(err, BiasError::CategoryMismatch { .. }));
    }
}
