use std::rc::Rc;

use crate::{Dispatch, Event, HandlerRegistry, Profile};

/// A grabber paired with the profile that dispatches events to it.
///
/// Keeping both in one value lets the host call [`InteractiveObject::handle`]
/// without splitting borrows. Handlers only ever see the grabber, so they
/// cannot re-enter the profile while it is dispatching.
#[derive(Debug)]
pub struct InteractiveObject<G> {
    grabber: G,
    profile: Profile<G>,
}

impl<G> InteractiveObject<G> {
    pub fn new(grabber: G, registry: Rc<HandlerRegistry<G>>) -> Self {
        Self {
            grabber,
            profile: Profile::new(registry),
        }
    }

    pub fn grabber(&self) -> &G {
        &self.grabber
    }

    pub fn grabber_mut(&mut self) -> &mut G {
        &mut self.grabber
    }

    pub fn profile(&self) -> &Profile<G> {
        &self.profile
    }

    pub fn profile_mut(&mut self) -> &mut Profile<G> {
        &mut self.profile
    }

    pub fn handle(&mut self, event: &Event) -> Dispatch {
        self.profile.handle(&mut self.grabber, event)
    }

    pub fn into_parts(self) -> (G, Profile<G>) {
        (self.grabber, self.profile)
    }
}
