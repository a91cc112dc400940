//! Demo scene used by the command line driver: an orbiting camera grabber
//! and a heads-up display delegate that watches it.

use std::{cell::RefCell, rc::Rc};

use bias_core::{
    BiasError, Category, Event, HandlerRegistry, InteractiveObject, Modifiers, Owner, Result,
    Shortcut,
};

pub const LEFT_BUTTON: i32 = 1;
pub const RIGHT_BUTTON: i32 = 3;
pub const WHEEL: i32 = 2;
pub const KEY_R: i32 = 82;
pub const KEY_H: i32 = 72;

/// Camera orbiting the scene origin.
#[derive(Debug, Default)]
pub struct SceneCamera {
    pub yaw_steps: i32,
    pub zoom_steps: i32,
    pub pan_steps: i32,
    pub selections: u32,
    /// Gesture currently steering the camera, as seen by the stage handlers.
    pub gesture: Option<&'static str>,
    pub gestures_completed: u32,
}

impl SceneCamera {
    fn reset(&mut self) {
        *self = Self {
            gestures_completed: self.gestures_completed,
            ..Self::default()
        };
    }
}

/// Overlay that can be toggled and counts what it has shown.
#[derive(Debug, Default)]
pub struct Hud {
    pub visible: bool,
    pub flashes: u32,
}

/// Builds the handler registry for [`SceneCamera`], with the HUD registered
/// as the `hud` delegate.
pub fn registry(hud: Rc<RefCell<Hud>>) -> HandlerRegistry<SceneCamera> {
    let mut registry = HandlerRegistry::new();
    registry
        .action("rotate", Category::Motion, |camera: &mut SceneCamera, _| {
            camera.yaw_steps += 1;
            Ok(())
        })
        .action("translate", Category::Motion, |camera: &mut SceneCamera, _| {
            camera.pan_steps += 1;
            Ok(())
        })
        .action("zoom", Category::Dof1, |camera: &mut SceneCamera, _| {
            camera.zoom_steps += 1;
            Ok(())
        })
        .action("select", Category::Click, |camera: &mut SceneCamera, event| {
            if event.shortcut().clicks() == Some(2) {
                return Err(BiasError::msg("nothing to focus on"));
            }
            camera.selections += 1;
            Ok(())
        })
        .action("reset", Category::Keyboard, |camera: &mut SceneCamera, _| {
            camera.reset();
            Ok(())
        })
        .stage("initMotion", Category::Motion, |camera: &mut SceneCamera, event| {
            camera.gesture = Some(gesture_label(event));
            // Let the bound action also see the first event of the drag.
            Ok(false)
        })
        .stage("execMotion", Category::Motion, |_: &mut SceneCamera, _| Ok(false))
        .action("flushMotion", Category::Motion, |camera: &mut SceneCamera, _| {
            camera.gesture = None;
            camera.gestures_completed += 1;
            Ok(())
        });

    registry
        .delegate_action("hud", hud.clone(), "toggle", Category::Keyboard, |hud, _, _| {
            hud.visible = !hud.visible;
            Ok(())
        })
        .delegate_action("hud", hud, "flash", Category::Click, |hud, camera, _| {
            if hud.visible {
                hud.flashes += 1;
                camera.selections += 1;
            }
            Ok(())
        });
    registry
}

fn gesture_label(event: &Event) -> &'static str {
    if event.shortcut().modifiers().contains(Modifiers::SHIFT) {
        "translate"
    } else {
        "rotate"
    }
}

/// The camera with its default bindings and stage handlers.
pub fn camera(hud: Rc<RefCell<Hud>>) -> Result<InteractiveObject<SceneCamera>> {
    let mut object = InteractiveObject::new(SceneCamera::default(), Rc::new(registry(hud)));
    let profile = object.profile_mut();

    profile.set_motion_binding(
        Owner::Grabber,
        Shortcut::motion(LEFT_BUTTON, Modifiers::empty()),
        "rotate",
    )?;
    profile.set_motion_binding(
        Owner::Grabber,
        Shortcut::motion(LEFT_BUTTON, Modifiers::SHIFT),
        "translate",
    )?;
    profile.set_dof1_binding(Owner::Grabber, Shortcut::motion(WHEEL, Modifiers::empty()), "zoom")?;
    profile.set_click_binding(
        Owner::Grabber,
        Shortcut::click(LEFT_BUTTON, Modifiers::empty(), 1),
        "select",
    )?;
    profile.set_click_binding(
        Owner::Grabber,
        Shortcut::click(LEFT_BUTTON, Modifiers::empty(), 2),
        "select",
    )?;
    profile.set_keyboard_binding(Owner::Grabber, Shortcut::keyboard(KEY_R, Modifiers::CTRL), "reset")?;
    profile.set_keyboard_binding(
        Owner::delegate("hud"),
        Shortcut::keyboard(KEY_H, Modifiers::empty()),
        "toggle",
    )?;
    profile.set_click_binding(
        Owner::delegate("hud"),
        Shortcut::click(RIGHT_BUTTON, Modifiers::empty(), 1),
        "flash",
    )?;

    for stage in ["initMotion", "execMotion", "flushMotion"] {
        profile.add_stage_handler(Owner::Grabber, stage)?;
    }
    Ok(object)
}

#[cfg(test)]
mod tests {
    use bias_core::Dispatch;

    use super::*;

    fn drag(modifiers: Modifiers) -> Event {
        Event::motion(Shortcut::motion(LEFT_BUTTON, modifiers), Category::Dof2)
    }

    #[test]
    fn drag_gesture_rotates_and_completes() {
        let hud = Rc::new(RefCell::new(Hud::default()));
        let mut object = camera(hud).unwrap();

        for _ in 0..3 {
            assert_eq!(object.handle(&drag(Modifiers::empty())), Dispatch::Action);
        }
        assert_eq!(object.grabber().gesture, Some("rotate"));
        object.handle(&drag(Modifiers::empty()).ending());

        let camera = object.grabber();
        assert_eq!(camera.yaw_steps, 3);
        assert_eq!(camera.gesture, None);
        assert_eq!(camera.gestures_completed, 1);
    }

    #[test]
    fn holding_shift_mid_drag_switches_to_translate() {
        let hud = Rc::new(RefCell::new(Hud::default()));
        let mut object = camera(hud).unwrap();

        object.handle(&drag(Modifiers::empty()));
        object.handle(&drag(Modifiers::SHIFT));
        object.handle(&drag(Modifiers::SHIFT));

        let camera = object.grabber();
        assert_eq!(camera.yaw_steps, 1);
        assert_eq!(camera.pan_steps, 2);
        assert_eq!(camera.gestures_completed, 1);
        assert_eq!(camera.gesture, Some("translate"));
    }

    #[test]
    fn hud_delegate_reacts_to_its_bindings() {
        let hud = Rc::new(RefCell::new(Hud::default()));
        let mut object = camera(hud.clone()).unwrap();
        let flash = Event::click(Shortcut::click(RIGHT_BUTTON, Modifiers::empty(), 1));

        object.handle(&flash);
        object.handle(&flash.ending());
        assert_eq!(hud.borrow().flashes, 0);

        object.handle(&Event::keyboard(Shortcut::keyboard(KEY_H, Modifiers::empty())));
        object.handle(&flash);

        assert!(hud.borrow().visible);
        assert_eq!(hud.borrow().flashes, 1);
        assert_eq!(object.grabber().selections, 1);
    }

    #[test]
    fn failing_double_click_leaves_the_camera_alone() {
        let hud = Rc::new(RefCell::new(Hud::default()));
        let mut object = camera(hud).unwrap();
        let double = Event::click(Shortcut::click(LEFT_BUTTON, Modifiers::empty(), 2));

        assert_eq!(object.handle(&double), Dispatch::Ignored);
        assert_eq!(object.grabber().selections, 0);
    }
}
