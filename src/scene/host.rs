//! The scene host: exclusive owner of the active scene and executor of the
//! transition protocol.

use std::panic::{AssertUnwindSafe, catch_unwind};

use super::scene::{EmptyScene, Scene, SceneOutcome};
use crate::delegate::{SharedDelegate, StageDelegate, notify, panic_message};

/// Owns the single active [`Scene`] and drives its lifecycle.
///
/// The host is never without a scene: it starts on [`EmptyScene`] and every
/// transition installs a replacement. The transition protocol is always the
/// same, whether triggered by a scene's own `update` or by an explicit
/// [`change_scene`](Self::change_scene) call:
///
/// 1. outgoing scene's `end` runs to completion,
/// 2. the replacement becomes current,
/// 3. incoming scene's `init` runs,
/// 4. the delegate's `on_scene_changed` is notified.
///
/// Scene callbacks that panic are caught here and logged; the frame loop
/// never stops ticking because of a misbehaving scene.
pub struct SceneHost {
    scene: Box<dyn Scene>,
    delegate: Option<SharedDelegate>,
}

impl SceneHost {
    /// Create a host running [`EmptyScene`].
    pub fn new() -> Self {
        Self {
            scene: Box::new(EmptyScene),
            delegate: None,
        }
    }

    /// Register the engine delegate notified on scene changes.
    pub fn set_delegate(&mut self, delegate: SharedDelegate) {
        self.delegate = Some(delegate);
    }

    /// Install the starting scene via the normal transition protocol.
    pub fn init(&mut self, start: Box<dyn Scene>) {
        self.change_scene(start);
    }

    /// Name of the currently active scene.
    pub fn current_name(&self) -> &str {
        self.scene.name()
    }

    /// Run the active scene's logic step for one tick.
    ///
    /// If the scene requests a replacement, the transition protocol runs
    /// before this returns. If the scene panics, the tick is a no-op and the
    /// current scene is retained.
    pub fn update(&mut self, dt: f32) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.scene.update(dt)));
        match outcome {
            Ok(SceneOutcome::Continue) => {}
            Ok(SceneOutcome::TransitionTo(next)) => self.change_scene(next),
            Err(payload) => {
                log::error!(
                    "scene '{}' panicked in update: {}; staying on it",
                    self.scene.name(),
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    /// Run the active scene's animation step (render phase).
    pub fn animate(&mut self, dt: f32) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.scene.animate(dt))) {
            log::error!(
                "scene '{}' panicked in animate: {}",
                self.scene.name(),
                panic_message(payload.as_ref())
            );
        }
    }

    /// Replace the active scene, running the full transition protocol.
    ///
    /// Usable from outside the tick path as well (e.g. a scene reacting to
    /// input); the ordering guarantee is identical either way.
    pub fn change_scene(&mut self, next: Box<dyn Scene>) {
        let outgoing = self.scene.name().to_owned();
        log::info!("scene transition: '{}' -> '{}'", outgoing, next.name());

        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.scene.end())) {
            // The outgoing scene forfeited its cleanup; nothing else can
            // release what it held.
            log::error!(
                "scene '{}' panicked in end: {}",
                outgoing,
                panic_message(payload.as_ref())
            );
        }

        self.scene = next;

        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.scene.init())) {
            log::error!(
                "scene '{}' panicked in init: {}",
                self.scene.name(),
                panic_message(payload.as_ref())
            );
        }

        if let Some(delegate) = &self.delegate {
            notify(delegate, "on_scene_changed", |d| {
                d.on_scene_changed(self.scene.name())
            });
        }
    }
}

impl Default for SceneHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::StageDelegate;
    use std::cell::RefCell;
    use std::rc::Rc;

    type EventLog = Rc<RefCell<Vec<String>>>;

    /// Scene that records its lifecycle calls and transitions after a fixed
    /// number of updates.
    struct Recording {
        label: &'static str,
        log: EventLog,
        updates_until_next: Option<usize>,
        successor: Option<Box<dyn Scene>>,
    }

    impl Recording {
        fn stay(label: &'static str, log: &EventLog) -> Self {
            Self {
                label,
                log: Rc::clone(log),
                updates_until_next: None,
                successor: None,
            }
        }

        fn then(label: &'static str, log: &EventLog, after: usize, next: Box<dyn Scene>) -> Self {
            Self {
                label,
                log: Rc::clone(log),
                updates_until_next: Some(after),
                successor: Some(next),
            }
        }
    }

    impl Scene for Recording {
        fn init(&mut self) {
            self.log.borrow_mut().push(format!("{}.init", self.label));
        }

        fn update(&mut self, _dt: f32) -> SceneOutcome {
            self.log.borrow_mut().push(format!("{}.update", self.label));
            if let Some(remaining) = &mut self.updates_until_next {
                if *remaining <= 1 {
                    if let Some(next) = self.successor.take() {
                        return SceneOutcome::TransitionTo(next);
                    }
                }
                *remaining = remaining.saturating_sub(1);
            }
            SceneOutcome::Continue
        }

        fn end(&mut self) {
            self.log.borrow_mut().push(format!("{}.end", self.label));
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    #[test]
    fn starts_on_empty_scene() {
        let host = SceneHost::new();
        assert_eq!(host.current_name(), "Empty");
    }

    #[test]
    fn no_transition_means_no_lifecycle_calls() {
        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let mut host = SceneHost::new();
        host.init(Box::new(Recording::stay("a", &log)));
        log.borrow_mut().clear();

        for _ in 0..10 {
            host.update(0.016);
        }

        assert_eq!(host.current_name(), "a");
        assert!(
            log.borrow()
                .iter()
                .all(|event| event.ends_with(".update")),
            "saw lifecycle calls without a transition: {:?}",
            log.borrow()
        );
    }

    #[test]
    fn end_runs_before_init_on_transition() {
        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let mut host = SceneHost::new();
        let b = Box::new(Recording::stay("b", &log));
        host.init(Box::new(Recording::then("a", &log, 1, b)));
        log.borrow_mut().clear();

        host.update(0.016);

        assert_eq!(host.current_name(), "b");
        assert_eq!(*log.borrow(), vec!["a.update", "a.end", "b.init"]);
    }

    #[test]
    fn each_scene_ends_exactly_once_across_repeated_transitions() {
        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let mut host = SceneHost::new();
        // a -> b -> c, where b is the same scene type as a.
        let c = Box::new(Recording::stay("c", &log));
        let b = Box::new(Recording::then("b", &log, 1, c));
        host.init(Box::new(Recording::then("a", &log, 1, b)));
        log.borrow_mut().clear();

        host.update(0.016);
        host.update(0.016);

        let events = log.borrow();
        let ends: Vec<_> = events.iter().filter(|e| e.ends_with(".end")).collect();
        assert_eq!(ends, vec!["a.end", "b.end"]);
        // init of the successor always comes after end of the predecessor.
        let a_end = events.iter().position(|e| e == "a.end").unwrap();
        let b_init = events.iter().position(|e| e == "b.init").unwrap();
        let b_end = events.iter().position(|e| e == "b.end").unwrap();
        let c_init = events.iter().position(|e| e == "c.init").unwrap();
        assert!(a_end < b_init);
        assert!(b_end < c_init);
    }

    #[test]
    fn explicit_change_scene_follows_the_same_protocol() {
        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let mut host = SceneHost::new();
        host.init(Box::new(Recording::stay("a", &log)));
        log.borrow_mut().clear();

        host.change_scene(Box::new(Recording::stay("b", &log)));

        assert_eq!(host.current_name(), "b");
        assert_eq!(*log.borrow(), vec!["a.end", "b.init"]);
    }

    #[test]
    fn update_panic_retains_current_scene() {
        struct Faulty;
        impl Scene for Faulty {
            fn update(&mut self, _dt: f32) -> SceneOutcome {
                panic!("boom");
            }
            fn name(&self) -> &str {
                "Faulty"
            }
        }

        let mut host = SceneHost::new();
        host.init(Box::new(Faulty));
        host.update(0.016);
        host.update(0.016);
        assert_eq!(host.current_name(), "Faulty");
    }

    #[test]
    fn delegate_panic_does_not_abort_the_transition() {
        struct Volatile;
        impl StageDelegate for Volatile {
            fn on_scene_changed(&mut self, _scene: &str) {
                panic!("observer bug");
            }
        }

        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let mut host = SceneHost::new();
        host.set_delegate(Rc::new(RefCell::new(Volatile)));

        host.init(Box::new(Recording::stay("a", &log)));
        host.change_scene(Box::new(Recording::stay("b", &log)));

        assert_eq!(host.current_name(), "b");
        assert_eq!(*log.borrow(), vec!["a.init", "a.end", "b.init"]);
    }

    #[test]
    fn delegate_sees_scene_changes() {
        struct NameCollector {
            names: Vec<String>,
        }
        impl StageDelegate for NameCollector {
            fn on_scene_changed(&mut self, scene: &str) {
                self.names.push(scene.to_owned());
            }
        }

        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let collector = Rc::new(RefCell::new(NameCollector { names: Vec::new() }));
        let mut host = SceneHost::new();
        host.set_delegate(collector.clone());

        host.init(Box::new(Recording::stay("a", &log)));
        host.change_scene(Box::new(Recording::stay("b", &log)));

        assert_eq!(collector.borrow().names, vec!["a", "b"]);
    }
}
