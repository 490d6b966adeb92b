//! The per-frame scheduler: an ordered registry of tick hooks driven by the
//! frame clock.
//!
//! Every subsystem that needs per-frame work registers a hook. Within a tick
//! the logic hooks run strictly in registration order, and the render hook,
//! held in its own slot so nothing can be appended after it, always runs
//! last. The registry is append-only: a hook is never removed, it just
//! becomes an internal no-op once its owner stops caring.
//!
//! All of this runs on one logical thread. There is no cancellation for an
//! in-flight hook; a stalled hook stalls the frame, so hooks must be bounded
//! and fast.

use std::time::Instant;

use crate::clock::{FrameClock, FrameTick};

/// A per-tick callable. Receives the clamped frame delta in seconds.
pub type TickHook = Box<dyn FnMut(f32)>;

/// Ordered per-tick hook registry plus the clock that feeds it.
pub struct RenderLoop {
    clock: FrameClock,
    hooks: Vec<TickHook>,
    render_hook: Option<TickHook>,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            clock: FrameClock::new(),
            hooks: Vec::new(),
            render_hook: None,
        }
    }

    /// Append a logic hook. Hooks run in the order they were added, always
    /// before the render hook. There is no removal.
    pub fn add_hook(&mut self, hook: impl FnMut(f32) + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Install the hook that runs last each tick and issues the draw call.
    ///
    /// Installing a second render hook replaces the first; the loop draws
    /// exactly once per tick.
    pub fn set_render_hook(&mut self, hook: impl FnMut(f32) + 'static) {
        if self.render_hook.is_some() {
            log::warn!("render hook replaced");
        }
        self.render_hook = Some(Box::new(hook));
    }

    /// Number of registered logic hooks.
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Run one tick: clock, then every logic hook in order, then the render
    /// hook. Returns the tick that was distributed.
    pub fn tick(&mut self, now: Instant) -> FrameTick {
        let tick = self.clock.tick(now);
        for hook in &mut self.hooks {
            hook(tick.delta_seconds);
        }
        if let Some(render) = &mut self.render_hook {
            render(tick.delta_seconds);
        }
        tick
    }
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn hooks_run_in_registration_order() {
        let order: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        let mut render_loop = RenderLoop::new();

        for id in 0..5u32 {
            let order = Rc::clone(&order);
            render_loop.add_hook(move |_| order.borrow_mut().push(id));
        }

        let t0 = Instant::now();
        for frame in 0..3 {
            order.borrow_mut().clear();
            render_loop.tick(t0 + Duration::from_millis(frame * 16));
            assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn render_hook_runs_after_every_logic_hook() {
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let mut render_loop = RenderLoop::new();

        let log = Rc::clone(&order);
        render_loop.set_render_hook(move |_| log.borrow_mut().push("render"));
        // Logic hooks added *after* the render hook still run before it.
        let log = Rc::clone(&order);
        render_loop.add_hook(move |_| log.borrow_mut().push("logic"));

        render_loop.tick(Instant::now());
        assert_eq!(*order.borrow(), vec!["logic", "render"]);
    }

    #[test]
    fn hooks_receive_the_clamped_delta() {
        let seen: Rc<RefCell<Vec<f32>>> = Rc::new(RefCell::new(Vec::new()));
        let mut render_loop = RenderLoop::new();
        let sink = Rc::clone(&seen);
        render_loop.add_hook(move |dt| sink.borrow_mut().push(dt));

        let t0 = Instant::now();
        render_loop.tick(t0);
        render_loop.tick(t0 + Duration::from_secs(10)); // long stall

        assert!(seen.borrow().iter().all(|&dt| dt <= 0.2));
    }

    #[test]
    fn registry_only_grows() {
        let mut render_loop = RenderLoop::new();
        render_loop.add_hook(|_| {});
        render_loop.add_hook(|_| {});
        assert_eq!(render_loop.hook_count(), 2);
        render_loop.tick(Instant::now());
        assert_eq!(render_loop.hook_count(), 2);
    }
}
