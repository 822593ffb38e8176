//! Drive the frame cadence of the simulation.
//!
//! Each tick reads the pointer, steps the particle system, then draws it. The loop only ever
//! holds a handle to the next scheduled frame, so stopping it is simply a matter of clearing
//! the running flag and dropping that handle.

use std::pin::Pin;

use crate::{
    canvas::Canvas, pointer::PointerTracker, renderer::Renderer, simulation::ParticleSystem,
};

/// The number of microseconds in a second.
const ONE_MICROSECOND: u64 = 1_000_000;

/// A stoppable frame loop.
#[derive(Debug)]
pub struct AnimationLoop {
    /// Whether frames should still be produced.
    is_running: bool,
    /// The next scheduled frame, if there is one.
    next_frame: Option<Pin<Box<tokio::time::Sleep>>>,
    /// Target frames per second.
    frame_rate: u32,
    /// When the last frame was produced.
    last_frame_tick: tokio::time::Instant,
}

impl AnimationLoop {
    /// Instantiate a stopped loop.
    #[must_use]
    pub fn new(frame_rate: u32) -> Self {
        Self {
            is_running: false,
            next_frame: None,
            frame_rate,
            last_frame_tick: tokio::time::Instant::now(),
        }
    }

    /// Start producing frames.
    pub fn start(&mut self) {
        tracing::debug!("Starting animation loop at {} FPS", self.frame_rate);
        self.is_running = true;
        self.schedule_next_frame();
    }

    /// Stop producing frames. Any frame that was already scheduled is cancelled.
    pub fn stop(&mut self) {
        if self.is_running {
            tracing::debug!("Stopping animation loop");
        }
        self.is_running = false;
        self.next_frame = None;
    }

    /// Whether the loop is producing frames.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.is_running
    }

    /// Change the target frames per second.
    pub fn set_frame_rate(&mut self, frame_rate: u32) {
        self.frame_rate = frame_rate;
        self.schedule_next_frame();
    }

    /// How long a single frame should last.
    fn frame_duration(&self) -> std::time::Duration {
        let target = ONE_MICROSECOND.wrapping_div(self.frame_rate.max(1).into());
        std::time::Duration::from_micros(target)
    }

    /// Schedule the next frame, relative to the previous one.
    fn schedule_next_frame(&mut self) {
        if !self.is_running {
            return;
        }
        let deadline = self.last_frame_tick + self.frame_duration();
        self.next_frame = Some(Box::pin(tokio::time::sleep_until(deadline)));
    }

    /// Wait until it's time for the next frame. Never completes when no frame is scheduled,
    /// which makes it safe to use in a `tokio::select!` branch.
    pub async fn wait_for_frame(&mut self) {
        match self.next_frame.as_mut() {
            Some(sleep) => sleep.as_mut().await,
            None => std::future::pending().await,
        }
        self.next_frame = None;
    }

    /// Produce a single frame. Returns `false`, without touching anything, when the loop has
    /// been stopped.
    pub fn tick<C: Canvas>(
        &mut self,
        pointer: &PointerTracker,
        system: &mut ParticleSystem,
        renderer: &Renderer,
        canvas: &mut C,
    ) -> bool {
        if !self.is_running {
            return false;
        }

        system.step(pointer.position());
        renderer.draw(canvas, system.particles());

        self.last_frame_tick = tokio::time::Instant::now();
        self.schedule_next_frame();
        true
    }
}
