//! The scene owns the whole simulation: the decoded image, the particles, the pointer, the
//! canvas and the frame loop. It's the only place any of them are mutated, so pointer events and
//! frame ticks are interleaved on a single task but never overlap.

use std::collections::VecDeque;

use color_eyre::eyre::Result;
use glam::DVec2;
use tokio::sync::{broadcast, mpsc};

use crate::{
    animation::AnimationLoop,
    canvas::{Canvas as _, RasterCanvas},
    config::Config,
    errors::ParticleImageError,
    pointer::PointerTracker,
    renderer::Renderer,
    run::Protocol,
    sampler::ImageSampler,
    shared_state::TTYSize,
    simulation::{ParticleSystem, Physics},
    source::ImageSource,
    surface::Surface,
};

/// How many frames to average the FPS over.
const STATS_WINDOW: usize = 30;

/// Rolling frame statistics.
#[derive(Debug, Default)]
struct FrameStats {
    /// The most recent durations between frames, in seconds.
    durations: VecDeque<f64>,
    /// When the last frame was made.
    last_tick: Option<tokio::time::Instant>,
}

impl FrameStats {
    /// Record that a frame was just made.
    fn record(&mut self) {
        let now = tokio::time::Instant::now();
        if let Some(last_tick) = self.last_tick {
            self.durations
                .push_front(now.duration_since(last_tick).as_secs_f64());
            if self.durations.len() > STATS_WINDOW {
                self.durations.pop_back();
            }
        }
        self.last_tick = Some(now);
    }

    /// The average frames per second over the window.
    #[expect(
        clippy::as_conversions,
        clippy::cast_precision_loss,
        reason = "The window is tiny"
    )]
    fn fps(&self) -> Option<f64> {
        let total = self.durations.iter().sum::<f64>();
        if self.durations.is_empty() || total <= 0.0 {
            return None;
        }
        Some(1.0 / (total / self.durations.len() as f64))
    }

    /// Start again, eg after the loop was paused.
    fn reset(&mut self) {
        self.durations.clear();
        self.last_tick = None;
    }
}

/// Everything needed to show one image as particles.
pub(crate) struct Scene {
    /// The current config
    config: Config,
    /// The size of the user's terminal, `None` when rendering headlessly.
    viewport: Option<TTYSize>,
    /// The decoded source image. Kept so that it can be re-sampled without decoding again.
    image: Option<image::RgbaImage>,
    /// The particles
    system: ParticleSystem,
    /// The latest pointer position
    pointer: PointerTracker,
    /// Draws the particles
    renderer: Renderer,
    /// What the particles are drawn onto
    canvas: RasterCanvas,
    /// The frame loop
    animation: AnimationLoop,
    /// For the optional stats overlay
    stats: FrameStats,
    /// Shown to the user when the image couldn't be loaded.
    error_message: Option<String>,
}

impl Scene {
    /// Instantiate an empty scene. Nothing is shown until an image is loaded.
    pub fn new(config: Config, viewport: Option<TTYSize>) -> Result<Self, ParticleImageError> {
        let renderer = Renderer::new(&config)?;
        let animation = AnimationLoop::new(config.frame_rate);
        Ok(Self {
            config,
            viewport,
            image: None,
            system: ParticleSystem::default(),
            pointer: PointerTracker::default(),
            renderer,
            canvas: RasterCanvas::default(),
            animation,
            stats: FrameStats::default(),
            error_message: None,
        })
    }

    /// Run headlessly for a number of frames and save the final frame as an image.
    pub async fn snapshot(config: Config, path: &std::path::Path, frames: u32) -> Result<()> {
        let mut scene = Self::new(config, None)?;
        scene.load_source().await?;
        for _ in 0..frames {
            scene.tick();
        }

        tracing::info!("Saving snapshot to {}", path.display());
        scene.canvas.image().save(path)?;
        Ok(())
    }

    /// Decode the configured image and create a new particle population from it.
    pub async fn load_source(&mut self) -> Result<(), ParticleImageError> {
        let Some(src) = self.config.src.clone() else {
            tracing::warn!("No image configured");
            self.unload();
            return Ok(());
        };

        let source = ImageSource::from(src);
        tracing::debug!("Loading image from {}", source.describe());
        let image = source.decode().await?;
        self.image = Some(image);
        self.error_message = None;
        self.resample();
        Ok(())
    }

    /// Load the image, but leave the scene empty and idle if that fails.
    pub async fn reload(&mut self) {
        if let Err(error) = self.load_source().await {
            tracing::error!("{error}");
            self.unload();
            self.error_message = Some(error.to_string());
        }
    }

    /// Throw away the population and stop animating.
    fn unload(&mut self) {
        self.animation.stop();
        self.image = None;
        self.system = ParticleSystem::default();
        self.canvas.set_size(0, 0);
        self.pointer.left();
    }

    /// Replace the population by sampling the decoded image again.
    fn resample(&mut self) {
        let Some(image) = self.image.as_ref() else {
            return;
        };

        let viewport_width = self.viewport.map(|size| f64::from(size.width));
        let sample = ImageSampler::new(&self.config).sample(image, viewport_width);
        tracing::debug!(
            "New population of {} particles on a {}x{} canvas",
            sample.particles.len(),
            sample.width,
            sample.height
        );

        self.canvas.set_size(sample.width, sample.height);
        self.system = ParticleSystem::new(sample.particles, Physics::from(&self.config));
        self.pointer.left();
        self.update_canvas_offset();
        self.stats.reset();
        self.animation.start();
    }

    /// Where the canvas' top-left corner is, in terminal columns and rows. The canvas is
    /// centred in the terminal.
    fn canvas_offset(&self) -> (u32, u32) {
        let Some(size) = self.viewport else {
            return (0, 0);
        };

        let (width, height) = self.canvas.dimensions();
        let col = u32::from(size.width).saturating_sub(width).div_euclid(2);
        let row = u32::from(size.height)
            .saturating_sub(height.div_ceil(2))
            .div_euclid(2);
        (col, row)
    }

    /// Tell the pointer tracker where the canvas is on the screen, in pixels.
    fn update_canvas_offset(&mut self) {
        let (col, row) = self.canvas_offset();
        self.pointer
            .set_canvas_offset(DVec2::new(f64::from(col), f64::from(row) * 2.0));
    }

    /// Convert a terminal mouse event into a pointer position on the canvas.
    ///
    /// Terminal coordinates start at 1, and every cell is 2 pixels high.
    fn handle_mouse(&mut self, event: &termwiz::input::MouseEvent) {
        let screen = DVec2::new(
            f64::from(event.x.saturating_sub(1)),
            f64::from(event.y.saturating_sub(1)) * 2.0,
        );
        self.pointer.moved(screen);

        let (width, height) = self.canvas.dimensions();
        let is_on_canvas = self.pointer.position().is_some_and(|position| {
            position.x >= 0.0
                && position.y >= 0.0
                && position.x < f64::from(width)
                && position.y < f64::from(height)
        });
        if !is_on_canvas {
            self.pointer.left();
        }
    }

    /// The user's terminal changed size.
    fn handle_resize(&mut self, width: u16, height: u16) {
        self.viewport = Some(TTYSize { width, height });
        let is_viewport_dependent = self.config.responsive && self.config.max_width.is_none();
        if is_viewport_dependent {
            self.resample();
        } else {
            self.update_canvas_offset();
        }
    }

    /// Apply a new config. The population is only replaced when the new config would sample
    /// the image differently. A scene without an image always tries loading again.
    async fn apply_config(&mut self, config: Config) {
        let renderer = match Renderer::new(&config) {
            Ok(renderer) => renderer,
            Err(error) => {
                tracing::error!("Ignoring new config: {error}");
                return;
            }
        };

        let is_new_source = config.src != self.config.src;
        let is_resample_needed = self.config.is_resample_needed(&config);
        self.renderer = renderer;
        self.animation.set_frame_rate(config.frame_rate);
        self.config = config;

        if is_new_source || self.image.is_none() {
            self.reload().await;
        } else if is_resample_needed {
            self.resample();
        } else {
            tracing::debug!("Updating physics without replacing the population");
            self.system.set_physics(Physics::from(&self.config));
        }
    }

    /// Produce a single frame. Returns `false` if the loop isn't running.
    fn tick(&mut self) -> bool {
        let is_ticked = self.animation.tick(
            &self.pointer,
            &mut self.system,
            &self.renderer,
            &mut self.canvas,
        );
        if is_ticked {
            self.stats.record();
        }
        is_ticked
    }

    /// Build a whole terminal frame from the canvas and any overlays.
    fn frame(&self) -> Option<Surface> {
        let size = self.viewport?;
        let mut frame = Surface::new(size.width.into(), size.height.into());
        let (col, row) = self.canvas_offset();
        frame.add_canvas(
            &self.canvas,
            (
                usize::try_from(col).unwrap_or_default(),
                usize::try_from(row).unwrap_or_default(),
            ),
        );

        if let Some(message) = self.error_message.clone() {
            frame.add_text(0, 0, message, None, None);
        }

        if self.config.show_stats {
            let text_column = frame.width.saturating_sub(20);
            let count = self.system.particles().len();
            frame.add_text(text_column, 0, format!("Particles: {count}"), None, None);
            if let Some(fps) = self.stats.fps() {
                frame.add_text(text_column, 1, format!("FPS: {fps:.1}"), None, None);
            }
        }

        Some(frame)
    }

    /// Send the current frame to the terminal. Returns `false` if the terminal has gone.
    async fn send_frame(&self, frames_tx: &mpsc::Sender<Surface>) -> bool {
        let Some(frame) = self.frame() else {
            return true;
        };
        if frames_tx.send(frame).await.is_err() {
            tracing::debug!("Terminal stopped receiving frames");
            return false;
        }
        true
    }

    /// Handle messages from the protocol. Returns whether the frame needs redrawing, which is
    /// only when there's no running loop to do it for us.
    async fn handle_protocol_message(&mut self, message: Protocol) -> bool {
        #[expect(clippy::wildcard_enum_match_arm, reason = "It's our internal protocol")]
        match message {
            Protocol::Resize { width, height } => self.handle_resize(width, height),
            Protocol::Input(termwiz::input::InputEvent::Mouse(event)) => {
                self.handle_mouse(&event);
            }
            Protocol::Config(config) => self.apply_config(config).await,
            _ => return false,
        }

        !self.animation.is_running()
    }

    /// Spawn the scene's task.
    pub fn start(
        mut self,
        frames_tx: mpsc::Sender<Surface>,
        protocol_tx: broadcast::Sender<Protocol>,
    ) -> tokio::task::JoinHandle<Result<()>> {
        let protocol_rx = protocol_tx.subscribe();
        tokio::spawn(async move {
            self.run(&frames_tx, protocol_rx).await;
            crate::run::broadcast_protocol_end(&protocol_tx);
            Ok(())
        })
    }

    /// Interleave frame ticks and protocol messages until the app ends.
    async fn run(
        &mut self,
        frames_tx: &mpsc::Sender<Surface>,
        mut protocol_rx: broadcast::Receiver<Protocol>,
    ) {
        if !self.send_frame(frames_tx).await {
            return;
        }

        tracing::debug!("Starting scene loop");
        #[expect(
            clippy::integer_division_remainder_used,
            reason = "`tokio::select! generates this.`"
        )]
        loop {
            tokio::select! {
                () = self.animation.wait_for_frame() => {
                    if self.tick() && !self.send_frame(frames_tx).await {
                        break;
                    }
                }
                result = protocol_rx.recv() => {
                    match result {
                        Ok(Protocol::End) | Err(broadcast::error::RecvError::Closed) => break,
                        Ok(message) => {
                            let is_redraw_needed = self.handle_protocol_message(message).await;
                            if is_redraw_needed && !self.send_frame(frames_tx).await {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(count)) => {
                            tracing::warn!("Scene missed {count} protocol messages");
                        }
                    }
                }
            }
        }

        self.animation.stop();
        tracing::debug!("Exited scene loop");
    }
}

#[cfg(test)]
#[expect(clippy::indexing_slicing, reason = "Tests aren't so strict")]
mod test {
    use super::*;

    fn write_png(
        directory: &std::path::Path,
        name: &str,
        width: u32,
        height: u32,
    ) -> std::path::PathBuf {
        let path = directory.join(name);
        image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn config(src: std::path::PathBuf) -> Config {
        Config {
            src: Some(src),
            spacing: 2,
            max_width: None,
            ..Config::default()
        }
    }

    fn mouse(x: u16, y: u16) -> termwiz::input::MouseEvent {
        termwiz::input::MouseEvent {
            x,
            y,
            mouse_buttons: termwiz::input::MouseButtons::NONE,
            modifiers: termwiz::input::Modifiers::NONE,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fps_follows_the_tokio_clock() {
        let mut stats = FrameStats::default();
        assert_eq!(stats.fps(), None);

        stats.record();
        for _ in 0..3 {
            tokio::time::advance(std::time::Duration::from_millis(100)).await;
            stats.record();
        }
        let fps = stats.fps().unwrap();
        assert!((fps - 10.0).abs() < 0.001, "Got {fps} FPS");

        stats.reset();
        assert_eq!(stats.fps(), None);
    }

    #[tokio::test]
    async fn loads_and_starts_animating() {
        let directory = tempfile::tempdir().unwrap();
        let path = write_png(directory.path(), "a.png", 10, 4);
        let mut scene = Scene::new(config(path), None).unwrap();
        scene.load_source().await.unwrap();

        assert_eq!(scene.system.particles().len(), 5 * 2);
        assert_eq!(scene.canvas.dimensions(), (10, 4));
        assert!(scene.animation.is_running());
        assert!(scene.tick());
    }

    #[tokio::test]
    async fn viewport_limits_the_canvas() {
        let directory = tempfile::tempdir().unwrap();
        let path = write_png(directory.path(), "a.png", 100, 10);
        let viewport = TTYSize {
            width: 50,
            height: 20,
        };
        let mut scene = Scene::new(config(path), Some(viewport)).unwrap();
        scene.load_source().await.unwrap();
        assert_eq!(scene.canvas.dimensions(), (40, 4));
        // Centred: (50 - 40) / 2 columns, (20 - 2) / 2 rows
        assert_eq!(scene.canvas_offset(), (5, 9));

        scene.handle_resize(25, 20);
        assert_eq!(scene.canvas.dimensions(), (20, 2));
    }

    #[tokio::test]
    async fn failed_reload_leaves_scene_idle() {
        let directory = tempfile::tempdir().unwrap();
        let path = write_png(directory.path(), "a.png", 4, 4);
        let mut scene = Scene::new(config(path), None).unwrap();
        scene.load_source().await.unwrap();

        scene
            .apply_config(config(directory.path().join("missing.png")))
            .await;
        assert!(!scene.animation.is_running());
        assert!(scene.system.particles().is_empty());
        assert!(scene.error_message.is_some());
        assert!(!scene.tick());
    }

    #[tokio::test]
    async fn missing_first_image_waits_for_a_valid_source() {
        let directory = tempfile::tempdir().unwrap();
        let viewport = TTYSize {
            width: 80,
            height: 4,
        };
        let mut scene =
            Scene::new(config(directory.path().join("missing.png")), Some(viewport)).unwrap();
        scene.reload().await;

        assert!(!scene.animation.is_running());
        assert!(scene.system.particles().is_empty());
        assert!(scene.error_message.is_some());
        let text = scene.frame().unwrap().surface.screen_chars_to_string();
        assert!(text.contains("Couldn't read image file"));

        let path = write_png(directory.path(), "a.png", 4, 4);
        scene.apply_config(config(path)).await;
        assert!(scene.animation.is_running());
        assert!(scene.error_message.is_none());
        assert_eq!(scene.system.particles().len(), 4);
        assert!(scene.tick());
    }

    #[tokio::test]
    async fn failed_reload_recovers_once_the_same_path_is_valid() {
        let directory = tempfile::tempdir().unwrap();
        let path = write_png(directory.path(), "a.png", 4, 4);
        let mut scene = Scene::new(config(path), None).unwrap();
        scene.load_source().await.unwrap();

        let later = directory.path().join("later.png");
        scene.apply_config(config(later.clone())).await;
        assert!(!scene.animation.is_running());

        write_png(directory.path(), "later.png", 4, 4);
        scene
            .apply_config(Config {
                spacing: 1,
                ..config(later.clone())
            })
            .await;
        assert!(scene.animation.is_running());
        assert_eq!(scene.system.particles().len(), 16);

        // Even a change that doesn't affect sampling tries the image again.
        let gone = directory.path().join("gone.png");
        scene.apply_config(config(gone.clone())).await;
        assert!(!scene.animation.is_running());
        write_png(directory.path(), "gone.png", 4, 4);
        scene
            .apply_config(Config {
                damping: 0.5,
                ..config(gone)
            })
            .await;
        assert!(scene.animation.is_running());
        assert_eq!(scene.system.particles().len(), 4);
    }

    #[tokio::test]
    async fn physics_changes_keep_the_population() {
        let directory = tempfile::tempdir().unwrap();
        let path = write_png(directory.path(), "a.png", 4, 4);
        let mut scene = Scene::new(config(path.clone()), None).unwrap();
        scene.load_source().await.unwrap();
        scene.pointer.moved(DVec2::new(1.0, 1.0));
        scene.tick();
        let displaced = scene.system.particles().to_vec();

        scene
            .apply_config(Config {
                damping: 0.5,
                ..config(path.clone())
            })
            .await;
        assert_eq!(scene.system.particles(), displaced.as_slice());

        scene
            .apply_config(Config {
                spacing: 1,
                ..config(path)
            })
            .await;
        assert_eq!(scene.system.particles().len(), 16);
        assert!(scene.system.particles()[0].displacement() < f64::EPSILON);
    }

    #[tokio::test]
    async fn mouse_is_mapped_onto_the_canvas() {
        let directory = tempfile::tempdir().unwrap();
        let path = write_png(directory.path(), "a.png", 10, 4);
        let viewport = TTYSize {
            width: 20,
            height: 10,
        };
        let mut scene = Scene::new(config(path), Some(viewport)).unwrap();
        scene.load_source().await.unwrap();
        assert_eq!(scene.canvas_offset(), (5, 4));

        // Column 7, row 5 (1-based) is pixel (6, 8) on screen, (1, 0) on the canvas.
        scene.handle_mouse(&mouse(7, 5));
        assert_eq!(scene.pointer.position(), Some(DVec2::new(1.0, 0.0)));

        scene.handle_mouse(&mouse(1, 1));
        assert_eq!(scene.pointer.position(), None);
    }

    #[tokio::test]
    async fn frames_include_the_stats_overlay() {
        let directory = tempfile::tempdir().unwrap();
        let path = write_png(directory.path(), "a.png", 2, 2);
        let viewport = TTYSize {
            width: 30,
            height: 4,
        };
        let mut scene = Scene::new(
            Config {
                show_stats: true,
                ..config(path)
            },
            Some(viewport),
        )
        .unwrap();
        scene.load_source().await.unwrap();

        let frame = scene.frame().unwrap();
        let text = frame.surface.screen_chars_to_string();
        assert!(text.contains("Particles: 1"));
    }

    #[tokio::test]
    async fn ends_on_protocol_end() {
        let directory = tempfile::tempdir().unwrap();
        let path = write_png(directory.path(), "a.png", 2, 2);
        let viewport = TTYSize {
            width: 4,
            height: 4,
        };
        let mut scene = Scene::new(config(path), Some(viewport)).unwrap();
        scene.load_source().await.unwrap();

        let (frames_tx, mut frames_rx) = mpsc::channel(16);
        let (protocol_tx, _) = broadcast::channel(16);
        let handle = scene.start(frames_tx, protocol_tx.clone());

        assert!(frames_rx.recv().await.is_some());
        protocol_tx.send(Protocol::End).unwrap();
        handle.await.unwrap().unwrap();
    }
}
