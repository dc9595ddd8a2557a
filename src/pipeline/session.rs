use std::time::Instant;

use image::{Rgba, RgbaImage};

use crate::{
    aggregator::HandAggregator,
    canvas::{BackgroundSource, Brush, History, LayeredCanvas, SourceId, StrokeRenderer, fit_background},
    config::{AppConfig, MAX_BRUSH_WIDTH, MIN_BRUSH_WIDTH, parse_hex_color, to_hex_color},
    debounce::{FrameIntent, GestureDebouncer, IntentEvent},
    error::{CanvasError, ConfigError},
    gesture::GestureClassifier,
    landmarks::RawHandRecord,
    types::{GestureKind, Point2D},
};

/// Outcome of one detection cycle.
#[derive(Clone, Debug, Default)]
pub struct FrameReport {
    pub hands: usize,
    pub primary_gesture: Option<GestureKind>,
    pub hand_in_view_confidence: f32,
    pub intent: FrameIntent,
    pub events: Vec<IntentEvent>,
    pub segments: usize,
    pub committed: bool,
}

/// Everything one drawing surface needs: gesture memory, the canvas, its
/// history and the current brush.
pub struct DrawingSession {
    aggregator: HandAggregator,
    debouncer: GestureDebouncer,
    renderer: StrokeRenderer,
    history: History,
    frame_size: (u32, u32),
}

impl DrawingSession {
    /// Canvas matches the camera resolution.
    pub fn new(config: &AppConfig) -> Result<Self, CanvasError> {
        Self::with_canvas_size(config, config.camera.width, config.camera.height)
    }

    pub fn with_canvas_size(config: &AppConfig, width: u32, height: u32) -> Result<Self, CanvasError> {
        let canvas = LayeredCanvas::new(width, height)?;
        let color = parse_hex_color(&config.brush.color).unwrap_or_else(|err| {
            log::warn!("{err}, using black");
            Rgba([0, 0, 0, 255])
        });
        let brush = Brush {
            color,
            width: config.brush.width.clamp(MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH),
            eraser: config.brush.eraser,
        };

        let mut profile = config.detector;
        profile.mirror_x = profile.mirror_x && config.camera.mirrored;

        let renderer = StrokeRenderer::new(canvas, brush, config.camera.width, config.camera.height);
        let history = History::new(renderer.canvas().ink().clone(), config.history.capacity);
        let mut session = Self {
            aggregator: HandAggregator::new(profile, GestureClassifier::new(config.classifier.clone())),
            debouncer: GestureDebouncer::new(config.debounce.clone()),
            renderer,
            history,
            frame_size: (config.camera.width, config.camera.height),
        };

        if let Some(background) = &config.background {
            session.set_background(&background.source, background.opacity)?;
        }
        log::info!(
            "drawing session ready: canvas {}x{}, brush {} @ {}px",
            width,
            height,
            to_hex_color(brush.color),
            brush.width
        );
        Ok(session)
    }

    /// Runs one frame of detector output through classification, intent and
    /// rendering. `width`/`height` are the frame dimensions; `now` is the
    /// capture time used for hold timing.
    pub fn process_hands(
        &mut self,
        records: &[RawHandRecord],
        width: u32,
        height: u32,
        now: Instant,
    ) -> FrameReport {
        if (width, height) != self.frame_size && width > 0 && height > 0 {
            log::debug!(
                "frame size changed {:?} -> {}x{}",
                self.frame_size,
                width,
                height
            );
            self.frame_size = (width, height);
            self.renderer.set_logical_size(width, height);
        }
        let (fw, fh) = (self.frame_size.0 as f32, self.frame_size.1 as f32);

        let frame = self.aggregator.aggregate(records, fw, fh);
        let (intent, events) = self
            .debouncer
            .update(&frame, self.renderer.brush().color, now, fw);

        for event in &events {
            self.apply_event(event);
        }

        let outcome = self.renderer.render(&intent);
        if outcome.committed {
            self.commit();
        }

        FrameReport {
            hands: frame.hands.len(),
            primary_gesture: frame.primary_hand().map(|h| h.gesture.kind),
            hand_in_view_confidence: frame.hand_in_view_confidence,
            intent,
            events,
            segments: outcome.segments,
            committed: outcome.committed,
        }
    }

    fn apply_event(&mut self, event: &IntentEvent) {
        match event {
            IntentEvent::ColorChanged { color, .. } => {
                log::info!("brush color changed to {}", color.name);
                self.renderer.brush_mut().color = color.color;
            }
            IntentEvent::CanvasCleared => {
                log::info!("canvas cleared by gesture");
                self.clear();
            }
            IntentEvent::EraserChanged(active) => {
                log::info!("eraser {}", if *active { "activated" } else { "released" });
                self.renderer.brush_mut().eraser = *active;
            }
            IntentEvent::DualHandStarted { secondary } => {
                log::info!("multi-hand drawing active ({} extra hands)", secondary);
            }
            IntentEvent::StateChanged { from, to } => {
                log::debug!("intent {} -> {}", from.label(), to.label());
            }
        }
    }

    fn commit(&mut self) {
        self.history.push(self.renderer.canvas().ink().clone());
    }

    pub fn pointer_down(&mut self, source: SourceId, pos: Point2D) {
        self.renderer.pointer_down(source, pos);
    }

    pub fn pointer_move(&mut self, source: SourceId, pos: Point2D) -> bool {
        self.renderer.pointer_move(source, pos)
    }

    pub fn pointer_up(&mut self, source: SourceId) {
        if self.renderer.pointer_up(source) {
            self.commit();
        }
    }

    /// Removes ink and background. Undo brings the ink back.
    pub fn clear(&mut self) {
        self.renderer.clear();
        self.commit();
    }

    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.undo() else {
            return false;
        };
        let snapshot = snapshot.clone();
        self.renderer.reset_strokes();
        self.renderer.canvas_mut().restore_ink(&snapshot);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.history.redo() else {
            return false;
        };
        let snapshot = snapshot.clone();
        self.renderer.reset_strokes();
        self.renderer.canvas_mut().restore_ink(&snapshot);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// File path or `data:` URI. Strokes are kept.
    pub fn set_background(&mut self, source: &str, opacity: u8) -> Result<(), CanvasError> {
        let image = BackgroundSource::parse(source).load()?;
        let canvas = self.renderer.canvas();
        let layer = fit_background(&image, canvas.width(), canvas.height(), opacity)?;
        self.renderer.canvas_mut().set_background(layer)?;
        log::info!("background set ({}x{}, {}%)", image.width(), image.height(), opacity);
        Ok(())
    }

    pub fn remove_background(&mut self) {
        self.renderer.canvas_mut().remove_background();
    }

    pub fn set_brush_color(&mut self, hex: &str) -> Result<(), ConfigError> {
        self.renderer.brush_mut().color = parse_hex_color(hex)?;
        Ok(())
    }

    pub fn set_brush_width(&mut self, width: u32) {
        self.renderer.brush_mut().width = width.clamp(MIN_BRUSH_WIDTH, MAX_BRUSH_WIDTH);
    }

    pub fn set_eraser(&mut self, eraser: bool) {
        self.renderer.brush_mut().eraser = eraser;
    }

    pub fn brush(&self) -> Brush {
        *self.renderer.brush()
    }

    pub fn composite(&self) -> RgbaImage {
        self.renderer.canvas().composite()
    }

    pub fn export_png(&self) -> Result<Vec<u8>, CanvasError> {
        self.renderer.canvas().export_png()
    }

    pub fn canvas(&self) -> &LayeredCanvas {
        self.renderer.canvas()
    }

    /// Drops in-flight hand strokes and gesture memory, e.g. after tracking
    /// was lost.
    pub fn reset_tracking(&mut self) {
        self.debouncer.reset();
        self.renderer.reset_strokes();
    }
}
