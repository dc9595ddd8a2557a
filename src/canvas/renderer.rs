use std::collections::HashMap;

use image::Rgba;

use super::raster::{Brush, LayeredCanvas};
use crate::{aggregator::HandKey, debounce::FrameIntent, types::Point2D};

/// Secondary hands shift their color by this fraction.
const SECONDARY_COLOR_SHIFT: f32 = 0.2;

/// Who is drawing. Each source keeps its own last point so strokes from
/// different hands or pointers never join. Hand roles also remember which
/// physical hand filled them last; a new hand in a role starts a new stroke.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceId {
    Primary,
    Hand(usize),
    Mouse,
    Touch,
}

impl SourceId {
    pub fn label(&self) -> String {
        match self {
            SourceId::Primary => "primary".to_string(),
            SourceId::Hand(i) => format!("hand_{i}"),
            SourceId::Mouse => "mouse".to_string(),
            SourceId::Touch => "touch".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    pub segments: usize,
    /// Every source stopped after ink was laid down since the last commit.
    pub committed: bool,
}

pub struct StrokeRenderer {
    canvas: LayeredCanvas,
    brush: Brush,
    last: HashMap<SourceId, Point2D>,
    owners: HashMap<SourceId, HandKey>,
    logical_width: f32,
    logical_height: f32,
    dirty: bool,
}

impl StrokeRenderer {
    /// `logical_width`/`logical_height` is the space hand positions arrive in.
    pub fn new(canvas: LayeredCanvas, brush: Brush, logical_width: u32, logical_height: u32) -> Self {
        Self {
            canvas,
            brush,
            last: HashMap::new(),
            owners: HashMap::new(),
            logical_width: logical_width.max(1) as f32,
            logical_height: logical_height.max(1) as f32,
            dirty: false,
        }
    }

    pub fn canvas(&self) -> &LayeredCanvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut LayeredCanvas {
        &mut self.canvas
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    pub fn brush_mut(&mut self) -> &mut Brush {
        &mut self.brush
    }

    pub fn set_logical_size(&mut self, width: u32, height: u32) {
        self.logical_width = width.max(1) as f32;
        self.logical_height = height.max(1) as f32;
    }

    pub fn last_position(&self, source: SourceId) -> Option<Point2D> {
        self.last.get(&source).copied()
    }

    pub fn active_sources(&self) -> usize {
        self.last.len()
    }

    /// Applies one frame of hand intent.
    pub fn render(&mut self, intent: &FrameIntent) -> RenderOutcome {
        let mut segments = 0;

        match intent.primary_position.filter(|_| intent.is_primary_drawing) {
            Some(pos) => {
                self.claim(SourceId::Primary, intent.primary_hand);
                let pos = self.to_buffer(pos);
                let brush = self.brush;
                segments += self.stroke(SourceId::Primary, pos, &brush) as usize;
            }
            None => {
                self.end(SourceId::Primary);
                self.owners.remove(&SourceId::Primary);
            }
        }

        for (i, pos) in intent.secondary_positions.iter().enumerate() {
            self.claim(SourceId::Hand(i), intent.secondary_hands.get(i).copied());
            let pos = self.to_buffer(*pos);
            let brush = Brush {
                color: secondary_color(self.brush.color, i),
                ..self.brush
            };
            segments += self.stroke(SourceId::Hand(i), pos, &brush) as usize;
        }
        let count = intent.secondary_positions.len();
        let stale = |source: &SourceId| matches!(source, SourceId::Hand(i) if *i >= count);
        self.last.retain(|source, _| !stale(source));
        self.owners.retain(|source, _| !stale(source));

        RenderOutcome {
            segments,
            committed: self.take_commit(),
        }
    }

    /// Pointer positions are already in buffer pixels.
    pub fn pointer_down(&mut self, source: SourceId, pos: Point2D) {
        if !pos.is_finite() {
            return;
        }
        let pos = self.clamp_to_buffer(pos);
        self.last.insert(source, pos);
    }

    pub fn pointer_move(&mut self, source: SourceId, pos: Point2D) -> bool {
        if !self.last.contains_key(&source) || !pos.is_finite() {
            return false;
        }
        let pos = self.clamp_to_buffer(pos);
        let brush = self.brush;
        self.stroke(source, pos, &brush)
    }

    pub fn pointer_up(&mut self, source: SourceId) -> bool {
        self.end(source);
        self.take_commit()
    }

    /// Removes all ink, the background and every in-flight stroke.
    pub fn clear(&mut self) {
        self.canvas.clear();
        self.last.clear();
        self.owners.clear();
        self.dirty = false;
    }

    /// Forgets in-flight strokes without touching pixels.
    pub fn reset_strokes(&mut self) {
        self.last.clear();
        self.owners.clear();
        self.dirty = false;
    }

    fn stroke(&mut self, source: SourceId, pos: Point2D, brush: &Brush) -> bool {
        if !pos.is_finite() {
            self.end(source);
            return false;
        }
        let drew = match self.last.insert(source, pos) {
            Some(prev) => self.canvas.draw_segment(prev, pos, brush),
            None => false,
        };
        self.dirty |= drew;
        drew
    }

    /// Records `owner` as the hand behind `source`, ending the stroke when it
    /// differs from the previous one.
    fn claim(&mut self, source: SourceId, owner: Option<HandKey>) {
        let previous = match owner {
            Some(key) => self.owners.insert(source, key),
            None => self.owners.remove(&source),
        };
        if previous != owner {
            self.end(source);
        }
    }

    fn end(&mut self, source: SourceId) {
        if self.last.remove(&source).is_some() {
            log::trace!("stroke ended for {}", source.label());
        }
    }

    fn take_commit(&mut self) -> bool {
        if self.dirty && self.last.is_empty() {
            self.dirty = false;
            true
        } else {
            false
        }
    }

    fn to_buffer(&self, pos: Point2D) -> Point2D {
        let scaled = Point2D::new(
            pos.x * self.canvas.width() as f32 / self.logical_width,
            pos.y * self.canvas.height() as f32 / self.logical_height,
        );
        self.clamp_to_buffer(scaled)
    }

    fn clamp_to_buffer(&self, pos: Point2D) -> Point2D {
        Point2D::new(
            pos.x.clamp(0.0, self.canvas.width() as f32),
            pos.y.clamp(0.0, self.canvas.height() as f32),
        )
    }
}

/// Even secondary hands draw darker, odd ones lighter. Black and white stay put.
pub fn secondary_color(color: Rgba<u8>, index: usize) -> Rgba<u8> {
    let [r, g, b, a] = color.0;
    if [r, g, b] == [0, 0, 0] || [r, g, b] == [255, 255, 255] {
        return color;
    }
    let shift = |c: u8| -> u8 {
        let c = f32::from(c);
        let shifted = if index % 2 == 0 {
            c * (1.0 - SECONDARY_COLOR_SHIFT)
        } else {
            c + (255.0 - c) * SECONDARY_COLOR_SHIFT
        };
        shifted.floor().clamp(0.0, 255.0) as u8
    };
    Rgba([shift(r), shift(g), shift(b), a])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Handedness;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn renderer() -> StrokeRenderer {
        let canvas = LayeredCanvas::new(640, 360).unwrap();
        let brush = Brush {
            color: RED,
            width: 4,
            eraser: false,
        };
        StrokeRenderer::new(canvas, brush, 640, 360)
    }

    fn drawing(x: f32, y: f32) -> FrameIntent {
        FrameIntent {
            primary_position: Some(Point2D::new(x, y)),
            is_primary_drawing: true,
            ..FrameIntent::default()
        }
    }

    #[test]
    fn three_positions_make_two_segments() {
        let mut r = renderer();
        let total: usize = [(10.0, 10.0), (20.0, 10.0), (30.0, 10.0)]
            .into_iter()
            .map(|(x, y)| r.render(&drawing(x, y)).segments)
            .sum();
        assert_eq!(total, 2);
        assert_eq!(r.last_position(SourceId::Primary), Some(Point2D::new(30.0, 10.0)));
    }

    #[test]
    fn gap_does_not_bridge() {
        let mut r = renderer();
        r.render(&drawing(10.0, 100.0));
        r.render(&drawing(20.0, 100.0));
        let out = r.render(&FrameIntent::default());
        assert!(out.committed);
        assert!(r.last_position(SourceId::Primary).is_none());

        let out = r.render(&drawing(200.0, 100.0));
        assert_eq!(out.segments, 0);
        // Nothing between the two strokes.
        assert_eq!(r.canvas().ink().get_pixel(100, 100)[3], 0);
    }

    #[test]
    fn logical_positions_rescale_to_buffer() {
        let canvas = LayeredCanvas::new(1280, 720).unwrap();
        let brush = Brush {
            color: RED,
            width: 2,
            eraser: false,
        };
        let mut r = StrokeRenderer::new(canvas, brush, 640, 360);
        r.render(&drawing(320.0, 180.0));
        assert_eq!(r.last_position(SourceId::Primary), Some(Point2D::new(640.0, 360.0)));
        r.render(&drawing(700.0, -10.0));
        assert_eq!(r.last_position(SourceId::Primary), Some(Point2D::new(1280.0, 0.0)));
    }

    #[test]
    fn two_hands_keep_independent_strokes() {
        let mut r = renderer();
        let frame = |p: (f32, f32), s: (f32, f32)| FrameIntent {
            primary_position: Some(Point2D::new(p.0, p.1)),
            is_primary_drawing: true,
            secondary_positions: vec![Point2D::new(s.0, s.1)],
            is_dual_hand_drawing: true,
            ..FrameIntent::default()
        };
        assert_eq!(r.render(&frame((200.0, 200.0), (400.0, 200.0))).segments, 0);
        assert_eq!(r.render(&frame((210.0, 205.0), (410.0, 205.0))).segments, 2);
        assert_eq!(r.active_sources(), 2);
        assert_eq!(r.last_position(SourceId::Hand(0)), Some(Point2D::new(410.0, 205.0)));
        // No stroke joins the two hands.
        assert_eq!(r.canvas().ink().get_pixel(300, 203)[3], 0);
        // Secondary ink uses the darkened color.
        assert_eq!(*r.canvas().ink().get_pixel(405, 202), Rgba([204, 0, 0, 255]));
    }

    #[test]
    fn dropped_secondary_hand_loses_continuity() {
        let mut r = renderer();
        let two = FrameIntent {
            secondary_positions: vec![Point2D::new(100.0, 100.0), Point2D::new(300.0, 100.0)],
            ..FrameIntent::default()
        };
        r.render(&two);
        assert_eq!(r.active_sources(), 2);
        let one = FrameIntent {
            secondary_positions: vec![Point2D::new(100.0, 100.0)],
            ..FrameIntent::default()
        };
        r.render(&one);
        assert!(r.last_position(SourceId::Hand(1)).is_none());
        assert!(r.last_position(SourceId::Hand(0)).is_some());
    }

    fn hands(
        primary: Option<((f32, f32), Handedness)>,
        secondary: &[((f32, f32), Handedness)],
    ) -> FrameIntent {
        FrameIntent {
            primary_position: primary.map(|(p, _)| Point2D::new(p.0, p.1)),
            primary_hand: primary.map(|(_, side)| HandKey::Side(side)),
            is_primary_drawing: primary.is_some(),
            secondary_positions: secondary.iter().map(|(p, _)| Point2D::new(p.0, p.1)).collect(),
            secondary_hands: secondary.iter().map(|(_, side)| HandKey::Side(*side)).collect(),
            ..FrameIntent::default()
        }
    }

    #[test]
    fn promoted_hand_does_not_inherit_primary_stroke() {
        use Handedness::{Left, Right};
        let mut r = renderer();
        r.render(&hands(Some(((100.0, 150.0), Right)), &[((500.0, 150.0), Left)]));
        r.render(&hands(Some(((105.0, 150.0), Right)), &[((505.0, 150.0), Left)]));

        // Right hand leaves, Left takes over the primary role.
        let out = r.render(&hands(Some(((510.0, 150.0), Left)), &[]));
        assert_eq!(out.segments, 0);
        assert_eq!(r.canvas().ink().get_pixel(300, 150)[3], 0);

        let out = r.render(&hands(Some(((520.0, 150.0), Left)), &[]));
        assert_eq!(out.segments, 1);
    }

    #[test]
    fn shifted_secondary_slot_starts_a_new_stroke() {
        let slot = |i: usize, x: f32| (HandKey::Slot(i), Point2D::new(x, 300.0));
        let frame = |entries: Vec<(HandKey, Point2D)>| {
            let (secondary_hands, secondary_positions) = entries.into_iter().unzip();
            FrameIntent {
                secondary_positions,
                secondary_hands,
                ..FrameIntent::default()
            }
        };
        let mut r = renderer();
        r.render(&frame(vec![slot(1, 100.0), slot(2, 400.0)]));
        // Hand 1 stops; hand 2 moves into the first secondary role.
        let out = r.render(&frame(vec![slot(2, 410.0)]));
        assert_eq!(out.segments, 0);
        assert_eq!(r.canvas().ink().get_pixel(250, 300)[3], 0);
        assert_eq!(r.render(&frame(vec![slot(2, 420.0)])).segments, 1);
    }

    #[test]
    fn pointer_strokes() {
        let mut r = renderer();
        r.pointer_down(SourceId::Mouse, Point2D::new(5.0, 5.0));
        assert!(!r.pointer_move(SourceId::Touch, Point2D::new(50.0, 5.0)));
        assert!(r.pointer_move(SourceId::Mouse, Point2D::new(50.0, 5.0)));
        assert!(r.pointer_move(SourceId::Mouse, Point2D::new(900.0, 5.0)));
        assert_eq!(r.last_position(SourceId::Mouse), Some(Point2D::new(640.0, 5.0)));
        assert!(r.pointer_up(SourceId::Mouse));
        assert!(!r.pointer_up(SourceId::Mouse));
    }

    #[test]
    fn clear_twice_matches_clear_once() {
        let mut r = renderer();
        r.render(&drawing(10.0, 10.0));
        r.render(&drawing(100.0, 100.0));
        r.clear();
        let once = r.canvas().composite();
        r.clear();
        assert_eq!(once, r.canvas().composite());
        assert_eq!(r.active_sources(), 0);
    }

    #[test]
    fn secondary_color_variation() {
        assert_eq!(secondary_color(Rgba([100, 50, 200, 255]), 0), Rgba([80, 40, 160, 255]));
        assert_eq!(secondary_color(Rgba([100, 50, 200, 255]), 1), Rgba([131, 91, 211, 255]));
        assert_eq!(secondary_color(Rgba([0, 0, 0, 255]), 1), Rgba([0, 0, 0, 255]));
        assert_eq!(secondary_color(Rgba([255, 255, 255, 255]), 0), Rgba([255, 255, 255, 255]));
    }
}
