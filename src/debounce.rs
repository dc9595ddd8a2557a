//! Turns the per-frame hand view into user intent: what the primary hand does,
//! which one-shot actions fire this frame, and how far the clear hold has got.

use std::time::{Duration, Instant};

use image::Rgba;

use crate::{
    aggregator::{AggregateFrame, HandKey},
    config::DebounceConfig,
    types::{GestureKind, Point2D},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteColor {
    pub name: &'static str,
    pub color: Rgba<u8>,
}

const fn swatch(name: &'static str, r: u8, g: u8, b: u8) -> PaletteColor {
    PaletteColor {
        name,
        color: Rgba([r, g, b, 255]),
    }
}

pub const PALETTE: [PaletteColor; 8] = [
    swatch("Black", 0x00, 0x00, 0x00),
    swatch("Red", 0xFF, 0x00, 0x00),
    swatch("Green", 0x00, 0xFF, 0x00),
    swatch("Blue", 0x00, 0x00, 0xFF),
    swatch("Yellow", 0xFF, 0xFF, 0x00),
    swatch("Purple", 0x80, 0x00, 0x80),
    swatch("Orange", 0xFF, 0xA5, 0x00),
    swatch("Pink", 0xFF, 0xC0, 0xCB),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntentState {
    #[default]
    Idle,
    Drawing,
    Paused,
    ColorSelect,
    ClearPending,
}

impl IntentState {
    pub fn label(&self) -> &'static str {
        match self {
            IntentState::Idle => "idle",
            IntentState::Drawing => "drawing",
            IntentState::Paused => "paused",
            IntentState::ColorSelect => "color-select",
            IntentState::ClearPending => "clear-pending",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoldTimer {
    pub started_at: Instant,
    pub progress_percent: f32,
}

impl HoldTimer {
    fn start(now: Instant) -> Self {
        Self {
            started_at: now,
            progress_percent: 0.0,
        }
    }

    /// Elapsed hold time. Zero while `started_at` lies in the future (cooldown).
    fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

/// Last seen value of each edge-triggered signal.
#[derive(Clone, Copy, Debug, Default)]
pub struct EdgeTracker {
    pub color_change: bool,
    pub eraser: bool,
    pub dual_hand: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IntentEvent {
    ColorChanged { index: usize, color: PaletteColor },
    CanvasCleared,
    EraserChanged(bool),
    DualHandStarted { secondary: usize },
    StateChanged { from: IntentState, to: IntentState },
}

/// What the renderer and session should do this frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameIntent {
    pub primary_position: Option<Point2D>,
    pub primary_hand: Option<HandKey>,
    pub is_primary_drawing: bool,
    pub secondary_positions: Vec<Point2D>,
    pub secondary_hands: Vec<HandKey>,
    pub clear_requested: bool,
    pub color_change_requested: bool,
    pub eraser_active: bool,
    pub paused_requested: bool,
    pub is_dual_hand_drawing: bool,
    pub clear_progress: f32,
    pub finger_distance: Option<f32>,
    pub color_index: Option<usize>,
    pub state: IntentState,
}

/// Cross-frame memory of the intent machine.
#[derive(Clone, Debug, Default)]
pub struct DebouncerState {
    pub state: IntentState,
    pub edges: EdgeTracker,
    pub clear_timer: Option<HoldTimer>,
}

pub struct GestureDebouncer {
    cfg: DebounceConfig,
    state: DebouncerState,
}

impl GestureDebouncer {
    pub fn new(cfg: DebounceConfig) -> Self {
        Self {
            cfg,
            state: DebouncerState::default(),
        }
    }

    pub fn state(&self) -> &DebouncerState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = DebouncerState::default();
    }

    /// `current_color` is the brush color in effect; palette picks equal to it
    /// are not reported again. `screen_width` is the width primary positions
    /// are expressed in.
    pub fn update(
        &mut self,
        frame: &AggregateFrame,
        current_color: Rgba<u8>,
        now: Instant,
        screen_width: f32,
    ) -> (FrameIntent, Vec<IntentEvent>) {
        update(&mut self.state, &self.cfg, frame, current_color, now, screen_width)
    }
}

pub fn update(
    st: &mut DebouncerState,
    cfg: &DebounceConfig,
    frame: &AggregateFrame,
    current_color: Rgba<u8>,
    now: Instant,
    screen_width: f32,
) -> (FrameIntent, Vec<IntentEvent>) {
    let mut events = Vec::new();
    let gesture = frame.primary_hand().map(|h| h.gesture);
    let kind = gesture.map(|g| g.kind);

    let drawing = kind == Some(GestureKind::Drawing);
    let clear = kind == Some(GestureKind::ClearCanvas);
    let color = kind == Some(GestureKind::ColorChange);
    let paused = kind == Some(GestureKind::Paused);

    let mut intent = FrameIntent {
        primary_position: frame.primary_position,
        primary_hand: frame.primary_key,
        is_primary_drawing: drawing,
        secondary_positions: frame.secondary_positions.clone(),
        secondary_hands: frame.secondary_keys.clone(),
        eraser_active: frame.eraser_any,
        paused_requested: paused,
        is_dual_hand_drawing: frame.is_dual_hand_drawing,
        finger_distance: gesture.and_then(|g| g.finger_distance),
        ..FrameIntent::default()
    };

    // Clear hold gate.
    if clear {
        let hold = cfg.clear_hold();
        let timer = st.clear_timer.get_or_insert_with(|| HoldTimer::start(now));
        let elapsed = timer.elapsed(now);
        timer.progress_percent =
            (elapsed.as_secs_f32() / hold.as_secs_f32().max(f32::EPSILON) * 100.0).min(100.0);
        if elapsed >= hold && timer.started_at <= now {
            intent.clear_requested = true;
            events.push(IntentEvent::CanvasCleared);
            timer.started_at = now + cfg.clear_cooldown();
            timer.progress_percent = 0.0;
        }
        intent.clear_progress = timer.progress_percent;
    } else {
        st.clear_timer = None;
    }

    // Color select by horizontal position.
    if color && !st.edges.color_change {
        log::debug!("color select entered at {:?}", frame.primary_position);
    }
    if color {
        if let Some(pos) = frame.primary_position {
            let index = palette_index(pos.x, screen_width, cfg.palette_slots);
            intent.color_index = Some(index);
            let pick = PALETTE[index];
            if pick.color != current_color {
                intent.color_change_requested = true;
                events.push(IntentEvent::ColorChanged { index, color: pick });
            }
        }
    }
    st.edges.color_change = color;

    if frame.eraser_any != st.edges.eraser {
        events.push(IntentEvent::EraserChanged(frame.eraser_any));
        st.edges.eraser = frame.eraser_any;
    }

    let dual = !paused && !frame.secondary_positions.is_empty() && frame.is_dual_hand_drawing;
    if dual && !st.edges.dual_hand {
        events.push(IntentEvent::DualHandStarted {
            secondary: frame.secondary_positions.len(),
        });
    }
    st.edges.dual_hand = dual;

    // Pause silences every hand, not just the primary one.
    if paused {
        intent.is_primary_drawing = false;
        intent.primary_position = None;
        intent.secondary_positions.clear();
        intent.secondary_hands.clear();
        intent.is_dual_hand_drawing = false;
    }

    let next = if clear {
        IntentState::ClearPending
    } else if color {
        IntentState::ColorSelect
    } else if paused {
        IntentState::Paused
    } else if drawing {
        IntentState::Drawing
    } else {
        IntentState::Idle
    };
    if next != st.state {
        events.push(IntentEvent::StateChanged {
            from: st.state,
            to: next,
        });
        st.state = next;
    }
    intent.state = next;

    (intent, events)
}

/// `floor(x / width × slots)`, clamped into the palette.
pub fn palette_index(x: f32, screen_width: f32, slots: usize) -> usize {
    let slots = slots.clamp(1, PALETTE.len());
    if screen_width <= 0.0 || !screen_width.is_finite() || !x.is_finite() {
        return 0;
    }
    let raw = (x / screen_width * slots as f32).floor();
    (raw.max(0.0) as usize).min(slots - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ClassifierConfig,
        gesture::{GestureClassifier, HandClassification},
        fingers::fixtures::pose_with,
    };

    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    /// One-hand frame with the given finger pattern and primary position.
    fn frame(fingers: [bool; 5], position: Option<(f32, f32)>) -> AggregateFrame {
        let [t, i, m, r, p] = fingers;
        let pose = pose_with((300.0, 250.0), t, i, m, r, p);
        let hand: HandClassification = GestureClassifier::new(ClassifierConfig::default())
            .classify(pose)
            .unwrap();
        let eraser_any = hand.gesture.is_eraser();
        AggregateFrame {
            hands: vec![hand],
            primary: Some(0),
            primary_position: position.map(|(x, y)| Point2D::new(x, y)),
            primary_key: None,
            secondary_positions: Vec::new(),
            secondary_keys: Vec::new(),
            is_dual_hand_drawing: false,
            hand_in_view_confidence: 0.9,
            eraser_any,
        }
    }

    const OPEN: [bool; 5] = [true; 5];
    const POINT: [bool; 5] = [false, true, false, false, false];
    const THREE: [bool; 5] = [false, true, true, true, false];
    const TWO: [bool; 5] = [false, true, true, false, false];
    const FIST: [bool; 5] = [false; 5];

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn clear_fires_once_after_hold() {
        let mut debouncer = GestureDebouncer::new(DebounceConfig::default());
        let t0 = Instant::now();
        let open = frame(OPEN, Some((100.0, 100.0)));

        let (intent, _) = debouncer.update(&open, BLACK, t0, 640.0);
        assert!(!intent.clear_requested);
        assert_eq!(intent.clear_progress, 0.0);
        assert_eq!(intent.state, IntentState::ClearPending);

        let (intent, _) = debouncer.update(&open, BLACK, t0 + ms(750), 640.0);
        assert!(!intent.clear_requested);
        assert!((intent.clear_progress - 50.0).abs() < 0.5, "{}", intent.clear_progress);

        let (intent, events) = debouncer.update(&open, BLACK, t0 + ms(1_500), 640.0);
        assert!(intent.clear_requested);
        assert!(events.contains(&IntentEvent::CanvasCleared));

        // Held through the cooldown: nothing fires, progress reads zero.
        for step in [1_600, 2_500, 4_000] {
            let (intent, _) = debouncer.update(&open, BLACK, t0 + ms(step), 640.0);
            assert!(!intent.clear_requested, "fired again at {step} ms");
            assert_eq!(intent.clear_progress, 0.0);
        }

        // Cooldown ends at 4500 ms; another full hold fires again.
        let (intent, _) = debouncer.update(&open, BLACK, t0 + ms(6_000), 640.0);
        assert!(intent.clear_requested);
    }

    #[test]
    fn releasing_clear_resets_the_hold() {
        let mut debouncer = GestureDebouncer::new(DebounceConfig::default());
        let t0 = Instant::now();
        let open = frame(OPEN, Some((100.0, 100.0)));
        let point = frame(POINT, Some((100.0, 100.0)));

        debouncer.update(&open, BLACK, t0, 640.0);
        debouncer.update(&open, BLACK, t0 + ms(1_000), 640.0);
        let (intent, _) = debouncer.update(&point, BLACK, t0 + ms(1_100), 640.0);
        assert_eq!(intent.clear_progress, 0.0);
        assert!(debouncer.state().clear_timer.is_none());

        let (intent, _) = debouncer.update(&open, BLACK, t0 + ms(1_200), 640.0);
        assert!(!intent.clear_requested);
        let (intent, _) = debouncer.update(&open, BLACK, t0 + ms(2_000), 640.0);
        assert!(!intent.clear_requested);
        let (intent, _) = debouncer.update(&open, BLACK, t0 + ms(2_700), 640.0);
        assert!(intent.clear_requested);
    }

    #[test]
    fn palette_index_mapping() {
        assert_eq!(palette_index(0.0, 640.0, 8), 0);
        assert_eq!(palette_index(79.9, 640.0, 8), 0);
        assert_eq!(palette_index(80.0, 640.0, 8), 1);
        assert_eq!(palette_index(639.0, 640.0, 8), 7);
        assert_eq!(palette_index(640.0, 640.0, 8), 7);
        assert_eq!(palette_index(-5.0, 640.0, 8), 0);
        assert_eq!(palette_index(100.0, 0.0, 8), 0);
    }

    #[test]
    fn color_select_applies_only_on_change() {
        let mut debouncer = GestureDebouncer::new(DebounceConfig::default());
        let t0 = Instant::now();

        // Leftmost slot is black, already current.
        let (intent, events) = debouncer.update(&frame(THREE, Some((10.0, 50.0))), BLACK, t0, 640.0);
        assert_eq!(intent.color_index, Some(0));
        assert!(!intent.color_change_requested);
        assert!(!events.iter().any(|e| matches!(e, IntentEvent::ColorChanged { .. })));

        let (intent, events) =
            debouncer.update(&frame(THREE, Some((170.0, 50.0))), BLACK, t0 + ms(33), 640.0);
        assert!(intent.color_change_requested);
        assert_eq!(intent.color_index, Some(2));
        assert!(events.contains(&IntentEvent::ColorChanged {
            index: 2,
            color: PALETTE[2]
        }));

        // Same slot with the new color applied: no repeat.
        let (intent, _) = debouncer.update(
            &frame(THREE, Some((175.0, 50.0))),
            PALETTE[2].color,
            t0 + ms(66),
            640.0,
        );
        assert!(!intent.color_change_requested);
        assert_eq!(intent.state, IntentState::ColorSelect);
    }

    #[test]
    fn pause_suppresses_drawing() {
        let mut debouncer = GestureDebouncer::new(DebounceConfig::default());
        let (intent, events) =
            debouncer.update(&frame(FIST, Some((100.0, 100.0))), BLACK, Instant::now(), 640.0);
        assert!(intent.paused_requested);
        assert!(!intent.is_primary_drawing);
        assert!(intent.primary_position.is_none());
        assert_eq!(intent.state, IntentState::Paused);
        assert!(events.contains(&IntentEvent::StateChanged {
            from: IntentState::Idle,
            to: IntentState::Paused
        }));
    }

    #[test]
    fn pause_also_stops_secondary_hands() {
        let mut debouncer = GestureDebouncer::new(DebounceConfig::default());
        let mut paused = frame(FIST, Some((100.0, 100.0)));
        paused.primary_key = Some(HandKey::Side(crate::types::Handedness::Right));
        paused.secondary_positions = vec![Point2D::new(400.0, 200.0)];
        paused.secondary_keys = vec![HandKey::Side(crate::types::Handedness::Left)];
        paused.is_dual_hand_drawing = true;

        let (intent, events) = debouncer.update(&paused, BLACK, Instant::now(), 640.0);
        assert!(intent.paused_requested);
        assert!(intent.secondary_positions.is_empty());
        assert!(intent.secondary_hands.is_empty());
        assert!(!intent.is_dual_hand_drawing);
        assert!(!events.iter().any(|e| matches!(e, IntentEvent::DualHandStarted { .. })));
    }

    #[test]
    fn eraser_toggles_on_edges() {
        let mut debouncer = GestureDebouncer::new(DebounceConfig::default());
        let t0 = Instant::now();
        let two = frame(TWO, Some((100.0, 100.0)));

        let (intent, events) = debouncer.update(&two, BLACK, t0, 640.0);
        assert!(intent.eraser_active);
        assert!(events.contains(&IntentEvent::EraserChanged(true)));

        let (_, events) = debouncer.update(&two, BLACK, t0 + ms(33), 640.0);
        assert!(!events.iter().any(|e| matches!(e, IntentEvent::EraserChanged(_))));

        let (intent, events) =
            debouncer.update(&frame(POINT, Some((100.0, 100.0))), BLACK, t0 + ms(66), 640.0);
        assert!(!intent.eraser_active);
        assert!(intent.is_primary_drawing);
        assert!(events.contains(&IntentEvent::EraserChanged(false)));
    }

    #[test]
    fn dual_hand_start_reported_once() {
        let mut debouncer = GestureDebouncer::new(DebounceConfig::default());
        let t0 = Instant::now();
        let mut dual = frame(POINT, Some((200.0, 200.0)));
        dual.secondary_positions = vec![Point2D::new(400.0, 200.0)];
        dual.is_dual_hand_drawing = true;

        let (intent, events) = debouncer.update(&dual, BLACK, t0, 640.0);
        assert!(intent.is_dual_hand_drawing);
        assert!(events.contains(&IntentEvent::DualHandStarted { secondary: 1 }));

        let (_, events) = debouncer.update(&dual, BLACK, t0 + ms(33), 640.0);
        assert!(!events.iter().any(|e| matches!(e, IntentEvent::DualHandStarted { .. })));
    }

    #[test]
    fn no_hands_is_idle() {
        let mut debouncer = GestureDebouncer::new(DebounceConfig::default());
        let (intent, events) =
            debouncer.update(&AggregateFrame::nothing(), BLACK, Instant::now(), 640.0);
        assert_eq!(intent, FrameIntent::default());
        assert!(events.is_empty());
    }
}
