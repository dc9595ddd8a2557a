use std::collections::VecDeque;

use image::RgbaImage;

/// Linear undo/redo over ink snapshots.
///
/// `cursor` points at the snapshot matching the live canvas. Pushing after an
/// undo drops everything ahead of the cursor; past `capacity` the oldest
/// snapshot goes.
pub struct History {
    snapshots: VecDeque<RgbaImage>,
    cursor: usize,
    capacity: usize,
}

impl History {
    pub fn new(initial: RgbaImage, capacity: usize) -> Self {
        let mut snapshots = VecDeque::new();
        snapshots.push_back(initial);
        Self {
            snapshots,
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, snapshot: RgbaImage) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        self.cursor = self.snapshots.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn undo(&mut self) -> Option<&RgbaImage> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.snapshots.get(self.cursor)
    }

    pub fn redo(&mut self) -> Option<&RgbaImage> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.snapshots.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn snap(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(1, 1, Rgba([v, 0, 0, 255]))
    }

    fn value(img: &RgbaImage) -> u8 {
        img.get_pixel(0, 0)[0]
    }

    #[test]
    fn undo_redo_walks_the_list() {
        let mut history = History::new(snap(0), 10);
        history.push(snap(1));
        history.push(snap(2));

        assert_eq!(history.undo().map(value), Some(1));
        assert_eq!(history.undo().map(value), Some(0));
        assert!(history.undo().is_none());
        assert_eq!(history.redo().map(value), Some(1));
        assert_eq!(history.redo().map(value), Some(2));
        assert!(history.redo().is_none());
    }

    #[test]
    fn push_after_undo_truncates_forward() {
        let mut history = History::new(snap(0), 10);
        history.push(snap(1));
        history.push(snap(2));
        history.undo();
        history.push(snap(3));

        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo().map(value), Some(1));
    }

    #[test]
    fn oldest_snapshot_dropped_past_capacity() {
        let mut history = History::new(snap(0), 3);
        for v in 1..=5 {
            history.push(snap(v));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo().map(value), Some(4));
        assert_eq!(history.undo().map(value), Some(3));
        assert!(history.undo().is_none());
    }
}
