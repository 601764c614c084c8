//! Vertical list geometry and the trigger band rule.
//!
//! Every coordinate here is in list space: `0.0` is the top of the first slot
//! and rows stack downward with no spacing. The presentation layer maps these
//! to screen space.

use std::collections::HashMap;

use shared::domain::ItemId;

use crate::Sequence;

/// Start of the trigger band as a fraction of a sibling's height.
pub const TRIGGER_BAND_START: f32 = 0.25;
/// End of the trigger band as a fraction of a sibling's height.
pub const TRIGGER_BAND_END: f32 = 0.75;

const MIN_ROW_HEIGHT: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub top: f32,
    pub height: f32,
}

impl Span {
    pub fn new(top: f32, height: f32) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center(&self) -> f32 {
        self.top + self.height * 0.5
    }

    /// Lower edge of the middle 50% band.
    pub fn band_start(&self) -> f32 {
        self.top + self.height * TRIGGER_BAND_START
    }

    /// Upper edge of the middle 50% band.
    pub fn band_end(&self) -> f32 {
        self.top + self.height * TRIGGER_BAND_END
    }

    pub fn band_contains(&self, y: f32) -> bool {
        y >= self.band_start() && y <= self.band_end()
    }

    pub fn intersects(&self, viewport: &Viewport) -> bool {
        self.top < viewport.bottom() && self.bottom() > viewport.top
    }
}

/// The visible window of the list, in list coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub top: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(top: f32, height: f32) -> Self {
        Self {
            top,
            height: height.max(0.0),
        }
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

/// Row heights plus the current viewport. Rows without an explicit height use
/// the default row height.
#[derive(Debug, Clone)]
pub struct ListGeometry {
    row_height: f32,
    heights: HashMap<ItemId, f32>,
    viewport: Option<Viewport>,
}

impl ListGeometry {
    pub fn uniform(row_height: f32) -> Self {
        Self {
            row_height: row_height.max(MIN_ROW_HEIGHT),
            heights: HashMap::new(),
            viewport: None,
        }
    }

    pub fn with_height(mut self, id: ItemId, height: f32) -> Self {
        self.set_height(id, height);
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn set_height(&mut self, id: ItemId, height: f32) {
        self.heights.insert(id, height.max(MIN_ROW_HEIGHT));
    }

    /// `None` treats every row as visible.
    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn row_height(&self) -> f32 {
        self.row_height
    }

    pub fn height_of(&self, id: ItemId) -> f32 {
        self.heights.get(&id).copied().unwrap_or(self.row_height)
    }

    /// Resting slot of every item in `sequence`, in sequence order.
    pub fn layout(&self, sequence: &Sequence) -> Vec<Span> {
        let mut top = 0.0;
        sequence
            .items()
            .iter()
            .map(|item| {
                let span = Span::new(top, self.height_of(item.id));
                top += span.height;
                span
            })
            .collect()
    }

    pub fn is_visible(&self, span: &Span) -> bool {
        self.viewport
            .map_or(true, |viewport| span.intersects(&viewport))
    }

    pub fn forget(&mut self, id: ItemId) {
        self.heights.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_covers_middle_half() {
        let span = Span::new(100.0, 40.0);
        assert_eq!(span.band_start(), 110.0);
        assert_eq!(span.band_end(), 130.0);
        assert!(!span.band_contains(109.9));
        assert!(span.band_contains(110.0));
        assert!(span.band_contains(120.0));
        assert!(span.band_contains(130.0));
        assert!(!span.band_contains(130.1));
    }

    #[test]
    fn viewport_intersection_excludes_touching_edges() {
        let viewport = Viewport::new(50.0, 100.0);
        assert!(!Span::new(0.0, 50.0).intersects(&viewport));
        assert!(Span::new(10.0, 50.0).intersects(&viewport));
        assert!(!Span::new(150.0, 20.0).intersects(&viewport));
    }

    #[test]
    fn heights_clamp_to_minimum() {
        let geometry = ListGeometry::uniform(0.0).with_height(ItemId(1), -5.0);
        assert_eq!(geometry.row_height(), MIN_ROW_HEIGHT);
        assert_eq!(geometry.height_of(ItemId(1)), MIN_ROW_HEIGHT);
    }
}
