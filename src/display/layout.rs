/*
 *  display/layout.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Quadrant geometry and static classification for screen layouts
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use crate::model::{LayoutConfig, Orientation, QueueConfig, ZoneConfig};

/// Pixel rectangle, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

fn offset(amount: u32) -> i32 {
    i32::try_from(amount).unwrap_or(i32::MAX)
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Shrink by `amount` on every side. Oversized amounts collapse the rect
    /// instead of wrapping.
    pub fn inset(&self, amount: u32) -> Self {
        let offset = offset(amount);
        Self {
            x: self.x.saturating_add(offset),
            y: self.y.saturating_add(offset),
            width: self.width.saturating_sub(amount.saturating_mul(2)),
            height: self.height.saturating_sub(amount.saturating_mul(2)),
        }
    }

    /// Split off a band of `height` from the top; returns (band, rest)
    fn take_top(&self, height: u32) -> (Rect, Rect) {
        let h = height.min(self.height);
        (
            Rect::new(self.x, self.y, self.width, h),
            Rect::new(self.x, self.y.saturating_add(offset(h)), self.width, self.height - h),
        )
    }

    /// Split off a band of `height` from the bottom; returns (rest, band)
    fn take_bottom(&self, height: u32) -> (Rect, Rect) {
        let h = height.min(self.height);
        let rest = self.height - h;
        (
            Rect::new(self.x, self.y, self.width, rest),
            Rect::new(self.x, self.y.saturating_add(offset(rest)), self.width, h),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The four fixed screen regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Left,
    Right,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::BottomLeft,
        Quadrant::TopRight,
        Quadrant::BottomRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Quadrant::TopLeft => "topLeft",
            Quadrant::BottomLeft => "bottomLeft",
            Quadrant::TopRight => "topRight",
            Quadrant::BottomRight => "bottomRight",
        }
    }

    pub fn column(self) -> Column {
        match self {
            Quadrant::TopLeft | Quadrant::BottomLeft => Column::Left,
            Quadrant::TopRight | Quadrant::BottomRight => Column::Right,
        }
    }

    pub fn is_top(self) -> bool {
        matches!(self, Quadrant::TopLeft | Quadrant::TopRight)
    }

    pub fn zone(self, layout: &LayoutConfig) -> &ZoneConfig {
        match self {
            Quadrant::TopLeft => &layout.top_left,
            Quadrant::BottomLeft => &layout.bottom_left,
            Quadrant::TopRight => &layout.top_right,
            Quadrant::BottomRight => &layout.bottom_right,
        }
    }
}

/// A layout is static when no visible zone follows the live queue.
///
/// Only the four zone type tags are consulted.
pub fn is_static_layout(layout: &LayoutConfig) -> bool {
    !layout
        .zones()
        .iter()
        .any(|zone| zone.is_visible() && zone.kind().is_queue_driven())
}

/// Convenience for [`is_static_layout`] on a whole configuration
pub fn is_static_config(config: &QueueConfig) -> bool {
    is_static_layout(&config.layout)
}

/// Clamp a percentage into 0..=100; NaN falls back to an even split
pub fn clamp_ratio(ratio: f32) -> f32 {
    if ratio.is_nan() {
        50.0
    } else {
        ratio.clamp(0.0, 100.0)
    }
}

/// Sizing of one column, all values in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnGeometry {
    pub visible: bool,
    /// Share of the content area along the split axis
    /// (width in landscape, height in portrait)
    pub span_pct: f32,
    /// Share of the column given to its top zone
    pub top_pct: f32,
    /// Share of the column given to its bottom zone
    pub bottom_pct: f32,
}

impl ColumnGeometry {
    fn hidden() -> Self {
        Self { visible: false, span_pct: 0.0, top_pct: 0.0, bottom_pct: 0.0 }
    }
}

/// Column and zone sizing derived from a [`LayoutConfig`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadrantGeometry {
    pub orientation: Orientation,
    pub has_left: bool,
    pub has_right: bool,
    pub left: ColumnGeometry,
    pub right: ColumnGeometry,
}

impl QuadrantGeometry {
    pub fn from_layout(layout: &LayoutConfig) -> Self {
        let top_left = layout.top_left.is_visible();
        let bottom_left = layout.bottom_left.is_visible();
        let top_right = layout.top_right.is_visible();
        let bottom_right = layout.bottom_right.is_visible();

        let has_left = top_left || bottom_left;
        let has_right = top_right || bottom_right;

        let split = clamp_ratio(layout.split_ratio);
        let (left_span, right_span) = match (has_left, has_right) {
            (true, true) => (split, 100.0 - split),
            (true, false) => (100.0, 0.0),
            (false, true) => (0.0, 100.0),
            (false, false) => (0.0, 0.0),
        };

        let left = column(has_left, left_span, top_left, bottom_left, layout.left_split_ratio);
        let right = column(has_right, right_span, top_right, bottom_right, layout.right_split_ratio);

        Self {
            orientation: layout.orientation,
            has_left,
            has_right,
            left,
            right,
        }
    }

    pub fn column(&self, column: Column) -> &ColumnGeometry {
        match column {
            Column::Left => &self.left,
            Column::Right => &self.right,
        }
    }

    /// Width of a column in percent of the content area
    pub fn column_width_pct(&self, column: Column) -> f32 {
        let col = self.column(column);
        match self.orientation {
            Orientation::Landscape => col.span_pct,
            Orientation::Portrait if col.visible => 100.0,
            Orientation::Portrait => 0.0,
        }
    }

    /// Height of a column in percent of the content area
    pub fn column_height_pct(&self, column: Column) -> f32 {
        let col = self.column(column);
        match self.orientation {
            Orientation::Landscape if col.visible => 100.0,
            Orientation::Landscape => 0.0,
            Orientation::Portrait => col.span_pct,
        }
    }

    /// (width, height) of a zone in percent of the content area
    pub fn zone_share(&self, quadrant: Quadrant) -> (f32, f32) {
        let column = quadrant.column();
        let col = self.column(column);
        let within = if quadrant.is_top() { col.top_pct } else { col.bottom_pct };
        let width = self.column_width_pct(column);
        let height = self.column_height_pct(column) * within / 100.0;
        (width, height)
    }

    /// Pixel bounds for every quadrant inside `content`, with `gap` pixels
    /// between columns and between stacked zones.
    pub fn zone_bounds(&self, content: Rect, gap: u32, quadrant: Quadrant) -> Rect {
        let col_rect = self.column_rect(content, gap, quadrant.column());
        let col = self.column(quadrant.column());
        if !col.visible || col_rect.is_empty() {
            return Rect::new(col_rect.x, col_rect.y, 0, 0);
        }

        let (top_h, bottom_h, inner_gap) = match (col.top_pct > 0.0, col.bottom_pct > 0.0) {
            (true, true) => {
                let avail = col_rect.height.saturating_sub(gap);
                let top = scale(avail, col.top_pct);
                (top, avail - top, gap)
            }
            (true, false) => (col_rect.height, 0, 0),
            (false, true) => (0, col_rect.height, 0),
            (false, false) => (0, 0, 0),
        };

        if quadrant.is_top() {
            Rect::new(col_rect.x, col_rect.y, col_rect.width, top_h)
        } else {
            Rect::new(
                col_rect.x,
                col_rect.y + (top_h + inner_gap) as i32,
                col_rect.width,
                bottom_h,
            )
        }
    }

    fn column_rect(&self, content: Rect, gap: u32, column: Column) -> Rect {
        let both = self.has_left && self.has_right;
        let inner_gap = if both { gap } else { 0 };
        match self.orientation {
            Orientation::Landscape => {
                let avail = content.width.saturating_sub(inner_gap);
                let left_w = if both { scale(avail, self.left.span_pct) } else if self.has_left { avail } else { 0 };
                match column {
                    Column::Left => Rect::new(content.x, content.y, left_w, content.height),
                    Column::Right => {
                        let offset = if self.has_left { left_w + inner_gap } else { 0 };
                        Rect::new(
                            content.x + offset as i32,
                            content.y,
                            avail - left_w.min(avail),
                            content.height,
                        )
                    }
                }
            }
            Orientation::Portrait => {
                let avail = content.height.saturating_sub(inner_gap);
                let left_h = if both { scale(avail, self.left.span_pct) } else if self.has_left { avail } else { 0 };
                match column {
                    Column::Left => Rect::new(content.x, content.y, content.width, left_h),
                    Column::Right => {
                        let offset = if self.has_left { left_h + inner_gap } else { 0 };
                        Rect::new(
                            content.x,
                            content.y + offset as i32,
                            content.width,
                            avail - left_h.min(avail),
                        )
                    }
                }
            }
        }
    }
}

fn column(visible: bool, span: f32, top: bool, bottom: bool, ratio: f32) -> ColumnGeometry {
    if !visible {
        return ColumnGeometry::hidden();
    }
    let (top_pct, bottom_pct) = match (top, bottom) {
        (true, true) => {
            let r = clamp_ratio(ratio);
            (r, 100.0 - r)
        }
        (true, false) => (100.0, 0.0),
        (false, true) => (0.0, 100.0),
        (false, false) => (0.0, 0.0),
    };
    ColumnGeometry { visible, span_pct: span, top_pct, bottom_pct }
}

fn scale(total: u32, pct: f32) -> u32 {
    ((total as f32) * pct / 100.0).round().min(total as f32) as u32
}

/// Header / content / footer split of the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenBands {
    pub header: Option<Rect>,
    pub content: Rect,
    pub footer: Option<Rect>,
}

/// Carve the viewport: overscan on all sides, then header and footer bands,
/// then container padding around the zone area.
pub fn screen_bands(config: &QueueConfig, width: u32, height: u32) -> ScreenBands {
    let layout = &config.layout;
    let mut area = Rect::new(0, 0, width, height).inset(layout.overscan_padding);

    let header = if config.header.visible {
        let (band, rest) = area.take_top(config.header.height);
        area = rest;
        Some(band)
    } else {
        None
    };

    let footer = if layout.footer.visible {
        let (rest, band) = area.take_bottom(layout.footer.height);
        area = rest;
        Some(band)
    } else {
        None
    };

    ScreenBands {
        header,
        content: area.inset(layout.container_padding),
        footer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StaticTextZone, VideoZone, WaitingListZone};

    fn layout_with(zones: [ZoneConfig; 4]) -> LayoutConfig {
        let [tl, bl, tr, br] = zones;
        LayoutConfig {
            top_left: tl,
            bottom_left: bl,
            top_right: tr,
            bottom_right: br,
            ..LayoutConfig::default()
        }
    }

    fn text() -> ZoneConfig {
        ZoneConfig::StaticText(StaticTextZone::default())
    }

    #[test]
    fn test_static_classification_by_zone_type() {
        assert!(!is_static_layout(&LayoutConfig::default()));

        let promo = layout_with([text(), ZoneConfig::Video(VideoZone::default()), ZoneConfig::Hidden, text()]);
        assert!(is_static_layout(&promo));

        let mixed = layout_with([text(), ZoneConfig::Hidden, ZoneConfig::WaitingList(WaitingListZone::default()), text()]);
        assert!(!is_static_layout(&mixed));
    }

    #[test]
    fn test_static_classification_ignores_other_fields() {
        let mut layout = layout_with([text(), ZoneConfig::Hidden, ZoneConfig::WaitingList(WaitingListZone::default()), text()]);
        let before = is_static_layout(&layout);
        if let ZoneConfig::WaitingList(z) = &mut layout.top_right {
            z.font_size = 99;
            z.grid_rows = 1;
        }
        layout.split_ratio = 12.0;
        layout.orientation = Orientation::Portrait;
        assert_eq!(before, is_static_layout(&layout));
    }

    #[test]
    fn test_landscape_split_both_columns() {
        let mut layout = LayoutConfig::default();
        layout.split_ratio = 40.0;
        let g = QuadrantGeometry::from_layout(&layout);
        assert_eq!(g.column_width_pct(Column::Left), 40.0);
        assert_eq!(g.column_width_pct(Column::Right), 60.0);
    }

    #[test]
    fn test_hidden_right_column_gives_left_full_width() {
        let mut layout = LayoutConfig::default();
        layout.split_ratio = 40.0;
        layout.top_right = ZoneConfig::Hidden;
        layout.bottom_right = ZoneConfig::Hidden;
        let g = QuadrantGeometry::from_layout(&layout);
        assert!(g.has_left);
        assert!(!g.has_right);
        assert_eq!(g.column_width_pct(Column::Left), 100.0);
        assert_eq!(g.column_width_pct(Column::Right), 0.0);
    }

    #[test]
    fn test_hidden_zone_gives_sibling_full_height() {
        let mut layout = LayoutConfig::default();
        layout.left_split_ratio = 30.0;
        layout.top_left = ZoneConfig::Hidden;
        let g = QuadrantGeometry::from_layout(&layout);
        assert_eq!(g.zone_share(Quadrant::TopLeft), (50.0, 0.0));
        assert_eq!(g.zone_share(Quadrant::BottomLeft), (50.0, 100.0));
        // right column keeps its own split
        assert_eq!(g.zone_share(Quadrant::TopRight).1, 70.0);
        assert_eq!(g.zone_share(Quadrant::BottomRight).1, 30.0);
    }

    #[test]
    fn test_ratios_are_clamped() {
        let mut layout = LayoutConfig::default();
        layout.split_ratio = 140.0;
        layout.left_split_ratio = -5.0;
        let g = QuadrantGeometry::from_layout(&layout);
        assert_eq!(g.left.span_pct, 100.0);
        assert_eq!(g.right.span_pct, 0.0);
        assert_eq!(g.left.top_pct, 0.0);
        assert_eq!(g.left.bottom_pct, 100.0);
    }

    #[test]
    fn test_portrait_stacks_full_width() {
        let mut layout = LayoutConfig::default();
        layout.orientation = Orientation::Portrait;
        layout.split_ratio = 40.0;
        let g = QuadrantGeometry::from_layout(&layout);
        assert_eq!(g.column_width_pct(Column::Left), 100.0);
        assert_eq!(g.column_width_pct(Column::Right), 100.0);
        assert_eq!(g.column_height_pct(Column::Left), 40.0);
        assert_eq!(g.column_height_pct(Column::Right), 60.0);

        let content = Rect::new(0, 0, 1000, 1010);
        let tl = g.zone_bounds(content, 10, Quadrant::TopLeft);
        let tr = g.zone_bounds(content, 10, Quadrant::TopRight);
        assert_eq!(tl.width, 1000);
        assert_eq!(tr.x, 0);
        assert!(tr.y > tl.y);
    }

    #[test]
    fn test_pixel_bounds_respect_gap() {
        let mut layout = LayoutConfig::default();
        layout.split_ratio = 40.0;
        layout.left_split_ratio = 50.0;
        let g = QuadrantGeometry::from_layout(&layout);
        let content = Rect::new(10, 10, 1010, 510);

        let tl = g.zone_bounds(content, 10, Quadrant::TopLeft);
        let bl = g.zone_bounds(content, 10, Quadrant::BottomLeft);
        let tr = g.zone_bounds(content, 10, Quadrant::TopRight);

        assert_eq!(tl, Rect::new(10, 10, 400, 250));
        assert_eq!(bl, Rect::new(10, 270, 400, 250));
        assert_eq!(tr.x, 420);
        assert_eq!(tr.width, 600);
    }

    #[test]
    fn test_screen_bands() {
        let mut cfg = QueueConfig::default();
        cfg.layout.overscan_padding = 20;
        cfg.layout.container_padding = 10;
        cfg.header.visible = true;
        cfg.header.height = 100;
        cfg.layout.footer.visible = true;
        cfg.layout.footer.height = 60;

        let bands = screen_bands(&cfg, 1920, 1080);
        assert_eq!(bands.header, Some(Rect::new(20, 20, 1880, 100)));
        assert_eq!(bands.footer, Some(Rect::new(20, 1000, 1880, 60)));
        assert_eq!(bands.content, Rect::new(30, 130, 1860, 860));

        cfg.header.visible = false;
        cfg.layout.footer.visible = false;
        let bands = screen_bands(&cfg, 1920, 1080);
        assert_eq!(bands.header, None);
        assert_eq!(bands.content, Rect::new(30, 30, 1860, 1020));
    }

    #[test]
    fn test_oversized_padding_collapses_instead_of_wrapping() {
        let r = Rect::new(0, 0, 1920, 1080).inset(u32::MAX);
        assert_eq!(r, Rect::new(i32::MAX, i32::MAX, 0, 0));
        assert!(r.is_empty());

        let r = Rect::new(10, 10, 100, 100).inset(3_000_000_000);
        assert_eq!((r.x, r.width), (i32::MAX, 0));

        let mut cfg = QueueConfig::default();
        cfg.layout.overscan_padding = u32::MAX;
        cfg.layout.container_padding = u32::MAX;
        cfg.header.visible = true;
        cfg.header.height = 100;
        cfg.layout.footer.visible = true;
        cfg.layout.footer.height = 60;
        let bands = screen_bands(&cfg, 1920, 1080);
        assert!(bands.content.is_empty());
        assert_eq!(bands.header.map(|h| h.height), Some(0));
        assert_eq!(bands.footer.map(|f| f.height), Some(0));
    }
}
