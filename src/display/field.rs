/*
 *  display/field.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Zone regions - a positioned quadrant with its resolved content
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

use super::layout::{Quadrant, Rect};
use super::zone::ZoneContent;
use crate::model::ZoneKind;

/// A rectangular region of the screen bound to one quadrant.
///
/// Sizes are kept both as percentages of the content area, which is what
/// layouts are authored in, and as pixel bounds for the current viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRegion {
    pub quadrant: Quadrant,

    /// Width in percent of the content area
    pub width_pct: f32,

    /// Height in percent of the content area
    pub height_pct: f32,

    /// Pixel bounds inside the viewport
    pub bounds: Rect,

    pub content: ZoneContent,
}

impl ZoneRegion {
    pub fn new(quadrant: Quadrant, bounds: Rect, content: ZoneContent) -> Self {
        Self {
            quadrant,
            width_pct: 0.0,
            height_pct: 0.0,
            bounds,
            content,
        }
    }

    /// Builder: set percentage share
    pub fn share(mut self, width_pct: f32, height_pct: f32) -> Self {
        self.width_pct = width_pct;
        self.height_pct = height_pct;
        self
    }

    pub fn name(&self) -> &'static str {
        self.quadrant.name()
    }

    pub fn kind(&self) -> ZoneKind {
        self.content.kind()
    }

    pub fn width(&self) -> u32 {
        self.bounds.width
    }

    pub fn height(&self) -> u32 {
        self.bounds.height
    }
}
