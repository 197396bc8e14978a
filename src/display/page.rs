/*
 *  display/page.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Render plans - everything a renderer needs for one screen
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

use std::net::IpAddr;

use super::field::ZoneRegion;
use super::layout::{Quadrant, QuadrantGeometry, Rect};
use crate::model::{ThemeConfig, ZoneKind};

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderBand {
    pub bounds: Rect,
    pub title: String,
    pub subtitle: String,
    pub show_clock: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FooterBand {
    pub bounds: Rect,
    pub text: String,
    pub scroll: bool,
    /// Marquee speed, pixels per second
    pub speed: u32,
}

/// A fully resolved screen
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenPlan {
    pub config_version: Option<String>,
    /// No visible zone follows the live queue
    pub is_static: bool,
    pub geometry: QuadrantGeometry,
    pub theme: ThemeConfig,
    pub header: Option<HeaderBand>,
    pub footer: Option<FooterBand>,
    pub content: Rect,
    /// Visible zones only, in top-left, bottom-left, top-right, bottom-right order
    pub zones: Vec<ZoneRegion>,
}

impl ScreenPlan {
    pub fn zones(&self) -> &[ZoneRegion] {
        &self.zones
    }

    /// Get a zone by quadrant; hidden quadrants are absent
    pub fn get_zone(&self, quadrant: Quadrant) -> Option<&ZoneRegion> {
        self.zones.iter().find(|z| z.quadrant == quadrant)
    }

    /// First zone showing a given kind of content
    pub fn zone_of_kind(&self, kind: ZoneKind) -> Option<&ZoneRegion> {
        self.zones.iter().find(|z| z.kind() == kind)
    }
}

/// What to put on the panel
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPlan {
    /// The device has not been bound yet; show its identity so an operator
    /// can register it.
    Unregistered {
        device_id: Option<String>,
        local_ip: Option<IpAddr>,
    },
    Screen(ScreenPlan),
}

impl RenderPlan {
    pub fn screen(&self) -> Option<&ScreenPlan> {
        match self {
            RenderPlan::Screen(plan) => Some(plan),
            RenderPlan::Unregistered { .. } => None,
        }
    }

    pub fn is_unregistered(&self) -> bool {
        matches!(self, RenderPlan::Unregistered { .. })
    }
}
