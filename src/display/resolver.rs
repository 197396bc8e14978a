/*
 *  display/resolver.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Layout resolver - turns a configuration into a render plan
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
use super::layout::{is_static_layout, screen_bands, Quadrant, QuadrantGeometry};
use super::page::{FooterBand, HeaderBand, RenderPlan, ScreenPlan};
use super::zone::resolve_zone;
use crate::constants::{DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH};
use crate::model::QueueConfig;

/// Layout resolver - pure function of configuration and viewport
#[derive(Debug, Clone)]
pub struct LayoutResolver {
    width: u32,
    height: u32,
    local_ip: Option<IpAddr>,
}

impl Default for LayoutResolver {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT)
    }
}

impl LayoutResolver {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, local_ip: None }
    }

    /// Builder: host address shown on the unregistered screen
    pub fn with_local_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.local_ip = ip;
        self
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when no visible zone depends on live queue data
    pub fn is_static(&self, config: &QueueConfig) -> bool {
        is_static_layout(&config.layout)
    }

    /// Resolve a configuration into a render plan
    pub fn resolve(&self, config: &QueueConfig) -> RenderPlan {
        if !config.system.is_registered {
            return RenderPlan::Unregistered {
                device_id: config.system.device_id.clone(),
                local_ip: self.local_ip,
            };
        }

        let layout = &config.layout;
        let geometry = QuadrantGeometry::from_layout(layout);
        let bands = screen_bands(config, self.width, self.height);

        let zones = Quadrant::ALL
            .iter()
            .copied()
            .filter(|q| q.zone(layout).is_visible())
            .map(|q| {
                let (w, h) = geometry.zone_share(q);
                ZoneRegion::new(
                    q,
                    geometry.zone_bounds(bands.content, layout.gap, q),
                    resolve_zone(q.zone(layout), config),
                )
                .share(w, h)
            })
            .collect();

        let header = bands.header.map(|bounds| HeaderBand {
            bounds,
            title: config.header.title.clone(),
            subtitle: config.header.subtitle.clone(),
            show_clock: config.header.show_clock,
        });

        let footer = bands.footer.map(|bounds| FooterBand {
            bounds,
            text: layout.footer.text.clone(),
            scroll: layout.footer.scroll,
            speed: layout.footer.speed,
        });

        RenderPlan::Screen(ScreenPlan {
            config_version: config.config_version.clone(),
            is_static: is_static_layout(layout),
            geometry,
            theme: config.theme.clone(),
            header,
            footer,
            content: bands.content,
            zones,
        })
    }
}
