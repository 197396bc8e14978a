/*
 *  display/mod.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - layout geometry and render plan resolution
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

// Quadrant geometry and static classification
pub mod layout;

// Zone content resolution
pub mod zone;

// Positioned regions and whole-screen plans
pub mod field;
pub mod page;

pub mod resolver;

pub use layout::{is_static_config, is_static_layout, Quadrant, Rect};
pub use page::{RenderPlan, ScreenPlan};
pub use resolver::LayoutResolver;
pub use zone::{ListEntry, UntrustedHtml, ZoneContent};
