/*
 *  model.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Versioned data model describing a terminal screen and its live queue
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

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::deutils::{
    default_true,
    deserialize_current_patient,
    deserialize_opt_string_from_anything,
    deserialize_opt_timestamp,
    deserialize_string_from_anything,
};

/// Generate a fresh, opaque configuration version token.
///
/// Tokens are only ever produced, never ordered; consumers watch for change.
pub fn new_config_version() -> String {
    format!("{}-{:04x}", Utc::now().timestamp_millis(), rand::random::<u16>())
}

/// A patient in the queue
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default, deserialize_with = "deserialize_string_from_anything")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Display queue number, e.g. "A012"
    #[serde(default, deserialize_with = "deserialize_string_from_anything")]
    pub number: String,
    #[serde(default, deserialize_with = "deserialize_opt_string_from_anything", skip_serializing_if = "Option::is_none")]
    pub window_number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_string_from_anything", skip_serializing_if = "Option::is_none")]
    pub window_name: Option<String>,
    /// Epoch millis of the last call; a later value on the same id is a recall
    #[serde(default, deserialize_with = "deserialize_opt_timestamp", skip_serializing_if = "Option::is_none")]
    pub call_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_time: Option<String>,
}

impl Patient {
    pub fn new(id: impl Into<String>, name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            number: number.into(),
            ..Self::default()
        }
    }

    /// Builder: target counter number
    pub fn at_window(mut self, window_number: impl Into<String>) -> Self {
        self.window_number = Some(window_number.into());
        self
    }

    /// Builder: target counter name
    pub fn at_window_named(mut self, window_name: impl Into<String>) -> Self {
        self.window_name = Some(window_name.into());
        self
    }

    /// Builder: call timestamp
    pub fn called_at(mut self, ts: i64) -> Self {
        self.call_timestamp = Some(ts);
        self
    }

    /// An empty id marks the "nobody is being served" slot.
    pub fn is_sentinel(&self) -> bool {
        self.id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

/// Where passed-over patients are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassedDisplayMode {
    /// Passed patients live in their own passed-list zone
    #[default]
    Separate,
    /// Passed patients are appended to the waiting list
    WaitListEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueNumberStyle {
    #[default]
    Circle,
    Rounded,
    Square,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFit {
    #[default]
    Contain,
    Cover,
    Fill,
}

/// Content kind of a zone, without its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneKind {
    WindowInfo,
    CurrentCall,
    WaitingList,
    PassedList,
    StaticText,
    Video,
    Hidden,
}

impl ZoneKind {
    /// Kinds whose content follows the live queue
    pub fn is_queue_driven(self) -> bool {
        matches!(
            self,
            ZoneKind::WaitingList | ZoneKind::CurrentCall | ZoneKind::WindowInfo | ZoneKind::PassedList
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneKind::WindowInfo => "window-info",
            ZoneKind::CurrentCall => "current-call",
            ZoneKind::WaitingList => "waiting-list",
            ZoneKind::PassedList => "passed-list",
            ZoneKind::StaticText => "static-text",
            ZoneKind::Video => "video",
            ZoneKind::Hidden => "hidden",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowInfoZone {
    pub font_size: u32,
    pub show_window_name: bool,
    /// Author supplied HTML shown under the window number
    pub subtitle_html: String,
}

impl Default for WindowInfoZone {
    fn default() -> Self {
        Self { font_size: 64, show_window_name: true, subtitle_html: String::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrentCallZone {
    pub title: String,
    pub font_size: u32,
    pub number_font_size: u32,
    pub show_window: bool,
}

impl Default for CurrentCallZone {
    fn default() -> Self {
        Self {
            title: "Now Serving".to_string(),
            font_size: 48,
            number_font_size: 72,
            show_window: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WaitingListZone {
    pub title: String,
    pub grid_rows: u32,
    pub grid_columns: u32,
    pub font_size: u32,
    /// Prepend the patient currently being served
    pub include_current: bool,
    pub highlight_current: bool,
    pub show_window: bool,
}

impl Default for WaitingListZone {
    fn default() -> Self {
        Self {
            title: "Waiting".to_string(),
            grid_rows: 5,
            grid_columns: 2,
            font_size: 32,
            include_current: false,
            highlight_current: true,
            show_window: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PassedListZone {
    pub title: String,
    pub grid_rows: u32,
    pub grid_columns: u32,
    pub font_size: u32,
    pub show_window: bool,
}

impl Default for PassedListZone {
    fn default() -> Self {
        Self {
            title: "Passed".to_string(),
            grid_rows: 2,
            grid_columns: 3,
            font_size: 24,
            show_window: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StaticTextZone {
    pub html: String,
    pub font_size: u32,
}

impl Default for StaticTextZone {
    fn default() -> Self {
        Self { html: String::new(), font_size: 28 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoZone {
    pub url: String,
    pub fit: VideoFit,
    #[serde(rename = "loop")]
    pub looped: bool,
    pub muted: bool,
}

impl Default for VideoZone {
    fn default() -> Self {
        Self { url: String::new(), fit: VideoFit::Contain, looped: true, muted: true }
    }
}

/// One quadrant of the screen. Exactly one content kind is active; fields
/// belonging to other kinds are dropped on decode rather than rejected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ZoneConfig {
    WindowInfo(WindowInfoZone),
    CurrentCall(CurrentCallZone),
    WaitingList(WaitingListZone),
    PassedList(PassedListZone),
    StaticText(StaticTextZone),
    Video(VideoZone),
    #[default]
    Hidden,
}

impl ZoneConfig {
    pub fn kind(&self) -> ZoneKind {
        match self {
            ZoneConfig::WindowInfo(_) => ZoneKind::WindowInfo,
            ZoneConfig::CurrentCall(_) => ZoneKind::CurrentCall,
            ZoneConfig::WaitingList(_) => ZoneKind::WaitingList,
            ZoneConfig::PassedList(_) => ZoneKind::PassedList,
            ZoneConfig::StaticText(_) => ZoneKind::StaticText,
            ZoneConfig::Video(_) => ZoneKind::Video,
            ZoneConfig::Hidden => ZoneKind::Hidden,
        }
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self, ZoneConfig::Hidden)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FooterConfig {
    pub visible: bool,
    pub text: String,
    /// Scroll the text as a marquee
    pub scroll: bool,
    /// Marquee speed in pixels per second
    pub speed: u32,
    pub height: u32,
}

impl Default for FooterConfig {
    fn default() -> Self {
        Self {
            visible: true,
            text: "Please have your prescription and ID ready".to_string(),
            scroll: true,
            speed: 60,
            height: 60,
        }
    }
}

/// Screen layout: four fixed zones in two columns plus a footer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub orientation: Orientation,
    pub gap: u32,
    pub container_padding: u32,
    pub overscan_padding: u32,
    /// Left column share in percent, 0..=100
    pub split_ratio: f32,
    /// Top zone share of the left column in percent
    pub left_split_ratio: f32,
    /// Top zone share of the right column in percent
    pub right_split_ratio: f32,
    pub top_left: ZoneConfig,
    pub bottom_left: ZoneConfig,
    pub top_right: ZoneConfig,
    pub bottom_right: ZoneConfig,
    pub footer: FooterConfig,
    pub passed_display_mode: PassedDisplayMode,
    pub gray_out_passed: bool,
    pub show_queue_number: bool,
    pub queue_number_style: QueueNumberStyle,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::Landscape,
            gap: 16,
            container_padding: 16,
            overscan_padding: 0,
            split_ratio: 50.0,
            left_split_ratio: 30.0,
            right_split_ratio: 70.0,
            top_left: ZoneConfig::WindowInfo(WindowInfoZone::default()),
            bottom_left: ZoneConfig::CurrentCall(CurrentCallZone::default()),
            top_right: ZoneConfig::WaitingList(WaitingListZone::default()),
            bottom_right: ZoneConfig::PassedList(PassedListZone::default()),
            footer: FooterConfig::default(),
            passed_display_mode: PassedDisplayMode::Separate,
            gray_out_passed: true,
            show_queue_number: true,
            queue_number_style: QueueNumberStyle::Circle,
        }
    }
}

impl LayoutConfig {
    /// Zones in fixed order: top-left, bottom-left, top-right, bottom-right
    pub fn zones(&self) -> [&ZoneConfig; 4] {
        [&self.top_left, &self.bottom_left, &self.top_right, &self.bottom_right]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeaderConfig {
    pub visible: bool,
    pub title: String,
    pub subtitle: String,
    pub height: u32,
    pub show_clock: bool,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            visible: true,
            title: "Pharmacy".to_string(),
            subtitle: String::new(),
            height: 100,
            show_clock: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThemeConfig {
    pub primary_color: String,
    pub background_color: String,
    pub text_color: String,
    pub accent_color: String,
    pub font_family: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            primary_color: "#1565C0".to_string(),
            background_color: "#0B1E3A".to_string(),
            text_color: "#FFFFFF".to_string(),
            accent_color: "#FFC107".to_string(),
            font_family: "sans-serif".to_string(),
        }
    }
}

/// Registration state and window binding of the terminal
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemConfig {
    #[serde(deserialize_with = "deserialize_opt_string_from_anything", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub is_registered: bool,
    #[serde(deserialize_with = "deserialize_opt_string_from_anything", skip_serializing_if = "Option::is_none")]
    pub window_number: Option<String>,
    #[serde(deserialize_with = "deserialize_opt_string_from_anything", skip_serializing_if = "Option::is_none")]
    pub window_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceMode {
    #[default]
    Push,
    Pull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollingStrategy {
    /// Always poll queue snapshots at the configured interval
    Realtime,
    /// Back off to a slow layout check while no zone follows the queue
    #[default]
    Smart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataSourceConfig {
    pub mode: DataSourceMode,
    pub polling_strategy: PollingStrategy,
    /// Seconds between snapshot polls, floored at 1
    pub polling_interval: u64,
    // pull-mode mapping, consumed by the server when it scrapes the HIS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub field_mapping: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub status_mapping: BTreeMap<String, String>,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            mode: DataSourceMode::Push,
            polling_strategy: PollingStrategy::Smart,
            polling_interval: 3,
            api_url: None,
            field_mapping: BTreeMap::new(),
            status_mapping: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    /// Announce every call
    #[default]
    All,
    /// Announce only calls for this terminal's own window
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeechConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub broadcast_mode: BroadcastMode,
    /// Message with `{name}`, `{number}` and `{window}` placeholders
    pub template: String,
    /// 0.0..=1.0
    pub volume: f32,
    /// 1.0 is normal speed
    pub rate: f32,
    /// 0.0..=2.0, 1.0 is normal
    pub pitch: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            broadcast_mode: BroadcastMode::All,
            template: crate::constants::DEFAULT_SPEECH_TEMPLATE.to_string(),
            volume: 1.0,
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

/// Live queue data as one unit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueData {
    #[serde(deserialize_with = "deserialize_current_patient", skip_serializing_if = "Option::is_none")]
    pub current_patient: Option<Patient>,
    pub waiting_list: Vec<Patient>,
    pub passed_list: Vec<Patient>,
}

/// Snapshot returned by the queue server
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    #[serde(flatten)]
    pub data: QueueData,
    /// Opaque; only equality matters
    #[serde(default, deserialize_with = "deserialize_string_from_anything")]
    pub version: String,
}

/// Aggregate root - the complete state of one terminal screen
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
    pub layout: LayoutConfig,
    pub header: HeaderConfig,
    pub theme: ThemeConfig,
    pub system: SystemConfig,
    pub data_source: DataSourceConfig,
    pub speech: SpeechConfig,
    #[serde(deserialize_with = "deserialize_current_patient", skip_serializing_if = "Option::is_none")]
    pub current_patient: Option<Patient>,
    pub waiting_list: Vec<Patient>,
    pub passed_list: Vec<Patient>,
}

impl QueueConfig {
    /// Restamp `config_version` so renderers treat this as a fresh snapshot
    pub fn stamp_version(&mut self) {
        self.config_version = Some(new_config_version());
    }

    /// Builder form of [`QueueConfig::stamp_version`]
    pub fn stamped(mut self) -> Self {
        self.stamp_version();
        self
    }

    /// Copy of this configuration with only the queue fields replaced
    pub fn with_queue(&self, data: QueueData) -> Self {
        Self {
            current_patient: data.current_patient,
            waiting_list: data.waiting_list,
            passed_list: data.passed_list,
            ..self.clone()
        }
    }

    /// Copy of this configuration with the layout replaced; local identity is kept
    pub fn with_layout(&self, layout: LayoutConfig) -> Self {
        Self { layout, ..self.clone() }
    }

    pub fn queue_data(&self) -> QueueData {
        QueueData {
            current_patient: self.current_patient.clone(),
            waiting_list: self.waiting_list.clone(),
            passed_list: self.passed_list.clone(),
        }
    }

    /// A registered terminal that knows which device it is
    pub fn is_bound_display(&self) -> bool {
        self.system.is_registered && self.system.device_id.is_some()
    }

    /// Window number used to scope snapshots, only in local broadcast mode
    pub fn window_filter(&self) -> Option<&str> {
        match self.speech.broadcast_mode {
            BroadcastMode::Local => self.system.window_number.as_deref(),
            BroadcastMode::All => None,
        }
    }

    /// Blank screen shown until an operator binds this device
    pub fn unregistered(device_id: Option<String>) -> Self {
        let mut cfg = Self::default();
        cfg.system = SystemConfig {
            device_id,
            is_registered: false,
            window_number: None,
            window_name: None,
        };
        cfg.speech.enabled = false;
        cfg.stamped()
    }
}
