/*
 *  display/zone.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Zone content - what each quadrant shows for the current queue
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

use crate::model::{
    CurrentCallZone,
    PassedDisplayMode,
    PassedListZone,
    Patient,
    QueueConfig,
    QueueNumberStyle,
    VideoFit,
    WaitingListZone,
    WindowInfoZone,
    ZoneConfig,
    ZoneKind,
};

/// Author supplied markup. It is carried through untouched and must be
/// sanitized by whatever finally renders it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UntrustedHtml(String);

impl UntrustedHtml {
    pub fn new(html: impl Into<String>) -> Self {
        Self(html.into())
    }

    /// Raw markup; callers own sanitizing
    pub fn as_unsanitized(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Current,
    Waiting,
    Passed,
}

/// One cell of a list grid
#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub patient: Patient,
    pub status: EntryStatus,
    pub highlighted: bool,
    pub grayed_out: bool,
}

impl ListEntry {
    fn new(patient: &Patient, status: EntryStatus) -> Self {
        Self {
            patient: patient.clone(),
            status,
            highlighted: false,
            grayed_out: false,
        }
    }

    fn highlighted(mut self, on: bool) -> Self {
        self.highlighted = on;
        self
    }

    fn grayed_out(mut self, on: bool) -> Self {
        self.grayed_out = on;
        self
    }
}

/// Queue number badge drawn next to a called patient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBadge {
    pub number: String,
    pub style: QueueNumberStyle,
}

/// Resolved content of a single zone
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneContent {
    WindowInfo {
        window_number: Option<String>,
        window_name: Option<String>,
        subtitle: UntrustedHtml,
        font_size: u32,
    },
    CurrentCall {
        title: String,
        patient: Option<Patient>,
        badge: Option<QueueBadge>,
        window: Option<String>,
        font_size: u32,
        number_font_size: u32,
    },
    WaitingList {
        title: String,
        entries: Vec<ListEntry>,
        rows: u32,
        columns: u32,
        font_size: u32,
        show_window: bool,
    },
    PassedList {
        title: String,
        entries: Vec<ListEntry>,
        rows: u32,
        columns: u32,
        font_size: u32,
        show_window: bool,
    },
    StaticText {
        html: UntrustedHtml,
        font_size: u32,
    },
    Video {
        url: String,
        fit: VideoFit,
        looped: bool,
        muted: bool,
    },
    Hidden,
}

impl ZoneContent {
    pub fn kind(&self) -> ZoneKind {
        match self {
            ZoneContent::WindowInfo { .. } => ZoneKind::WindowInfo,
            ZoneContent::CurrentCall { .. } => ZoneKind::CurrentCall,
            ZoneContent::WaitingList { .. } => ZoneKind::WaitingList,
            ZoneContent::PassedList { .. } => ZoneKind::PassedList,
            ZoneContent::StaticText { .. } => ZoneKind::StaticText,
            ZoneContent::Video { .. } => ZoneKind::Video,
            ZoneContent::Hidden => ZoneKind::Hidden,
        }
    }

    /// List entries for list zones, empty otherwise
    pub fn entries(&self) -> &[ListEntry] {
        match self {
            ZoneContent::WaitingList { entries, .. } | ZoneContent::PassedList { entries, .. } => entries,
            _ => &[],
        }
    }
}

/// Maximum number of cells a grid can show; degenerate grids still get one
pub fn list_capacity(rows: u32, columns: u32) -> usize {
    (rows.max(1) as usize) * (columns.max(1) as usize)
}

/// Resolve the content of one zone against the whole configuration
pub fn resolve_zone(zone: &ZoneConfig, config: &QueueConfig) -> ZoneContent {
    match zone {
        ZoneConfig::WindowInfo(z) => window_info(z, config),
        ZoneConfig::CurrentCall(z) => current_call(z, config),
        ZoneConfig::WaitingList(z) => ZoneContent::WaitingList {
            title: z.title.clone(),
            entries: waiting_entries(z, config),
            rows: z.grid_rows,
            columns: z.grid_columns,
            font_size: z.font_size,
            show_window: z.show_window,
        },
        ZoneConfig::PassedList(z) => ZoneContent::PassedList {
            title: z.title.clone(),
            entries: passed_entries(z, config),
            rows: z.grid_rows,
            columns: z.grid_columns,
            font_size: z.font_size,
            show_window: z.show_window,
        },
        ZoneConfig::StaticText(z) => ZoneContent::StaticText {
            html: UntrustedHtml::new(z.html.clone()),
            font_size: z.font_size,
        },
        ZoneConfig::Video(z) => ZoneContent::Video {
            url: z.url.clone(),
            fit: z.fit,
            looped: z.looped,
            muted: z.muted,
        },
        ZoneConfig::Hidden => ZoneContent::Hidden,
    }
}

fn window_info(zone: &WindowInfoZone, config: &QueueConfig) -> ZoneContent {
    ZoneContent::WindowInfo {
        window_number: config.system.window_number.clone(),
        window_name: if zone.show_window_name { config.system.window_name.clone() } else { None },
        subtitle: UntrustedHtml::new(zone.subtitle_html.clone()),
        font_size: zone.font_size,
    }
}

fn current_call(zone: &CurrentCallZone, config: &QueueConfig) -> ZoneContent {
    let patient = config.current_patient.clone();
    let badge = patient
        .as_ref()
        .filter(|_| config.layout.show_queue_number)
        .map(|p| QueueBadge {
            number: p.number.clone(),
            style: config.layout.queue_number_style,
        });
    let window = patient
        .as_ref()
        .filter(|_| zone.show_window)
        .and_then(window_label);

    ZoneContent::CurrentCall {
        title: zone.title.clone(),
        patient,
        badge,
        window,
        font_size: zone.font_size,
        number_font_size: zone.number_font_size,
    }
}

/// Counter label for a called patient, name preferred over number
pub fn window_label(patient: &Patient) -> Option<String> {
    patient
        .window_name
        .clone()
        .or_else(|| patient.window_number.clone())
}

fn waiting_entries(zone: &WaitingListZone, config: &QueueConfig) -> Vec<ListEntry> {
    let layout = &config.layout;
    let mut entries = Vec::with_capacity(config.waiting_list.len() + 1);

    if zone.include_current {
        if let Some(current) = &config.current_patient {
            entries.push(ListEntry::new(current, EntryStatus::Current).highlighted(zone.highlight_current));
        }
    }

    entries.extend(
        config
            .waiting_list
            .iter()
            .map(|p| ListEntry::new(p, EntryStatus::Waiting)),
    );

    if layout.passed_display_mode == PassedDisplayMode::WaitListEnd {
        entries.extend(
            config
                .passed_list
                .iter()
                .map(|p| ListEntry::new(p, EntryStatus::Passed).grayed_out(layout.gray_out_passed)),
        );
    }

    entries.truncate(list_capacity(zone.grid_rows, zone.grid_columns));
    entries
}

fn passed_entries(zone: &PassedListZone, config: &QueueConfig) -> Vec<ListEntry> {
    // passed patients already trail the waiting list
    if config.layout.passed_display_mode == PassedDisplayMode::WaitListEnd {
        return Vec::new();
    }
    config
        .passed_list
        .iter()
        .take(list_capacity(zone.grid_rows, zone.grid_columns))
        .map(|p| ListEntry::new(p, EntryStatus::Passed).grayed_out(config.layout.gray_out_passed))
        .collect()
}
