/*
 *  announce.rs
 *
 *  QuMonS - next please
 *  (c) 2020-26 Stuart Hunter
 *
 *  Announcement engine - decides when a patient call is spoken
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

use log::{debug, info, warn};

use crate::constants::DEFAULT_SPEECH_TEMPLATE;
use crate::model::{BroadcastMode, Patient, QueueConfig, SpeechConfig, SystemConfig};
use crate::speech::{Speaker, Utterance};

/// The last patient that was called
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastCalled {
    pub id: String,
    pub timestamp: i64,
}

impl LastCalled {
    fn of(patient: &Patient) -> Self {
        Self {
            id: patient.id.clone(),
            timestamp: patient.call_timestamp.unwrap_or(0),
        }
    }
}

/// The counter this terminal is bound to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowIdentity {
    pub number: Option<String>,
    pub name: Option<String>,
}

impl WindowIdentity {
    pub fn from_system(system: &SystemConfig) -> Self {
        Self {
            number: system.window_number.clone(),
            name: system.window_name.clone(),
        }
    }

    /// Number wins when the patient carries one, otherwise names are compared
    pub fn matches(&self, patient: &Patient) -> bool {
        if let Some(number) = &patient.window_number {
            return self.number.as_deref().is_some_and(|own| own.trim() == number.trim());
        }
        if let Some(name) = &patient.window_name {
            return self
                .name
                .as_deref()
                .is_some_and(|own| own.trim().eq_ignore_ascii_case(name.trim()));
        }
        false
    }
}

/// Result of evaluating a current-patient update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    /// Same call as before, or nobody being served
    Unchanged,
    /// Handed to the speaker
    Spoken { text: String, recall: bool },
    /// Call for another window in local broadcast mode
    Filtered { recall: bool },
    /// Speech disabled or no speaker
    Muted { recall: bool },
}

/// Fill `{name}`, `{number}` and `{window}` into a template
pub fn render_template(template: &str, patient: &Patient, terminal_window: Option<&str>) -> String {
    let template = if template.trim().is_empty() { DEFAULT_SPEECH_TEMPLATE } else { template };
    let window = patient
        .window_name
        .as_deref()
        .or(terminal_window)
        .or(patient.window_number.as_deref())
        .unwrap_or("");
    template
        .replace("{name}", &patient.name)
        .replace("{number}", &patient.number)
        .replace("{window}", window)
}

fn serving(config: &QueueConfig) -> Option<&Patient> {
    config.current_patient.as_ref().filter(|p| !p.is_sentinel())
}

/// Per terminal announcement state
pub struct AnnouncementEngine {
    last_called: Option<LastCalled>,
    /// Live queue data has been seen since start or registration
    primed: bool,
    registered: bool,
    window: WindowIdentity,
    speech: SpeechConfig,
    speaker: Option<Box<dyn Speaker>>,
}

impl AnnouncementEngine {
    /// Primed with whoever is already being served, so a restart does not
    /// repeat the current call. An unregistered configuration carries no
    /// live queue, so priming waits for the first queue replacement.
    pub fn new(config: &QueueConfig, speaker: Option<Box<dyn Speaker>>) -> Self {
        Self {
            last_called: serving(config).map(LastCalled::of),
            primed: config.system.is_registered,
            registered: config.system.is_registered,
            window: WindowIdentity::from_system(&config.system),
            speech: config.speech.clone(),
            speaker,
        }
    }

    /// Pick up new speech settings and window binding. Call state is kept,
    /// or primed from the new configuration if nothing was called yet.
    pub fn rebind(&mut self, config: &QueueConfig) {
        self.window = WindowIdentity::from_system(&config.system);
        self.speech = config.speech.clone();
        if self.last_called.is_none() {
            self.last_called = serving(config).map(LastCalled::of);
        }
        if config.system.is_registered && !self.registered {
            // newly bound: the next snapshot shows what is already in progress
            self.primed = false;
        }
        self.registered = config.system.is_registered;
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    pub fn last_called(&self) -> Option<&LastCalled> {
        self.last_called.as_ref()
    }

    pub fn window(&self) -> &WindowIdentity {
        &self.window
    }

    /// Handle a queue replacement. The first one after start or
    /// registration only records the current call.
    pub fn on_queue_replaced(&mut self, config: &QueueConfig) -> Announcement {
        if !self.primed {
            self.primed = true;
            if let Some(patient) = serving(config) {
                debug!("Call {} already in progress, not announced", patient.number);
                self.last_called = Some(LastCalled::of(patient));
            }
            return Announcement::Unchanged;
        }
        self.evaluate(config.current_patient.as_ref())
    }

    /// Decide whether the current patient should be announced
    pub fn evaluate(&mut self, current: Option<&Patient>) -> Announcement {
        let Some(patient) = current.filter(|p| !p.is_sentinel()) else {
            return Announcement::Unchanged;
        };
        let ts = patient.call_timestamp.unwrap_or(0);

        let recall = match &self.last_called {
            Some(last) if last.id == patient.id => {
                if ts <= last.timestamp {
                    return Announcement::Unchanged;
                }
                true
            }
            _ => false,
        };
        self.last_called = Some(LastCalled { id: patient.id.clone(), timestamp: ts });

        if self.speech.broadcast_mode == BroadcastMode::Local && !self.window.matches(patient) {
            debug!("Call for {} is for another window, not announced", patient.number);
            return Announcement::Filtered { recall };
        }

        let speaker = match &self.speaker {
            Some(speaker) if self.speech.enabled => speaker,
            _ => return Announcement::Muted { recall },
        };

        let text = render_template(&self.speech.template, patient, self.window.name.as_deref());
        let utterance = Utterance {
            text: text.clone(),
            volume: self.speech.volume,
            rate: self.speech.rate,
            pitch: self.speech.pitch,
        };
        match speaker.speak(&utterance) {
            Ok(()) => info!("{} {}", if recall { "Recalled" } else { "Called" }, patient.number),
            Err(e) => warn!("Announcement for {} failed: {}", patient.number, e),
        }
        Announcement::Spoken { text, recall }
    }
}
