//! Dialogue events and trackers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::state::State;
use crate::{ENTITY_PREFIX, INTENT_PREFIX, PREV_PREFIX, SLOT_PREFIX};

/// One record in a dialogue's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    UserUttered {
        intent: Option<String>,
        #[serde(default)]
        intent_ranking: Vec<(String, f32)>,
        #[serde(default)]
        entities: Vec<String>,
    },
    ActionExecuted {
        action_name: String,
        #[serde(default)]
        unpredictable: bool,
    },
    SlotSet {
        key: String,
        value: Option<String>,
    },
    Restarted,
}

impl Event {
    pub fn action(action_name: impl Into<String>) -> Self {
        Event::ActionExecuted {
            action_name: action_name.into(),
            unpredictable: false,
        }
    }

    pub fn unpredictable_action(action_name: impl Into<String>) -> Self {
        Event::ActionExecuted {
            action_name: action_name.into(),
            unpredictable: true,
        }
    }

    pub fn user(intent: impl Into<String>) -> Self {
        Event::UserUttered {
            intent: Some(intent.into()),
            intent_ranking: Vec::new(),
            entities: Vec::new(),
        }
    }
}

/// Read-only snapshot access to one conversation.
pub trait Tracker {
    fn sender_id(&self) -> &str;

    /// States before each executed action, followed by the final state.
    fn past_states(&self, domain: &dyn Domain) -> Vec<State>;

    /// Events still in effect (everything after the last restart).
    fn applied_events(&self) -> &[Event];
}

/// A tracker backed by an in-memory event list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogueTracker {
    sender_id: String,
    events: Vec<Event>,
}

impl DialogueTracker {
    pub fn new(sender_id: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            sender_id: sender_id.into(),
            events,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn last_mut(&mut self) -> Option<&mut Event> {
        self.events.last_mut()
    }
}

impl Tracker for DialogueTracker {
    fn sender_id(&self) -> &str {
        &self.sender_id
    }

    fn past_states(&self, domain: &dyn Domain) -> Vec<State> {
        let known: HashSet<&str> = domain.input_states().iter().map(String::as_str).collect();
        let mut replay = Replay::default();
        let mut states = Vec::new();

        for event in self.applied_events() {
            if matches!(event, Event::ActionExecuted { .. }) {
                states.push(replay.snapshot(&known));
            }
            replay.apply(event);
        }
        states.push(replay.snapshot(&known));
        states
    }

    fn applied_events(&self) -> &[Event] {
        let start = self
            .events
            .iter()
            .rposition(|e| matches!(e, Event::Restarted))
            .map_or(0, |i| i + 1);
        &self.events[start..]
    }
}

/// Conversation context accumulated while replaying events.
#[derive(Debug, Default)]
struct Replay<'a> {
    latest_message: Option<&'a Event>,
    slots: Vec<&'a str>,
    prev_action: Option<&'a str>,
}

impl<'a> Replay<'a> {
    fn apply(&mut self, event: &'a Event) {
        match event {
            Event::UserUttered { .. } => self.latest_message = Some(event),
            Event::ActionExecuted { action_name, .. } => {
                self.prev_action = Some(action_name.as_str());
            }
            Event::SlotSet { key, value } => {
                self.slots.retain(|s| *s != key.as_str());
                if value.is_some() {
                    self.slots.push(key.as_str());
                }
            }
            // replay starts after the last restart
            Event::Restarted => {}
        }
    }

    fn snapshot(&self, known: &HashSet<&str>) -> State {
        let mut state = State::new();
        let mut add = |key: String, weight: f32| {
            if known.contains(key.as_str()) {
                state.insert(key, weight);
            }
        };

        if let Some(Event::UserUttered {
            intent,
            intent_ranking,
            entities,
        }) = self.latest_message
        {
            if intent_ranking.is_empty() {
                if let Some(intent) = intent {
                    add(format!("{INTENT_PREFIX}{intent}"), 1.0);
                }
            } else {
                for (name, confidence) in intent_ranking {
                    add(format!("{INTENT_PREFIX}{name}"), *confidence);
                }
            }
            for entity in entities {
                add(format!("{ENTITY_PREFIX}{entity}"), 1.0);
            }
        }
        for slot in &self.slots {
            add(format!("{SLOT_PREFIX}{slot}_0"), 1.0);
        }
        if let Some(action) = self.prev_action {
            add(format!("{PREV_PREFIX}{action}"), 1.0);
        }
        state
    }
}
