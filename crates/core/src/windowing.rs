//! Slicing per-dialogue state sequences into training and prediction windows.
//!
//! Two strategies are supported:
//! - `FullDialogue`: one example per dialogue, every turn labelled, padded at
//!   the end to the longest dialogue of the batch.
//! - `MaxHistory`: one example per predictable action, a window of the last
//!   `max_history` states padded at the front.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dedup::ExampleDeduplicator;
use crate::domain::Domain;
use crate::error::{FeaturizerError, Result};
use crate::sequence::create_states;
use crate::state::State;
use crate::tracker::{Event, Tracker};
use crate::MAX_HISTORY_DEFAULT;

/// Windows paired with their action labels.
///
/// `states[i]` and `actions[i]` belong to the same example. Full-dialogue
/// examples carry one label per turn, max-history examples exactly one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingExamples {
    pub states: Vec<Vec<Option<State>>>,
    pub actions: Vec<Vec<String>>,
}

impl TrainingExamples {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum WindowingStrategy {
    FullDialogue {
        /// Most actions in any dialogue of the last training batch.
        #[serde(default)]
        max_len: Option<usize>,
    },
    MaxHistory {
        max_history: usize,
        remove_duplicates: bool,
        #[serde(default)]
        verify_collisions: bool,
    },
}

impl Default for WindowingStrategy {
    fn default() -> Self {
        Self::max_history(None, true)
    }
}

impl WindowingStrategy {
    pub fn full_dialogue() -> Self {
        Self::FullDialogue { max_len: None }
    }

    /// A missing or zero `max_history` falls back to [`MAX_HISTORY_DEFAULT`].
    pub fn max_history(max_history: Option<usize>, remove_duplicates: bool) -> Self {
        Self::MaxHistory {
            max_history: max_history
                .filter(|&n| n > 0)
                .unwrap_or(MAX_HISTORY_DEFAULT),
            remove_duplicates,
            verify_collisions: false,
        }
    }

    /// Compare frozen examples on a hash match instead of trusting the hash.
    pub fn with_verified_collisions(mut self) -> Self {
        if let Self::MaxHistory {
            verify_collisions, ..
        } = &mut self
        {
            *verify_collisions = true;
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FullDialogue { .. } => "full_dialogue",
            Self::MaxHistory { .. } => "max_history",
        }
    }

    /// Whether each example has a single label rather than one per turn.
    pub fn labels_last_turn_only(&self) -> bool {
        matches!(self, Self::MaxHistory { .. })
    }

    /// Build training windows and labels for a batch of trackers.
    ///
    /// Trackers are processed in parallel; the output follows input order.
    pub fn training_examples<T, D>(&mut self, trackers: &[T], domain: &D) -> Result<TrainingExamples>
    where
        T: Tracker + Sync,
        D: Domain + Sync,
    {
        debug!(
            "Creating states and action examples from collected trackers (by {})...",
            self.name()
        );

        match self {
            Self::FullDialogue { max_len } => {
                let dialogues = trackers
                    .par_iter()
                    .map(|tracker| full_dialogue_example(tracker, domain))
                    .collect::<Result<Vec<_>>>()?;

                let mut examples = TrainingExamples::default();
                for (states, actions) in dialogues {
                    examples.states.push(states);
                    examples.actions.push(actions);
                }

                *max_len = examples.actions.iter().map(Vec::len).max();
                debug!("The longest dialogue has {:?} actions.", max_len);
                Ok(examples)
            }
            Self::MaxHistory {
                max_history,
                remove_duplicates,
                verify_collisions,
            } => {
                let max_history = *max_history;
                let per_tracker: Vec<Vec<(Vec<Option<State>>, String)>> = trackers
                    .par_iter()
                    .map(|tracker| max_history_examples(tracker, domain, max_history))
                    .collect();

                // sequential so the first occurrence in input order wins
                let mut dedup = ExampleDeduplicator::new(*verify_collisions);
                let mut examples = TrainingExamples::default();
                for (window, action) in per_tracker.into_iter().flatten() {
                    if *remove_duplicates && !dedup.insert(&window, &action) {
                        continue;
                    }
                    examples.states.push(window);
                    examples.actions.push(vec![action]);
                }

                debug!("Created {} action examples.", examples.len());
                Ok(examples)
            }
        }
    }

    /// Build unlabelled windows for inference, one per tracker.
    pub fn predict_examples<T, D>(
        &self,
        trackers: &[T],
        domain: &D,
        use_intent_probabilities: bool,
    ) -> Vec<Vec<Option<State>>>
    where
        T: Tracker + Sync,
        D: Domain + Sync,
    {
        trackers
            .par_iter()
            .map(|tracker| {
                let states = create_states(tracker, domain, false, use_intent_probabilities);
                match self {
                    Self::FullDialogue { .. } => states.into_iter().map(Some).collect(),
                    Self::MaxHistory { max_history, .. } => {
                        slice_state_history(&states, *max_history)
                    }
                }
            })
            .collect()
    }

    /// Turn axis length of an encoded batch, even when it has no examples.
    pub fn min_turns(&self) -> usize {
        match self {
            Self::FullDialogue { .. } => 0,
            Self::MaxHistory { max_history, .. } => *max_history,
        }
    }

    /// Length every sequence of this batch is padded to.
    pub fn padded_len<T>(&self, sequences: &[Vec<Option<T>>]) -> usize {
        let longest = sequences.iter().map(Vec::len).max().unwrap_or(0);
        match self {
            Self::FullDialogue { max_len } => longest.max(max_len.unwrap_or(0)),
            Self::MaxHistory { max_history, .. } => longest.max(*max_history),
        }
    }

    /// Pad one sequence to `target_len`.
    ///
    /// Full-dialogue sequences get trailing `None`s. Max-history windows are
    /// already padded at the front when sliced and are returned unchanged.
    pub fn pad<T: Clone>(&self, mut sequence: Vec<Option<T>>, target_len: usize) -> Vec<Option<T>> {
        if let Self::FullDialogue { .. } = self {
            if sequence.len() < target_len {
                sequence.resize(target_len, None);
            }
        }
        sequence
    }
}

/// Take the last `slice_length` states, padding the front with `None` when
/// fewer are available.
pub fn slice_state_history(states: &[State], slice_length: usize) -> Vec<Option<State>> {
    let slice_end = states.len();
    let slice_start = slice_end.saturating_sub(slice_length);
    let padding = slice_length.saturating_sub(slice_end);

    std::iter::repeat(None)
        .take(padding)
        .chain(states[slice_start..].iter().cloned().map(Some))
        .collect()
}

fn full_dialogue_example<T: Tracker + ?Sized>(
    tracker: &T,
    domain: &dyn Domain,
) -> Result<(Vec<Option<State>>, Vec<String>)> {
    let mut states = create_states(tracker, domain, true, false);

    let mut delete_first_state = false;
    let mut actions = Vec::new();
    for event in tracker.applied_events() {
        let Event::ActionExecuted {
            action_name,
            unpredictable,
        } = event
        else {
            continue;
        };

        if !unpredictable {
            actions.push(action_name.clone());
        } else if delete_first_state {
            return Err(FeaturizerError::UnpredictableActionConflict {
                sender_id: tracker.sender_id().to_string(),
            });
        } else {
            delete_first_state = true;
        }
    }

    if delete_first_state && !states.is_empty() {
        states.remove(0);
    }
    // the final state has no action following it
    states.pop();

    Ok((states.into_iter().map(Some).collect(), actions))
}

fn max_history_examples<T: Tracker + ?Sized>(
    tracker: &T,
    domain: &dyn Domain,
    max_history: usize,
) -> Vec<(Vec<Option<State>>, String)> {
    let states = create_states(tracker, domain, true, false);

    let mut examples = Vec::new();
    let mut idx = 0;
    for event in tracker.applied_events() {
        let Event::ActionExecuted {
            action_name,
            unpredictable,
        } = event
        else {
            continue;
        };

        if !unpredictable {
            let end = (idx + 1).min(states.len());
            let window = slice_state_history(&states[..end], max_history);
            examples.push((window, action_name.clone()));
        }
        idx += 1;
    }
    examples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainSpec, StaticDomain};
    use crate::tracker::DialogueTracker;
    use proptest::prelude::*;

    fn domain() -> StaticDomain {
        StaticDomain::new(DomainSpec {
            intents: vec!["greet".into(), "bye".into()],
            actions: vec![
                "action_listen".into(),
                "action_session_start".into(),
                "utter_greet".into(),
                "utter_bye".into(),
            ],
            ..Default::default()
        })
    }

    /// A dialogue with `turns` greet / utter_greet exchanges.
    fn greeting_tracker(sender_id: &str, turns: usize) -> DialogueTracker {
        let mut tracker = DialogueTracker::new(sender_id, vec![Event::action("action_listen")]);
        for _ in 0..turns {
            tracker.push(Event::user("greet"));
            tracker.push(Event::action("utter_greet"));
            tracker.push(Event::action("action_listen"));
        }
        tracker
    }

    fn state(pairs: &[(&str, f32)]) -> State {
        pairs.iter().map(|(k, w)| (*k, *w)).collect()
    }

    #[test]
    fn test_slice_state_history_pads_front() {
        let states = vec![state(&[("a", 1.0)]), state(&[("b", 1.0)])];
        let window = slice_state_history(&states, 4);
        assert_eq!(window.len(), 4);
        assert!(window[0].is_none() && window[1].is_none());
        assert_eq!(window[3], Some(state(&[("b", 1.0)])));
    }

    #[test]
    fn test_slice_state_history_keeps_most_recent() {
        let states: Vec<State> = (0..6)
            .map(|i| state(&[(format!("k{i}").as_str(), 1.0)]))
            .collect();
        let window = slice_state_history(&states, 3);
        assert_eq!(
            window,
            vec![
                Some(state(&[("k3", 1.0)])),
                Some(state(&[("k4", 1.0)])),
                Some(state(&[("k5", 1.0)]))
            ]
        );
    }

    #[test]
    fn test_full_dialogue_max_len_and_lengths() {
        // 1 + 2 * turns predictable actions
        let trackers = vec![
            greeting_tracker("a", 1),
            greeting_tracker("b", 2),
            greeting_tracker("c", 0),
        ];
        let mut strategy = WindowingStrategy::full_dialogue();
        let examples = strategy.training_examples(&trackers, &domain()).unwrap();

        let lens: Vec<usize> = examples.actions.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![3, 5, 1]);
        assert_eq!(strategy, WindowingStrategy::FullDialogue { max_len: Some(5) });
        for (states, actions) in examples.states.iter().zip(&examples.actions) {
            assert_eq!(states.len(), actions.len());
        }

        let padded = strategy.pad(examples.states[0].clone(), strategy.padded_len(&examples.states));
        assert_eq!(padded.len(), 5);
        assert!(padded[3].is_none() && padded[4].is_none());
    }

    #[test]
    fn test_unpredictable_first_action_drops_leading_state() {
        let mut tracker = DialogueTracker::new(
            "s",
            vec![Event::unpredictable_action("action_session_start")],
        );
        tracker.push(Event::action("action_listen"));
        tracker.push(Event::user("greet"));
        tracker.push(Event::action("utter_greet"));

        let mut strategy = WindowingStrategy::full_dialogue();
        let examples = strategy.training_examples(&[tracker], &domain()).unwrap();

        // three applied actions: one unpredictable, states = 4 - 1 leading - 1 trailing
        assert_eq!(examples.actions[0], vec!["action_listen", "utter_greet"]);
        assert_eq!(examples.states[0].len(), 2);
        assert_eq!(
            examples.states[0][0],
            Some(state(&[("prev_action_session_start", 1.0)]))
        );
    }

    #[test]
    fn test_two_unpredictable_actions_abort_batch() {
        let bad = DialogueTracker::new(
            "broken_story",
            vec![
                Event::unpredictable_action("action_session_start"),
                Event::action("action_listen"),
                Event::unpredictable_action("action_session_start"),
            ],
        );
        let trackers = vec![greeting_tracker("ok", 1), bad];

        let mut strategy = WindowingStrategy::full_dialogue();
        let err = strategy.training_examples(&trackers, &domain()).unwrap_err();
        assert!(matches!(
            err,
            FeaturizerError::UnpredictableActionConflict { ref sender_id } if sender_id == "broken_story"
        ));
    }

    #[test]
    fn test_zero_max_history_falls_back_to_default() {
        let strategy = WindowingStrategy::max_history(Some(0), true);
        assert_eq!(strategy.min_turns(), MAX_HISTORY_DEFAULT);
        assert_eq!(
            strategy,
            WindowingStrategy::MaxHistory {
                max_history: 5,
                remove_duplicates: true,
                verify_collisions: false,
            }
        );
        assert_eq!(WindowingStrategy::full_dialogue().min_turns(), 0);
    }

    #[test]
    fn test_max_history_removes_duplicates_across_dialogues() {
        let trackers = vec![greeting_tracker("a", 1), greeting_tracker("b", 1)];

        let mut dedup = WindowingStrategy::max_history(Some(3), true);
        let examples = dedup.training_examples(&trackers, &domain()).unwrap();
        assert_eq!(examples.len(), 3);

        let mut keep = WindowingStrategy::max_history(Some(3), false);
        let examples = keep.training_examples(&trackers, &domain()).unwrap();
        assert_eq!(examples.len(), 6);
        assert!(examples.actions.iter().all(|a| a.len() == 1));
    }

    #[test]
    fn test_max_history_skips_unpredictable_labels() {
        let tracker = DialogueTracker::new(
            "s",
            vec![
                Event::unpredictable_action("action_session_start"),
                Event::action("action_listen"),
                Event::user("bye"),
                Event::action("utter_bye"),
            ],
        );

        let mut strategy = WindowingStrategy::max_history(Some(2), true);
        let examples = strategy.training_examples(&[tracker], &domain()).unwrap();
        assert_eq!(examples.actions, vec![vec!["action_listen"], vec!["utter_bye"]]);
        // the label's window ends with the state right before it
        assert_eq!(
            examples.states[0],
            vec![
                Some(State::new()),
                Some(state(&[("prev_action_session_start", 1.0)]))
            ]
        );
    }

    #[test]
    fn test_predict_examples() {
        let trackers = vec![greeting_tracker("a", 2)];

        let full = WindowingStrategy::full_dialogue();
        let windows = full.predict_examples(&trackers, &domain(), false);
        assert_eq!(windows[0].len(), 6);
        assert!(windows[0].iter().all(Option::is_some));

        let history = WindowingStrategy::max_history(Some(8), true);
        let windows = history.predict_examples(&trackers, &domain(), false);
        assert_eq!(windows[0].len(), 8);
        assert!(windows[0][0].is_none() && windows[0][1].is_none());
    }

    proptest! {
        #[test]
        fn max_history_windows_have_fixed_length(
            turns in prop::collection::vec(0usize..6, 1..5),
            max_history in 1usize..8,
        ) {
            let trackers: Vec<DialogueTracker> = turns
                .iter()
                .enumerate()
                .map(|(i, t)| greeting_tracker(&format!("t{i}"), *t))
                .collect();

            let mut strategy = WindowingStrategy::max_history(Some(max_history), false);
            let examples = strategy.training_examples(&trackers, &domain()).unwrap();
            prop_assert_eq!(examples.len(), turns.iter().map(|t| 1 + 2 * t).sum::<usize>());
            for window in &examples.states {
                prop_assert_eq!(window.len(), max_history);
            }
        }
    }
}
