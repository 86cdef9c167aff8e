//! Per-dialogue state sequences and intent post-processing.

use crate::domain::Domain;
use crate::state::State;
use crate::tracker::Tracker;
use crate::INTENT_PREFIX;

/// Derive the ordered per-turn states of one tracker.
///
/// Unless `is_binary_training` or `use_intent_probabilities` is set, every
/// turn keeps only its most confident intent, forced to 1.0.
pub fn create_states<T: Tracker + ?Sized>(
    tracker: &T,
    domain: &dyn Domain,
    is_binary_training: bool,
    use_intent_probabilities: bool,
) -> Vec<State> {
    let states = tracker.past_states(domain);

    // training stories only carry 1.0 / 0.0 intents already
    if use_intent_probabilities || is_binary_training {
        return states;
    }
    states.iter().map(binarize_intents).collect()
}

/// Keep the highest-weight intent feature of a state, set to 1.0, and drop
/// every other intent feature.
///
/// Ties go to the first intent seen. States without intent features come
/// back unchanged.
pub fn binarize_intents(state: &State) -> State {
    let mut binned = state.clone();
    let mut best_intent: Option<&str> = None;
    let mut best_prob = -1.0_f32;

    for (name, prob) in state.iter() {
        if !name.starts_with(INTENT_PREFIX) {
            continue;
        }
        if prob > best_prob {
            if let Some(previous) = best_intent {
                binned.remove(previous);
            }
            best_intent = Some(name);
            best_prob = prob;
        } else {
            binned.remove(name);
        }
    }

    if let Some(best) = best_intent {
        binned.insert(best, 1.0);
    }
    binned
}

/// Remove an intent feature that repeats the intent of the previous turn.
///
/// Only the first intent feature of a state is considered. Each sequence is
/// processed independently and `None` turns are skipped.
pub fn compress_repeated_intents(sequences: &mut [Vec<Option<State>>]) {
    for states in sequences.iter_mut() {
        let mut previous_intent: Option<String> = None;

        for state in states.iter_mut().flatten() {
            let Some(current) = state
                .keys()
                .find(|k| k.starts_with(INTENT_PREFIX))
                .map(str::to_string)
            else {
                continue;
            };

            if previous_intent.as_deref() == Some(current.as_str()) {
                state.remove(&current);
            } else {
                previous_intent = Some(current);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainSpec, StaticDomain};
    use crate::tracker::{DialogueTracker, Event};
    use proptest::prelude::*;

    fn state(pairs: &[(&str, f32)]) -> State {
        pairs.iter().map(|(k, w)| (*k, *w)).collect()
    }

    #[test]
    fn test_binarize_keeps_best_intent() {
        let s = state(&[
            ("intent_greet", 0.3),
            ("prev_action_listen", 1.0),
            ("intent_bye", 0.6),
            ("intent_affirm", 0.1),
        ]);
        let binned = binarize_intents(&s);
        assert_eq!(
            binned,
            state(&[("prev_action_listen", 1.0), ("intent_bye", 1.0)])
        );
    }

    #[test]
    fn test_binarize_tie_keeps_first() {
        let s = state(&[("intent_greet", 0.5), ("intent_bye", 0.5)]);
        assert_eq!(binarize_intents(&s), state(&[("intent_greet", 1.0)]));
    }

    #[test]
    fn test_binarize_without_intents_is_identity() {
        let s = state(&[("prev_action_listen", 1.0), ("slot_name_0", 1.0)]);
        assert_eq!(binarize_intents(&s), s);
    }

    #[test]
    fn test_create_states_binary_training_skips_binarization() {
        let domain = StaticDomain::new(DomainSpec {
            intents: vec!["greet".into(), "bye".into()],
            actions: vec!["utter_greet".into()],
            ..Default::default()
        });
        let tracker = DialogueTracker::new(
            "s1",
            vec![
                Event::UserUttered {
                    intent: Some("greet".into()),
                    intent_ranking: vec![("greet".into(), 0.7), ("bye".into(), 0.3)],
                    entities: vec![],
                },
                Event::action("utter_greet"),
            ],
        );

        let raw = create_states(&tracker, &domain, true, false);
        assert_eq!(raw[0].len(), 2);

        let probs = create_states(&tracker, &domain, false, true);
        assert_eq!(probs[0].get("intent_bye"), Some(0.3));

        let binned = create_states(&tracker, &domain, false, false);
        assert_eq!(binned[0], state(&[("intent_greet", 1.0)]));
    }

    #[test]
    fn test_compress_repeated_intents() {
        let mut sequences = vec![vec![
            None,
            Some(state(&[("intent_greet", 1.0), ("prev_action_listen", 1.0)])),
            Some(state(&[("intent_greet", 1.0), ("prev_utter_greet", 1.0)])),
            Some(state(&[("intent_bye", 1.0)])),
            Some(state(&[("intent_greet", 1.0)])),
        ]];

        compress_repeated_intents(&mut sequences);
        let seq = &sequences[0];
        assert!(seq[0].is_none());
        assert!(seq[1].as_ref().unwrap().contains_key("intent_greet"));
        assert_eq!(seq[2], Some(state(&[("prev_utter_greet", 1.0)])));
        assert!(seq[3].as_ref().unwrap().contains_key("intent_bye"));
        assert!(seq[4].as_ref().unwrap().contains_key("intent_greet"));
    }

    fn intents_strategy() -> impl Strategy<Value = Vec<(String, f32)>> {
        prop::collection::btree_map("[a-z]{1,6}", 0.0f32..1.0, 1..6)
            .prop_map(|m| m.into_iter().map(|(k, w)| (format!("intent_{k}"), w)).collect())
    }

    proptest! {
        #[test]
        fn single_intent_only_forced_to_one(name in "[a-z]{1,6}", weight in 0.0f32..1.0) {
            let key = format!("intent_{name}");
            let s = state(&[("prev_action_listen", 1.0), (key.as_str(), weight)]);
            let binned = binarize_intents(&s);
            prop_assert_eq!(binned, state(&[("prev_action_listen", 1.0), (key.as_str(), 1.0)]));
        }

        #[test]
        fn exactly_one_intent_survives(intents in intents_strategy()) {
            let s: State = intents.iter().map(|(k, w)| (k.clone(), *w)).collect();
            let binned = binarize_intents(&s);

            let survivors: Vec<(&str, f32)> = binned
                .iter()
                .filter(|(k, _)| k.starts_with(INTENT_PREFIX))
                .collect();
            prop_assert_eq!(survivors.len(), 1);
            prop_assert_eq!(survivors[0].1, 1.0);

            // first-seen maximum
            let mut expected = &intents[0];
            for candidate in &intents {
                if candidate.1 > expected.1 {
                    expected = candidate;
                }
            }
            prop_assert_eq!(survivors[0].0, expected.0.as_str());
        }
    }
}
