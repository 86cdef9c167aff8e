//! Stacking encoded windows and labels into dense arrays.

use ndarray::{s, Array2, Array3, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::Domain;
use crate::encoder::{action_as_one_hot, StateEncoder};
use crate::error::Result;
use crate::state::State;

/// Label array of a training batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "array", rename_all = "snake_case")]
pub enum Labels {
    /// batch x turn x action, one label per turn.
    PerTurn(Array3<i32>),
    /// batch x action, one label per example.
    LastTurn(Array2<i32>),
}

impl Labels {
    pub fn shape(&self) -> &[usize] {
        match self {
            Labels::PerTurn(y) => y.shape(),
            Labels::LastTurn(y) => y.shape(),
        }
    }
}

/// Featurized training batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
    /// batch x turn x feature.
    pub x: Array3<f32>,
    pub y: Labels,
    /// Unpadded turn count of each example.
    pub true_lengths: Vec<usize>,
}

impl TrainingData {
    pub fn num_examples(&self) -> usize {
        self.x.len_of(Axis(0))
    }
}

/// Number of real (non-padding) turns in a window.
pub fn true_length<T>(window: &[Option<T>]) -> usize {
    window.iter().filter(|s| s.is_some()).count()
}

/// Encode every window and stack them into a batch x turn x feature array.
///
/// Windows must already be padded to a common length; a shorter window is
/// filled with the sentinel encoding. The turn axis is at least `min_turns`
/// long, so an empty batch keeps its window shape.
pub fn encode_windows<E>(
    windows: &[Vec<Option<State>>],
    encoder: &E,
    min_turns: usize,
) -> Result<Array3<f32>>
where
    E: StateEncoder + Sync + ?Sized,
{
    let dim = encoder.vocabulary_size()?;
    let turns = windows
        .iter()
        .map(Vec::len)
        .max()
        .unwrap_or(0)
        .max(min_turns);

    let encoded = windows
        .par_iter()
        .map(|window| {
            window
                .iter()
                .map(|state| encoder.encode(state.as_ref()))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    let mut x = Array3::from_elem((windows.len(), turns, dim), crate::SENTINEL as f32);
    for (i, rows) in encoded.iter().enumerate() {
        for (j, row) in rows.iter().enumerate() {
            x.slice_mut(s![i, j, ..]).assign(row);
        }
    }
    Ok(x)
}

/// One-hot encode action labels.
///
/// `None` labels (padding) encode to the sentinel. With `last_turn_only`
/// the turn axis is dropped and only each example's first label is kept.
pub fn encode_labels(
    actions: &[Vec<Option<String>>],
    domain: &dyn Domain,
    last_turn_only: bool,
) -> Result<Labels> {
    let num_actions = domain.num_actions();
    let turns = actions.iter().map(Vec::len).max().unwrap_or(0);

    let mut y = Array3::from_elem((actions.len(), turns, num_actions), crate::SENTINEL);
    for (i, labels) in actions.iter().enumerate() {
        for (j, action) in labels.iter().enumerate() {
            let one_hot = action_as_one_hot(action.as_deref(), domain)?;
            y.slice_mut(s![i, j, ..]).assign(&one_hot);
        }
    }

    if last_turn_only {
        let first = if turns == 0 {
            Array2::from_elem((actions.len(), num_actions), crate::SENTINEL)
        } else {
            y.index_axis(Axis(1), 0).to_owned()
        };
        return Ok(Labels::LastTurn(first));
    }
    Ok(Labels::PerTurn(y))
}
