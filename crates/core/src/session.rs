//! Loading recorded dialogue sessions from CSV event logs.
//!
//! Each file holds one conversation, one event per row:
//!
//! ```text
//! Sequence,Type,Name,Value,Unpredictable
//! 1,action,action_session_start,,true
//! 2,action,action_listen,,
//! 3,user,greet,0.85,
//! 4,intent_ranking,goodbye,0.15,
//! 5,entity,name,,
//! 6,slot,name,Core,
//! 7,action,utter_greet,,
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{FeaturizerError, Result};
use crate::tracker::{DialogueTracker, Event};

/// A row from a session CSV file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SessionRow {
    sequence: Option<i64>,
    #[serde(rename = "Type")]
    event_type: String,
    name: Option<String>,
    value: Option<String>,
    unpredictable: Option<bool>,
}

impl SessionRow {
    fn name(&self, path: &Path) -> Result<&str> {
        self.name.as_deref().ok_or_else(|| invalid(path, self, "missing Name"))
    }

    fn confidence(&self, path: &Path) -> Result<f32> {
        match self.value.as_deref() {
            None => Ok(1.0),
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| invalid(path, self, &format!("invalid confidence '{v}'"))),
        }
    }
}

fn invalid(path: &Path, row: &SessionRow, message: &str) -> FeaturizerError {
    FeaturizerError::InvalidSession {
        path: path.to_path_buf(),
        message: format!(
            "{} row {}: {}",
            row.event_type,
            row.sequence.map_or_else(|| "?".to_string(), |s| s.to_string()),
            message
        ),
    }
}

/// Discover all session CSV files in a directory, sorted by path.
pub fn discover_session_files(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "csv"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

/// Parse one session file into a tracker named after the file stem.
pub fn load_session(csv_path: &Path) -> Result<DialogueTracker> {
    let sender_id = csv_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut tracker = DialogueTracker::new(sender_id, Vec::new());

    let mut reader = csv::Reader::from_path(csv_path)?;
    for result in reader.deserialize() {
        let row: SessionRow = result?;

        match row.event_type.as_str() {
            "user" => {
                let intent = row.name(csv_path)?.to_string();
                let confidence = row.confidence(csv_path)?;
                tracker.push(Event::UserUttered {
                    intent: Some(intent.clone()),
                    intent_ranking: vec![(intent, confidence)],
                    entities: Vec::new(),
                });
            }
            "intent_ranking" | "entity" => {
                let name = row.name(csv_path)?.to_string();
                let confidence = row.confidence(csv_path)?;
                let Some(Event::UserUttered {
                    intent_ranking,
                    entities,
                    ..
                }) = tracker.last_mut()
                else {
                    return Err(invalid(csv_path, &row, "must directly follow a user row"));
                };
                if row.event_type == "entity" {
                    entities.push(name);
                } else {
                    intent_ranking.push((name, confidence));
                }
            }
            "slot" => {
                let key = row.name(csv_path)?.to_string();
                tracker.push(Event::SlotSet {
                    key,
                    value: row.value.clone(),
                });
            }
            "action" => {
                let action_name = row.name(csv_path)?.to_string();
                tracker.push(Event::ActionExecuted {
                    action_name,
                    unpredictable: row.unpredictable.unwrap_or(false),
                });
            }
            "restart" => tracker.push(Event::Restarted),
            other => {
                warn!("Unknown event type '{}' in {:?}", other, csv_path);
            }
        }
    }

    Ok(tracker)
}

/// Load every session under `root` in parallel.
///
/// Trackers come back in path order. The first malformed file fails the
/// whole load.
pub fn load_all_sessions(root: &Path) -> Result<Vec<DialogueTracker>> {
    let paths = discover_session_files(root);
    if paths.is_empty() {
        return Err(FeaturizerError::InvalidSession {
            path: root.to_path_buf(),
            message: "no session CSV files found".to_string(),
        });
    }

    let total = paths.len();
    let processed = AtomicUsize::new(0);

    paths
        .par_iter()
        .map(|path| {
            let tracker = load_session(path)?;
            let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 || count == total {
                debug!("Loaded {}/{} sessions...", count, total);
            }
            Ok(tracker)
        })
        .collect()
}
