/*!
 * Capture Tracker
 *
 * Accumulates per-capture file arrivals and detects completion. State is
 * coarse-locked (one mutex for the whole map): contention is low because
 * only finished file copies call in, and the critical section is a
 * handful of `HashSet` operations plus, on the quorum transition, the
 * global counter bump.
 */

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use tracing::info;

use crate::grammar::{self, CaptureDescriptor};
use crate::progress::{ProgressBus, ProgressEvent};
use crate::types::{Node, WORKER_QUORUM};

/// A capture's classification, fixed by the first arriving file. Sticky:
/// once a capture is observed to carry a test raw fragment it can never
/// revert to `Production`, even if a later arrival (which per the cluster
/// contract should not happen) looks like production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Unknown,
    Production,
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ArrivalToken {
    Raw(Node),
    Metadata,
}

struct CaptureEntry {
    tokens: HashSet<ArrivalToken>,
    classification: Classification,
    project_name: String,
    sensor_code: Option<String>,
    session_id: String,
    verified: bool,
}

/// Global, per-run counters the engine exposes via `GetStatus`.
#[derive(Default)]
pub struct GlobalCounters {
    pub completed_captures: AtomicU32,
    pub completed_test_captures: AtomicU32,
    last_capture_number: Mutex<Option<String>>,
    last_test_capture_number: Mutex<Option<String>>,
}

impl GlobalCounters {
    pub fn last_capture_number(&self) -> Option<String> {
        self.last_capture_number.lock().unwrap().clone()
    }

    pub fn last_test_capture_number(&self) -> Option<String> {
        self.last_test_capture_number.lock().unwrap().clone()
    }
}

/// Per-run capture completion state machine.
pub struct CaptureTracker {
    entries: Mutex<HashMap<String, CaptureEntry>>,
    counters: GlobalCounters,
}

impl CaptureTracker {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            counters: GlobalCounters::default(),
        }
    }

    pub fn counters(&self) -> &GlobalCounters {
        &self.counters
    }

    /// Record one file arrival. `basename` is the file's name (no
    /// directory component); `arriving_node` is the (node, share) task's
    /// node — ignored for metadata arrivals, since the CU share is the
    /// only valid source of metadata by convention.
    ///
    /// Returns the emitted completion event, if this arrival caused the
    /// capture to reach quorum.
    pub fn record_arrival(
        &self,
        basename: &str,
        arriving_node: &Node,
        bus: &ProgressBus,
    ) -> Option<()> {
        let descriptor = grammar::parse(basename)?;

        let token = match descriptor.data_type {
            grammar::DataType::Ead => ArrivalToken::Metadata,
            grammar::DataType::Lvl00 | grammar::DataType::Lvl0X => {
                ArrivalToken::Raw(arriving_node.clone())
            }
        };

        let mut entries = self.entries.lock().unwrap();
        let completion = {
            let entry = entries
                .entry(descriptor.capture_number.clone())
                .or_insert_with(|| CaptureEntry {
                    tokens: HashSet::new(),
                    classification: Classification::Unknown,
                    project_name: descriptor.project_name.clone(),
                    sensor_code: descriptor.sensor_code.clone(),
                    session_id: descriptor.session_id.clone(),
                    verified: descriptor.is_verified(),
                });

            if descriptor.is_test && entry.classification != Classification::Test {
                entry.classification = Classification::Test;
            } else if entry.classification == Classification::Unknown {
                entry.classification = Classification::Production;
            }

            if !entry.tokens.insert(token) {
                // Idempotent: duplicate arrival (e.g. the same fragment
                // visible on both shares of a worker), not a no-op error.
                return None;
            }

            self.check_completion(&descriptor.capture_number, entry)
        };

        if let Some(record) = completion {
            entries.remove(&descriptor.capture_number);
            drop(entries);
            self.emit_completion(&descriptor.capture_number, record, bus);
            return Some(());
        }

        None
    }

    fn check_completion(
        &self,
        _capture_number: &str,
        entry: &CaptureEntry,
    ) -> Option<CompletionRecord> {
        let raw_count = entry
            .tokens
            .iter()
            .filter(|t| matches!(t, ArrivalToken::Raw(_)))
            .count();
        let has_xml = entry.tokens.contains(&ArrivalToken::Metadata);

        let complete = match entry.classification {
            Classification::Test => raw_count == WORKER_QUORUM,
            Classification::Production | Classification::Unknown => {
                raw_count == WORKER_QUORUM && has_xml
            }
        };

        if !complete {
            return None;
        }

        Some(CompletionRecord {
            classification: entry.classification,
            project_name: entry.project_name.clone(),
            sensor_code: entry.sensor_code.clone(),
            session_id: entry.session_id.clone(),
            verified: entry.verified,
        })
    }

    fn emit_completion(&self, capture_number: &str, record: CompletionRecord, bus: &ProgressBus) {
        let counter_value = match record.classification {
            Classification::Test => {
                let value = self.counters.completed_test_captures.fetch_add(1, Ordering::SeqCst) + 1;
                *self.counters.last_test_capture_number.lock().unwrap() =
                    Some(capture_number.to_string());
                value
            }
            Classification::Production | Classification::Unknown => {
                let value = self.counters.completed_captures.fetch_add(1, Ordering::SeqCst) + 1;
                *self.counters.last_capture_number.lock().unwrap() = Some(capture_number.to_string());
                value
            }
        };

        info!(
            capture_number,
            project = %record.project_name,
            verified = record.verified,
            sensor_code = record.sensor_code.as_deref().unwrap_or(""),
            session_id = %record.session_id,
            class = ?record.classification,
            counter_value,
            "capture complete"
        );

        bus.publish(ProgressEvent::CaptureComplete {
            capture_number: capture_number.to_string(),
            project: record.project_name,
            verified: record.verified,
            sensor_code: record.sensor_code,
            session_id: record.session_id,
            class: record.classification,
            counter_value,
        });
    }

    /// Number of captures still in flight (not yet reached quorum).
    pub fn pending_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_pending(&self, capture_number: &str) -> bool {
        self.entries.lock().unwrap().contains_key(capture_number)
    }
}

impl Default for CaptureTracker {
    fn default() -> Self {
        Self::new()
    }
}

struct CompletionRecord {
    classification: Classification,
    project_name: String,
    sensor_code: Option<String>,
    session_id: String,
    verified: bool,
}

/// Convenience used by callers that already have a parsed descriptor and
/// just want the capture number back (e.g. tests).
pub fn capture_number_of(descriptor: &CaptureDescriptor) -> &str {
    &descriptor.capture_number
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(s: &str) -> Node {
        Node::from(s)
    }

    fn worker_nodes() -> Vec<Node> {
        (1..=13).map(|i| node(&format!("WU{:02}", i))).collect()
    }

    #[test]
    fn single_worker_no_completion() {
        let tracker = CaptureTracker::new();
        let bus = ProgressBus::new();

        let result = tracker.record_arrival(
            "Lvl00-00001-ProjectA-00-00-ABCD_1234.raw",
            &node("WU01"),
            &bus,
        );

        assert!(result.is_none());
        assert_eq!(tracker.counters().completed_captures.load(Ordering::SeqCst), 0);
        assert!(tracker.is_pending("00001"));
    }

    #[test]
    fn production_capture_completes_with_quorum_and_xml() {
        let tracker = CaptureTracker::new();
        let bus = ProgressBus::new();

        for n in worker_nodes() {
            let name = format!("Lvl00-00042-ProjectA-00-00-{}.raw", session_id_for(&n));
            tracker.record_arrival(&name, &n, &bus);
        }
        assert_eq!(tracker.counters().completed_captures.load(Ordering::SeqCst), 0);

        let completed = tracker.record_arrival(
            "EAD-00042-ProjectA-ABCD_1234.xml",
            &node("CU"),
            &bus,
        );

        assert!(completed.is_some());
        assert_eq!(tracker.counters().completed_captures.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.counters().last_capture_number(), Some("00042".to_string()));
        assert!(!tracker.is_pending("00042"));
    }

    #[test]
    fn test_capture_completes_without_xml() {
        let tracker = CaptureTracker::new();
        let bus = ProgressBus::new();

        let mut last = None;
        for n in worker_nodes() {
            let name = format!("Lvl0X-00007-T-ProjectA-00-00-{}.raw", session_id_for(&n));
            last = tracker.record_arrival(&name, &n, &bus);
        }

        assert!(last.is_some());
        assert_eq!(
            tracker.counters().completed_test_captures.load(Ordering::SeqCst),
            1
        );
        assert_eq!(tracker.counters().completed_captures.load(Ordering::SeqCst), 0);
        assert_eq!(
            tracker.counters().last_test_capture_number(),
            Some("00007".to_string())
        );
    }

    #[test]
    fn duplicate_fragment_does_not_double_count() {
        let tracker = CaptureTracker::new();
        let bus = ProgressBus::new();

        let name = "Lvl00-00099-ProjectA-00-00-ABCD_1234.raw";
        tracker.record_arrival(name, &node("WU05"), &bus);
        let second = tracker.record_arrival(name, &node("WU05"), &bus); // same file, e.g. seen on both shares

        assert!(second.is_none());
        assert!(tracker.is_pending("00099"));
    }

    #[test]
    fn idempotent_after_commit() {
        let tracker = CaptureTracker::new();
        let bus = ProgressBus::new();

        for n in worker_nodes() {
            let name = format!("Lvl0X-00007-T-ProjectA-00-00-{}.raw", session_id_for(&n));
            tracker.record_arrival(&name, &n, &bus);
        }
        assert_eq!(
            tracker.counters().completed_test_captures.load(Ordering::SeqCst),
            1
        );

        // A duplicate arrival of the first worker's fragment after commit:
        // capture 00007 no longer exists in the map, so this starts a
        // *new* pending entry rather than incrementing the counter again.
        let name = format!(
            "Lvl0X-00007-T-ProjectA-00-00-{}.raw",
            session_id_for(&node("WU01"))
        );
        tracker.record_arrival(&name, &node("WU01"), &bus);
        assert_eq!(
            tracker.counters().completed_test_captures.load(Ordering::SeqCst),
            1
        );
    }

    #[test]
    fn parse_miss_is_ignored() {
        let tracker = CaptureTracker::new();
        let bus = ProgressBus::new();

        let result = tracker.record_arrival("readme.txt", &node("WU01"), &bus);
        assert!(result.is_none());
        assert_eq!(tracker.pending_count(), 0);
    }

    /// A valid `[A-F0-9_]+` session id that's unique per node, so that
    /// fragments from different workers never collide on basename alone.
    fn session_id_for(n: &Node) -> String {
        let digits: String = n.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
        format!("AB{:0>4}", digits)
    }
}
