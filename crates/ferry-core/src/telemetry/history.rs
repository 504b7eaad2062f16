//! Bounded per-category history of race outcomes.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

/// One completed race as seen by telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceRecord {
    pub category: String,
    /// Winning method, or None when the race fell back.
    pub chosen: Option<String>,
    pub elapsed_ms: u64,
    pub attempted: Vec<String>,
    /// Strategies that reported a fatal (hard incompatibility) failure.
    #[serde(default)]
    pub fatal: Vec<String>,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub recorded_at: i64,
}

/// Aggregate per-method counters within one category.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodStats {
    pub method: String,
    pub attempts: u32,
    pub wins: u32,
    pub fatal: u32,
}

/// Rolling history keyed by request category. Oldest entries drop first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryHistory {
    #[serde(default = "default_version")]
    pub version: u8,
    pub per_category: usize,
    pub entries: HashMap<String, VecDeque<RaceRecord>>,
}

fn default_version() -> u8 {
    1
}

impl TelemetryHistory {
    pub fn new(per_category: usize) -> Self {
        Self {
            version: 1,
            per_category: per_category.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn push(&mut self, record: RaceRecord) {
        let cap = self.per_category.max(1);
        let queue = self.entries.entry(record.category.clone()).or_default();
        while queue.len() >= cap {
            queue.pop_front();
        }
        queue.push_back(record);
    }

    pub fn records(&self, category: &str) -> Vec<RaceRecord> {
        self.entries
            .get(category)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self.entries.keys().cloned().collect();
        cats.sort();
        cats
    }

    /// Per-method counters for a category, sorted by method name.
    pub fn method_stats(&self, category: &str) -> Vec<MethodStats> {
        let mut by_method: HashMap<&str, MethodStats> = HashMap::new();
        let Some(queue) = self.entries.get(category) else {
            return Vec::new();
        };
        for rec in queue {
            for name in &rec.attempted {
                let s = by_method.entry(name.as_str()).or_insert_with(|| MethodStats {
                    method: name.clone(),
                    ..MethodStats::default()
                });
                s.attempts += 1;
                if rec.chosen.as_deref() == Some(name.as_str()) {
                    s.wins += 1;
                }
                if rec.fatal.iter().any(|f| f == name) {
                    s.fatal += 1;
                }
            }
        }
        let mut stats: Vec<MethodStats> = by_method.into_values().collect();
        stats.sort_by(|a, b| a.method.cmp(&b.method));
        stats
    }

    /// Reorder `names` by wins (desc) then fatal failures (asc). Stable, so
    /// names with equal history keep their given order.
    pub fn preferred_order(&self, category: &str, names: &[String]) -> Vec<String> {
        let stats = self.method_stats(category);
        let score = |name: &str| {
            stats
                .iter()
                .find(|s| s.method == name)
                .map(|s| (s.wins, s.fatal))
                .unwrap_or((0, 0))
        };
        let mut ordered = names.to_vec();
        ordered.sort_by(|a, b| {
            let (wa, fa) = score(a);
            let (wb, fb) = score(b);
            wb.cmp(&wa).then(fa.cmp(&fb))
        });
        ordered
    }

    pub fn total_records(&self) -> usize {
        self.entries.values().map(VecDeque::len).sum()
    }
}
