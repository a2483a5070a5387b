use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of one scheduled unit of work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskResult {
    pub success: bool,
    /// Seconds.
    pub duration: f64,
}

impl TaskResult {
    pub fn ok(elapsed: Duration) -> Self {
        Self {
            success: true,
            duration: elapsed.as_secs_f64(),
        }
    }

    pub fn failed(elapsed: Duration) -> Self {
        Self {
            success: false,
            duration: elapsed.as_secs_f64(),
        }
    }

    pub fn new(success: bool, elapsed: Duration) -> Self {
        Self {
            success,
            duration: elapsed.as_secs_f64(),
        }
    }
}

/// Task results grouped by category label. Order inside a category is not meaningful.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultBucket {
    categories: BTreeMap<String, Vec<TaskResult>>,
}

impl ResultBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: &str, result: TaskResult) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .push(result);
    }

    pub fn merge(&mut self, other: ResultBucket) {
        for (category, mut results) in other.categories {
            self.categories
                .entry(category)
                .or_default()
                .append(&mut results);
        }
    }

    pub fn get(&self, category: &str) -> Option<&[TaskResult]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[TaskResult])> {
        self.categories
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Total number of results across categories.
    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn failed(&self) -> usize {
        self.categories
            .values()
            .flatten()
            .filter(|r| !r.success)
            .count()
    }
}
