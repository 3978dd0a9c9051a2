//! Ordered course module ids of one section.
//!
//! Persisted as a JSON list; [`SectionSequence::to_delimited`] and
//! [`SectionSequence::from_delimited`] give the comma-separated encoding for
//! storage layers that keep it as text.
use serde::{Deserialize, Serialize};

use crate::course::error::CourseSystemError;
use crate::kernel::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionSequence(Vec<i64>);

impl SectionSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.contains(&id)
    }

    /// Returns false when `id` was already present.
    pub fn append(&mut self, id: i64) -> bool {
        if self.contains(id) {
            return false;
        }
        self.0.push(id);
        true
    }

    /// Insert `id` in front of `before`; appends when `before` is absent.
    pub fn insert_before(&mut self, id: i64, before: i64) -> bool {
        if self.contains(id) {
            return false;
        }
        match self.0.iter().position(|x| *x == before) {
            Some(index) => self.0.insert(index, id),
            None => self.0.push(id),
        }
        true
    }

    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.0.len();
        self.0.retain(|x| *x != id);
        before != self.0.len()
    }

    pub fn to_delimited(&self) -> String {
        self.0.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
    }

    /// Parse `"3,1,7"`. Empty entries are ignored and repeated ids kept once.
    pub fn from_delimited(text: &str) -> Result<Self> {
        let mut sequence = Self::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let id = part
                .parse::<i64>()
                .map_err(|_| CourseSystemError::InvalidSequence(text.to_string()))?;
            sequence.append(id);
        }
        Ok(sequence)
    }
}

impl FromIterator<i64> for SectionSequence {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        let mut sequence = Self::new();
        for id in iter {
            sequence.append(id);
        }
        sequence
    }
}
