//! Directed travel-time lookups between named locations.
//!
//! Source tables often name the same place differently from the demand data
//! (e.g. "Centre Port" vs "CentrePort Wellington"), so every lookup goes
//! through an alias table first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Directed travel durations in seconds, keyed by canonical location names.
///
/// A pair with no entry means there is no route data. It is never treated as
/// a zero-length edge.
#[derive(Debug, Clone, Default)]
pub struct TravelTimeTable {
    durations: HashMap<(String, String), f64>,
    aliases: HashMap<String, String>,
}

/// Origin-row / destination-column travel table as found in source data.
///
/// `null` cells mean "no direct route data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelTimeSheet {
    pub destinations: Vec<String>,
    pub rows: Vec<TravelTimeRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelTimeRow {
    pub origin: String,
    pub seconds: Vec<Option<f64>>,
}

impl TravelTimeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers name aliases applied to both ends of every lookup.
    ///
    /// Entries already in the table are re-keyed under the new canonical
    /// names. When an alias spelling and the canonical spelling both carry a
    /// duration for the same pair, the canonical one is kept.
    pub fn with_aliases<I, K, V>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (alias, name) in aliases {
            self.aliases
                .insert(alias.into().trim().to_string(), name.into().trim().to_string());
        }

        let mut entries: Vec<((String, String), f64)> = self.durations.drain().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        let (canonical, renamed): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|((origin, destination), _)| {
                self.canonical(origin) == *origin && self.canonical(destination) == *destination
            });
        self.durations.extend(canonical);
        for ((origin, destination), seconds) in renamed {
            let key = (self.canonical(&origin), self.canonical(&destination));
            self.durations.entry(key).or_insert(seconds);
        }
        self
    }

    /// Builds a table from one row of cells per origin, in `destinations` order.
    ///
    /// Cells beyond the destination list are ignored; missing trailing cells
    /// are treated as no data.
    pub fn from_rows<I>(destinations: &[String], rows: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Option<f64>>)>,
    {
        let mut table = Self::new();
        for (origin, cells) in rows {
            for (destination, cell) in destinations.iter().zip(cells) {
                if let Some(seconds) = cell {
                    table.insert(&origin, destination, seconds);
                }
            }
        }
        table
    }

    pub fn from_sheet(sheet: &TravelTimeSheet) -> Self {
        Self::from_rows(
            &sheet.destinations,
            sheet
                .rows
                .iter()
                .map(|row| (row.origin.clone(), row.seconds.clone())),
        )
    }

    /// Records the duration of the directed edge `origin -> destination`.
    ///
    /// Non-finite durations are discarded, leaving the edge undefined.
    pub fn insert(&mut self, origin: &str, destination: &str, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        self.durations
            .insert((self.canonical(origin), self.canonical(destination)), seconds);
    }

    /// Canonical name for `name`: trimmed, then resolved through the aliases.
    pub fn canonical(&self, name: &str) -> String {
        let trimmed = name.trim();
        self.aliases
            .get(trimmed)
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// Travel seconds from `origin` to `destination`, if the table has data.
    pub fn lookup(&self, origin: &str, destination: &str) -> Option<f64> {
        self.durations
            .get(&(self.canonical(origin), self.canonical(destination)))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}
