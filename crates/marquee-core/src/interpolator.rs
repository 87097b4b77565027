#![forbid(unsafe_code)]

//! Category-driven metric display with spring interpolation.
//!
//! A [`CategoricalValueInterpolator`] holds a closed table of categories,
//! each with a target value in `[0, 100]`. Selecting a category retargets a
//! [`Spring`] from wherever the displayed value currently is, so rapid
//! switching bends the trajectory instead of snapping or restarting.
//!
//! The displayed value is never written directly: it only moves through
//! [`CategoricalValueInterpolator::advance`].

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::time::Duration;

use tracing::debug;

use crate::animation::{Animation, Spring, SpringParams};
use crate::error::{ConfigError, Result};

/// Display data for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEntry {
    /// Heading shown for the category.
    pub label: String,
    /// Value the bar settles at, in `[0, 100]`.
    pub target_value: f64,
    /// Caption under the bar.
    pub sub_label: String,
}

impl CategoryEntry {
    pub fn new(label: impl Into<String>, target_value: f64, sub_label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target_value,
            sub_label: sub_label.into(),
        }
    }
}

/// Ordered, validated mapping from category keys to entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable<K> {
    rows: Vec<(K, CategoryEntry)>,
}

impl<K: Eq + Hash + Display> CategoryTable<K> {
    /// Reject an empty table, duplicate keys, and targets outside `[0, 100]`.
    pub fn new(rows: Vec<(K, CategoryEntry)>) -> Result<Self> {
        if rows.is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        let mut seen = HashSet::with_capacity(rows.len());
        for (key, entry) in &rows {
            if !seen.insert(key) {
                return Err(ConfigError::DuplicateCategory {
                    key: key.to_string(),
                });
            }
            if !(0.0..=100.0).contains(&entry.target_value) {
                return Err(ConfigError::TargetOutOfRange {
                    key: key.to_string(),
                    value: entry.target_value,
                });
            }
        }
        Ok(Self { rows })
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&CategoryEntry> {
        self.position(key).map(|idx| &self.rows[idx].1)
    }

    fn position(&self, key: &K) -> Option<usize> {
        self.rows.iter().position(|(k, _)| k == key)
    }

    /// Keys in configured order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.rows.iter().map(|(k, _)| k)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&K, &CategoryEntry)> {
        self.rows.iter().map(|(k, e)| (k, e))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl CategoryTable<String> {
    /// The proficiency metrics of the portfolio page.
    #[must_use]
    pub fn proficiency() -> Self {
        Self {
            rows: vec![
                (
                    "Code".to_string(),
                    CategoryEntry::new("Problem Solving", 90.0, "Efficiency"),
                ),
                (
                    "Design".to_string(),
                    CategoryEntry::new("System Design", 75.0, "Scalability"),
                ),
                (
                    "Tools".to_string(),
                    CategoryEntry::new("DevOps & Git", 85.0, "Workflow"),
                ),
            ],
        }
    }
}

/// Spring-animated display of the selected category's value.
#[derive(Debug, Clone)]
pub struct CategoricalValueInterpolator<K> {
    table: CategoryTable<K>,
    /// Row of the selected category.
    current: usize,
    spring: Spring,
}

impl<K: Clone + Eq + Hash + Display> CategoricalValueInterpolator<K> {
    /// Start on `initial`, with the display at 0 springing toward its value.
    pub fn new(table: CategoryTable<K>, initial: K, params: SpringParams) -> Result<Self> {
        params.validate()?;
        let current = table
            .position(&initial)
            .ok_or_else(|| ConfigError::UnknownCategory {
                key: initial.to_string(),
            })?;
        let target = table.rows[current].1.target_value;
        Ok(Self {
            table,
            current,
            spring: Spring::new(0.0, target).with_params(params),
        })
    }

    /// Switch to `key`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not in the table. The table is closed and fixed at
    /// construction, so an unknown key is a bug in the caller.
    pub fn select_category(&mut self, key: &K) {
        if let Err(err) = self.try_select_category(key) {
            panic!("{err}");
        }
    }

    /// Switch to `key`, reporting an unknown key instead of panicking.
    pub fn try_select_category(&mut self, key: &K) -> Result<()> {
        let idx = self
            .table
            .position(key)
            .ok_or_else(|| ConfigError::UnknownCategory {
                key: key.to_string(),
            })?;
        if idx == self.current {
            return Ok(());
        }
        let target = self.table.rows[idx].1.target_value;
        debug!(
            from = %self.current(),
            to = %key,
            displayed = self.spring.position(),
            target,
            "category retargeted"
        );
        self.current = idx;
        self.spring.retarget(target);
        Ok(())
    }

    /// Step the animation by `dt` and return the displayed value.
    pub fn advance(&mut self, dt: Duration) -> f64 {
        self.spring.advance(dt)
    }

    #[inline]
    #[must_use]
    pub fn displayed_value(&self) -> f64 {
        self.spring.position()
    }

    #[inline]
    #[must_use]
    pub fn target_value(&self) -> f64 {
        self.spring.target()
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> &K {
        &self.table.rows[self.current].0
    }

    #[must_use]
    pub fn current_entry(&self) -> &CategoryEntry {
        &self.table.rows[self.current].1
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.spring.is_at_rest()
    }

    pub fn categories(&self) -> impl Iterator<Item = &K> {
        self.table.keys()
    }
}

impl<K: Clone + Eq + Hash + Display> Animation for CategoricalValueInterpolator<K> {
    fn tick(&mut self, dt: Duration) {
        self.advance(dt);
    }

    fn is_complete(&self) -> bool {
        self.is_settled()
    }

    /// Bar height as a fraction of the full track.
    fn value(&self) -> f32 {
        (self.displayed_value() as f32 / 100.0).clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        self.spring.reset();
    }
}
