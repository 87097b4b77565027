#![forbid(unsafe_code)]

//! File-based stage configuration.
//!
//! [`StageConfig`] gathers every tunable of the four engines into one struct
//! that can be loaded from TOML or JSON. All fields default to the values of
//! the portfolio page, so an empty file is a valid configuration and a
//! partial file overrides only what it names.
//!
//! # Example (TOML)
//!
//! ```toml
//! seed = 7
//! frame_ms = 33
//!
//! [progress]
//! tick_ms = 100
//!
//! [spring]
//! stiffness = 120.0
//! damping = 22.0
//!
//! [[catalog]]
//! id = "rust"
//! label = "Rust"
//!
//! [[catalog]]
//! id = "cert"
//! label = "Certificate"
//! payload = "/cert.pdf"
//! ```
//!
//! Loaders validate after parsing: a file that parses but describes an
//! invalid engine is reported as [`ConfigLoadError::Invalid`].

#[cfg(feature = "stage-config")]
use std::path::Path;
use std::time::Duration;

use marquee_core::{
    Catalog, CatalogEntry, CategoryEntry, CategoryTable, ConfigError, Phase, PhaseMap,
    ProgressConfig, SpringParams, StepConfig,
};
#[cfg(feature = "stage-config")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a [`StageConfig`].
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "stage-config")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "stage-config")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid stage configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// Everything needed to build a [`Stage`](crate::Stage).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "stage-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "stage-config", serde(default))]
pub struct StageConfig {
    /// Seed for the loading increments. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Interval between frames of the stage loop. Default: 16.
    pub frame_ms: u64,
    pub progress: ProgressSection,
    pub stepper: StepperSection,
    pub spring: SpringSection,
    /// Skill grid, in display order. An entry with a `payload` is a
    /// side-effect item.
    pub catalog: Vec<CatalogItem>,
    /// Metric categories, in display order.
    pub categories: Vec<CategoryItem>,
    /// Category shown first. Default: "Code".
    pub initial_category: String,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            seed: None,
            frame_ms: 16,
            progress: ProgressSection::default(),
            stepper: StepperSection::default(),
            spring: SpringSection::default(),
            catalog: Catalog::skills().entries().iter().map(CatalogItem::from).collect(),
            categories: CategoryTable::proficiency()
                .rows()
                .map(|(key, entry)| CategoryItem::from_row(key, entry))
                .collect(),
            initial_category: "Code".to_string(),
        }
    }
}

/// Loading simulation timings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "stage-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "stage-config", serde(default))]
pub struct ProgressSection {
    /// Default: 150.
    pub tick_ms: u64,
    /// Upper bound of one random increment. Default: 15.0.
    pub max_increment: f64,
    /// Default: 500.
    pub settle_ms: u64,
    /// Default: 600.
    pub exit_ms: u64,
}

impl Default for ProgressSection {
    fn default() -> Self {
        let defaults = ProgressConfig::default();
        Self {
            tick_ms: millis(defaults.tick_period),
            max_increment: defaults.max_increment,
            settle_ms: millis(defaults.settle_delay),
            exit_ms: millis(defaults.exit_delay),
        }
    }
}

/// Pipeline indicator timing and phase layout.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "stage-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "stage-config", serde(default))]
pub struct StepperSection {
    /// Default: 2000.
    pub period_ms: u64,
    /// Default: 4.
    pub stage_count: usize,
    pub phases: Vec<PhaseItem>,
    /// Step on which the scanning effect plays. Default: 1.
    pub scanning_step: Option<usize>,
}

impl Default for StepperSection {
    fn default() -> Self {
        let defaults = StepConfig::default();
        let map = PhaseMap::default();
        Self {
            period_ms: millis(defaults.period),
            stage_count: defaults.stage_count,
            phases: map.phases().iter().map(PhaseItem::from).collect(),
            scanning_step: (0..map.stage_count()).find(|&i| map.is_scanning(i.into())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "stage-config", derive(Serialize, Deserialize))]
pub struct PhaseItem {
    pub name: String,
    pub first: usize,
    pub last: usize,
}

impl From<&Phase> for PhaseItem {
    fn from(phase: &Phase) -> Self {
        Self {
            name: phase.name.clone(),
            first: *phase.steps.start(),
            last: *phase.steps.end(),
        }
    }
}

/// Metric spring tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "stage-config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "stage-config", serde(default))]
pub struct SpringSection {
    /// Default: 80.0.
    pub stiffness: f64,
    /// Default: 15.0.
    pub damping: f64,
}

impl Default for SpringSection {
    fn default() -> Self {
        Self {
            stiffness: SpringParams::DISPLAY.stiffness,
            damping: SpringParams::DISPLAY.damping,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "stage-config", derive(Serialize, Deserialize))]
pub struct CatalogItem {
    pub id: String,
    pub label: String,
    #[cfg_attr(
        feature = "stage-config",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub payload: Option<String>,
}

impl From<&CatalogEntry> for CatalogItem {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            label: entry.label.clone(),
            payload: entry.side_effect_payload.clone(),
        }
    }
}

impl CatalogItem {
    fn to_entry(&self) -> CatalogEntry {
        match &self.payload {
            Some(payload) => CatalogEntry::with_side_effect(&self.id, &self.label, payload),
            None => CatalogEntry::new(&self.id, &self.label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "stage-config", derive(Serialize, Deserialize))]
pub struct CategoryItem {
    pub key: String,
    pub label: String,
    pub target: f64,
    #[cfg_attr(feature = "stage-config", serde(default))]
    pub sub_label: String,
}

impl CategoryItem {
    fn from_row(key: &str, entry: &CategoryEntry) -> Self {
        Self {
            key: key.to_string(),
            label: entry.label.clone(),
            target: entry.target_value,
            sub_label: entry.sub_label.clone(),
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

impl StageConfig {
    /// Load from a TOML string and validate.
    #[cfg(feature = "stage-config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file on disk and validate.
    #[cfg(feature = "stage-config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string and validate.
    #[cfg(feature = "stage-config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigLoadError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file on disk and validate.
    #[cfg(feature = "stage-config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load by extension: `.json` as JSON, anything else as TOML.
    #[cfg(feature = "stage-config")]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Check that every engine can be built from this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_ms == 0 {
            return Err(ConfigError::ZeroPeriod { what: "frame" });
        }
        self.progress_config().validate()?;
        self.step_config().validate()?;
        self.phase_map()?;
        self.spring_params()?;
        self.catalog()?;
        let table = self.category_table()?;
        if table.get(&self.initial_category).is_none() {
            return Err(ConfigError::UnknownCategory {
                key: self.initial_category.clone(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    #[must_use]
    pub fn progress_config(&self) -> ProgressConfig {
        ProgressConfig::default()
            .with_tick_period(Duration::from_millis(self.progress.tick_ms))
            .with_max_increment(self.progress.max_increment)
            .with_settle_delay(Duration::from_millis(self.progress.settle_ms))
            .with_exit_delay(Duration::from_millis(self.progress.exit_ms))
    }

    #[must_use]
    pub fn step_config(&self) -> StepConfig {
        StepConfig::default()
            .with_period(Duration::from_millis(self.stepper.period_ms))
            .with_stage_count(self.stepper.stage_count)
    }

    pub fn phase_map(&self) -> Result<PhaseMap, ConfigError> {
        let phases = self
            .stepper
            .phases
            .iter()
            .map(|p| Phase::new(&p.name, p.first..=p.last))
            .collect();
        let map = PhaseMap::new(phases, self.stepper.stage_count)?;
        Ok(match self.stepper.scanning_step {
            Some(step) => map.with_scanning_step(step),
            None => map,
        })
    }

    pub fn spring_params(&self) -> Result<SpringParams, ConfigError> {
        let params = SpringParams {
            stiffness: self.spring.stiffness,
            damping: self.spring.damping,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        Catalog::new(self.catalog.iter().map(CatalogItem::to_entry).collect())
    }

    pub fn category_table(&self) -> Result<CategoryTable<String>, ConfigError> {
        CategoryTable::new(
            self.categories
                .iter()
                .map(|c| {
                    (
                        c.key.clone(),
                        CategoryEntry::new(&c.label, c.target, &c.sub_label),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_fields_saturate() {
        assert_eq!(millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(micros(Duration::from_millis(16)), 16_000);
        assert_eq!(millis(Duration::MAX), u64::MAX);
        assert_eq!(micros(Duration::MAX), u64::MAX);
    }

    #[test]
    fn defaults_reproduce_the_portfolio_page() {
        let config = StageConfig::default();
        config.validate().unwrap();

        assert_eq!(config.progress_config(), ProgressConfig::default());
        assert_eq!(config.step_config(), StepConfig::default());
        assert_eq!(config.phase_map().unwrap(), PhaseMap::default());
        assert_eq!(config.spring_params().unwrap(), SpringParams::DISPLAY);
        assert_eq!(config.catalog().unwrap(), Catalog::skills());
        assert_eq!(config.category_table().unwrap(), CategoryTable::proficiency());
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn zero_frame_is_rejected() {
        let config = StageConfig {
            frame_ms: 0,
            ..StageConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroPeriod { what: "frame" })
        );
    }

    #[test]
    fn unknown_initial_category_is_rejected() {
        let config = StageConfig {
            initial_category: "Music".into(),
            ..StageConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownCategory { key }) if key == "Music"
        ));
    }

    #[test]
    fn phase_outside_stage_count_is_rejected() {
        let mut config = StageConfig::default();
        config.stepper.stage_count = 3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PhaseOutOfRange { name, .. }) if name == "Deploy"
        ));
    }

    #[test]
    fn scanning_step_can_be_disabled() {
        let mut config = StageConfig::default();
        config.stepper.scanning_step = None;
        let map = config.phase_map().unwrap();
        assert!((0..4).all(|i| !map.is_scanning(i.into())));
    }

    #[cfg(feature = "stage-config")]
    mod files {
        use super::*;

        #[test]
        fn empty_toml_is_default() {
            assert_eq!(StageConfig::from_toml_str("").unwrap(), StageConfig::default());
        }

        #[test]
        fn partial_toml_overrides_named_fields() {
            let config = StageConfig::from_toml_str(
                r#"
                seed = 7
                [progress]
                tick_ms = 100
                [spring]
                damping = 25.0
                "#,
            )
            .unwrap();
            assert_eq!(config.seed, Some(7));
            assert_eq!(config.progress.tick_ms, 100);
            assert_eq!(config.progress.exit_ms, 600);
            assert_eq!(config.spring.stiffness, 80.0);
            assert_eq!(config.spring.damping, 25.0);
        }

        #[test]
        fn catalog_payload_marks_side_effect() {
            let config = StageConfig::from_toml_str(
                r#"
                [[catalog]]
                id = "rust"
                label = "Rust"

                [[catalog]]
                id = "cert"
                label = "Certificate"
                payload = "/cert.pdf"
                "#,
            )
            .unwrap();
            let catalog = config.catalog().unwrap();
            assert_eq!(catalog.len(), 2);
            assert!(!catalog.get("rust").unwrap().has_side_effect);
            assert_eq!(
                catalog.get("cert").unwrap().side_effect_payload.as_deref(),
                Some("/cert.pdf")
            );
        }

        #[test]
        fn duplicate_catalog_id_is_invalid() {
            let err = StageConfig::from_toml_str(
                r#"
                [[catalog]]
                id = "a"
                label = "A"
                [[catalog]]
                id = "a"
                label = "Again"
                "#,
            )
            .unwrap_err();
            assert!(matches!(
                err,
                ConfigLoadError::Invalid(ConfigError::DuplicateId { .. })
            ));
        }

        #[test]
        fn malformed_toml_is_a_parse_error() {
            let err = StageConfig::from_toml_str("frame_ms = \"fast\"").unwrap_err();
            assert!(matches!(err, ConfigLoadError::Toml(_)));
        }

        #[test]
        fn json_categories_replace_defaults() {
            let config = StageConfig::from_json_str(
                r#"{
                    "initial_category": "Speed",
                    "categories": [
                        {"key": "Speed", "label": "Throughput", "target": 60.0},
                        {"key": "Care", "label": "Reliability", "target": 95.0, "sub_label": "Uptime"}
                    ]
                }"#,
            )
            .unwrap();
            let table = config.category_table().unwrap();
            assert_eq!(table.len(), 2);
            assert_eq!(table.get(&"Care".to_string()).unwrap().sub_label, "Uptime");
            assert_eq!(table.get(&"Speed".to_string()).unwrap().sub_label, "");
        }

        #[test]
        fn json_target_out_of_range_is_invalid() {
            let err = StageConfig::from_json_str(
                r#"{"initial_category": "X", "categories": [{"key": "X", "label": "X", "target": 130.0}]}"#,
            )
            .unwrap_err();
            assert!(matches!(
                err,
                ConfigLoadError::Invalid(ConfigError::TargetOutOfRange { .. })
            ));
        }

        #[test]
        fn toml_round_trips_defaults() {
            let text = toml::to_string(&StageConfig::default()).unwrap();
            assert_eq!(StageConfig::from_toml_str(&text).unwrap(), StageConfig::default());
        }
    }
}
