//! Booster pack simulation.
//!
//! A configuration holds weighted pack templates and the sheets they draw
//! from:
//!
//! ```text
//! BoosterConfig (set, kind)
//!   templates: [ {weight: 3, contents: [(common, 10), (rare, 1)]},
//!                {weight: 1, contents: [(common, 10), (mythic, 1)]} ]
//!   sheets:    common -> [(uuid, weight), ...]
//!              rare   -> [(uuid, weight), ...]
//! ```
//!
//! Opening a pack picks one template by weight, then draws each slot from
//! its sheet. The random source is a parameter so seeded runs reproduce.

pub mod config;
mod sampling;

pub use sampling::{draw, SamplingPolicy, WeightError, WeightedIndex};

use std::collections::HashMap;

use rand::Rng;
use serde::Serialize;

/// Errors from booster configuration lookup and sampling.
#[derive(Debug, thiserror::Error)]
pub enum BoosterError {
    #[error("no booster configuration for set '{set_code}' kind '{booster_kind}'")]
    ConfigurationNotFound {
        set_code: String,
        booster_kind: String,
    },

    /// The sheet is missing or all of its weights are zero.
    #[error("booster sheet '{sheet}' has nothing to draw")]
    EmptySheet { sheet: String },

    /// Weights of a sheet or of the pack templates sum past `u64::MAX`.
    #[error("weights of '{name}' overflow a 64-bit total")]
    WeightOverflow { name: String },
}

pub type BoosterResult<T> = Result<T, BoosterError>;

/// One weighted card list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoosterSheet {
    pub set_code: String,
    pub booster_kind: String,
    pub sheet_name: String,
    /// `(card_uuid, weight)` pairs.
    pub entries: Vec<(String, u64)>,
    pub total_weight: u64,
    pub allow_duplicates: bool,
    pub foil: bool,
}

impl BoosterSheet {
    pub fn new(
        set_code: impl Into<String>,
        booster_kind: impl Into<String>,
        sheet_name: impl Into<String>,
        entries: Vec<(String, u64)>,
    ) -> Self {
        let total_weight = entries
            .iter()
            .fold(0u64, |total, (_, w)| total.saturating_add(*w));
        Self {
            set_code: set_code.into(),
            booster_kind: booster_kind.into(),
            sheet_name: sheet_name.into(),
            entries,
            total_weight,
            allow_duplicates: false,
            foil: false,
        }
    }
}

/// A weighted pack layout: which sheets to draw from and how many cards each.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackTemplate {
    pub weight: u64,
    /// `(sheet_name, count)` slots in pack order.
    pub contents: Vec<(String, usize)>,
}

/// Everything needed to open packs of one set and booster kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoosterConfig {
    pub set_code: String,
    pub booster_kind: String,
    pub templates: Vec<PackTemplate>,
    pub sheets: HashMap<String, BoosterSheet>,
}

impl BoosterConfig {
    fn not_found(&self) -> BoosterError {
        BoosterError::ConfigurationNotFound {
            set_code: self.set_code.clone(),
            booster_kind: self.booster_kind.clone(),
        }
    }
}

/// Opens packs from a [`BoosterConfig`] under a sampling policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoosterEngine {
    policy: SamplingPolicy,
}

impl BoosterEngine {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SamplingPolicy {
        self.policy
    }

    /// Open one pack with the thread-local generator.
    pub fn open_pack(&self, config: &BoosterConfig) -> BoosterResult<Vec<String>> {
        self.open_pack_with_rng(config, &mut rand::rng())
    }

    /// Open one pack, returning card uuids in slot order.
    pub fn open_pack_with_rng<R: Rng>(
        &self,
        config: &BoosterConfig,
        rng: &mut R,
    ) -> BoosterResult<Vec<String>> {
        let templates = WeightedIndex::new(config.templates.iter().map(|t| t.weight))
            .map_err(|e| match e {
                WeightError::Empty => config.not_found(),
                WeightError::Overflow => BoosterError::WeightOverflow {
                    name: format!("{}/{}", config.set_code, config.booster_kind),
                },
            })?;
        let template = &config.templates[templates.sample(rng)];

        let mut pack = Vec::new();
        for (sheet_name, count) in &template.contents {
            let sheet = config
                .sheets
                .get(sheet_name)
                .ok_or_else(|| BoosterError::EmptySheet {
                    sheet: sheet_name.clone(),
                })?;
            let duplicates = self.policy.allows_duplicates(sheet.allow_duplicates);
            let picked = draw(&sheet.entries, *count, duplicates, rng).map_err(|e| match e {
                WeightError::Empty => BoosterError::EmptySheet {
                    sheet: sheet_name.clone(),
                },
                WeightError::Overflow => BoosterError::WeightOverflow {
                    name: sheet_name.clone(),
                },
            })?;
            pack.extend(picked.into_iter().map(str::to_string));
        }
        Ok(pack)
    }

    /// Open `packs` packs with the thread-local generator.
    pub fn open_box(&self, config: &BoosterConfig, packs: usize) -> BoosterResult<Vec<Vec<String>>> {
        self.open_box_with_rng(config, packs, &mut rand::rng())
    }

    pub fn open_box_with_rng<R: Rng>(
        &self,
        config: &BoosterConfig,
        packs: usize,
        rng: &mut R,
    ) -> BoosterResult<Vec<Vec<String>>> {
        (0..packs)
            .map(|_| self.open_pack_with_rng(config, rng))
            .collect()
    }
}
