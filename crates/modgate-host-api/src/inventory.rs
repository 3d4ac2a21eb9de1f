//! Per-module asset inventory.
//!
//! Asset subsystems expose read-only indexes of namespaced identifiers
//! (`module:assetName`). The reporter attributes each identifier to the
//! module owning its namespace and summarizes the counts per module.
//! Item assets are further split by naming convention.
//!
//! Identifiers whose namespace is not a loaded module are counted as
//! unattributed, so the counts of every kind always add up to the size of
//! its index.

use chrono::{DateTime, Utc};
use modgate_runtime::Environment;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Kinds of assets the host indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Structured-data item definitions.
    Item,
    Emitter,
    Sound,
    Music,
    Texture,
}

impl AssetKind {
    /// Every kind, in report order.
    pub const ALL: [AssetKind; 5] = [
        AssetKind::Item,
        AssetKind::Emitter,
        AssetKind::Sound,
        AssetKind::Music,
        AssetKind::Texture,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Item => "items",
            AssetKind::Emitter => "emitters",
            AssetKind::Sound => "sounds",
            AssetKind::Music => "music",
            AssetKind::Texture => "textures",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item subcategories, recognized by name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Armor,
    AbilityCharge,
    Clip,
    Engine,
    Shield,
    Other,
}

impl ItemCategory {
    /// Suffix rules, checked in this order.
    const SUFFIXES: [(&'static str, ItemCategory); 5] = [
        ("Armor", ItemCategory::Armor),
        ("AbilityCharge", ItemCategory::AbilityCharge),
        ("Clip", ItemCategory::Clip),
        ("Engine", ItemCategory::Engine),
        ("Shield", ItemCategory::Shield),
    ];

    /// Every category, in report order.
    pub const ALL: [ItemCategory; 6] = [
        ItemCategory::Armor,
        ItemCategory::AbilityCharge,
        ItemCategory::Clip,
        ItemCategory::Engine,
        ItemCategory::Shield,
        ItemCategory::Other,
    ];

    /// Classify an item by its asset name.
    pub fn classify(asset_name: &str) -> Self {
        Self::SUFFIXES
            .iter()
            .find(|(suffix, _)| asset_name.ends_with(suffix))
            .map(|&(_, category)| category)
            .unwrap_or(ItemCategory::Other)
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemCategory::Armor => "Armors",
            ItemCategory::AbilityCharge => "AbilityCharges",
            ItemCategory::Clip => "Clips",
            ItemCategory::Engine => "Engines",
            ItemCategory::Shield => "Shields",
            ItemCategory::Other => "Others",
        }
    }
}

/// Read-only index of one kind of asset.
pub trait AssetIndex: Send + Sync {
    /// Every identifier in the index, as `module:assetName`.
    fn list(&self) -> Vec<String>;
}

/// Fixed list of identifiers.
#[derive(Debug, Clone, Default)]
pub struct StaticAssetIndex {
    ids: Vec<String>,
}

impl StaticAssetIndex {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl AssetIndex for StaticAssetIndex {
    fn list(&self) -> Vec<String> {
        self.ids.clone()
    }
}

/// The indexes supplied to a report, one per kind.
#[derive(Default)]
pub struct AssetIndexes {
    indexes: BTreeMap<AssetKind, Box<dyn AssetIndex>>,
}

impl AssetIndexes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply the index for `kind`, replacing any earlier one.
    pub fn with(mut self, kind: AssetKind, index: impl AssetIndex + 'static) -> Self {
        self.insert(kind, index);
        self
    }

    pub fn insert(&mut self, kind: AssetKind, index: impl AssetIndex + 'static) {
        self.indexes.insert(kind, Box::new(index));
    }

    pub fn get(&self, kind: AssetKind) -> Option<&dyn AssetIndex> {
        self.indexes.get(&kind).map(|index| index.as_ref())
    }

    /// Supplied kinds, in report order.
    pub fn kinds(&self) -> impl Iterator<Item = AssetKind> + '_ {
        self.indexes.keys().copied()
    }
}

/// Summary of one module's assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInventory {
    pub module: String,
    pub version: String,

    /// Count per supplied kind, zero counts included.
    pub counts: BTreeMap<AssetKind, usize>,

    /// Item counts per category; empty when no item index was supplied.
    pub items: BTreeMap<ItemCategory, usize>,
}

impl ModuleInventory {
    pub fn count(&self, kind: AssetKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn items(&self, category: ItemCategory) -> usize {
        self.items.get(&category).copied().unwrap_or(0)
    }

    /// Total assets of every kind.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Inventory of every loaded module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReport {
    pub generated_at: DateTime<Utc>,

    /// One record per loaded module, in load order.
    pub modules: Vec<ModuleInventory>,

    /// Identifiers not belonging to any loaded module.
    pub unattributed: BTreeMap<AssetKind, usize>,

    /// Size of each supplied index.
    pub totals: BTreeMap<AssetKind, usize>,
}

impl InventoryReport {
    /// Record for `module`, if it is loaded.
    pub fn module(&self, module: &str) -> Option<&ModuleInventory> {
        self.modules.iter().find(|m| m.module == module)
    }

    /// Emit the report to the log.
    pub fn log(&self) {
        for inventory in &self.modules {
            info!(
                module = %inventory.module,
                "Module Discovered: {}-{}",
                inventory.module,
                inventory.version
            );

            for kind in inventory.counts.keys() {
                if *kind == AssetKind::Item {
                    info!(module = %inventory.module, "\t-Items:");
                    for category in ItemCategory::ALL {
                        info!(
                            module = %inventory.module,
                            "\t\t-{}: {}",
                            category.label(),
                            inventory.items(category)
                        );
                    }
                } else {
                    info!(
                        module = %inventory.module,
                        "\t-{}: {}",
                        kind,
                        inventory.count(*kind)
                    );
                }
            }
        }

        for (kind, count) in &self.unattributed {
            if *count > 0 {
                info!("{} {} asset(s) belong to no loaded module", count, kind);
            }
        }
    }

    /// Render the report as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds [`InventoryReport`]s.
pub struct AssetInventoryReporter;

impl AssetInventoryReporter {
    /// Count every supplied index per loaded module.
    pub fn report(environment: &Environment, indexes: &AssetIndexes) -> InventoryReport {
        let mut counts: HashMap<&str, BTreeMap<AssetKind, usize>> = HashMap::new();
        let mut items: HashMap<&str, BTreeMap<ItemCategory, usize>> = HashMap::new();
        let mut unattributed = BTreeMap::new();
        let mut totals = BTreeMap::new();

        for kind in indexes.kinds() {
            let Some(index) = indexes.get(kind) else {
                continue;
            };
            let ids = index.list();
            totals.insert(kind, ids.len());
            unattributed.insert(kind, 0);

            for id in &ids {
                let owner = id
                    .split_once(':')
                    .and_then(|(namespace, name)| {
                        environment.module(namespace).map(|m| (m.id.as_str(), name))
                    });

                match owner {
                    Some((module, name)) => {
                        *counts.entry(module).or_default().entry(kind).or_default() += 1;
                        if kind == AssetKind::Item {
                            *items
                                .entry(module)
                                .or_default()
                                .entry(ItemCategory::classify(name))
                                .or_default() += 1;
                        }
                    }
                    None => {
                        *unattributed.entry(kind).or_default() += 1;
                    }
                }
            }
        }

        let has_items = indexes.get(AssetKind::Item).is_some();
        let modules = environment
            .modules()
            .iter()
            .map(|module| {
                let mut module_counts = counts.remove(module.id.as_str()).unwrap_or_default();
                for kind in indexes.kinds() {
                    module_counts.entry(kind).or_insert(0);
                }

                let mut module_items = items.remove(module.id.as_str()).unwrap_or_default();
                if has_items {
                    for category in ItemCategory::ALL {
                        module_items.entry(category).or_insert(0);
                    }
                }

                ModuleInventory {
                    module: module.id.clone(),
                    version: module.version.to_string(),
                    counts: module_counts,
                    items: module_items,
                }
            })
            .collect();

        InventoryReport {
            generated_at: Utc::now(),
            modules,
            unattributed,
            totals,
        }
    }
}
