//! The catalog snapshot and its durable encoding.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storeline_core::{Item, ItemId};

use super::ViewKey;

/// An immutable, versioned copy of every catalog view.
///
/// Every view holds `Arc`s into the `All` view, so each item is allocated
/// once and `All` is a superset of every other view by identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "SnapshotRecord", from = "SnapshotRecord")]
pub struct CatalogSnapshot {
    pub(crate) views: BTreeMap<ViewKey, Vec<Arc<Item>>>,
    pub(crate) item_count: u64,
    pub(crate) taken_at: DateTime<Utc>,
    pub(crate) version: u64,
}

impl CatalogSnapshot {
    /// Items of `key`, in view order. Missing views are empty.
    #[must_use]
    pub fn view(&self, key: ViewKey) -> &[Arc<Item>] {
        self.views
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Length of the `All` view when the snapshot was built.
    #[must_use]
    pub const fn item_count(&self) -> u64 {
        self.item_count
    }

    /// When the snapshot was built.
    #[must_use]
    pub const fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Build number, increasing with every committed build.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Look up an item by id.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&Arc<Item>> {
        self.view(ViewKey::All).iter().find(|item| item.id == id)
    }
}

/// Durable form: the `All` items once, other views as id lists.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRecord {
    items: Vec<Item>,
    views: BTreeMap<ViewKey, Vec<ItemId>>,
    item_count: u64,
    taken_at: DateTime<Utc>,
    version: u64,
}

impl From<CatalogSnapshot> for SnapshotRecord {
    fn from(snapshot: CatalogSnapshot) -> Self {
        let items = snapshot
            .view(ViewKey::All)
            .iter()
            .map(|item| Item::clone(item))
            .collect();
        let views = snapshot
            .views
            .iter()
            .filter(|(key, _)| **key != ViewKey::All)
            .map(|(key, items)| (*key, items.iter().map(|item| item.id).collect()))
            .collect();

        Self {
            items,
            views,
            item_count: snapshot.item_count,
            taken_at: snapshot.taken_at,
            version: snapshot.version,
        }
    }
}

impl From<SnapshotRecord> for CatalogSnapshot {
    fn from(record: SnapshotRecord) -> Self {
        let all: Vec<Arc<Item>> = record.items.into_iter().map(Arc::new).collect();
        let index: HashMap<ItemId, &Arc<Item>> = all.iter().map(|item| (item.id, item)).collect();

        let mut views: BTreeMap<ViewKey, Vec<Arc<Item>>> = record
            .views
            .into_iter()
            .filter(|(key, _)| *key != ViewKey::All)
            .map(|(key, ids)| {
                let items = ids
                    .iter()
                    .filter_map(|id| index.get(id).map(|item| Arc::clone(item)))
                    .collect();
                (key, items)
            })
            .collect();
        views.insert(ViewKey::All, all);

        Self {
            views,
            item_count: record.item_count,
            taken_at: record.taken_at,
            version: record.version,
        }
    }
}
