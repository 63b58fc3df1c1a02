//! The list of favorite places and its persisted form.
//!
//! Favorites are stored under a single key as a JSON array of records in the order they were
//! added:
//!
//! ```json
//! [{"lat": 51.11, "lng": 17.04, "name": "Rynek", "id": "0f9c…"}]
//! ```
//!
//! The `id` field is optional when reading, so lists written without it still load.

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::layers::marker::{MarkerId, MarkerLayer};
use crate::projection::GeoPos;
use crate::storage::KeyValueStore;

/// Errors raised by the favorites store.
#[derive(Error, Debug)]
pub enum FavoritesError {
    /// There is no picked coordinate to save.
    #[error("Pick a place on the map first")]
    NoSelection,

    /// The list could not be encoded.
    #[error("Unable to encode favorites")]
    Serialize(#[from] serde_json::Error),
}

/// A stable identifier of a favorite.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoriteId(Uuid);

impl FavoriteId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for FavoriteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A saved place.
#[derive(Clone, Debug, PartialEq)]
pub struct Favorite {
    /// The identifier of the favorite.
    pub id: FavoriteId,

    /// The name shown in the list and in the pin's popup. Never empty.
    pub label: String,

    /// The saved coordinate.
    pub pos: GeoPos,

    /// The pin drawn for this favorite.
    pub marker: MarkerId,
}

/// The persisted form of a [`Favorite`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRecord {
    /// Latitude.
    pub lat: f64,

    /// Longitude.
    pub lng: f64,

    /// The label.
    pub name: String,

    /// The identifier, absent in lists written by older versions. Anything that is not a UUID
    /// string reads as absent.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_id"
    )]
    pub id: Option<FavoriteId>,
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<FavoriteId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(FavoriteId))
}

impl From<&Favorite> for FavoriteRecord {
    fn from(favorite: &Favorite) -> Self {
        Self {
            lat: favorite.pos.lat,
            lng: favorite.pos.lon,
            name: favorite.label.clone(),
            id: Some(favorite.id),
        }
    }
}

/// The favorites, in the order they were added.
#[derive(Clone, Debug)]
pub struct FavoritesStore {
    favorites: Vec<Favorite>,
    key: String,
    label_prefix: String,
}

impl FavoritesStore {
    /// Creates an empty store persisted under `key`. Unlabeled favorites are named
    /// `"{label_prefix} {n}"`.
    pub fn new(key: impl Into<String>, label_prefix: impl Into<String>) -> Self {
        Self {
            favorites: Vec::new(),
            key: key.into(),
            label_prefix: label_prefix.into(),
        }
    }

    /// Loads the favorites saved under the store's key, placing one pin per favorite on
    /// `markers`. Missing or unreadable data loads as an empty list.
    pub fn hydrate<S: KeyValueStore + ?Sized>(
        &mut self,
        storage: Option<&S>,
        markers: &mut MarkerLayer,
    ) {
        for favorite in self.favorites.drain(..) {
            markers.remove(favorite.marker);
        }

        let mut seen = HashSet::new();
        for record in load_records(storage, &self.key) {
            let label = if record.name.trim().is_empty() {
                self.default_label()
            } else {
                record.name
            };
            let pos = GeoPos {
                lon: record.lng,
                lat: record.lat,
            };
            // A repeated id gets a fresh one, so every entry stays addressable.
            let id = match record.id {
                Some(id) if seen.insert(id) => id,
                _ => {
                    let id = FavoriteId::generate();
                    seen.insert(id);
                    id
                }
            };
            let marker = markers.place(pos, label.clone());
            self.favorites.push(Favorite {
                id,
                label,
                pos,
                marker,
            });
        }
        debug!("Hydrated {} favorites from `{}`", self.favorites.len(), self.key);
    }

    /// Adds a favorite at `pos` as the last entry and places its pin. An empty `label` is
    /// replaced with a generated name.
    pub fn append(
        &mut self,
        pos: Option<GeoPos>,
        label: &str,
        markers: &mut MarkerLayer,
    ) -> Result<&Favorite, FavoritesError> {
        let pos = pos.ok_or(FavoritesError::NoSelection)?;
        let label = match label.trim() {
            "" => self.default_label(),
            label => label.to_string(),
        };

        let marker = markers.place(pos, label.clone());
        self.favorites.push(Favorite {
            id: FavoriteId::generate(),
            label,
            pos,
            marker,
        });
        let favorite = &self.favorites[self.favorites.len() - 1];
        debug!(
            "Added favorite `{}` at {:.5}, {:.5}",
            favorite.label, favorite.pos.lat, favorite.pos.lon
        );
        Ok(favorite)
    }

    /// Overwrites the stored list with the current favorites.
    pub fn persist<S: KeyValueStore + ?Sized>(&self, storage: &mut S) -> Result<(), FavoritesError> {
        let records: Vec<FavoriteRecord> = self.favorites.iter().map(FavoriteRecord::from).collect();
        let json = serde_json::to_string(&records)?;
        storage.set_string(&self.key, json);
        storage.flush();
        debug!("Persisted {} favorites to `{}`", records.len(), self.key);
        Ok(())
    }

    /// Gets a favorite by id.
    pub fn get(&self, id: FavoriteId) -> Option<&Favorite> {
        self.favorites.iter().find(|f| f.id == id)
    }

    /// Iterates over the favorites in the order they were added.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Favorite> {
        self.favorites.iter()
    }

    /// Iterates over the favorites in display order.
    pub fn display_order(&self, newest_first: bool) -> Box<dyn Iterator<Item = &Favorite> + '_> {
        if newest_first {
            Box::new(self.favorites.iter().rev())
        } else {
            Box::new(self.favorites.iter())
        }
    }

    /// The number of favorites.
    pub fn len(&self) -> usize {
        self.favorites.len()
    }

    /// Whether there are no favorites.
    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty()
    }

    /// The storage key of the list.
    pub fn key(&self) -> &str {
        &self.key
    }

    fn default_label(&self) -> String {
        format!("{} {}", self.label_prefix, self.favorites.len() + 1)
    }
}

fn load_records<S: KeyValueStore + ?Sized>(storage: Option<&S>, key: &str) -> Vec<FavoriteRecord> {
    let Some(storage) = storage else {
        debug!("No storage available, starting without favorites");
        return Vec::new();
    };
    let Some(json) = storage.get_string(key) else {
        return Vec::new();
    };
    match serde_json::from_str(&json) {
        Ok(records) => records,
        Err(e) => {
            warn!("Ignoring malformed favorites under `{}`: {}", key, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const KEY: &str = "favorites";

    fn store() -> FavoritesStore {
        FavoritesStore::new(KEY, "Marker")
    }

    fn stored_records(storage: &MemoryStore) -> Vec<FavoriteRecord> {
        serde_json::from_str(&storage.get_string(KEY).unwrap()).unwrap()
    }

    #[test]
    fn append_then_persist_matches_memory() {
        let mut storage = MemoryStore::new();
        let mut markers = MarkerLayer::default();
        let mut favorites = store();

        for i in 0..5 {
            let pos = GeoPos::from_lat_lon(50.0 + i as f64, 17.0);
            favorites
                .append(Some(pos), &format!("Place {}", i), &mut markers)
                .unwrap();
            favorites.persist(&mut storage).unwrap();

            let records = stored_records(&storage);
            assert_eq!(records.len(), favorites.len());
            for (record, favorite) in records.iter().zip(favorites.iter()) {
                assert_eq!(record, &FavoriteRecord::from(favorite));
            }
        }
        assert_eq!(markers.len(), 5);
        assert_eq!(storage.flushes(), 5);
    }

    #[test]
    fn append_is_last_and_not_deduplicated() {
        let mut markers = MarkerLayer::default();
        let mut favorites = store();
        let pos = GeoPos::from_lat_lon(10.0, 20.0);

        let first = favorites.append(Some(pos), "Same", &mut markers).unwrap().id;
        let second = favorites.append(Some(pos), "Same", &mut markers).unwrap().id;

        assert_ne!(first, second);
        let ids: Vec<_> = favorites.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn empty_label_gets_generated_name() {
        let mut markers = MarkerLayer::default();
        let mut favorites = store();
        let pos = Some(GeoPos::from_lat_lon(10.0, 20.0));

        assert_eq!(favorites.append(pos, "", &mut markers).unwrap().label, "Marker 1");
        assert_eq!(favorites.append(pos, "Named", &mut markers).unwrap().label, "Named");
        assert_eq!(favorites.append(pos, "   ", &mut markers).unwrap().label, "Marker 3");

        let marker = favorites.iter().next().unwrap().marker;
        assert_eq!(markers.get(marker).unwrap().label, "Marker 1");
    }

    #[test]
    fn append_without_selection_is_rejected() {
        let mut markers = MarkerLayer::default();
        let mut favorites = store();

        let result = favorites.append(None, "Rynek", &mut markers);
        assert!(matches!(result, Err(FavoritesError::NoSelection)));
        assert!(favorites.is_empty());
        assert!(markers.is_empty());
    }

    #[test]
    fn hydrate_places_one_marker_per_record() {
        for count in [0usize, 1, 7] {
            let records: Vec<FavoriteRecord> = (0..count)
                .map(|i| FavoriteRecord {
                    lat: i as f64,
                    lng: -(i as f64),
                    name: format!("R{}", i),
                    id: None,
                })
                .collect();
            let storage = MemoryStore::with_value(KEY, serde_json::to_string(&records).unwrap());
            let mut markers = MarkerLayer::default();
            let mut favorites = store();

            favorites.hydrate(Some(&storage), &mut markers);

            assert_eq!(favorites.len(), count);
            assert_eq!(markers.len(), count);
            for (favorite, record) in favorites.iter().zip(&records) {
                assert_eq!(favorite.label, record.name);
                assert_eq!(favorite.pos, GeoPos::from_lat_lon(record.lat, record.lng));
                assert_eq!(markers.get(favorite.marker).unwrap().pos, favorite.pos);
            }
        }
    }

    #[test]
    fn hydrate_legacy_records_without_id() {
        let storage = MemoryStore::with_value(KEY, r#"[{"lat":10,"lng":20,"name":"A"}]"#);
        let mut markers = MarkerLayer::default();
        let mut favorites = store();

        favorites.hydrate(Some(&storage), &mut markers);

        let favorite = favorites.iter().next().unwrap();
        assert_eq!(favorite.label, "A");
        assert_eq!(favorite.pos, GeoPos::from_lat_lon(10.0, 20.0));
        assert_eq!(markers.len(), 1);
    }

    #[test]
    fn hydrate_ignores_foreign_ids() {
        let mut storage = MemoryStore::with_value(
            KEY,
            r#"[{"lat":10,"lng":20,"name":"A","id":1},{"lat":11,"lng":21,"name":"B"},{"lat":12,"lng":22,"name":"C","id":"not-a-uuid"}]"#,
        );
        let mut markers = MarkerLayer::default();
        let mut favorites = store();

        favorites.hydrate(Some(&storage), &mut markers);
        let names: Vec<_> = favorites.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(markers.len(), 3);

        favorites
            .append(Some(GeoPos::from_lat_lon(1.0, 2.0)), "D", &mut markers)
            .unwrap();
        favorites.persist(&mut storage).unwrap();

        let names: Vec<_> = stored_records(&storage).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
        assert!(stored_records(&storage).iter().all(|r| r.id.is_some()));
    }

    #[test]
    fn hydrate_replaces_repeated_ids() {
        let id = "0f9c0b6e-5d3a-4a4e-9c55-3f1e2b7a9d10";
        let storage = MemoryStore::with_value(
            KEY,
            format!(
                r#"[{{"lat":10,"lng":20,"name":"A","id":"{id}"}},{{"lat":11,"lng":21,"name":"B","id":"{id}"}}]"#
            ),
        );
        let mut favorites = store();
        favorites.hydrate(Some(&storage), &mut MarkerLayer::default());

        let entries: Vec<_> = favorites.iter().cloned().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id.to_string(), id);
        assert_ne!(entries[0].id, entries[1].id);
        assert_eq!(favorites.get(entries[0].id).unwrap().label, "A");
        assert_eq!(favorites.get(entries[1].id).unwrap().label, "B");
    }

    #[test]
    fn ids_survive_persist_and_hydrate() {
        let mut storage = MemoryStore::new();
        let mut markers = MarkerLayer::default();
        let mut favorites = store();
        let id = favorites
            .append(Some(GeoPos::from_lat_lon(1.0, 2.0)), "A", &mut markers)
            .unwrap()
            .id;
        favorites.persist(&mut storage).unwrap();

        let mut reloaded = store();
        reloaded.hydrate(Some(&storage), &mut MarkerLayer::default());
        assert_eq!(reloaded.get(id).map(|f| f.label.as_str()), Some("A"));
    }

    #[test]
    fn hydrate_absent_or_malformed_is_empty() {
        let mut markers = MarkerLayer::default();
        let mut favorites = store();

        favorites.hydrate(Some(&MemoryStore::new()), &mut markers);
        assert!(favorites.is_empty());

        for bad in ["not json", r#"{"lat":1}"#, r#"[{"lat":"x"}]"#, ""] {
            favorites.hydrate(Some(&MemoryStore::with_value(KEY, bad)), &mut markers);
            assert!(favorites.is_empty(), "{:?} should load as empty", bad);
        }

        favorites.hydrate(None::<&MemoryStore>, &mut markers);
        assert!(favorites.is_empty());
        assert!(markers.is_empty());
    }

    #[test]
    fn hydrate_replaces_previous_entries_and_markers() {
        let storage = MemoryStore::with_value(KEY, r#"[{"lat":10,"lng":20,"name":"A"}]"#);
        let mut markers = MarkerLayer::default();
        let mut favorites = store();
        favorites
            .append(Some(GeoPos::from_lat_lon(1.0, 1.0)), "Old", &mut markers)
            .unwrap();

        favorites.hydrate(Some(&storage), &mut markers);

        assert_eq!(favorites.len(), 1);
        assert_eq!(markers.len(), 1);
        assert_eq!(favorites.iter().next().unwrap().label, "A");
    }

    #[test]
    fn display_order_reverses_without_touching_storage_order() {
        let mut markers = MarkerLayer::default();
        let mut favorites = store();
        for name in ["A", "B", "C"] {
            favorites
                .append(Some(GeoPos::default()), name, &mut markers)
                .unwrap();
        }

        let newest: Vec<_> = favorites.display_order(true).map(|f| f.label.as_str()).collect();
        let oldest: Vec<_> = favorites.display_order(false).map(|f| f.label.as_str()).collect();
        assert_eq!(newest, vec!["C", "B", "A"]);
        assert_eq!(oldest, vec!["A", "B", "C"]);
    }

    #[test]
    fn record_serializes_lat_lng_name() {
        let record = FavoriteRecord {
            lat: 51.11,
            lng: 17.04,
            name: "Rynek".to_string(),
            id: None,
        };
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"lat":51.11,"lng":17.04,"name":"Rynek"}"#
        );
    }
}
