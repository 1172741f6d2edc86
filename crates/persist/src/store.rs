//! File-backed snapshot store.
//!
//! Layout inside the store directory:
//! ```text
//! world.meta.json              - schema version and snapshot index
//! snapshots/
//!   000001.snapshot.cbor.zst   - CBOR+zstd compressed snapshots
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use worldkit_kernel::World;

use crate::codec::sha256_hex;
use crate::error::StoreError;
use crate::snapshot::SnapshotFile;

const STORE_SCHEMA_VERSION: u32 = 1;
const META_FILE: &str = "world.meta.json";
const SNAPSHOT_DIR: &str = "snapshots";

/// One saved snapshot as recorded in `world.meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub index: u32,
    pub filename: String,
    pub tick: u64,
    pub objects: usize,
    /// SHA-256 of the compressed file on disk.
    pub sha256: String,
}

/// Metadata stored in `world.meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldMeta {
    pub schema_version: u32,
    pub world_name: String,
    pub snapshots: Vec<SnapshotEntry>,
}

/// Directory of numbered snapshots with schema versioning and per-file hashes.
#[derive(Debug)]
pub struct WorldStore {
    root: PathBuf,
    meta: WorldMeta,
}

impl WorldStore {
    /// Open the store at `path`, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(SNAPSHOT_DIR))?;

        let meta_path = root.join(META_FILE);
        let meta = if meta_path.exists() {
            let meta: WorldMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.schema_version != STORE_SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    file_version: meta.schema_version,
                    expected_version: STORE_SCHEMA_VERSION,
                });
            }
            meta
        } else {
            let meta = WorldMeta {
                schema_version: STORE_SCHEMA_VERSION,
                world_name: String::new(),
                snapshots: Vec::new(),
            };
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            meta
        };

        tracing::debug!(root = %root.display(), snapshots = meta.snapshots.len(), "opened world store");
        Ok(Self { root, meta })
    }

    /// Capture `world` and write it as the next numbered snapshot.
    pub fn save(&mut self, world: &World) -> Result<u32, StoreError> {
        let snapshot = SnapshotFile::capture(world)?;
        let index = self.next_index();
        let filename = format!("{index:06}.snapshot.cbor.zst");
        let bytes = snapshot.to_bytes()?;
        std::fs::write(self.root.join(SNAPSHOT_DIR).join(&filename), &bytes)?;

        self.meta.world_name = world.config().name.clone();
        self.meta.snapshots.push(SnapshotEntry {
            index,
            filename,
            tick: snapshot.tick,
            objects: snapshot.objects.len(),
            sha256: sha256_hex(&bytes),
        });
        self.save_meta()?;
        tracing::debug!(index, tick = snapshot.tick, objects = snapshot.objects.len(), "snapshot written");
        Ok(index)
    }

    /// Read snapshot `index`, checking the file hash and the content hash.
    pub fn load(&self, index: u32) -> Result<SnapshotFile, StoreError> {
        let entry = self
            .meta
            .snapshots
            .iter()
            .find(|entry| entry.index == index)
            .ok_or(StoreError::UnknownSnapshot(index))?;
        let data = std::fs::read(self.root.join(SNAPSHOT_DIR).join(&entry.filename))?;
        let actual = sha256_hex(&data);
        if actual != entry.sha256 {
            return Err(StoreError::IntegrityMismatch {
                expected: entry.sha256.clone(),
                actual,
            });
        }
        SnapshotFile::from_bytes(&data)
    }

    pub fn load_latest(&self) -> Result<SnapshotFile, StoreError> {
        let entry = self.meta.snapshots.last().ok_or(StoreError::NoSnapshots)?;
        self.load(entry.index)
    }

    /// Re-hash every snapshot file against the index.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        for entry in &self.meta.snapshots {
            let data = std::fs::read(self.root.join(SNAPSHOT_DIR).join(&entry.filename))?;
            let actual = sha256_hex(&data);
            if actual != entry.sha256 {
                return Err(StoreError::IntegrityMismatch {
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    pub fn snapshot_count(&self) -> usize {
        self.meta.snapshots.len()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &WorldMeta {
        &self.meta
    }

    fn next_index(&self) -> u32 {
        self.meta.snapshots.last().map_or(1, |entry| entry.index + 1)
    }

    fn save_meta(&self) -> Result<(), StoreError> {
        let path = self.root.join(META_FILE);
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.meta)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldkit_kernel::{Template, TemplateMeta, TemplateRegistry, Vec2, WorldConfig, WorldObject};

    fn world_with(count: usize) -> World {
        let mut world = World::with_config(WorldConfig {
            name: "arena".into(),
            ..WorldConfig::default()
        });
        for i in 0..count {
            world.add_at(
                WorldObject::new(TemplateMeta::new("rock")),
                Vec2::new(i as f32, 0.0),
            );
        }
        world.step();
        world
    }

    #[test]
    fn open_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WorldStore::open(tmp.path().join("world_data")).unwrap();
        assert_eq!(store.snapshot_count(), 0);
        assert!(store.root().join(SNAPSHOT_DIR).is_dir());
        assert!(store.root().join(META_FILE).is_file());
        assert_eq!(store.meta().schema_version, STORE_SCHEMA_VERSION);
    }

    #[test]
    fn save_then_reopen_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world_data");
        let world = world_with(3);

        {
            let mut store = WorldStore::open(&path).unwrap();
            assert_eq!(store.save(&world).unwrap(), 1);
            assert!(path.join(SNAPSHOT_DIR).join("000001.snapshot.cbor.zst").is_file());
        }

        let store = WorldStore::open(&path).unwrap();
        assert_eq!(store.snapshot_count(), 1);
        assert_eq!(store.meta().world_name, "arena");

        let snap = store.load_latest().unwrap();
        assert_eq!(snap.tick, world.tick());
        assert_eq!(snap.objects, world.save());

        let mut registry = TemplateRegistry::new();
        registry.register(Template::new("rock"));
        let mut restored = World::new();
        snap.restore(&mut restored, &registry).unwrap();
        assert_eq!(restored.len(), 3);
    }

    #[test]
    fn indices_increase_and_older_snapshots_stay_readable() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = WorldStore::open(tmp.path()).unwrap();
        let mut world = world_with(1);
        store.save(&world).unwrap();
        world.add(WorldObject::new(TemplateMeta::new("rock")));
        world.step();
        assert_eq!(store.save(&world).unwrap(), 2);

        assert_eq!(store.load(1).unwrap().objects.len(), 1);
        assert_eq!(store.load_latest().unwrap().objects.len(), 2);
        assert!(matches!(store.load(9), Err(StoreError::UnknownSnapshot(9))));
    }

    #[test]
    fn empty_store_has_no_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let store = WorldStore::open(tmp.path()).unwrap();
        assert!(matches!(store.load_latest(), Err(StoreError::NoSnapshots)));
    }

    #[test]
    fn corruption_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world_data");
        let mut store = WorldStore::open(&path).unwrap();
        store.save(&world_with(2)).unwrap();
        store.verify_integrity().unwrap();

        let snap_path = path.join(SNAPSHOT_DIR).join("000001.snapshot.cbor.zst");
        let mut data = std::fs::read(&snap_path).unwrap();
        if let Some(byte) = data.last_mut() {
            *byte ^= 0xff;
        }
        std::fs::write(&snap_path, &data).unwrap();

        let store = WorldStore::open(&path).unwrap();
        assert!(store.verify_integrity().is_err());
        assert!(matches!(
            store.load_latest(),
            Err(StoreError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn schema_mismatch_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world_data");
        WorldStore::open(&path).unwrap();

        let meta_path = path.join(META_FILE);
        let mut meta: WorldMeta =
            serde_json::from_reader(std::fs::File::open(&meta_path).unwrap()).unwrap();
        meta.schema_version = 999;
        serde_json::to_writer_pretty(std::fs::File::create(&meta_path).unwrap(), &meta).unwrap();

        match WorldStore::open(&path) {
            Err(StoreError::SchemaMismatch {
                file_version,
                expected_version,
            }) => {
                assert_eq!(file_version, 999);
                assert_eq!(expected_version, STORE_SCHEMA_VERSION);
            }
            Err(e) => panic!("expected SchemaMismatch, got: {e}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }
}
