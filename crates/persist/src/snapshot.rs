use serde::{Deserialize, Serialize};
use worldkit_common::WorldSnapshot;
use worldkit_kernel::{LoadReport, TemplateRegistry, World};

use crate::codec::{cbor_deserialize, cbor_serialize, sha256_hex, zstd_compress, zstd_decompress};
use crate::error::StoreError;

/// Format version written into every snapshot file.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A content-addressed snapshot of a world at a specific tick.
///
/// The hash is SHA-256 over the CBOR encoding of `(tick, objects)`, so any
/// change to either is detected by [`SnapshotFile::verify`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub version: u32,
    pub tick: u64,
    pub hash: String,
    pub objects: WorldSnapshot,
}

impl SnapshotFile {
    /// Capture every object the world currently owns.
    pub fn capture(world: &World) -> Result<Self, StoreError> {
        let tick = world.tick();
        let objects = world.save();
        let hash = content_hash(tick, &objects)?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            tick,
            hash,
            objects,
        })
    }

    /// Recompute the hash and compare.
    pub fn verify(&self) -> bool {
        content_hash(self.tick, &self.objects).is_ok_and(|hash| hash == self.hash)
    }

    /// Verify, then load every entry into `world` through `registry`.
    pub fn restore(
        &self,
        world: &mut World,
        registry: &TemplateRegistry,
    ) -> Result<LoadReport, StoreError> {
        self.check()?;
        Ok(world.load(&self.objects, registry)?)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        let snapshot: Self = serde_json::from_str(text)?;
        snapshot.check()?;
        Ok(snapshot)
    }

    /// CBOR, then zstd.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        zstd_compress(&cbor_serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, StoreError> {
        let snapshot: Self = cbor_deserialize(&zstd_decompress(data)?)?;
        snapshot.check()?;
        Ok(snapshot)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StoreError::SchemaMismatch {
                file_version: self.version,
                expected_version: SNAPSHOT_VERSION,
            });
        }
        let actual = content_hash(self.tick, &self.objects)?;
        if actual != self.hash {
            return Err(StoreError::IntegrityMismatch {
                expected: self.hash.clone(),
                actual,
            });
        }
        Ok(())
    }
}

fn content_hash(tick: u64, objects: &WorldSnapshot) -> Result<String, StoreError> {
    Ok(sha256_hex(&cbor_serialize(&(tick, objects))?))
}
