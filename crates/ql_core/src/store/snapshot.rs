//! Whole-league binary snapshots.
//!
//! MessagePack + LZ4 with a version field and SHA-256 integrity check, so a
//! restart (or a copy to another machine) restores the clock and league state
//! exactly as last persisted.

use std::fs::{rename, File};
use std::io::{Read, Write};
use std::path::Path;

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use rmp_serde::{from_slice, to_vec_named};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::clock::ClockState;
use crate::models::{
    Bet, LedgerEntry, Match, MatchEvent, Prediction, Season, SeasonArchive, Team, UserAccount,
};

pub const SNAPSHOT_VERSION: u32 = 1;

const MAGIC: &[u8; 6] = b"QLSNAP";
const CHECKSUM_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("not a snapshot file")]
    BadMagic,

    #[error("snapshot version {found} is newer than supported {supported}")]
    VersionMismatch { found: u32, supported: u32 },

    #[error("checksum mismatch, snapshot is corrupted")]
    ChecksumMismatch,

    #[error("decompression error")]
    Decompression,
}

/// Serializable image of every table the store owns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeagueSnapshot {
    pub clock: Option<ClockState>,
    pub teams: Vec<Team>,
    pub seasons: Vec<Season>,
    pub matches: Vec<Match>,
    pub events: Vec<MatchEvent>,
    pub bets: Vec<Bet>,
    pub predictions: Vec<Prediction>,
    pub users: Vec<UserAccount>,
    pub ledger: Vec<LedgerEntry>,
    pub archives: Vec<SeasonArchive>,
}

fn sha256(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Encode: magic | version (le) | sha256(compressed) | compressed payload.
pub fn encode_snapshot(snapshot: &LeagueSnapshot) -> Result<Vec<u8>, SnapshotError> {
    let payload = to_vec_named(snapshot)?;
    let compressed = compress_prepend_size(&payload);
    let checksum = sha256(&compressed);

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + CHECKSUM_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    out.extend_from_slice(&checksum);
    out.extend_from_slice(&compressed);
    Ok(out)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<LeagueSnapshot, SnapshotError> {
    let header_len = MAGIC.len() + 4 + CHECKSUM_LEN;
    if bytes.len() < header_len || &bytes[..MAGIC.len()] != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(&bytes[MAGIC.len()..MAGIC.len() + 4]);
    let version = u32::from_le_bytes(version_bytes);
    if version > SNAPSHOT_VERSION {
        return Err(SnapshotError::VersionMismatch { found: version, supported: SNAPSHOT_VERSION });
    }

    let checksum = &bytes[MAGIC.len() + 4..header_len];
    let compressed = &bytes[header_len..];
    if sha256(compressed) != checksum[..] {
        return Err(SnapshotError::ChecksumMismatch);
    }

    let payload =
        decompress_size_prepended(compressed).map_err(|_| SnapshotError::Decompression)?;
    Ok(from_slice(&payload)?)
}

/// Write atomically: temp file in the same directory, then rename over.
pub fn save_snapshot(path: &Path, snapshot: &LeagueSnapshot) -> Result<(), SnapshotError> {
    let bytes = encode_snapshot(snapshot)?;
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    rename(&tmp_path, path)?;
    log::debug!("snapshot saved: {} bytes to {:?}", bytes.len(), path);
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<LeagueSnapshot, SnapshotError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    let snapshot = decode_snapshot(&bytes)?;
    log::debug!("snapshot loaded: {} bytes from {:?}", bytes.len(), path);
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::default_epoch;

    fn sample() -> LeagueSnapshot {
        LeagueSnapshot {
            clock: Some(ClockState::starting_at(default_epoch())),
            teams: vec![Team::new("Puddlemere United", 75, 80, 70)],
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let snapshot = sample();
        let bytes = encode_snapshot(&snapshot).unwrap();
        let decoded = decode_snapshot(&bytes).unwrap();
        assert_eq!(decoded.teams.len(), 1);
        assert_eq!(decoded.teams[0].name, "Puddlemere United");
        assert_eq!(decoded.clock.unwrap().current_date, default_epoch());
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = encode_snapshot(&sample()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(decode_snapshot(&bytes), Err(SnapshotError::ChecksumMismatch)));
    }

    #[test]
    fn test_bad_magic_rejected() {
        assert!(matches!(decode_snapshot(b"not a snapshot"), Err(SnapshotError::BadMagic)));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut bytes = encode_snapshot(&sample()).unwrap();
        bytes[6..10].copy_from_slice(&(SNAPSHOT_VERSION + 1).to_le_bytes());
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(SnapshotError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("league.qls");
        save_snapshot(&path, &sample()).unwrap();
        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.teams[0].name, "Puddlemere United");
    }
}
