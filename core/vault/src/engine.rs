//! The vault engine: initialization, unlock, save, and lock.
//!
//! One engine instance is bound to one drive path and serializes its own
//! operations. It is the single policy point: component errors are mapped
//! onto the public taxonomy here, quarantine decisions are made here, and
//! every audit entry is emitted here. Components below this layer neither
//! log nor interpret.
//!
//! Key schedule: the metadata file is sealed under
//! `Argon2id(pin, drive_salt)` with the built-in default parameters; the
//! secrets payload is sealed under an HKDF binding of that key, the
//! share-reconstructed master key, and the hardware fingerprint. Possession
//! of the drive, the PIN, a share quorum, and the bound host are therefore
//! all cryptographically required to reach the payload.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use ursafe_common::{Error, Result, SecretsMap};
use ursafe_crypto::{
    aead_decrypt, aead_encrypt, bind_vault_key, derive_key, generate_signing_keypair, sha256,
    sign, signing_key_from_seed, verify, verifying_key_from_bytes, KdfParams, MasterKey, Salt,
    SigningKey, KEY_LENGTH, SIGNATURE_LENGTH,
};
use ursafe_fingerprint::{compute, Fingerprint, FingerprintSource};
use ursafe_logchain::{ChainStatus, LogAction, LogChain, LogStats, GENESIS_HASH};
use ursafe_shares::{combine, split, Share, ShareKind, ShareStore};

use crate::config::VaultConfig;
use crate::drive::DriveLayout;
use crate::format::{
    decode_payload, encode_payload, manifest_input, VaultMetadata, FINGERPRINT_CHECK_LENGTH,
};
use crate::status::{ChunkStatus, EngineState, VaultStatus};

/// In-memory state of an unlocked vault. Every key field zeroizes on drop.
/// The payload key itself is not cached; saves re-bind it from the held
/// master key, PIN-derived key, and fingerprint.
struct Session {
    master_key: MasterKey,
    signing_key: SigningKey,
    meta_key: Zeroizing<[u8; KEY_LENGTH]>,
    kdf_key: Zeroizing<[u8; KEY_LENGTH]>,
    fingerprint: Fingerprint,
    metadata: VaultMetadata,
    map: SecretsMap,
}

/// Engine for one vault on one drive.
pub struct VaultEngine {
    drive: DriveLayout,
    config: VaultConfig,
    fingerprint: Box<dyn FingerprintSource>,
    state: EngineState,
    session: Option<Session>,
}

impl VaultEngine {
    /// Bind an engine to a drive path.
    ///
    /// # Preconditions
    /// - `drive_path` must be an existing directory (a mounted volume root)
    /// - the config's share policy must be internally consistent
    pub fn new(
        drive_path: impl Into<PathBuf>,
        config: VaultConfig,
        fingerprint: impl FingerprintSource + 'static,
    ) -> Result<Self> {
        let drive = DriveLayout::new(drive_path);
        if !drive.root().is_dir() {
            return Err(Error::DriveNotVault(drive.root().to_path_buf()));
        }
        config.share_policy.validate()?;

        let state = if drive.is_vault_drive() {
            EngineState::Initialized
        } else {
            EngineState::Absent
        };

        Ok(Self {
            drive,
            config,
            fingerprint: Box::new(fingerprint),
            state,
            session: None,
        })
    }

    /// The drive this engine is bound to.
    pub fn drive_path(&self) -> &Path {
        self.drive.root()
    }

    /// Create a new vault on the drive.
    ///
    /// Generates the master key and signing keypair, splits both into
    /// shares across the host and drive stores, writes the encrypted empty
    /// payload, metadata, and signed manifest, and appends the genesis
    /// `vault_created` entry. All key material is zeroized before returning.
    pub fn initialize(&mut self, pin: &str) -> Result<()> {
        if self.drive.is_vault_drive() {
            return Err(Error::AlreadyInitialized);
        }

        let policy = self.config.share_policy;
        fs::create_dir_all(self.drive.chunks_dir())?;
        self.drive.clean_stale_tmp()?;

        let master_key = MasterKey::generate();
        let (signing_key, public_key) = generate_signing_keypair();
        let fingerprint = compute(&self.fingerprint.attributes());
        if fingerprint.stability() < 0.5 {
            warn!(
                stability = fingerprint.stability(),
                "few hardware attributes available; host binding will be weak"
            );
        }
        let drive_salt = Salt::generate();

        // Two parallel share sets, equal split geometry.
        let master_shares = split(master_key.as_bytes(), policy.required, policy.total)?;
        let seed = Zeroizing::new(signing_key.to_bytes());
        let signing_shares = split(seed.as_ref(), policy.required, policy.total)?;

        let host_store = ShareStore::new(&self.config.host_chunk_dir);
        let drive_store = ShareStore::new(self.drive.chunks_dir());
        let host_count = policy.host as usize;

        write_shares(&host_store, ShareKind::MasterKey, &master_shares[..host_count])?;
        write_shares(&host_store, ShareKind::SigningKey, &signing_shares[..host_count])?;
        write_shares(&drive_store, ShareKind::MasterKey, &master_shares[host_count..])?;
        write_shares(&drive_store, ShareKind::SigningKey, &signing_shares[host_count..])?;

        let drive_share_indices: Vec<u8> = master_shares[host_count..]
            .iter()
            .map(|s| s.index())
            .collect();

        let meta_key = derive_key(
            pin.as_bytes(),
            drive_salt.as_bytes(),
            &KdfParams::default(),
        )?;
        let kdf_key = if self.config.kdf_params == KdfParams::default() {
            meta_key.clone()
        } else {
            derive_key(pin.as_bytes(), drive_salt.as_bytes(), &self.config.kdf_params)?
        };
        let vault_key = bind_vault_key(&kdf_key, &master_key, fingerprint.as_bytes())?;

        let map = SecretsMap::new();
        let payload = Zeroizing::new(
            serde_json::to_vec(&map).map_err(|e| Error::Serialization(e.to_string()))?,
        );
        let vault_bytes = encode_payload(&aead_encrypt(&payload, vault_key.as_ref())?);

        let metadata = VaultMetadata {
            drive_salt,
            kdf_params: self.config.kdf_params.clone(),
            fingerprint_check: fingerprint_check(&fingerprint),
            signing_public_key: public_key.to_bytes(),
            drive_share_indices,
            log_head: GENESIS_HASH.to_string(),
        };
        let metadata_bytes = metadata.seal(&meta_key)?;

        let signature = sign(
            &signing_key,
            &manifest_input(&vault_bytes, &metadata_bytes, GENESIS_HASH),
        );

        // The manifest lands last; the drive does not count as initialized
        // until it exists.
        write_file_sync(&self.drive.vault_file(), &vault_bytes)?;
        write_file_sync(&self.drive.metadata_file(), &metadata_bytes)?;
        write_file_sync(&self.drive.manifest_file(), &signature)?;

        self.logchain().append(LogAction::VaultCreated, &signing_key)?;

        self.state = EngineState::Initialized;
        info!(drive = %self.drive.root().display(), "vault initialized");
        Ok(())
    }

    /// Unlock the vault and return its secrets map.
    ///
    /// All four factors are checked in order: drive layout, PIN (metadata
    /// authentication), hardware fingerprint, and the share quorum; then the
    /// manifest and audit chain are verified before the payload is touched.
    /// The reconstructed keys stay in memory for the session.
    pub fn unlock(&mut self, pin: &str) -> Result<SecretsMap> {
        if self.state == EngineState::Quarantined {
            return Err(Error::Quarantined);
        }
        if !self.drive.is_vault_drive() {
            return Err(Error::DriveNotVault(self.drive.root().to_path_buf()));
        }
        self.drive.clean_stale_tmp()?;

        // PIN gate: the metadata tag authenticates under the PIN-derived
        // key alone. No audit entry for a failed PIN; signing material is
        // not available yet.
        let metadata_bytes = fs::read(self.drive.metadata_file())?;
        let (header_salt, sealed_metadata) = VaultMetadata::split_frame(&metadata_bytes)?;
        let meta_key = derive_key(
            pin.as_bytes(),
            header_salt.as_bytes(),
            &KdfParams::default(),
        )?;
        let sealed_plain =
            aead_decrypt(&sealed_metadata, meta_key.as_ref()).map_err(|_| Error::BadPin)?;
        let metadata: VaultMetadata = serde_json::from_slice(&sealed_plain)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let fingerprint = compute(&self.fingerprint.attributes());

        // Signing material is reconstructed eagerly so integrity and
        // fingerprint failures can still be logged.
        let signing_shares = self.load_shares(ShareKind::SigningKey)?;
        let signing_key = combine(&signing_shares, self.config.share_policy.required)
            .and_then(secret32)
            .map(|seed| signing_key_from_seed(&seed));

        // Hardware gate.
        if fingerprint_check(&fingerprint) != metadata.fingerprint_check {
            warn!(
                stability = fingerprint.stability(),
                "hardware fingerprint mismatch"
            );
            if let Ok(key) = &signing_key {
                let _ = self.logchain().append(LogAction::FingerprintMismatch, key);
            }
            return Err(Error::HardwareMismatch);
        }

        // Share quorum gate.
        let master_shares = self.load_shares(ShareKind::MasterKey)?;
        let master_secret = secret32(combine(
            &master_shares,
            self.config.share_policy.required,
        )?)?;
        let master_key = MasterKey::from_bytes(*master_secret);
        let signing_key = signing_key?;

        let public_key = verifying_key_from_bytes(&metadata.signing_public_key)?;
        if signing_key.verifying_key() != public_key {
            return Err(self.integrity_fault(
                Error::TamperDetected("reconstructed signing key does not match vault".to_string()),
                None,
            ));
        }

        // Manifest gate.
        let vault_bytes = fs::read(self.drive.vault_file())?;
        let manifest = fs::read(self.drive.manifest_file())?;
        let input = manifest_input(&vault_bytes, &metadata_bytes, &metadata.log_head);
        if manifest.len() != SIGNATURE_LENGTH || !verify(&public_key, &manifest, &input) {
            return Err(self.integrity_fault(
                Error::TamperDetected("manifest signature invalid".to_string()),
                Some(&signing_key),
            ));
        }

        // Audit chain gate.
        match self.logchain().verify(&public_key)? {
            ChainStatus::Valid => {}
            ChainStatus::BrokenAt { line, reason } => {
                return Err(self.integrity_fault(
                    Error::CorruptLog {
                        line,
                        reason: reason.to_string(),
                    },
                    Some(&signing_key),
                ));
            }
        }

        // The manifest binds a head that must exist somewhere in the
        // verified chain; entries after it are individually signed.
        if metadata.log_head != GENESIS_HASH {
            let entries = self.logchain().chain()?;
            if !entries.iter().any(|e| e.current_hash == metadata.log_head) {
                return Err(self.integrity_fault(
                    Error::TamperDetected("manifest log head absent from chain".to_string()),
                    Some(&signing_key),
                ));
            }
        }

        // Payload: every factor participates in the key.
        let kdf_key = if metadata.kdf_params == KdfParams::default() {
            meta_key.clone()
        } else {
            derive_key(pin.as_bytes(), header_salt.as_bytes(), &metadata.kdf_params)?
        };
        let vault_key = bind_vault_key(&kdf_key, &master_key, fingerprint.as_bytes())?;

        let sealed_vault = decode_payload(&vault_bytes)?;
        let payload = match aead_decrypt(&sealed_vault, vault_key.as_ref()) {
            Ok(payload) => payload,
            Err(_) => {
                return Err(self.integrity_fault(
                    Error::TamperDetected("vault payload authentication failed".to_string()),
                    Some(&signing_key),
                ));
            }
        };
        let map: SecretsMap = serde_json::from_slice(&payload)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        self.logchain().append(LogAction::VaultUnlocked, &signing_key)?;

        self.session = Some(Session {
            master_key,
            signing_key,
            meta_key,
            kdf_key,
            fingerprint,
            metadata,
            map: map.clone(),
        });
        self.state = EngineState::Unlocked;
        info!(drive = %self.drive.root().display(), records = map.len(), "vault unlocked");
        Ok(map)
    }

    /// Re-encrypt and atomically persist a new secrets map, then append the
    /// per-record diff to the audit log.
    pub fn save(&mut self, new_map: &SecretsMap) -> Result<()> {
        if self.state != EngineState::Unlocked {
            return Err(Error::InvalidInput(
                "vault must be unlocked to save".to_string(),
            ));
        }
        let session = self
            .session
            .as_ref()
            .expect("unlocked engine carries a session");

        let head = self.logchain().head_hash()?;
        let mut metadata = session.metadata.clone();
        metadata.log_head = head.clone();

        let vault_key = bind_vault_key(
            &session.kdf_key,
            &session.master_key,
            session.fingerprint.as_bytes(),
        )?;
        let payload = Zeroizing::new(
            serde_json::to_vec(new_map).map_err(|e| Error::Serialization(e.to_string()))?,
        );
        let vault_bytes = encode_payload(&aead_encrypt(&payload, vault_key.as_ref())?);
        let metadata_bytes = metadata.seal(&session.meta_key)?;
        let signature = sign(
            &session.signing_key,
            &manifest_input(&vault_bytes, &metadata_bytes, &head),
        );

        // Stage everything, then rename; the previous signed state stays
        // verifiable until the final rename commits the manifest.
        let vault_tmp = stage_file(&self.drive.vault_file(), &vault_bytes)?;
        let metadata_tmp = stage_file(&self.drive.metadata_file(), &metadata_bytes)?;
        let manifest_tmp = stage_file(&self.drive.manifest_file(), &signature)?;

        fs::rename(&vault_tmp, self.drive.vault_file())?;
        fs::rename(&metadata_tmp, self.drive.metadata_file())?;
        fs::rename(&manifest_tmp, self.drive.manifest_file())?;

        let (added, updated, removed) = self.append_diff(new_map)?;

        let session = self
            .session
            .as_mut()
            .expect("unlocked engine carries a session");
        session.map = new_map.clone();
        session.metadata = metadata;

        info!(added, updated, removed, "vault saved");
        Ok(())
    }

    /// Zeroize all session key material and append `vault_locked`.
    pub fn lock(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let result = self.logchain().append(LogAction::VaultLocked, &session.signing_key);
        drop(session);
        self.state = EngineState::Locked;
        debug!("vault locked");
        result.map(|_| ())
    }

    /// Current engine and drive status.
    pub fn vault_status(&self) -> VaultStatus {
        let fingerprint = compute(&self.fingerprint.attributes());
        VaultStatus {
            drive_path: self.drive.root().to_path_buf(),
            state: self.state,
            layout_present: self.drive.is_vault_drive(),
            fingerprint_stability: fingerprint.stability(),
        }
    }

    /// Presence of master-key shares in both stores.
    pub fn chunk_status(&self) -> Result<ChunkStatus> {
        let policy = self.config.share_policy;
        let host: Vec<u8> = ShareStore::new(&self.config.host_chunk_dir)
            .enumerate(ShareKind::MasterKey)?
            .into_keys()
            .collect();
        let drive: Vec<u8> = ShareStore::new(self.drive.chunks_dir())
            .enumerate(ShareKind::MasterKey)?
            .into_keys()
            .collect();

        let mut distinct: Vec<u8> = host.iter().chain(drive.iter()).copied().collect();
        distinct.sort_unstable();
        distinct.dedup();

        Ok(ChunkStatus {
            required: policy.required,
            total: policy.total,
            host_present: host,
            drive_present: drive,
            recoverable: distinct.len() >= policy.required as usize,
        })
    }

    /// Audit chain statistics.
    pub fn log_stats(&self) -> Result<LogStats> {
        self.logchain().stats()
    }

    fn logchain(&self) -> LogChain {
        LogChain::at_drive(self.drive.root())
    }

    /// Load and parse one kind of share from both stores. Files that fail
    /// to parse, or whose filename index disagrees with the embedded one,
    /// count as absent.
    fn load_shares(&self, kind: ShareKind) -> Result<Vec<Share>> {
        let mut merged = ShareStore::new(&self.config.host_chunk_dir).enumerate(kind)?;
        merged.extend(ShareStore::new(self.drive.chunks_dir()).enumerate(kind)?);

        let mut shares = Vec::with_capacity(merged.len());
        for (index, bytes) in merged {
            match Share::from_bytes(&bytes) {
                Ok(share) if share.index() == index => shares.push(share),
                _ => warn!(index, "skipping unreadable share file"),
            }
        }
        Ok(shares)
    }

    /// Append `secret_*` entries for every difference between the session
    /// map and `new_map`. Returns (added, updated, removed) counts.
    fn append_diff(&self, new_map: &SecretsMap) -> Result<(usize, usize, usize)> {
        let session = self
            .session
            .as_ref()
            .expect("unlocked engine carries a session");
        let chain = self.logchain();
        let (mut added, mut updated, mut removed) = (0, 0, 0);

        for (name, record) in new_map {
            match session.map.get(name) {
                None => {
                    chain.append(LogAction::SecretAdded, &session.signing_key)?;
                    added += 1;
                }
                Some(old) if old != record => {
                    chain.append(LogAction::SecretUpdated, &session.signing_key)?;
                    updated += 1;
                }
                Some(_) => {}
            }
        }
        for name in session.map.keys() {
            if !new_map.contains_key(name) {
                chain.append(LogAction::SecretRemoved, &session.signing_key)?;
                removed += 1;
            }
        }

        Ok((added, updated, removed))
    }

    /// Record an integrity fault: best-effort audit entry, drop any session,
    /// and quarantine the engine for the rest of this process.
    fn integrity_fault(&mut self, error: Error, signing_key: Option<&SigningKey>) -> Error {
        warn!(error = %error, "integrity fault; quarantining vault");
        if let Some(key) = signing_key {
            let _ = self.logchain().append(LogAction::IntegrityFailure, key);
        }
        self.session = None;
        self.state = EngineState::Quarantined;
        error
    }
}

impl Drop for VaultEngine {
    fn drop(&mut self) {
        // Key material must not outlive the engine; the log entry is
        // best-effort only on explicit lock().
        self.session = None;
    }
}

fn fingerprint_check(fingerprint: &Fingerprint) -> [u8; FINGERPRINT_CHECK_LENGTH] {
    let digest = sha256(fingerprint.as_bytes());
    let mut check = [0u8; FINGERPRINT_CHECK_LENGTH];
    check.copy_from_slice(&digest[..FINGERPRINT_CHECK_LENGTH]);
    check
}

fn secret32(bytes: Zeroizing<Vec<u8>>) -> Result<Zeroizing<[u8; 32]>> {
    if bytes.len() != 32 {
        return Err(Error::InconsistentShares);
    }
    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(&bytes);
    Ok(secret)
}

fn write_shares(store: &ShareStore, kind: ShareKind, shares: &[Share]) -> Result<()> {
    for share in shares {
        store.put(kind, share.index(), &share.to_bytes())?;
    }
    Ok(())
}

fn write_file_sync(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn stage_file(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidInput("path has no file name".to_string()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    write_file_sync(&tmp, bytes)?;
    Ok(tmp)
}
