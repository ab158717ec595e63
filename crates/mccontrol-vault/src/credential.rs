use crate::error::{VaultError, VaultResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

pub const API_KEY_FILE: &str = "API-KEY.txt";
pub const PRIVATE_KEY_FILE: &str = "private-key.pem";
pub const PUBLIC_KEY_FILE: &str = "public-key.txt";

pub const KEY_ALGORITHM: &str = "RSA";
pub const RSA_KEY_BITS: usize = 2048;

/// Where a piece of credential material came from on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Read back from the data directory.
    Loaded,
    /// Freshly generated and persisted.
    Generated,
    /// Generated but could not be persisted; valid for this process only.
    Ephemeral,
}

/// Public half of the key exchange, served unauthenticated.
#[derive(Debug, Clone)]
pub struct HandshakeOffer {
    /// Base64 of the SubjectPublicKeyInfo DER encoding.
    pub public_key: String,
    pub algorithm: &'static str,
    pub key_size: usize,
}

/// Long-lived shared secret and asymmetric key pair.
///
/// Both are created on first run and persisted under the data directory.
/// After `open` returns, the material is immutable for the process lifetime.
pub struct CredentialStore {
    api_key: Zeroizing<String>,
    api_key_origin: KeyOrigin,
    private_key: RsaPrivateKey,
    public_key_der: Vec<u8>,
    key_pair_origin: KeyOrigin,
}

impl CredentialStore {
    /// Load credentials from `data_dir`, creating whatever is missing.
    ///
    /// An unreadable or unwritable API key file never fails startup: the
    /// store falls back to a token held only in memory for this run.
    pub fn open(data_dir: &Path) -> VaultResult<Self> {
        if let Err(e) = fs::create_dir_all(data_dir) {
            warn!(dir = %data_dir.display(), error = %e, "could not create credential directory");
        }

        let (api_key, api_key_origin) = load_or_create_api_key(data_dir);
        let (private_key, key_pair_origin) = load_or_create_key_pair(data_dir)?;

        Self::assemble(api_key, api_key_origin, private_key, key_pair_origin)
    }

    /// Build an in-memory store from existing material. Nothing touches disk.
    pub fn from_parts(api_key: impl Into<String>, private_key: RsaPrivateKey) -> VaultResult<Self> {
        Self::assemble(
            Zeroizing::new(api_key.into()),
            KeyOrigin::Ephemeral,
            private_key,
            KeyOrigin::Ephemeral,
        )
    }

    fn assemble(
        api_key: Zeroizing<String>,
        api_key_origin: KeyOrigin,
        private_key: RsaPrivateKey,
        key_pair_origin: KeyOrigin,
    ) -> VaultResult<Self> {
        let public_key_der = encode_public_key(&private_key)?;
        Ok(Self {
            api_key,
            api_key_origin,
            private_key,
            public_key_der,
            key_pair_origin,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_key_origin(&self) -> KeyOrigin {
        self.api_key_origin
    }

    pub fn key_pair_origin(&self) -> KeyOrigin {
        self.key_pair_origin
    }

    /// Constant-time comparison against the stored token.
    pub fn api_key_matches(&self, candidate: &[u8]) -> bool {
        self.api_key.as_bytes().ct_eq(candidate).into()
    }

    /// Short SHA-256 fingerprint of the API key, safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.api_key.as_bytes());
        hex::encode(&digest[..8])
    }

    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey::from(&self.private_key)
    }

    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(&self.public_key_der)
    }

    pub fn handshake_offer(&self) -> HandshakeOffer {
        HandshakeOffer {
            public_key: self.public_key_base64(),
            algorithm: KEY_ALGORITHM,
            key_size: RSA_KEY_BITS,
        }
    }

    /// Decrypt a PKCS#1 v1.5 ciphertext produced with our public key.
    pub fn decrypt(&self, ciphertext: &[u8]) -> VaultResult<Zeroizing<Vec<u8>>> {
        self.private_key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map(Zeroizing::new)
            .map_err(|e| VaultError::Decryption(e.to_string()))
    }
}

/// A fresh token: two random v4 UUIDs joined by a dash.
pub fn generate_api_key() -> String {
    format!("{}-{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4())
}

pub fn generate_key_pair() -> VaultResult<RsaPrivateKey> {
    RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
        .map_err(|e| VaultError::Key(format!("key generation failed: {}", e)))
}

fn encode_public_key(private_key: &RsaPrivateKey) -> VaultResult<Vec<u8>> {
    let document = RsaPublicKey::from(private_key)
        .to_public_key_der()
        .map_err(|e| VaultError::Key(format!("public key encoding failed: {}", e)))?;
    Ok(document.as_bytes().to_vec())
}

fn load_or_create_api_key(data_dir: &Path) -> (Zeroizing<String>, KeyOrigin) {
    let path = data_dir.join(API_KEY_FILE);

    if path.exists() {
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let key = contents.trim();
                if !key.is_empty() {
                    info!("loaded existing API key");
                    return (Zeroizing::new(key.to_string()), KeyOrigin::Loaded);
                }
                warn!("API key file is empty; generating a new key");
            }
            Err(e) => {
                error!(error = %e, "failed to read API key file; using a temporary key for this run");
                return (Zeroizing::new(generate_api_key()), KeyOrigin::Ephemeral);
            }
        }
    }

    let key = Zeroizing::new(generate_api_key());
    match write_owner_only(&path, key.as_bytes()) {
        Ok(()) => {
            warn!("===========================================");
            warn!("NEW API KEY GENERATED");
            warn!(file = %path.display(), "copy the key from this file into the backend configuration");
            warn!("===========================================");
            (key, KeyOrigin::Generated)
        }
        Err(e) => {
            error!(error = %e, "failed to save API key; using a temporary key for this run");
            (key, KeyOrigin::Ephemeral)
        }
    }
}

fn load_or_create_key_pair(data_dir: &Path) -> VaultResult<(RsaPrivateKey, KeyOrigin)> {
    let pem_path = data_dir.join(PRIVATE_KEY_FILE);

    if pem_path.exists() {
        let loaded = fs::read_to_string(&pem_path)
            .map_err(VaultError::Io)
            .and_then(|pem| {
                RsaPrivateKey::from_pkcs8_pem(&pem)
                    .map_err(|e| VaultError::Key(format!("invalid private key: {}", e)))
            });
        match loaded {
            Ok(key) => {
                if let Err(e) = write_public_key(data_dir, &key) {
                    warn!(error = %e, "failed to refresh public key file");
                }
                info!("loaded existing RSA key pair");
                return Ok((key, KeyOrigin::Loaded));
            }
            Err(e) => {
                warn!(error = %e, "stored private key is unusable; generating a new key pair");
            }
        }
    }

    let key = generate_key_pair()?;
    let origin = match persist_key_pair(data_dir, &key) {
        Ok(()) => {
            info!("generated RSA key pair for the key exchange");
            KeyOrigin::Generated
        }
        Err(e) => {
            error!(error = %e, "failed to save key pair; it is valid for this run only");
            KeyOrigin::Ephemeral
        }
    };
    Ok((key, origin))
}

fn persist_key_pair(data_dir: &Path, key: &RsaPrivateKey) -> VaultResult<()> {
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| VaultError::Key(format!("private key encoding failed: {}", e)))?;
    write_owner_only(&data_dir.join(PRIVATE_KEY_FILE), pem.as_bytes())?;
    write_public_key(data_dir, key)
}

fn write_public_key(data_dir: &Path, key: &RsaPrivateKey) -> VaultResult<()> {
    let encoded = STANDARD.encode(encode_public_key(key)?);
    let path = data_dir.join(PUBLIC_KEY_FILE);
    if fs::read_to_string(&path).map(|s| s.trim() == encoded).unwrap_or(false) {
        return Ok(());
    }
    fs::write(path, encoded)?;
    Ok(())
}

/// Write a file readable and writable by its owner only.
fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        // mode() only applies at creation; tighten files that already existed
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(contents)?;
        file.sync_all()
    }
    #[cfg(not(unix))]
    {
        fs::write(path, contents)
    }
}
