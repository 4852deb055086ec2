//! Key material and randomness for pairing and the encrypted channel
//!
//! A client owns one X25519 [`KeyPair`]. Combined with the device public key
//! it yields a [`SharedKey`], which is NaCl's `box_beforenm` output:
//! `HSalsa20(X25519(secret, device_public), 0¹⁶)`. The same 32 bytes serve as
//! the HMAC-SHA256 key during pairing and as the XSalsa20-Poly1305 key on
//! the user channel.
//!
//! Randomness is injected through [`NonceSource`] so that tests can replay
//! fixed nonces without touching global state.

pub mod channel;
pub mod pairing;

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use salsa20::cipher::consts::U10;
use salsa20::cipher::generic_array::GenericArray;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{ProtocolError, Result};

/// Size of X25519 keys
pub const KEY_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Client key pair used for pairing and the encrypted channel
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS CSPRNG
    pub fn generate() -> Self {
        Self::from_static(StaticSecret::random_from_rng(OsRng))
    }

    /// Restore a key pair from its secret half
    pub fn from_secret(secret: [u8; KEY_LEN]) -> Self {
        Self::from_static(StaticSecret::from(secret))
    }

    /// Restore a key pair from a secret slice, checking its length
    pub fn from_secret_slice(secret: &[u8]) -> Result<Self> {
        let secret: [u8; KEY_LEN] =
            secret
                .try_into()
                .map_err(|_| ProtocolError::InvalidKeyLength {
                    expected: KEY_LEN,
                    got: secret.len(),
                })?;
        Ok(Self::from_secret(secret))
    }

    fn from_static(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Public half
    pub fn public_key(&self) -> [u8; KEY_LEN] {
        self.public.to_bytes()
    }

    /// Secret half, for persisting credentials
    pub fn secret_key(&self) -> [u8; KEY_LEN] {
        self.secret.to_bytes()
    }

    /// Derive the key shared with the device owning `device_public`
    pub fn shared_key(&self, device_public: &[u8; KEY_LEN]) -> SharedKey {
        SharedKey::precompute(device_public, self)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Precomputed key shared between client and device
#[derive(Clone, PartialEq, Eq)]
pub struct SharedKey([u8; KEY_LEN]);

impl SharedKey {
    /// `HSalsa20(X25519(client_secret, device_public), 0)`
    pub fn precompute(device_public: &[u8; KEY_LEN], key_pair: &KeyPair) -> Self {
        let dh = key_pair
            .secret
            .diffie_hellman(&PublicKey::from(*device_public));
        let key = salsa20::hsalsa::<U10>(
            GenericArray::from_slice(dh.as_bytes()),
            &GenericArray::default(),
        );
        let mut out = [0u8; KEY_LEN];
        out.copy_from_slice(&key);
        Self(out)
    }

    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn mac(&self, parts: &[&[u8]]) -> Result<HmacSha256> {
        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.0).map_err(|_| {
                ProtocolError::InvalidKeyLength {
                    expected: KEY_LEN,
                    got: self.0.len(),
                }
            })?;
        for part in parts {
            mac.update(part);
        }
        Ok(mac)
    }

    /// HMAC-SHA256 over the concatenation of `parts`
    pub fn authenticate(&self, parts: &[&[u8]]) -> Result<[u8; 32]> {
        let tag = self.mac(parts)?.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    /// Constant-time check of `tag` against HMAC-SHA256 over `parts`
    pub fn verify(&self, parts: &[&[u8]], tag: &[u8]) -> Result<()> {
        self.mac(parts)?
            .verify_slice(tag)
            .map_err(|_| ProtocolError::AuthenticatorMismatch)
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey([REDACTED])")
    }
}

/// Source of nonces for locally generated randomness
pub trait NonceSource: Send {
    /// Fill `dest` with fresh nonce bytes
    fn fill_nonce(&mut self, dest: &mut [u8]);
}

/// Nonces from the operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsNonceSource;

impl NonceSource for OsNonceSource {
    fn fill_nonce(&mut self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Replays a fixed byte sequence, wrapping around when exhausted
///
/// Only meant for deterministic tests and test vectors.
#[derive(Debug, Clone)]
pub struct StaticNonceSource {
    bytes: Vec<u8>,
    pos: usize,
}

impl StaticNonceSource {
    /// Replay `bytes`
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            pos: 0,
        }
    }
}

impl NonceSource for StaticNonceSource {
    fn fill_nonce(&mut self, dest: &mut [u8]) {
        if self.bytes.is_empty() {
            dest.fill(0);
            return;
        }
        for b in dest.iter_mut() {
            *b = self.bytes[self.pos];
            self.pos = (self.pos + 1) % self.bytes.len();
        }
    }
}

/// Everything needed to resume an authenticated session
///
/// Produced by pairing; persisting it is up to the caller. Keys serialize as
/// hex strings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Id assigned by the device
    pub authorization_id: u32,
    /// Client secret key
    #[serde(with = "hex_key")]
    pub client_secret_key: [u8; KEY_LEN],
    /// Device public key
    #[serde(with = "hex_key")]
    pub device_public_key: [u8; KEY_LEN],
}

impl Credentials {
    /// Bundle credentials from a key pair
    pub fn new(authorization_id: u32, key_pair: &KeyPair, device_public_key: [u8; KEY_LEN]) -> Self {
        Self {
            authorization_id,
            client_secret_key: key_pair.secret_key(),
            device_public_key,
        }
    }

    /// Client key pair
    pub fn key_pair(&self) -> KeyPair {
        KeyPair::from_secret(self.client_secret_key)
    }

    /// Client public key
    pub fn client_public_key(&self) -> [u8; KEY_LEN] {
        self.key_pair().public_key()
    }

    /// Shared key for the user channel
    pub fn shared_key(&self) -> SharedKey {
        self.key_pair().shared_key(&self.device_public_key)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("authorization_id", &self.authorization_id)
            .field("client_secret_key", &"[REDACTED]")
            .field("device_public_key", &hex::encode(self.device_public_key))
            .finish()
    }
}

// Serde helpers for 32-byte keys as hex strings
mod hex_key {
    use super::KEY_LEN;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(key: &[u8; KEY_LEN], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(key))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; KEY_LEN], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut key = [0u8; KEY_LEN];
        hex::decode_to_slice(&s, &mut key).map_err(serde::de::Error::custom)?;
        Ok(key)
    }
}
