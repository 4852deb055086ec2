//! Encrypted user channel
//!
//! Messages on the user channel are NaCl secret boxes around a CRC-protected
//! plaintext:
//!
//! ```text
//! nonce:24 ‖ auth_id:4 LE ‖ len:2 LE ‖ box(auth_id ‖ id:2 ‖ payload ‖ crc:2)
//! ```
//!
//! `len` counts the sealed bytes, which include the 16-byte Poly1305 tag in
//! front of the ciphertext.

use bytes::{BufMut, Bytes, BytesMut};
use crypto_secretbox::aead::generic_array::GenericArray;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;

use super::{NonceSource, SharedKey};
use crate::command::{crc16, Command, CommandId, CRC_LEN, ID_LEN};
use crate::error::{ProtocolError, Result};

/// Size of the XSalsa20 nonce
pub const NONCE_LEN: usize = 24;

/// Size of the authorization id field
pub const AUTH_ID_LEN: usize = 4;

/// Size of the sealed-length field
pub const LENGTH_LEN: usize = 2;

/// Unencrypted prefix: nonce, authorization id and sealed length
pub const HEADER_LEN: usize = NONCE_LEN + AUTH_ID_LEN + LENGTH_LEN;

/// Poly1305 tag size
pub const TAG_LEN: usize = 16;

/// Smallest valid plaintext: authorization id, command id and CRC
const MIN_PLAINTEXT_LEN: usize = AUTH_ID_LEN + ID_LEN + CRC_LEN;

fn cipher(key: &SharedKey) -> XSalsa20Poly1305 {
    XSalsa20Poly1305::new(GenericArray::from_slice(key.as_bytes()))
}

/// Seal `command` for the device under `authorization_id`
pub fn encrypt_command(
    authorization_id: u32,
    key: &SharedKey,
    command: &Command,
    nonces: &mut dyn NonceSource,
) -> Result<Bytes> {
    let auth_id = authorization_id.to_le_bytes();
    let id = command.raw_id().to_le_bytes();
    let payload = command.payload();

    let mut plaintext = BytesMut::with_capacity(MIN_PLAINTEXT_LEN + payload.len());
    plaintext.put_slice(&auth_id);
    plaintext.put_slice(&id);
    plaintext.put_slice(payload);
    let crc = crc16(&[&plaintext[..]]);
    plaintext.put_u16_le(crc);

    let mut nonce = [0u8; NONCE_LEN];
    nonces.fill_nonce(&mut nonce);

    let sealed = cipher(key)
        .encrypt(GenericArray::from_slice(&nonce), &plaintext[..])
        .map_err(|_| ProtocolError::EncryptionFailed)?;
    let sealed_len = u16::try_from(sealed.len()).map_err(|_| ProtocolError::MessageTooLarge {
        size: sealed.len(),
        max: u16::MAX as usize,
    })?;

    let mut out = BytesMut::with_capacity(HEADER_LEN + sealed.len());
    out.put_slice(&nonce);
    out.put_slice(&auth_id);
    out.put_u16_le(sealed_len);
    out.put_slice(&sealed);
    Ok(out.freeze())
}

/// Open a message from the device
///
/// Returns the authorization id found inside the box together with the
/// inner command. The plaintext CRC must match and the sealed id must equal
/// the one in the header.
pub fn decrypt_command(data: &[u8], key: &SharedKey) -> Result<(u32, Command)> {
    if data.len() < HEADER_LEN {
        return Err(ProtocolError::TooShort {
            need: HEADER_LEN,
            got: data.len(),
        });
    }

    let sealed_len = u16::from_le_bytes([data[28], data[29]]) as usize;
    let end = HEADER_LEN + sealed_len;
    if data.len() < end {
        return Err(ProtocolError::TooShort {
            need: end,
            got: data.len(),
        });
    }

    let nonce = &data[..NONCE_LEN];
    let plaintext = cipher(key)
        .decrypt(GenericArray::from_slice(nonce), &data[HEADER_LEN..end])
        .map_err(|_| ProtocolError::DecryptionFailed)?;

    if plaintext.len() < MIN_PLAINTEXT_LEN {
        return Err(ProtocolError::TooShort {
            need: MIN_PLAINTEXT_LEN,
            got: plaintext.len(),
        });
    }

    let crc_at = plaintext.len() - CRC_LEN;
    let expected = crc16(&[&plaintext[..crc_at]]);
    let got = u16::from_le_bytes([plaintext[crc_at], plaintext[crc_at + 1]]);
    if expected != got {
        return Err(ProtocolError::BadCrc { expected, got });
    }

    let inner_auth_id =
        u32::from_le_bytes([plaintext[0], plaintext[1], plaintext[2], plaintext[3]]);
    let outer_auth_id = u32::from_le_bytes([data[24], data[25], data[26], data[27]]);
    if inner_auth_id != outer_auth_id {
        tracing::warn!(
            header = outer_auth_id,
            inner = inner_auth_id,
            "Authorization id differs between header and plaintext"
        );
        return Err(ProtocolError::AuthorizationIdMismatch {
            header: outer_auth_id,
            inner: inner_auth_id,
        });
    }

    let id = u16::from_le_bytes([plaintext[4], plaintext[5]]);
    let command = Command::new(CommandId::from(id), &plaintext[AUTH_ID_LEN + ID_LEN..crc_at]);
    Ok((inner_auth_id, command))
}
