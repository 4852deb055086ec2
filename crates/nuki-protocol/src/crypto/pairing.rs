//! Pairing handshake payloads
//!
//! Each builder derives the shared key from the device public key and the
//! client key pair, then authenticates its fields with HMAC-SHA256:
//!
//! | command | authenticated data | payload |
//! |---------|--------------------|---------|
//! | AuthorizationAuthenticator | `client_pub ‖ device_pub ‖ nonce` | `hmac` |
//! | AuthorizationData | `id_type ‖ id ‖ name ‖ local_nonce ‖ nonce` | `hmac ‖ id_type ‖ id ‖ name ‖ local_nonce` |
//! | AuthorizationIdConfirmation | `auth_id ‖ nonce` | `hmac ‖ auth_id` |
//!
//! The device answers AuthorizationData with an AuthorizationId command whose
//! own authenticator covers `auth_id ‖ uuid ‖ device_nonce ‖ local_nonce`;
//! [`verify_authorization_id`] checks it.

use bytes::{BufMut, BytesMut};

use super::{KeyPair, NonceSource, SharedKey, KEY_LEN};
use crate::command::{put_padded_str, AuthorizationIdCommand, Command, CommandId};
use crate::error::Result;
use crate::types::ClientIdType;

/// Width of the client name field
pub const NAME_LEN: usize = 32;

/// Size of the locally generated pairing nonce
pub const LOCAL_NONCE_LEN: usize = 32;

/// AuthorizationAuthenticator: HMAC over both public keys and the challenge
pub fn authorization_authenticator(
    device_nonce: &[u8],
    device_public: &[u8; KEY_LEN],
    key_pair: &KeyPair,
) -> Result<Command> {
    let shared = key_pair.shared_key(device_public);
    let client_public = key_pair.public_key();
    let tag = shared.authenticate(&[&client_public, device_public, device_nonce])?;
    Ok(Command::new(CommandId::AuthorizationAuthenticator, &tag))
}

/// AuthorizationData together with the local nonce it embeds
#[derive(Debug, Clone)]
pub struct AuthorizationData {
    /// Command to send
    pub command: Command,
    /// Nonce drawn for this command; needed to verify the device's reply
    pub local_nonce: [u8; LOCAL_NONCE_LEN],
}

/// AuthorizationData: identify this client to the device
pub fn authorization_data(
    device_nonce: &[u8],
    device_public: &[u8; KEY_LEN],
    key_pair: &KeyPair,
    client_id: u32,
    id_type: ClientIdType,
    name: &str,
    nonces: &mut dyn NonceSource,
) -> Result<AuthorizationData> {
    let mut local_nonce = [0u8; LOCAL_NONCE_LEN];
    nonces.fill_nonce(&mut local_nonce);

    let mut fields = BytesMut::with_capacity(1 + 4 + NAME_LEN + LOCAL_NONCE_LEN);
    fields.put_u8(id_type.into());
    fields.put_u32_le(client_id);
    put_padded_str(&mut fields, name, NAME_LEN);
    fields.put_slice(&local_nonce);

    let shared = key_pair.shared_key(device_public);
    let tag = shared.authenticate(&[&fields[..], device_nonce])?;

    let mut payload = BytesMut::with_capacity(tag.len() + fields.len());
    payload.put_slice(&tag);
    payload.put_slice(&fields);

    Ok(AuthorizationData {
        command: Command::new(CommandId::AuthorizationData, &payload),
        local_nonce,
    })
}

/// AuthorizationIdConfirmation: acknowledge the assigned id
pub fn authorization_id_confirmation(
    device_nonce: &[u8],
    device_public: &[u8; KEY_LEN],
    key_pair: &KeyPair,
    authorization_id: u32,
) -> Result<Command> {
    let id = authorization_id.to_le_bytes();
    let shared = key_pair.shared_key(device_public);
    let tag = shared.authenticate(&[&id, device_nonce])?;

    let mut payload = BytesMut::with_capacity(tag.len() + id.len());
    payload.put_slice(&tag);
    payload.put_slice(&id);
    Ok(Command::new(CommandId::AuthorizationIdConfirmation, &payload))
}

/// Check the authenticator the device attached to its AuthorizationId reply
pub fn verify_authorization_id(
    response: &AuthorizationIdCommand<'_>,
    shared: &SharedKey,
    local_nonce: &[u8],
) -> Result<()> {
    let id = response.authorization_id().to_le_bytes();
    shared.verify(
        &[&id, response.uuid(), response.nonce(), local_nonce],
        response.authenticator(),
    )
}
