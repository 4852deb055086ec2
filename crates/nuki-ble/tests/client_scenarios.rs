//! End-to-end client scenarios against a scripted device
//!
//! These tests drive a [`Client`] over the in-memory transport:
//! - Pairing handshake including authenticator verification
//! - Two-phase accepted/complete actions and their failure modes
//! - Lock action confirmation through reported lock states
//! - Log retrieval, state and config reads, maintenance commands
//! - Timeouts, cancellation and device error reports

use chrono::{TimeZone, Utc};
use nuki_ble::protocol::{
    decrypt_command, requests, ClientIdType, Command, CommandId, CompletionStatus, Config,
    Credentials, DeviceError, DeviceType, KeyPair, LockAction, LockState, LogEntryCountCommand,
    LogSortOrder, Pin, ProtocolError, SharedKey, StaticNonceSource, States,
};
use nuki_ble::{
    Client, ClientConfig, ClientConfigBuilder, ClientState, MockTransport, NukiError,
    ScriptedDevice, OPENER_PROFILE, SMARTLOCK_PROFILE,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fixtures
// ============================================================================

const AUTH_ID: u32 = 0x0000_0102;
const CLIENT_SECRET: [u8; 32] = [0x44; 32];
const DEVICE_SECRET: [u8; 32] = [0x33; 32];
const LOCAL_NONCE: [u8; 32] = [0x5A; 32];
const DEVICE_UUID: [u8; 16] = [0xD0; 16];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("nuki_ble=trace")
        .try_init();
}

fn config() -> ClientConfig {
    ClientConfigBuilder::new()
        .response_timeout(Duration::from_secs(2))
        .label("test")
        .app_id(7)
        .build()
}

fn client_keys() -> KeyPair {
    KeyPair::from_secret(CLIENT_SECRET)
}

fn device_keys() -> KeyPair {
    KeyPair::from_secret(DEVICE_SECRET)
}

fn credentials() -> Credentials {
    Credentials::new(AUTH_ID, &client_keys(), device_keys().public_key())
}

fn device_shared_key() -> SharedKey {
    device_keys().shared_key(&client_keys().public_key())
}

fn pin() -> Pin {
    "1234".parse().unwrap()
}

fn challenge() -> Command {
    Command::new(CommandId::Challenge, &[0xC1; 32])
}

fn status(status: CompletionStatus) -> Command {
    Command::new(CommandId::Status, &[status.into()])
}

fn states(lock_state: LockState) -> Command {
    let mut p = vec![0x02, lock_state.into(), 0x01];
    p.extend_from_slice(&2024u16.to_le_bytes());
    p.extend_from_slice(&[3, 14, 9, 26, 53]);
    p.extend_from_slice(&60i16.to_le_bytes());
    p.extend_from_slice(&[0x00, 1, 0, 0x01, 0x00, 0x00, 0x02]);
    Command::new(CommandId::KeyturnerStates, &p)
}

fn log_entry(index: u32) -> Command {
    let mut p = Vec::new();
    p.extend_from_slice(&index.to_le_bytes());
    p.extend_from_slice(&2024u16.to_le_bytes());
    p.extend_from_slice(&[3, 14, 9, 26, 53]);
    p.extend_from_slice(&AUTH_ID.to_le_bytes());
    let mut name = b"tester".to_vec();
    name.resize(32, 0);
    p.extend_from_slice(&name);
    p.push(0x02);
    p.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
    Command::new(CommandId::LogEntry, &p)
}

fn error_report(code: u8, id: CommandId) -> Command {
    let mut p = vec![code];
    p.extend_from_slice(&id.value().to_le_bytes());
    Command::new(CommandId::ErrorReport, &p)
}

/// Device answering each message with one set of sealed replies
fn sealed_device(sets: &[&[Command]]) -> ScriptedDevice {
    let key = device_shared_key();
    sets.iter().fold(ScriptedDevice::new(), |device, set| {
        device.reply_encrypted(AUTH_ID, &key, set).unwrap()
    })
}

/// Client with credentials installed, connected to `device`
async fn authenticated(
    device_type: DeviceType,
    device: ScriptedDevice,
) -> (Client<MockTransport>, MockTransport) {
    init_tracing();
    let mock = MockTransport::new(device_type).with_device(device);
    let mut client = Client::new(config()).unwrap();
    client.authenticate(credentials()).await.unwrap();
    client.connect(Arc::new(mock.clone())).await.unwrap();
    assert_eq!(client.state(), ClientState::Authenticated);
    (client, mock)
}

/// Decrypt every message the client sent on the SmartLock user channel
fn sent_user_commands(mock: &MockTransport) -> Vec<Command> {
    let key = device_shared_key();
    mock.messages(SMARTLOCK_PROFILE.user)
        .iter()
        .map(|m| {
            let (auth_id, cmd) = decrypt_command(m, &key).unwrap();
            assert_eq!(auth_id, AUTH_ID);
            cmd
        })
        .collect()
}

// ============================================================================
// Pairing
// ============================================================================

/// Replies of a device going through pairing; `authenticator` overrides the
/// correct AuthorizationId authenticator
fn pairing_device(authenticator: Option<[u8; 32]>, last: CompletionStatus) -> ScriptedDevice {
    let device = device_keys();
    let id = AUTH_ID.to_le_bytes();
    let nonce = [0xA3; 32];
    let authenticator = authenticator.unwrap_or_else(|| {
        device_shared_key()
            .authenticate(&[&id, &DEVICE_UUID, &nonce, &LOCAL_NONCE])
            .unwrap()
    });

    let mut assigned = Vec::new();
    assigned.extend_from_slice(&authenticator);
    assigned.extend_from_slice(&id);
    assigned.extend_from_slice(&DEVICE_UUID);
    assigned.extend_from_slice(&nonce);

    ScriptedDevice::new()
        .reply_plain(&[Command::new(CommandId::PublicKey, &device.public_key())])
        .reply_plain(&[Command::new(CommandId::Challenge, &[0xA1; 32])])
        .reply_plain(&[Command::new(CommandId::Challenge, &[0xA2; 32])])
        .reply_plain(&[Command::new(CommandId::AuthorizationId, &assigned)])
        .reply_plain(&[status(last)])
}

async fn pairing_client(
    config: ClientConfig,
    device: ScriptedDevice,
) -> (Client<MockTransport>, MockTransport) {
    init_tracing();
    let mock = MockTransport::new(DeviceType::SmartLock).with_device(device);
    let mut client = Client::new(config)
        .unwrap()
        .with_nonce_source(StaticNonceSource::new(LOCAL_NONCE.to_vec()));
    client.connect(Arc::new(mock.clone())).await.unwrap();
    (client, mock)
}

#[tokio::test]
async fn test_pairing_handshake() {
    let device = pairing_device(None, CompletionStatus::Complete);
    let (mut client, mock) = pairing_client(config(), device).await;
    let cancel = CancellationToken::new();

    let creds = client
        .pair(&client_keys(), 42, ClientIdType::Bridge, "Integration", &cancel)
        .await
        .unwrap();

    assert_eq!(creds, credentials());
    assert_eq!(client.state(), ClientState::Authenticated);
    assert_eq!(client.authentication_id(), Some(AUTH_ID));
    assert_eq!(client.device_public_key(), Some(device_keys().public_key()));

    let sent = mock.messages(SMARTLOCK_PROFILE.general);
    assert_eq!(sent.len(), 5);
    assert_eq!(sent[0], requests::request_data(CommandId::PublicKey).to_bytes());
    assert_eq!(sent[1], requests::public_key(&client_keys().public_key()).to_bytes());

    let confirmation = Command::decode(sent[4].clone()).unwrap();
    assert_eq!(confirmation.id(), CommandId::AuthorizationIdConfirmation);
    assert_eq!(&confirmation.payload()[32..], &AUTH_ID.to_le_bytes());
}

#[tokio::test]
async fn test_pairing_confirmation_is_terminated() {
    let device = pairing_device(None, CompletionStatus::Complete);
    let (mut client, mock) = pairing_client(config(), device).await;
    client
        .pair(&client_keys(), 42, ClientIdType::App, "x", &CancellationToken::new())
        .await
        .unwrap();

    // 40-byte confirmation: two full chunks and an empty terminator
    let writes = mock.writes();
    let tail: Vec<usize> = writes[writes.len() - 3..].iter().map(|(_, c)| c.len()).collect();
    assert_eq!(tail, vec![20, 20, 0]);
}

#[tokio::test]
async fn test_pairing_rejects_bad_authenticator() {
    let device = pairing_device(Some([0; 32]), CompletionStatus::Complete);
    let (mut client, mock) = pairing_client(config(), device).await;
    let err = client
        .pair(&client_keys(), 42, ClientIdType::App, "x", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.root(), NukiError::AuthenticatorMismatch));
    assert_eq!(err.step(), Some("verifying authorization id"));
    assert_eq!(mock.messages(SMARTLOCK_PROFILE.general).len(), 4);
    assert_eq!(client.state(), ClientState::Connected);
    assert!(client.credentials().is_none());
}

#[tokio::test]
async fn test_pairing_without_verification() {
    let config = ClientConfigBuilder::new()
        .response_timeout(Duration::from_secs(2))
        .verify_device_authenticator(false)
        .build();
    let device = pairing_device(Some([0; 32]), CompletionStatus::Complete);
    let (mut client, _mock) = pairing_client(config, device).await;
    let creds = client
        .pair(&client_keys(), 42, ClientIdType::App, "x", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(creds.authorization_id, AUTH_ID);
}

#[tokio::test]
async fn test_pairing_not_complete() {
    let device = pairing_device(None, CompletionStatus::Accepted);
    let (mut client, _mock) = pairing_client(config(), device).await;

    let err = client
        .pair(&client_keys(), 1, ClientIdType::App, "x", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err.root(),
        NukiError::UnexpectedStatus {
            expected: CompletionStatus::Complete,
            got: CompletionStatus::Accepted
        }
    ));
    assert_eq!(err.step(), Some("completing pairing"));
    assert!(client.credentials().is_none());
}

#[tokio::test]
async fn test_pairing_requires_connection() {
    let mut client: Client<MockTransport> = Client::new(config()).unwrap();
    let err = client
        .pair(&client_keys(), 1, ClientIdType::App, "x", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NukiError::NotConnected));
}

// ============================================================================
// Two-phase actions
// ============================================================================

#[tokio::test]
async fn test_unlock_accepted_then_complete() {
    let device = sealed_device(&[
        &[challenge()],
        &[status(CompletionStatus::Accepted), status(CompletionStatus::Complete)],
    ]);
    let (mut client, mock) = authenticated(DeviceType::SmartLock, device).await;

    client.perform_unlock(&CancellationToken::new()).await.unwrap();

    let sent = sent_user_commands(&mock);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], requests::request_data(CommandId::Challenge));
    assert_eq!(
        sent[1],
        requests::lock_action(LockAction::Unlock, 7, 0, None, &[0xC1; 32])
    );
}

#[tokio::test]
async fn test_action_complete_immediately() {
    let device = sealed_device(&[&[challenge()], &[status(CompletionStatus::Complete)]]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;
    client.perform_lock(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_action_second_status_must_be_complete() {
    let device = sealed_device(&[
        &[challenge()],
        &[status(CompletionStatus::Accepted), status(CompletionStatus::Accepted)],
    ]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;

    let err = client
        .perform_unlatch(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err.root(),
        NukiError::UnexpectedStatus {
            expected: CompletionStatus::Complete,
            got: CompletionStatus::Accepted
        }
    ));
}

#[tokio::test]
async fn test_action_rejects_unexpected_status() {
    let device = sealed_device(&[
        &[challenge()],
        &[status(CompletionStatus::Unknown(0x07))],
    ]);
    let (mut client, mock) = authenticated(DeviceType::SmartLock, device).await;

    let err = client.perform_lock(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err.root(),
        NukiError::UnexpectedStatus {
            expected: CompletionStatus::Accepted,
            got: CompletionStatus::Unknown(0x07)
        }
    ));
    // Rejected on the first status, before any wait for completion
    assert_eq!(err.step(), Some("reading status"));
    assert_eq!(sent_user_commands(&mock).len(), 2);
}

#[tokio::test]
async fn test_action_error_report() {
    let device = sealed_device(&[&[challenge()], &[error_report(0x21, CommandId::LockAction)]]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;

    let err = client.perform_unlock(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err.root(), NukiError::Device(DeviceError::BadPin)));
    assert_eq!(err.step(), Some("waiting for status"));
    assert_eq!(err.error_code(), "DEVICE_KEYTURNER_ERROR");
}

#[tokio::test]
async fn test_opener_action_with_name_suffix() {
    let device = sealed_device(&[&[challenge()], &[status(CompletionStatus::Complete)]]);
    let mock = MockTransport::new(DeviceType::Opener).with_device(device);
    let config = ClientConfigBuilder::new().app_id(9).name_suffix("hall").build();
    let mut client = Client::new(config).unwrap();
    client.authenticate(credentials()).await.unwrap();
    client.connect(Arc::new(mock.clone())).await.unwrap();

    client.perform_open(&CancellationToken::new()).await.unwrap();

    let key = device_shared_key();
    let sent = mock.messages(OPENER_PROFILE.user);
    let (_, action) = decrypt_command(&sent[1], &key).unwrap();
    assert_eq!(action.id(), CommandId::LockAction);
    assert_eq!(action.payload()[0], 0x03);
    assert_eq!(&action.payload()[1..5], &9u32.to_le_bytes());
    assert_eq!(&action.payload()[6..10], b"hall");
}

#[tokio::test]
async fn test_device_type_gating_sends_nothing() {
    let (mut client, mock) = authenticated(DeviceType::Opener, ScriptedDevice::new()).await;
    let err = client.perform_lock(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        NukiError::UnsupportedDeviceType {
            required: DeviceType::SmartLock,
            actual: DeviceType::Opener
        }
    ));
    assert!(mock.writes().is_empty());

    let (mut client, mock) = authenticated(DeviceType::SmartLock, ScriptedDevice::new()).await;
    let err = client.perform_open(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, NukiError::UnsupportedDeviceType { .. }));
    assert!(mock.writes().is_empty());
}

#[tokio::test]
async fn test_actions_require_authentication() {
    init_tracing();
    let mock = MockTransport::new(DeviceType::SmartLock);
    let mut client = Client::new(config()).unwrap();
    client.connect(Arc::new(mock)).await.unwrap();

    let err = client.perform_unlock(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, NukiError::NotAuthenticated));
}

// ============================================================================
// Lock action confirmation
// ============================================================================

#[tokio::test]
async fn test_lock_action_confirmed() {
    let device = sealed_device(&[
        &[challenge()],
        &[
            status(CompletionStatus::Accepted),
            states(LockState::Unlocking),
            states(LockState::Unlocked),
            status(CompletionStatus::Complete),
        ],
    ]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;
    client
        .lock_action_confirmed(&CancellationToken::new(), LockAction::Unlock)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_lock_action_confirmed_wrong_transition() {
    let device = sealed_device(&[
        &[challenge()],
        &[status(CompletionStatus::Accepted), states(LockState::Locked)],
    ]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;
    let err = client
        .lock_action_confirmed(&CancellationToken::new(), LockAction::Unlock)
        .await
        .unwrap_err();
    assert!(matches!(
        err.root(),
        NukiError::UnexpectedLockState {
            expected: LockState::Unlocking,
            got: LockState::Locked
        }
    ));
    assert_eq!(err.step(), Some("waiting for transitional state"));
}

#[tokio::test]
async fn test_lock_action_confirmed_requires_accepted() {
    let device = sealed_device(&[&[challenge()], &[status(CompletionStatus::Complete)]]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;
    let err = client
        .lock_action_confirmed(&CancellationToken::new(), LockAction::Lock)
        .await
        .unwrap_err();
    assert!(matches!(
        err.root(),
        NukiError::UnexpectedStatus {
            expected: CompletionStatus::Accepted,
            got: CompletionStatus::Complete
        }
    ));
}

#[tokio::test]
async fn test_lock_action_confirmed_untracked_action() {
    let (mut client, mock) = authenticated(DeviceType::SmartLock, ScriptedDevice::new()).await;
    let err = client
        .lock_action_confirmed(&CancellationToken::new(), LockAction::LockAndGo)
        .await
        .unwrap_err();
    assert!(matches!(err, NukiError::UnsupportedLockAction(LockAction::LockAndGo)));
    assert!(mock.writes().is_empty());
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_read_states_without_challenge() {
    let device = sealed_device(&[&[states(LockState::Locked)]]);
    let (mut client, mock) = authenticated(DeviceType::SmartLock, device).await;

    let cmd = client.read_states(&CancellationToken::new()).await.unwrap();
    let states = States::new(&cmd).unwrap();
    assert_eq!(states.lock_state(), LockState::Locked);

    let sent = sent_user_commands(&mock);
    assert_eq!(sent, vec![requests::request_data(CommandId::KeyturnerStates)]);
}

#[tokio::test]
async fn test_read_config() {
    let config = Command::new(CommandId::Config, &[0u8; 74]);
    let device = sealed_device(&[&[challenge()], &[config.clone()]]);
    let (mut client, mock) = authenticated(DeviceType::SmartLock, device).await;

    let cmd = client.read_config(&CancellationToken::new()).await.unwrap();
    assert_eq!(cmd, config);
    assert!(Config::new(&cmd).unwrap().as_smartlock().is_some());

    let sent = sent_user_commands(&mock);
    assert_eq!(sent[1], requests::request_config(&[0xC1; 32]));
}

#[tokio::test]
async fn test_read_config_rejects_unknown_layout() {
    let device = sealed_device(&[&[challenge()], &[Command::new(CommandId::Config, &[0u8; 10])]]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;

    let err = client.read_config(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err.root(),
        NukiError::Protocol(ProtocolError::UnsupportedPayload { len: 10, .. })
    ));
}

// ============================================================================
// Logs
// ============================================================================

#[tokio::test]
async fn test_read_log_entry_count() {
    let count = Command::new(CommandId::LogEntryCount, &[0x01, 0x05, 0x00]);
    let device = sealed_device(&[
        &[challenge()],
        &[count.clone(), status(CompletionStatus::Complete)],
    ]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;

    let cmd = client
        .read_log_entry_count(&CancellationToken::new(), pin())
        .await
        .unwrap();
    let view = LogEntryCountCommand::new(&cmd).unwrap();
    assert!(view.is_logging_enabled());
    assert_eq!(view.count(), 5);
}

#[tokio::test]
async fn test_read_log_entry_count_requires_complete() {
    let count = Command::new(CommandId::LogEntryCount, &[0x01, 0x05, 0x00]);
    let device = sealed_device(&[
        &[challenge()],
        &[count, status(CompletionStatus::Accepted)],
    ]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;

    let err = client
        .read_log_entry_count(&CancellationToken::new(), pin())
        .await
        .unwrap_err();
    assert!(matches!(err.root(), NukiError::UnexpectedStatus { .. }));
}

#[tokio::test]
async fn test_stream_log_entries() {
    let device = sealed_device(&[
        &[challenge()],
        &[log_entry(10), log_entry(11), log_entry(12), status(CompletionStatus::Complete)],
    ]);
    let (mut client, mock) = authenticated(DeviceType::SmartLock, device).await;

    let mut indices = Vec::new();
    client
        .stream_log_entries(
            &CancellationToken::new(),
            10,
            3,
            LogSortOrder::Ascending,
            pin(),
            |entry| indices.push(entry.index()),
        )
        .await
        .unwrap();
    assert_eq!(indices, vec![10, 11, 12]);

    let sent = sent_user_commands(&mock);
    assert_eq!(
        sent[1],
        requests::request_log_entries(10, 3, LogSortOrder::Ascending, pin(), &[0xC1; 32])
    );
}

#[tokio::test]
async fn test_read_log_entries_buffers() {
    let device = sealed_device(&[
        &[challenge()],
        &[log_entry(1), log_entry(2), status(CompletionStatus::Complete)],
    ]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;

    let entries = client
        .read_log_entries(&CancellationToken::new(), 0, 2, LogSortOrder::Descending, pin())
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].view().index(), 2);
    assert_eq!(entries[0].view().name(), "tester");
}

#[tokio::test]
async fn test_log_stream_unexpected_response() {
    let device = sealed_device(&[&[challenge()], &[log_entry(1), challenge()]]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;

    let mut seen = 0;
    let err = client
        .stream_log_entries(
            &CancellationToken::new(),
            0,
            5,
            LogSortOrder::Ascending,
            pin(),
            |_| seen += 1,
        )
        .await
        .unwrap_err();
    assert_eq!(seen, 1);
    assert!(matches!(
        err.root(),
        NukiError::UnexpectedResponse {
            got: CommandId::Challenge,
            ..
        }
    ));
}

// ============================================================================
// Maintenance
// ============================================================================

#[tokio::test]
async fn test_set_logging_and_update_time() {
    let device = sealed_device(&[
        &[challenge()],
        &[status(CompletionStatus::Complete)],
        &[challenge()],
        &[status(CompletionStatus::Complete)],
    ]);
    let (mut client, mock) = authenticated(DeviceType::SmartLock, device).await;
    let cancel = CancellationToken::new();

    client.enable_logging(&cancel, pin()).await.unwrap();
    let time = Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap();
    client.update_time(&cancel, pin(), time).await.unwrap();

    let sent = sent_user_commands(&mock);
    assert_eq!(sent[1], requests::enable_logging(true, pin(), &[0xC1; 32]));
    assert_eq!(sent[3], requests::update_time(&time, pin(), &[0xC1; 32]));
}

#[tokio::test]
async fn test_reboot_closes_client() {
    let device = sealed_device(&[&[challenge()]]);
    let (mut client, mock) = authenticated(DeviceType::SmartLock, device).await;

    client.reboot(&CancellationToken::new(), pin()).await.unwrap();

    assert_eq!(client.state(), ClientState::Disconnected);
    assert!(mock.is_closed());
    let sent = sent_user_commands(&mock);
    assert_eq!(sent[1], requests::request_reboot(pin(), &[0xC1; 32]));
}

// ============================================================================
// Timeouts and Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_silent_device_times_out() {
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, ScriptedDevice::new()).await;

    let err = client.perform_unlock(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err.root(), NukiError::Timeout { duration_ms: 2000 }));
    assert_eq!(err.step(), Some("waiting for challenge"));
    assert!(err.is_retriable());
    assert_eq!(
        err.to_string(),
        "Error while waiting for challenge: Response timeout after 2000ms"
    );
}

#[tokio::test]
async fn test_cancelled_before_response() {
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, ScriptedDevice::new()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = client.read_states(&cancel).await.unwrap_err();
    assert!(matches!(err.root(), NukiError::Cancelled));
}

#[tokio::test]
async fn test_late_error_report_does_not_fail_next_operation() {
    let device = sealed_device(&[
        &[error_report(0x21, CommandId::RequestData)],
        &[challenge()],
        &[status(CompletionStatus::Complete)],
    ]);
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, device).await;

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = client.read_states(&cancelled).await.unwrap_err();
    assert!(matches!(err.root(), NukiError::Cancelled));

    // The error report for the abandoned request is still queued
    client.perform_lock(&CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn test_cancel_while_waiting() {
    let (mut client, _mock) = authenticated(DeviceType::SmartLock, ScriptedDevice::new()).await;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = client.perform_unlock(&cancel).await.unwrap_err();
    assert!(matches!(err.root(), NukiError::Cancelled));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_reconnect_reopens_user_channel() {
    let (mut client, mock) = authenticated(DeviceType::SmartLock, ScriptedDevice::new()).await;
    client.close().await.unwrap();
    assert_eq!(client.state(), ClientState::Disconnected);
    assert!(!mock.is_subscribed(SMARTLOCK_PROFILE.user));

    let fresh = MockTransport::new(DeviceType::SmartLock);
    client.connect(Arc::new(fresh.clone())).await.unwrap();
    assert_eq!(client.state(), ClientState::Authenticated);
    assert!(fresh.is_subscribed(SMARTLOCK_PROFILE.general));
    assert!(fresh.is_subscribed(SMARTLOCK_PROFILE.user));
}

#[tokio::test]
async fn test_credentials_survive_serde() {
    let json = serde_json::to_string(&credentials()).unwrap();
    let restored: Credentials = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, credentials());

    let (mut client, _mock) = authenticated(DeviceType::SmartLock, ScriptedDevice::new()).await;
    client.authenticate(restored).await.unwrap();
    assert_eq!(client.authentication_id(), Some(AUTH_ID));
}
