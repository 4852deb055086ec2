//! Protocol orchestrator
//!
//! A [`Client`] drives one device over a [`BleTransport`]. After
//! [`connect`](Client::connect) only the general channel is open, which is
//! enough to [`pair`](Client::pair). Installing [`Credentials`] (by pairing or
//! through [`authenticate`](Client::authenticate)) opens the encrypted user
//! channel that every other operation runs on.
//!
//! Operations are strictly sequential request/response exchanges, which is
//! why every method takes `&mut self`.

mod actions;
mod logs;

use nuki_protocol::{
    authorization_authenticator, authorization_data, authorization_id_confirmation, requests,
    verify_authorization_id, AuthorizationIdCommand, ChallengeCommand, ClientIdType, Command,
    CommandId, CompletionStatus, Credentials, DeviceType, KeyPair, NonceSource, OsNonceSource,
    PublicKeyCommand, StatusCommand,
};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info, info_span, instrument, warn, Span};

use crate::channel::Channel;
use crate::config::ClientConfig;
use crate::error::{NukiError, Result, StepExt};
use crate::transport::BleTransport;

/// Connection state of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No transport attached
    Disconnected,
    /// General channel open
    Connected,
    /// User channel open
    Authenticated,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientState::Disconnected => write!(f, "disconnected"),
            ClientState::Connected => write!(f, "connected"),
            ClientState::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Client for one Nuki device
pub struct Client<T: BleTransport + ?Sized> {
    config: ClientConfig,
    span: Span,
    nonces: Box<dyn NonceSource>,
    transport: Option<Arc<T>>,
    general: Option<Channel<T>>,
    user: Option<Channel<T>>,
    credentials: Option<Credentials>,
}

impl<T: BleTransport + ?Sized> Client<T> {
    /// Create a disconnected client
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let span = info_span!("nuki", label = %config.label, device_type = field::Empty);
        Ok(Self {
            config,
            span,
            nonces: Box::new(OsNonceSource),
            transport: None,
            general: None,
            user: None,
            credentials: None,
        })
    }

    /// Replace the source of local nonces
    pub fn with_nonce_source(mut self, nonces: impl NonceSource + 'static) -> Self {
        self.nonces = Box::new(nonces);
        self
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current connection state
    pub fn state(&self) -> ClientState {
        if self.user.is_some() {
            ClientState::Authenticated
        } else if self.transport.is_some() {
            ClientState::Connected
        } else {
            ClientState::Disconnected
        }
    }

    /// Device family of the connection, [`DeviceType::Unknown`] when disconnected
    pub fn device_type(&self) -> DeviceType {
        self.general
            .as_ref()
            .or(self.user.as_ref())
            .map(Channel::device_type)
            .unwrap_or(DeviceType::Unknown)
    }

    /// Installed credentials
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Authorization id assigned by the device during pairing
    pub fn authentication_id(&self) -> Option<u32> {
        self.credentials.as_ref().map(|c| c.authorization_id)
    }

    /// Public key of the paired device
    pub fn device_public_key(&self) -> Option<[u8; 32]> {
        self.credentials.as_ref().map(|c| c.device_public_key)
    }

    /// Attach a connected transport and open the general channel
    ///
    /// When credentials are already installed the user channel is opened too.
    /// An existing connection is closed first.
    #[instrument(parent = &self.span, skip_all, fields(transport = transport.name()))]
    pub async fn connect(&mut self, transport: Arc<T>) -> Result<()> {
        if self.transport.is_some() {
            self.close().await?;
        }

        let general = Channel::open_general(transport.clone())
            .await
            .step("opening general data input output")?;
        self.span.record("device_type", field::display(general.device_type()));
        self.transport = Some(transport);
        self.general = Some(general);

        if self.credentials.is_some() {
            self.open_user_channel().await?;
        }

        info!(state = %self.state(), device_type = %self.device_type(), "Connected");
        Ok(())
    }

    /// Install credentials from an earlier pairing
    ///
    /// Opens the user channel right away when connected; otherwise on the next
    /// [`connect`](Self::connect).
    #[instrument(parent = &self.span, skip_all, fields(authorization_id = credentials.authorization_id))]
    pub async fn authenticate(&mut self, credentials: Credentials) -> Result<()> {
        if let Some(old) = self.user.take() {
            if let Err(e) = old.close().await {
                warn!(error = %e, "Failed to close previous user channel");
            }
        }
        self.credentials = Some(credentials);
        if self.transport.is_some() {
            self.open_user_channel().await?;
        }
        Ok(())
    }

    async fn open_user_channel(&mut self) -> Result<()> {
        let transport = self.transport.clone().ok_or(NukiError::NotConnected)?;
        let credentials = self.credentials.as_ref().ok_or(NukiError::NotAuthenticated)?;
        let user = Channel::open_user(
            transport,
            credentials.authorization_id,
            credentials.shared_key(),
        )
        .await
        .step("opening user-specific data input output")?;
        debug!(authorization_id = credentials.authorization_id, "User channel open");
        self.user = Some(user);
        Ok(())
    }

    /// Pair with a device in pairing mode
    ///
    /// On success the returned credentials are installed and the user channel
    /// is open. Persisting them is up to the caller.
    #[instrument(parent = &self.span, skip_all, fields(client_id = client_id, id_type = ?id_type, name = name))]
    pub async fn pair(
        &mut self,
        key_pair: &KeyPair,
        client_id: u32,
        id_type: ClientIdType,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Credentials> {
        let timeout = self.config.response_timeout;
        let verify = self.config.verify_device_authenticator;
        let nonces = self.nonces.as_mut();
        let general = self.general.as_mut().ok_or(NukiError::NotConnected)?;

        general
            .send(&requests::request_data(CommandId::PublicKey), nonces)
            .await
            .step("requesting public key")?;
        let response = general
            .wait_for_specific_response(CommandId::PublicKey, timeout, cancel)
            .await
            .step("waiting for public key")?;
        let device_public = PublicKeyCommand::new(&response)
            .step("reading public key")?
            .public_key();

        general
            .send(&requests::public_key(&key_pair.public_key()), nonces)
            .await
            .step("sending public key")?;
        let challenge = general
            .wait_for_specific_response(CommandId::Challenge, timeout, cancel)
            .await
            .step("waiting for first challenge")?;
        let nonce = ChallengeCommand::new(&challenge).step("reading first challenge")?.nonce();

        let authenticator = authorization_authenticator(nonce, &device_public, key_pair)
            .step("building authorization authenticator")?;
        general
            .send(&authenticator, nonces)
            .await
            .step("sending authorization authenticator")?;
        let challenge = general
            .wait_for_specific_response(CommandId::Challenge, timeout, cancel)
            .await
            .step("waiting for second challenge")?;
        let nonce = ChallengeCommand::new(&challenge).step("reading second challenge")?.nonce();

        let data = authorization_data(nonce, &device_public, key_pair, client_id, id_type, name, nonces)
            .step("building authorization data")?;
        general
            .send(&data.command, nonces)
            .await
            .step("sending authorization data")?;
        let response = general
            .wait_for_specific_response(CommandId::AuthorizationId, timeout, cancel)
            .await
            .step("waiting for authorization id")?;
        let assigned = AuthorizationIdCommand::new(&response).step("reading authorization id")?;
        let authorization_id = assigned.authorization_id();

        if verify {
            let shared = key_pair.shared_key(&device_public);
            verify_authorization_id(&assigned, &shared, &data.local_nonce)
                .map_err(|_| NukiError::AuthenticatorMismatch)
                .step("verifying authorization id")?;
        } else {
            debug!("Skipping device authenticator verification");
        }

        let confirmation =
            authorization_id_confirmation(assigned.nonce(), &device_public, key_pair, authorization_id)
                .step("building authorization id confirmation")?;
        general
            .send(&confirmation, nonces)
            .await
            .step("sending authorization id confirmation")?;
        let status = general
            .wait_for_specific_response(CommandId::Status, timeout, cancel)
            .await
            .step("waiting for pairing status")?;
        expect_status(&status, CompletionStatus::Complete).step("completing pairing")?;

        let credentials = Credentials::new(authorization_id, key_pair, device_public);
        info!(authorization_id, "Paired");
        self.authenticate(credentials.clone()).await?;
        Ok(credentials)
    }

    /// Run a challenge-protected action
    ///
    /// Fetches a challenge, sends `builder(nonce)` and waits for the status.
    /// An `accepted` status is followed by a second status that must be
    /// `complete`.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn perform_action<F>(&mut self, cancel: &CancellationToken, builder: F) -> Result<()>
    where
        F: FnOnce(&[u8]) -> Command + Send,
    {
        let timeout = self.config.response_timeout;
        let nonce = self.challenge(cancel).await?;
        let (user, nonces) = self.user_parts()?;

        user.send(&builder(&nonce), nonces).await.step("sending action")?;
        let status = user
            .wait_for_specific_response(CommandId::Status, timeout, cancel)
            .await
            .step("waiting for status")?;

        match StatusCommand::new(&status).step("reading status")?.status() {
            CompletionStatus::Complete => Ok(()),
            CompletionStatus::Accepted => {
                let status = user
                    .wait_for_specific_response(CommandId::Status, timeout, cancel)
                    .await
                    .step("waiting for completion")?;
                expect_status(&status, CompletionStatus::Complete).step("completing action")
            }
            got => Err(NukiError::UnexpectedStatus {
                expected: CompletionStatus::Accepted,
                got,
            })
            .step("reading status"),
        }
    }

    /// Close both channels and the transport
    ///
    /// Every step runs even if an earlier one fails; failures are reported
    /// together as [`NukiError::Close`]. Credentials stay installed.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn close(&mut self) -> Result<()> {
        let mut errors = Vec::new();

        if let Some(general) = self.general.take() {
            if let Err(e) = general.close().await {
                errors.push(e);
            }
        }
        if let Some(user) = self.user.take() {
            if let Err(e) = user.close().await {
                errors.push(e);
            }
        }
        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            info!("Closed");
            Ok(())
        } else {
            warn!(failures = errors.len(), "Failed to close resources");
            Err(NukiError::Close(errors))
        }
    }

    /// Request a challenge on the user channel and return its nonce
    async fn challenge(&mut self, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let timeout = self.config.response_timeout;
        let (user, nonces) = self.user_parts()?;
        user.send(&requests::request_data(CommandId::Challenge), nonces)
            .await
            .step("requesting challenge")?;
        let cmd = user
            .wait_for_specific_response(CommandId::Challenge, timeout, cancel)
            .await
            .step("waiting for challenge")?;
        let nonce = ChallengeCommand::new(&cmd).step("reading challenge")?.nonce().to_vec();
        Ok(nonce)
    }

    /// Borrow the user channel together with the nonce source
    fn user_parts(&mut self) -> Result<(&mut Channel<T>, &mut dyn NonceSource)> {
        let missing = self.missing_user_channel();
        let user = self.user.as_mut().ok_or(missing)?;
        Ok((user, self.nonces.as_mut()))
    }

    fn missing_user_channel(&self) -> NukiError {
        if self.transport.is_none() {
            NukiError::NotConnected
        } else {
            NukiError::NotAuthenticated
        }
    }

    /// Fail unless the user channel belongs to a `required` device
    fn require_device(&self, required: DeviceType) -> Result<()> {
        let actual = self
            .user
            .as_ref()
            .map(Channel::device_type)
            .ok_or_else(|| self.missing_user_channel())?;
        if actual != required {
            return Err(NukiError::UnsupportedDeviceType { required, actual });
        }
        Ok(())
    }
}

impl<T: BleTransport + ?Sized> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("label", &self.config.label)
            .field("state", &self.state())
            .field("device_type", &self.device_type())
            .field("authorization_id", &self.authentication_id())
            .finish()
    }
}

/// Fail unless `cmd` is a Status carrying `expected`
fn expect_status(cmd: &Command, expected: CompletionStatus) -> Result<()> {
    let got = StatusCommand::new(cmd)?.status();
    if got != expected {
        return Err(NukiError::UnexpectedStatus { expected, got });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockFailure, MockTransport};

    fn credentials() -> Credentials {
        let device = KeyPair::from_secret([0x11; 32]);
        Credentials::new(5, &KeyPair::from_secret([0x22; 32]), device.public_key())
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ClientConfig {
            response_timeout: std::time::Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            Client::<MockTransport>::new(config),
            Err(NukiError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let mut client = Client::new(ClientConfig::default()).unwrap();
        assert_eq!(client.state(), ClientState::Disconnected);
        assert_eq!(client.device_type(), DeviceType::Unknown);

        let mock = Arc::new(MockTransport::new(DeviceType::Opener));
        client.connect(mock.clone()).await.unwrap();
        assert_eq!(client.state(), ClientState::Connected);
        assert_eq!(client.device_type(), DeviceType::Opener);

        client.authenticate(credentials()).await.unwrap();
        assert_eq!(client.state(), ClientState::Authenticated);
        assert_eq!(client.authentication_id(), Some(5));
        assert_eq!(client.state().to_string(), "authenticated");

        client.close().await.unwrap();
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(mock.is_closed());
        assert_eq!(client.authentication_id(), Some(5));
    }

    #[tokio::test]
    async fn test_authenticate_before_connect() {
        let mut client = Client::new(ClientConfig::default()).unwrap();
        client.authenticate(credentials()).await.unwrap();
        assert_eq!(client.state(), ClientState::Disconnected);

        let mock = Arc::new(MockTransport::new(DeviceType::SmartLock));
        client.connect(mock).await.unwrap();
        assert_eq!(client.state(), ClientState::Authenticated);
    }

    #[tokio::test]
    async fn test_operations_need_connection_and_credentials() {
        let mut client: Client<MockTransport> = Client::new(ClientConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        let err = client.perform_action(&cancel, |_| unreachable!()).await;
        assert!(matches!(err, Err(NukiError::NotConnected)));

        client.connect(Arc::new(MockTransport::new(DeviceType::SmartLock))).await.unwrap();
        let err = client.perform_action(&cancel, |_| unreachable!()).await;
        assert!(matches!(err, Err(NukiError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_close_aggregates_failures() {
        let mut client = Client::new(ClientConfig::default()).unwrap();
        let mock = Arc::new(MockTransport::new(DeviceType::SmartLock));
        client.connect(mock.clone()).await.unwrap();
        client.authenticate(credentials()).await.unwrap();

        mock.fail_on(MockFailure::Unsubscribe);
        mock.fail_on(MockFailure::Close);
        match client.close().await {
            Err(NukiError::Close(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected close failure, got {other:?}"),
        }
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[test]
    fn test_expect_status() {
        let complete = Command::new(CommandId::Status, &[0x00]);
        assert!(expect_status(&complete, CompletionStatus::Complete).is_ok());
        let accepted = Command::new(CommandId::Status, &[0x01]);
        assert!(matches!(
            expect_status(&accepted, CompletionStatus::Complete),
            Err(NukiError::UnexpectedStatus {
                expected: CompletionStatus::Complete,
                got: CompletionStatus::Accepted
            })
        ));
    }
}
