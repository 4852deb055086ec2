//! Lock and open actions, state and config reads, device maintenance

use chrono::{DateTime, Utc};
use nuki_protocol::{
    requests, Command, CommandId, CompletionStatus, Config, DeviceType, LockAction, LockState,
    OpenAction, Pin, States,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::{expect_status, Client};
use crate::error::{NukiError, Result, StepExt};
use crate::transport::BleTransport;

/// Transitional and final lock state an action is expected to pass through
fn expected_transition(action: LockAction) -> Option<(LockState, LockState)> {
    match action {
        LockAction::Unlock => Some((LockState::Unlocking, LockState::Unlocked)),
        LockAction::Lock => Some((LockState::Locking, LockState::Locked)),
        LockAction::Unlatch => Some((LockState::Unlatching, LockState::Unlatched)),
        _ => None,
    }
}

impl<T: BleTransport + ?Sized> Client<T> {
    /// Perform a SmartLock action
    #[instrument(parent = &self.span, skip_all, fields(action = ?action))]
    pub async fn perform_lock_action(
        &mut self,
        cancel: &CancellationToken,
        action: LockAction,
    ) -> Result<()> {
        self.require_device(DeviceType::SmartLock)?;
        let app_id = self.config.app_id;
        let suffix = self.config.name_suffix.clone();
        self.perform_action(cancel, move |nonce| {
            requests::lock_action(action, app_id, 0, suffix.as_deref(), nonce)
        })
        .await
    }

    /// Lock a SmartLock
    pub async fn perform_lock(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.perform_lock_action(cancel, LockAction::Lock).await
    }

    /// Unlock a SmartLock
    pub async fn perform_unlock(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.perform_lock_action(cancel, LockAction::Unlock).await
    }

    /// Unlatch a SmartLock
    pub async fn perform_unlatch(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.perform_lock_action(cancel, LockAction::Unlatch).await
    }

    /// Perform an Opener action
    #[instrument(parent = &self.span, skip_all, fields(action = ?action))]
    pub async fn perform_open_action(
        &mut self,
        cancel: &CancellationToken,
        action: OpenAction,
    ) -> Result<()> {
        self.require_device(DeviceType::Opener)?;
        let app_id = self.config.app_id;
        let suffix = self.config.name_suffix.clone();
        self.perform_action(cancel, move |nonce| {
            requests::open_action(action, app_id, 0, suffix.as_deref(), nonce)
        })
        .await
    }

    /// Actuate the Opener's electric strike
    pub async fn perform_open(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.perform_open_action(cancel, OpenAction::ElectricStrikeActuation)
            .await
    }

    /// Perform a SmartLock action and follow the lock through its states
    ///
    /// The device must answer `accepted`, then report the transitional state,
    /// then the final state, then `complete`. Only Unlock, Lock and Unlatch
    /// have known transitions.
    #[instrument(parent = &self.span, skip_all, fields(action = ?action))]
    pub async fn lock_action_confirmed(
        &mut self,
        cancel: &CancellationToken,
        action: LockAction,
    ) -> Result<()> {
        self.require_device(DeviceType::SmartLock)?;
        let (transitional, last) =
            expected_transition(action).ok_or(NukiError::UnsupportedLockAction(action))?;

        let timeout = self.config.response_timeout;
        let app_id = self.config.app_id;
        let suffix = self.config.name_suffix.clone();
        let nonce = self.challenge(cancel).await?;
        let (user, nonces) = self.user_parts()?;

        let cmd = requests::lock_action(action, app_id, 0, suffix.as_deref(), &nonce);
        user.send(&cmd, nonces).await.step("sending lock action")?;

        let status = user
            .wait_for_specific_response(CommandId::Status, timeout, cancel)
            .await
            .step("waiting for acceptance")?;
        expect_status(&status, CompletionStatus::Accepted).step("waiting for acceptance")?;

        for (expected, step) in [
            (transitional, "waiting for transitional state"),
            (last, "waiting for final state"),
        ] {
            let states = user
                .wait_for_specific_response(CommandId::KeyturnerStates, timeout, cancel)
                .await
                .step(step)?;
            let got = States::new(&states).step(step)?.lock_state();
            debug!(state = ?got, "Lock state reported");
            if got != expected {
                return Err(NukiError::UnexpectedLockState { expected, got }).step(step);
            }
        }

        let status = user
            .wait_for_specific_response(CommandId::Status, timeout, cancel)
            .await
            .step("waiting for completion")?;
        expect_status(&status, CompletionStatus::Complete).step("waiting for completion")?;
        info!("Lock action confirmed");
        Ok(())
    }

    /// Read the current device states
    ///
    /// The returned command is a KeyturnerStates whose payload matches the
    /// device family, so [`States::new`] on it succeeds.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn read_states(&mut self, cancel: &CancellationToken) -> Result<Command> {
        let timeout = self.config.response_timeout;
        let (user, nonces) = self.user_parts()?;
        user.send(&requests::request_data(CommandId::KeyturnerStates), nonces)
            .await
            .step("requesting device states")?;
        let cmd = user
            .wait_for_specific_response(CommandId::KeyturnerStates, timeout, cancel)
            .await
            .step("waiting for device states")?;
        States::new(&cmd).step("reading device states")?;
        Ok(cmd)
    }

    /// Read the device configuration
    ///
    /// The returned command is a Config that [`Config::new`] accepts.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn read_config(&mut self, cancel: &CancellationToken) -> Result<Command> {
        let timeout = self.config.response_timeout;
        let nonce = self.challenge(cancel).await?;
        let (user, nonces) = self.user_parts()?;
        user.send(&requests::request_config(&nonce), nonces)
            .await
            .step("requesting config")?;
        let cmd = user
            .wait_for_specific_response(CommandId::Config, timeout, cancel)
            .await
            .step("waiting for config")?;
        Config::new(&cmd).step("reading config")?;
        Ok(cmd)
    }

    /// Switch activity logging on the device
    #[instrument(parent = &self.span, skip_all, fields(enable = enable))]
    pub async fn set_logging(
        &mut self,
        cancel: &CancellationToken,
        pin: Pin,
        enable: bool,
    ) -> Result<()> {
        self.perform_action(cancel, move |nonce| {
            requests::enable_logging(enable, pin, nonce)
        })
        .await
    }

    /// Enable activity logging
    pub async fn enable_logging(&mut self, cancel: &CancellationToken, pin: Pin) -> Result<()> {
        self.set_logging(cancel, pin, true).await
    }

    /// Disable activity logging
    pub async fn disable_logging(&mut self, cancel: &CancellationToken, pin: Pin) -> Result<()> {
        self.set_logging(cancel, pin, false).await
    }

    /// Set the device clock
    #[instrument(parent = &self.span, skip_all, fields(time = %time))]
    pub async fn update_time(
        &mut self,
        cancel: &CancellationToken,
        pin: Pin,
        time: DateTime<Utc>,
    ) -> Result<()> {
        self.perform_action(cancel, move |nonce| requests::update_time(&time, pin, nonce))
            .await
    }

    /// Reboot the device
    ///
    /// The device drops the connection, so the client closes its own
    /// resources afterwards and has to be connected again.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn reboot(&mut self, cancel: &CancellationToken, pin: Pin) -> Result<()> {
        let nonce = self.challenge(cancel).await?;
        let (user, nonces) = self.user_parts()?;
        user.send(&requests::request_reboot(pin, &nonce), nonces)
            .await
            .step("sending reboot request")?;
        info!("Reboot requested");

        if let Err(e) = self.close().await {
            debug!(error = %e, "Failed to close after reboot");
        }
        Ok(())
    }
}
