//! Activity log retrieval

use nuki_protocol::{
    requests, Command, CommandId, CompletionStatus, LogEntryCommand, LogEntryCountCommand,
    LogSortOrder, OwnedLogEntry, Pin,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{expect_status, Client};
use crate::error::{NukiError, Result, StepExt};
use crate::transport::BleTransport;

impl<T: BleTransport + ?Sized> Client<T> {
    /// Read the number of stored log entries
    ///
    /// Returns the LogEntryCount command; [`LogEntryCountCommand::new`] on it
    /// succeeds. The device follows it with a Status that must be `complete`.
    #[instrument(parent = &self.span, skip_all)]
    pub async fn read_log_entry_count(
        &mut self,
        cancel: &CancellationToken,
        pin: Pin,
    ) -> Result<Command> {
        let timeout = self.config.response_timeout;
        let nonce = self.challenge(cancel).await?;
        let (user, nonces) = self.user_parts()?;

        user.send(&requests::request_log_entry_count(pin, &nonce), nonces)
            .await
            .step("requesting log entry count")?;
        let count = user
            .wait_for_specific_response(CommandId::LogEntryCount, timeout, cancel)
            .await
            .step("waiting for log entry count")?;
        LogEntryCountCommand::new(&count).step("reading log entry count")?;

        let status = user
            .wait_for_specific_response(CommandId::Status, timeout, cancel)
            .await
            .step("waiting for status")?;
        expect_status(&status, CompletionStatus::Complete).step("waiting for status")?;
        Ok(count)
    }

    /// Stream log entries to `on_entry` as they arrive
    ///
    /// Ends at the device's closing Status. Any other command in between fails
    /// the stream; entries already delivered stay delivered.
    #[instrument(parent = &self.span, skip_all, fields(start = start, count = count, order = ?order))]
    pub async fn stream_log_entries<F>(
        &mut self,
        cancel: &CancellationToken,
        start: u32,
        count: u16,
        order: LogSortOrder,
        pin: Pin,
        mut on_entry: F,
    ) -> Result<()>
    where
        F: FnMut(LogEntryCommand<'_>) + Send,
    {
        let timeout = self.config.response_timeout;
        let nonce = self.challenge(cancel).await?;
        let (user, nonces) = self.user_parts()?;

        user.send(
            &requests::request_log_entries(start, count, order, pin, &nonce),
            nonces,
        )
        .await
        .step("requesting log entries")?;

        let mut received = 0usize;
        loop {
            let cmd = user
                .wait_for_response(timeout, cancel)
                .await
                .step("waiting for log entry")?;
            match cmd.id() {
                CommandId::LogEntry => {
                    on_entry(LogEntryCommand::new(&cmd).step("reading log entry")?);
                    received += 1;
                }
                CommandId::Status => break,
                got => {
                    return Err(NukiError::UnexpectedResponse {
                        expected: "LogEntry or Status",
                        got,
                    })
                    .step("waiting for log entry");
                }
            }
        }

        debug!(received, "Log stream finished");
        Ok(())
    }

    /// Read log entries into memory
    ///
    /// Buffers the whole result; prefer [`stream_log_entries`](Self::stream_log_entries)
    /// for large ranges.
    pub async fn read_log_entries(
        &mut self,
        cancel: &CancellationToken,
        start: u32,
        count: u16,
        order: LogSortOrder,
        pin: Pin,
    ) -> Result<Vec<OwnedLogEntry>> {
        let mut entries = Vec::with_capacity(usize::from(count));
        self.stream_log_entries(cancel, start, count, order, pin, |entry| {
            entries.push(entry.to_owned_entry())
        })
        .await?;
        Ok(entries)
    }
}
