// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owner of the active journal channel
//!
//! A roll installs the new channel immediately but finishes lazily: the
//! previous channel is closed, and the roll callback fires, on the first
//! write that lands on the new channel.

use crate::error::JournalError;
use cairn_core::{Buffer, Channel, SerializeError};

type RolledHandler = Box<dyn FnOnce() + Send>;

pub struct Journaler {
    label: &'static str,
    current: Option<Box<dyn Channel>>,
    /// Channel rolled away from, closed on the next write
    previous: Option<Box<dyn Channel>>,
    on_rolled: Option<RolledHandler>,
    writing: bool,
    scratch: Buffer,
}

impl Journaler {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            current: None,
            previous: None,
            on_rolled: None,
            writing: false,
            scratch: Buffer::with_capacity(64 * 1024),
        }
    }

    pub fn is_writing(&self) -> bool {
        self.writing
    }

    pub fn current_channel(&self) -> Option<&dyn Channel> {
        self.current.as_deref()
    }

    /// True while a roll has been installed but not yet observed by a write
    pub fn roll_pending(&self) -> bool {
        self.previous.is_some()
    }

    pub fn start_writing(&mut self, channel: Box<dyn Channel>) -> Result<(), JournalError> {
        if self.writing {
            return Err(JournalError::IllegalState(format!(
                "{} journaler is already writing",
                self.label
            )));
        }
        tracing::info!(journal = self.label, channel = channel.name(), "started writing");
        self.current = Some(channel);
        self.previous = None;
        self.writing = true;
        Ok(())
    }

    /// Encode one record with `writer` and append it to the current channel
    pub fn write_data<F>(&mut self, writer: F, end_of_batch: bool) -> Result<(), JournalError>
    where
        F: FnOnce(&mut Buffer) -> Result<(), SerializeError>,
    {
        if !self.writing {
            return Err(JournalError::NotWriting);
        }
        let channel = self.current.as_mut().ok_or(JournalError::NotWriting)?;

        self.scratch.clear();
        writer(&mut self.scratch)?;
        channel.write(self.scratch.as_slice(), end_of_batch)?;

        if let Some(mut old) = self.previous.take() {
            close_silently(self.label, old.as_mut());
            if let Some(rolled) = self.on_rolled.take() {
                rolled();
            }
        }
        Ok(())
    }

    /// Switch to `channel`; the switch completes on the next write
    pub fn roll(
        &mut self,
        channel: Box<dyn Channel>,
        on_rolled: impl FnOnce() + Send + 'static,
    ) -> Result<(), JournalError> {
        tracing::info!(journal = self.label, channel = channel.name(), "rolling");
        if !self.writing {
            return self.start_writing(channel);
        }

        let replaced = self.current.replace(channel);
        match (self.previous.is_some(), replaced) {
            // The replaced channel never saw a write since the last roll
            (true, Some(mut unused)) => close_silently(self.label, unused.as_mut()),
            (false, replaced) => self.previous = replaced,
            (true, None) => {}
        }
        self.on_rolled = Some(Box::new(on_rolled));
        Ok(())
    }

    /// Close every channel, logging close failures; idempotent
    pub fn stop_writing(&mut self) {
        if self.writing {
            tracing::info!(
                journal = self.label,
                channel = self.current.as_ref().map(|c| c.name()),
                "stopped writing"
            );
        }
        self.writing = false;
        if let Some(mut channel) = self.current.take() {
            close_silently(self.label, channel.as_mut());
        }
        if let Some(mut channel) = self.previous.take() {
            close_silently(self.label, channel.as_mut());
        }
        self.on_rolled = None;
    }

    pub fn destroy(&mut self) {
        self.stop_writing();
    }
}

impl Drop for Journaler {
    fn drop(&mut self) {
        self.stop_writing();
    }
}

fn close_silently(label: &str, channel: &mut dyn Channel) {
    if !channel.is_open() {
        return;
    }
    if let Err(e) = channel.close() {
        tracing::error!(journal = label, channel = channel.name(), error = %e, "failed to close channel");
    }
}

#[cfg(test)]
#[path = "journaler_tests.rs"]
mod tests;
