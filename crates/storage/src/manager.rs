// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal store lifecycle: rolling, rotation, and replay

use crate::channel::FileChannel;
use crate::error::{JournalError, StorageError};
use crate::journaler::Journaler;
use crate::naming::{self, FileSystemStorage, JournalStore};
use crate::reader::{JournalReader, TornSegment};
use cairn_core::{
    Buffer, Channel, EventsCommitInfo, JournalingConfig, SerializeError, SerializerChain,
    TransactionCommitInfo,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Owns the transaction and events journalers and the store they write to
pub struct JournalsManager {
    storage: FileSystemStorage,
    chain: Arc<SerializerChain>,
    transactions: Journaler,
    events: Journaler,
    store: Option<JournalStore>,
    config: JournalingConfig,
    last_transaction_id: u64,
}

impl JournalsManager {
    pub fn new(
        storage: FileSystemStorage,
        chain: Arc<SerializerChain>,
        config: JournalingConfig,
    ) -> Self {
        Self {
            storage,
            chain,
            transactions: Journaler::new("tx"),
            events: Journaler::new("evn"),
            store: None,
            config,
            last_transaction_id: 0,
        }
    }

    pub fn storage(&self) -> &FileSystemStorage {
        &self.storage
    }

    pub fn current_store(&self) -> Option<&JournalStore> {
        self.store.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.store.is_some()
    }

    /// Open a fresh store unless one is already active
    pub fn start(&mut self, last_transaction_id: u64) -> Result<(), JournalError> {
        self.last_transaction_id = self.last_transaction_id.max(last_transaction_id);
        if self.store.is_none() {
            self.roll(last_transaction_id)?;
        }
        Ok(())
    }

    /// Switch both journals to a new store and return its version
    ///
    /// The previous store's segments are published once each journal has
    /// written its first record to the new store, or at [`Self::stop`].
    pub fn roll(&mut self, last_transaction_id: u64) -> Result<u64, JournalError> {
        let next = self.storage.next_store(last_transaction_id)?;
        let mode = self.config.channel;
        let tx_channel = FileChannel::open(&JournalStore::tmp_path(&next.transactions), mode)?;
        let evn_channel = FileChannel::open(&JournalStore::tmp_path(&next.events), mode)?;

        let (old_tx, old_evn) = match &self.store {
            Some(old) => (
                Some(JournalStore::tmp_path(&old.transactions)),
                Some(JournalStore::tmp_path(&old.events)),
            ),
            None => (None, None),
        };
        self.transactions
            .roll(Box::new(tx_channel), move || publish_opt(old_tx))?;
        self.events
            .roll(Box::new(evn_channel), move || publish_opt(old_evn))?;

        tracing::info!(
            version = next.version,
            last_transaction_id,
            "rolled journal store"
        );
        let version = next.version;
        self.store = Some(next);
        Ok(version)
    }

    pub fn write_transaction(
        &mut self,
        info: &TransactionCommitInfo,
        end_of_batch: bool,
    ) -> Result<(), JournalError> {
        let record = self.encode_transaction(info)?;
        self.write_encoded_transaction(info.transaction_id, &record, end_of_batch)
    }

    /// Serialize a transaction record without writing it
    ///
    /// Lets the apply path find out that a transaction cannot be journaled
    /// before it touches any state.
    pub fn encode_transaction(&self, info: &TransactionCommitInfo) -> Result<Buffer, JournalError> {
        let mut record = Buffer::new();
        self.chain.serialize_transaction(info, &mut record)?;
        Ok(record)
    }

    /// Append a record produced by [`Self::encode_transaction`]
    pub fn write_encoded_transaction(
        &mut self,
        transaction_id: u64,
        record: &Buffer,
        end_of_batch: bool,
    ) -> Result<(), JournalError> {
        if exceeds(&self.transactions, self.config.tx_volume_size) {
            tracing::debug!(limit = self.config.tx_volume_size, "transaction volume full");
            self.roll(self.last_transaction_id)?;
        }
        self.transactions.write_data(
            |buffer| {
                buffer.write_bytes(record.as_slice());
                Ok(())
            },
            end_of_batch,
        )?;
        self.last_transaction_id = self.last_transaction_id.max(transaction_id);
        Ok(())
    }

    pub fn write_events(
        &mut self,
        info: &EventsCommitInfo,
        end_of_batch: bool,
    ) -> Result<(), JournalError> {
        if exceeds(&self.events, self.config.events_volume_size) {
            tracing::debug!(limit = self.config.events_volume_size, "events volume full");
            self.roll(self.last_transaction_id)?;
        }
        let chain = Arc::clone(&self.chain);
        self.events.write_data(
            |buffer| {
                chain.serialize_events_commit(info, buffer);
                Ok(())
            },
            end_of_batch,
        )
    }

    /// Version of the newest store on disk, published or not
    pub fn last_store_version(&self) -> Result<u64, JournalError> {
        Ok(self.storage.last_store_version()?)
    }

    /// Close both journals and publish every pending segment
    pub fn stop(&mut self) -> Result<(), JournalError> {
        self.transactions.stop_writing();
        self.events.stop_writing();
        if self.store.take().is_some() {
            let published = self.storage.publish_tmp_segments()?;
            tracing::info!(published, "journals stopped");
        }
        Ok(())
    }

    /// Transactions from stores with `version >= min_version`, in order
    pub fn replay_transactions(
        &self,
        min_version: u64,
    ) -> Result<Replay<TransactionCommitInfo>, JournalError> {
        let segments = self
            .storage
            .journal_stores()?
            .into_iter()
            .filter(|s| s.version >= min_version)
            .map(|s| s.transactions)
            .collect();
        let chain = Arc::clone(&self.chain);
        Ok(Replay::new(
            segments,
            Box::new(move |buffer| chain.deserialize_transaction(buffer)),
        ))
    }

    /// Every events-commit record on disk, in store order
    pub fn replay_events(&self) -> Result<Replay<EventsCommitInfo>, JournalError> {
        let segments = self.storage.events_segments()?;
        let chain = Arc::clone(&self.chain);
        Ok(Replay::new(
            segments,
            Box::new(move |buffer| chain.deserialize_events_commit(buffer)),
        ))
    }
}

impl Drop for JournalsManager {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(error = %e, "failed to stop journals");
        }
    }
}

fn exceeds(journaler: &Journaler, limit: u64) -> bool {
    limit > 0
        && journaler
            .current_channel()
            .is_some_and(|channel| channel.size() >= limit)
}

fn publish_opt(path: Option<PathBuf>) {
    if let Some(path) = path {
        naming::publish(&path);
    }
}

type Decoder<T> = Box<dyn FnMut(&mut Buffer) -> Result<T, SerializeError> + Send>;

/// Decoded records across a run of segments
///
/// The replay ends at the first torn or undecodable record, so callers
/// always observe a prefix of what was written. A torn tail is reported
/// by [`Replay::torn`]; anything else that stops the replay early is an
/// error from [`Replay::take_error`].
pub struct Replay<T> {
    segments: std::vec::IntoIter<PathBuf>,
    reader: Option<JournalReader>,
    decode: Decoder<T>,
    finished: bool,
    torn: Option<TornSegment>,
    error: Option<JournalError>,
}

impl<T> Replay<T> {
    fn new(segments: Vec<PathBuf>, decode: Decoder<T>) -> Self {
        Self {
            segments: segments.into_iter(),
            reader: None,
            decode,
            finished: false,
            torn: None,
            error: None,
        }
    }

    /// The torn segment that ended the replay, if any
    pub fn torn(&self) -> Option<&TornSegment> {
        self.torn.as_ref()
    }

    /// Why the replay stopped before the end of the written records
    pub fn take_error(&mut self) -> Option<JournalError> {
        self.error.take()
    }

    fn tear(&mut self, path: PathBuf, valid_len: usize) {
        self.torn = Some(TornSegment {
            path,
            valid_len: valid_len as u64,
            unreached: self.segments.by_ref().collect(),
        });
    }

    fn finish(&mut self) -> Option<T> {
        self.finished = true;
        self.reader = None;
        None
    }
}

impl<T> Iterator for Replay<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        while !self.finished {
            let Some(reader) = self.reader.as_mut() else {
                let path = self.segments.next()?;
                match JournalReader::open(&path) {
                    Ok(reader) => self.reader = Some(reader),
                    Err(e) => {
                        tracing::error!(path = %path.display(), error = %e, "cannot open segment");
                        self.error = Some(StorageError::Io(e).into());
                        return self.finish();
                    }
                }
                continue;
            };

            match reader.next() {
                Some(mut record) => {
                    let start = reader.last_valid_position() - record.len() - 4;
                    match (self.decode)(&mut record) {
                        Ok(item) => return Some(item),
                        // Zeroed or short records mark the end of written data
                        Err(SerializeError::Buffer(e)) => {
                            tracing::warn!(
                                path = %reader.path().display(),
                                offset = start,
                                error = %e,
                                "journal ends in an unwritten record"
                            );
                            let path = reader.path().to_path_buf();
                            self.tear(path, start);
                            return self.finish();
                        }
                        Err(e) => {
                            tracing::error!(
                                path = %reader.path().display(),
                                offset = start,
                                error = %e,
                                "stopping replay at undecodable record"
                            );
                            self.error = Some(JournalError::Undecodable {
                                path: reader.path().to_path_buf(),
                                offset: start,
                                source: e,
                            });
                            return self.finish();
                        }
                    }
                }
                None if reader.truncated() => {
                    let path = reader.path().to_path_buf();
                    let valid_len = reader.last_valid_position();
                    self.tear(path, valid_len);
                    return self.finish();
                }
                None => self.reader = None,
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
