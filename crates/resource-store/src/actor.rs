use crate::client::StoreClient;
use crate::error::StoreError;
use crate::etag::Etag;
use crate::message::{ScanFilter, StoreRequest};
use crate::record::StoredRecord;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The task that owns every record of one record type.
///
/// # Architecture Note
/// This struct is the "Server" half of the store. It owns the state (`records`) and the
/// receiver end of the channel. Requests are processed *sequentially*, so a
/// compare-and-set check and the write that follows it can never interleave with another
/// writer. No `Mutex` is needed around `records`.
///
/// ## Operations
///
/// * **Create**: assigns the next numeric id, builds the record with
///   [`StoredRecord::from_create`] and inserts it unless the key is taken or a required
///   key is missing.
/// * **Get**: returns a clone of the record, or `None`.
/// * **Update**: checks the optional expected etag and the required keys, applies the
///   change to a clone and swaps the clone in. The stored record is untouched on any
///   failure.
/// * **Delete**: checks the optional expected etag and, if a guard was sent, that no
///   other record matches it. Then removes the record.
/// * **Scan**: returns clones of all records matching the predicate.
pub struct StoreActor<T: StoredRecord> {
    receiver: mpsc::Receiver<StoreRequest<T>>,
    records: HashMap<T::Key, T>,
    next_id: u64,
}

impl<T: StoredRecord> StoreActor<T> {
    /// Creates a new `StoreActor` and its associated `StoreClient`.
    ///
    /// `buffer_size` is the capacity of the request channel. When it is full, client calls
    /// wait until there is space.
    pub fn new(buffer_size: usize) -> (Self, StoreClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            records: HashMap::new(),
            next_id: 1,
        };
        (actor, StoreClient::new(sender))
    }

    /// Runs the event loop until every client has been dropped.
    pub async fn run(mut self) {
        let record_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        info!(record_type, "Store started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::Create {
                    params,
                    requires,
                    respond_to,
                } => {
                    debug!(record_type, ?params, ?requires, "Create");
                    let _ = respond_to.send(self.create(params, &requires));
                }
                StoreRequest::Get { key, respond_to } => {
                    let record = self.records.get(&key).cloned();
                    debug!(record_type, %key, found = record.is_some(), "Get");
                    let _ = respond_to.send(Ok(record));
                }
                StoreRequest::Update {
                    key,
                    expected,
                    update,
                    requires,
                    respond_to,
                } => {
                    debug!(record_type, %key, ?expected, ?update, ?requires, "Update");
                    let result = self.update(&key, expected, update, &requires);
                    match &result {
                        Ok(record) => info!(record_type, %key, etag = %record.etag(), "Updated"),
                        Err(e) => warn!(record_type, %key, error = %e, "Update failed"),
                    }
                    let _ = respond_to.send(result);
                }
                StoreRequest::Delete {
                    key,
                    expected,
                    referenced_by,
                    respond_to,
                } => {
                    debug!(record_type, %key, ?expected, "Delete");
                    let result = self.delete(&key, expected, referenced_by);
                    match &result {
                        Ok(()) => info!(record_type, %key, size = self.records.len(), "Deleted"),
                        Err(e) => warn!(record_type, %key, error = %e, "Delete failed"),
                    }
                    let _ = respond_to.send(result);
                }
                StoreRequest::Scan { filter, respond_to } => {
                    let matched: Vec<T> = self
                        .records
                        .values()
                        .filter(|record| filter(record))
                        .cloned()
                        .collect();
                    debug!(record_type, matched = matched.len(), "Scan");
                    let _ = respond_to.send(Ok(matched));
                }
            }
        }

        info!(record_type, size = self.records.len(), "Shutdown");
    }

    fn create(&mut self, params: T::Create, requires: &[T::Key]) -> Result<T, StoreError> {
        self.check_required(requires)?;
        let record = T::from_create(self.next_id, params)
            .map_err(|e| StoreError::Record(Box::new(e)))?;
        let key = record.key();
        if self.records.contains_key(&key) {
            warn!(%key, "Create rejected, key exists");
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        self.next_id += 1;
        self.records.insert(key.clone(), record.clone());
        info!(%key, size = self.records.len(), "Created");
        Ok(record)
    }

    fn update(
        &mut self,
        key: &T::Key,
        expected: Option<Etag>,
        update: T::Update,
        requires: &[T::Key],
    ) -> Result<T, StoreError> {
        let current = self
            .records
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        check_expected(expected, current)?;
        self.check_required(requires)?;

        let mut next = current.clone();
        next.apply_update(update)
            .map_err(|e| StoreError::Record(Box::new(e)))?;
        self.records.insert(key.clone(), next.clone());
        Ok(next)
    }

    fn delete(
        &mut self,
        key: &T::Key,
        expected: Option<Etag>,
        referenced_by: Option<ScanFilter<T>>,
    ) -> Result<(), StoreError> {
        let current = self
            .records
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        check_expected(expected, current)?;

        if let Some(referenced_by) = referenced_by {
            let mut by: Vec<String> = self
                .records
                .iter()
                .filter(|(other, record)| *other != key && referenced_by(record))
                .map(|(other, _)| other.to_string())
                .collect();
            if !by.is_empty() {
                by.sort();
                return Err(StoreError::InUse {
                    key: key.to_string(),
                    by,
                });
            }
        }

        self.records.remove(key);
        Ok(())
    }

    fn check_required(&self, requires: &[T::Key]) -> Result<(), StoreError> {
        match requires.iter().find(|key| !self.records.contains_key(*key)) {
            Some(missing) => Err(StoreError::MissingReference(missing.to_string())),
            None => Ok(()),
        }
    }
}

fn check_expected<T: StoredRecord>(
    expected: Option<Etag>,
    current: &T,
) -> Result<(), StoreError> {
    match expected {
        Some(expected) if &expected != current.etag() => Err(StoreError::PreconditionFailed {
            expected,
            current: current.etag().clone(),
        }),
        _ => Ok(()),
    }
}
