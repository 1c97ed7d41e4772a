use crate::error::StoreError;
use crate::etag::Etag;
use crate::message::{ScanFilter, StoreRequest};
use crate::record::StoredRecord;
use tokio::sync::{mpsc, oneshot};

/// A type-safe client for a [`StoreActor`](crate::StoreActor).
///
/// Holds only a sender, so cloning is cheap and clones can be handed to every member of
/// an in-process cluster. The store shuts down once the last clone is dropped.
pub struct StoreClient<T: StoredRecord> {
    sender: mpsc::Sender<StoreRequest<T>>,
}

// Manual impl: deriving would require `T: Clone` on the client rather than on the record.
impl<T: StoredRecord> Clone for StoreClient<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: StoredRecord> StoreClient<T> {
    pub fn new(sender: mpsc::Sender<StoreRequest<T>>) -> Self {
        Self { sender }
    }

    pub async fn create(&self, params: T::Create) -> Result<T, StoreError> {
        self.create_referencing(params, Vec::new()).await
    }

    /// Create that fails with [`StoreError::MissingReference`] unless every key in
    /// `requires` exists when the insert runs.
    pub async fn create_referencing(
        &self,
        params: T::Create,
        requires: Vec<T::Key>,
    ) -> Result<T, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Create {
                params,
                requires,
                respond_to,
            })
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Dropped)?
    }

    pub async fn get(&self, key: T::Key) -> Result<Option<T>, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Get { key, respond_to })
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Dropped)?
    }

    /// Compare-and-set update. Pass `None` for an unconditional write.
    pub async fn update(
        &self,
        key: T::Key,
        expected: Option<Etag>,
        update: T::Update,
    ) -> Result<T, StoreError> {
        self.update_referencing(key, expected, update, Vec::new()).await
    }

    /// [`update`](Self::update) that also requires every key in `requires` to exist.
    pub async fn update_referencing(
        &self,
        key: T::Key,
        expected: Option<Etag>,
        update: T::Update,
        requires: Vec<T::Key>,
    ) -> Result<T, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Update {
                key,
                expected,
                update,
                requires,
                respond_to,
            })
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Dropped)?
    }

    pub async fn delete(&self, key: T::Key, expected: Option<Etag>) -> Result<(), StoreError> {
        self.send_delete(key, expected, None).await
    }

    /// Delete that fails with [`StoreError::InUse`] while any other record matches
    /// `referenced_by`. The check and the removal run as one store step.
    pub async fn delete_unreferenced<F>(
        &self,
        key: T::Key,
        expected: Option<Etag>,
        referenced_by: F,
    ) -> Result<(), StoreError>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.send_delete(key, expected, Some(Box::new(referenced_by))).await
    }

    async fn send_delete(
        &self,
        key: T::Key,
        expected: Option<Etag>,
        referenced_by: Option<ScanFilter<T>>,
    ) -> Result<(), StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Delete {
                key,
                expected,
                referenced_by,
                respond_to,
            })
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Dropped)?
    }

    pub async fn scan<F>(&self, filter: F) -> Result<Vec<T>, StoreError>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Scan {
                filter: Box::new(filter),
                respond_to,
            })
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Dropped)?
    }
}
