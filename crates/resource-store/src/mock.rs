//! # Mock Store & Testing Guide
//!
//! [`MockStore<T>`] hands out a real [`StoreClient<T>`] whose requests are answered from a
//! script instead of a running [`StoreActor`](crate::StoreActor). Use it to test code
//! *around* the store, especially failure paths that a real store never produces on
//! demand (a closed channel in the middle of a reverse-index lookup, a compare-and-set
//! race lost at exactly the wrong moment).
//!
//! | Feature | MockStore | Real StoreActor |
//! |---------|-----------|-----------------|
//! | **State** | None, answers are scripted | Real records |
//! | **Determinism** | Fully deterministic | Subject to scheduler |
//! | **Error Injection** | `return_err` | Hard |
//!
//! Expectations are consumed in FIFO order. A request that does not match the next
//! expectation panics the background task, which surfaces in the test as
//! [`StoreError::Dropped`].
//!
//! ```rust,ignore
//! let mut mock = MockStore::<MyRecord>::new();
//! mock.expect_get(key.clone()).return_ok(Some(record));
//! mock.expect_scan().return_err(StoreError::Closed);
//!
//! let client = mock.client();
//! // ... exercise code that uses `client` ...
//! mock.verify();
//! ```

use crate::client::StoreClient;
use crate::error::StoreError;
use crate::message::StoreRequest;
use crate::record::StoredRecord;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

enum Expectation<T: StoredRecord> {
    Create(Result<T, StoreError>),
    Get(T::Key, Result<Option<T>, StoreError>),
    Update(T::Key, Result<T, StoreError>),
    Delete(T::Key, Result<(), StoreError>),
    Scan(Result<Vec<T>, StoreError>),
}

type Script<T> = Arc<Mutex<VecDeque<Expectation<T>>>>;

/// A scripted store client for tests.
pub struct MockStore<T: StoredRecord> {
    client: StoreClient<T>,
    expectations: Script<T>,
    _handle: tokio::task::JoinHandle<()>,
}

impl<T: StoredRecord> Default for MockStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StoredRecord> MockStore<T> {
    /// Creates a mock with an empty script. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<StoreRequest<T>>(100);
        let expectations: Script<T> = Arc::new(Mutex::new(VecDeque::new()));
        let script = expectations.clone();

        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let next = script.lock().pop_front();
                match (request, next) {
                    (StoreRequest::Create { respond_to, .. }, Some(Expectation::Create(r))) => {
                        let _ = respond_to.send(r);
                    }
                    (StoreRequest::Get { key, respond_to }, Some(Expectation::Get(want, r))) => {
                        assert_eq!(key, want, "MockStore: get for unexpected key");
                        let _ = respond_to.send(r);
                    }
                    (
                        StoreRequest::Update {
                            key, respond_to, ..
                        },
                        Some(Expectation::Update(want, r)),
                    ) => {
                        assert_eq!(key, want, "MockStore: update for unexpected key");
                        let _ = respond_to.send(r);
                    }
                    (
                        StoreRequest::Delete {
                            key, respond_to, ..
                        },
                        Some(Expectation::Delete(want, r)),
                    ) => {
                        assert_eq!(key, want, "MockStore: delete for unexpected key");
                        let _ = respond_to.send(r);
                    }
                    (StoreRequest::Scan { respond_to, .. }, Some(Expectation::Scan(r))) => {
                        let _ = respond_to.send(r);
                    }
                    (request, _) => {
                        panic!("MockStore: unexpected request {:?}", request);
                    }
                }
            }
        });

        Self {
            client: StoreClient::new(sender),
            expectations,
            _handle: handle,
        }
    }

    /// Returns a client wired to this mock.
    pub fn client(&self) -> StoreClient<T> {
        self.client.clone()
    }

    pub fn expect_create(&mut self) -> ExpectationBuilder<T, T> {
        ExpectationBuilder::new(self.expectations.clone(), Expectation::Create)
    }

    pub fn expect_get(&mut self, key: T::Key) -> ExpectationBuilder<T, Option<T>> {
        ExpectationBuilder::new(self.expectations.clone(), move |r| Expectation::Get(key, r))
    }

    pub fn expect_update(&mut self, key: T::Key) -> ExpectationBuilder<T, T> {
        ExpectationBuilder::new(self.expectations.clone(), move |r| {
            Expectation::Update(key, r)
        })
    }

    pub fn expect_delete(&mut self, key: T::Key) -> ExpectationBuilder<T, ()> {
        ExpectationBuilder::new(self.expectations.clone(), move |r| {
            Expectation::Delete(key, r)
        })
    }

    pub fn expect_scan(&mut self) -> ExpectationBuilder<T, Vec<T>> {
        ExpectationBuilder::new(self.expectations.clone(), Expectation::Scan)
    }

    /// Panics if any scripted expectation was not consumed.
    pub fn verify(&self) {
        let remaining = self.expectations.lock().len();
        if remaining != 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }
}

/// Builder returned by the `expect_*` methods; finish it with `return_ok` or `return_err`.
pub struct ExpectationBuilder<T: StoredRecord, R> {
    script: Script<T>,
    make: Box<dyn FnOnce(Result<R, StoreError>) -> Expectation<T> + Send>,
}

impl<T: StoredRecord, R> ExpectationBuilder<T, R> {
    fn new(
        script: Script<T>,
        make: impl FnOnce(Result<R, StoreError>) -> Expectation<T> + Send + 'static,
    ) -> Self {
        Self {
            script,
            make: Box::new(make),
        }
    }

    pub fn return_ok(self, value: R) {
        self.script.lock().push_back((self.make)(Ok(value)));
    }

    pub fn return_err(self, error: StoreError) {
        self.script.lock().push_back((self.make)(Err(error)));
    }
}
