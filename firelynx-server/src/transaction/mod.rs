//! Configuration transactions
//!
//! A transaction carries one candidate configuration through its
//! lifecycle: origin metadata, a fresh id, a guarded state machine, and
//! a buffered log stream the control plane ships back to callers.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};

pub mod log;
pub mod state;

pub use log::{LogRecord, RecordLevel, TransactionLog};
pub use state::TransactionState;

/// Where a transaction's candidate configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    File,
    Api,
    Test,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Api => write!(f, "api"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// One attempt to move the world from configuration A to
/// configuration B.
#[derive(Debug)]
pub struct Transaction {
    id: Uuid,
    request_id: String,
    source: Source,
    source_detail: String,
    created_at: DateTime<Utc>,
    is_valid: AtomicBool,
    state: Mutex<TransactionState>,
    log: TransactionLog,
    config: Arc<Config>,
}

impl Transaction {
    /// Transaction for a configuration read from a file (initial load
    /// or signal-triggered reload).
    pub fn from_file(path: impl Into<String>, config: Arc<Config>) -> Self {
        let path = path.into();
        Self::new(Source::File, path, Uuid::new_v4().to_string(), config)
    }

    /// Transaction for a configuration pushed through the control
    /// plane, correlated by the producer-supplied request id.
    pub fn from_api(request_id: impl Into<String>, config: Arc<Config>) -> Self {
        let request_id = request_id.into();
        Self::new(Source::Api, request_id.clone(), request_id, config)
    }

    /// Transaction originating in a test.
    pub fn from_test(name: impl Into<String>, config: Arc<Config>) -> Self {
        Self::new(Source::Test, name.into(), Uuid::new_v4().to_string(), config)
    }

    fn new(source: Source, source_detail: String, request_id: String, config: Arc<Config>) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(
            transaction_id = %id,
            source = %source,
            source_detail = %source_detail,
            "transaction created"
        );
        Self {
            id,
            request_id,
            source,
            source_detail,
            created_at: Utc::now(),
            is_valid: AtomicBool::new(false),
            state: Mutex::new(TransactionState::Created),
            log: TransactionLog::new(id),
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn source_detail(&self) -> &str {
        &self.source_detail
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The candidate configuration this transaction carries.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the candidate configuration.
    pub fn config_arc(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// The transaction's buffered log stream.
    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock().expect("transaction state poisoned")
    }

    /// Lock-free view of the validation outcome.
    pub fn is_valid(&self) -> bool {
        self.is_valid.load(Ordering::Acquire)
    }

    /// Run validation on the candidate configuration.
    ///
    /// Legal only from `Created`. Moves to `Validated` on success and
    /// `Invalid` on failure, returning the accumulated errors.
    pub fn run_validation(&self) -> Result<()> {
        self.ensure_state(TransactionState::Created, TransactionState::Validated)?;

        match self.config.validate() {
            Ok(()) => {
                self.is_valid.store(true, Ordering::Release);
                self.transition(TransactionState::Validated)?;
                self.log.info("configuration validated");
                Ok(())
            }
            Err(errors) => {
                self.transition(TransactionState::Invalid)?;
                for error in errors.iter() {
                    self.log.error(error.to_string());
                }
                Err(Error::Validation(errors))
            }
        }
    }

    /// Mark a transaction invalid without validating, for candidates
    /// that failed before a domain config existed (conversion errors).
    pub fn reject(&self, reason: &Error) -> Result<()> {
        self.ensure_state(TransactionState::Created, TransactionState::Invalid)?;
        self.transition(TransactionState::Invalid)?;
        self.log.error(reason.to_string());
        Ok(())
    }

    pub fn begin_execution(&self) -> Result<()> {
        self.transition(TransactionState::Executing)
    }

    pub fn mark_succeeded(&self) -> Result<()> {
        self.transition(TransactionState::Succeeded)
    }

    pub fn mark_failed(&self) -> Result<()> {
        self.transition(TransactionState::Failed)
    }

    pub fn begin_compensation(&self) -> Result<()> {
        self.transition(TransactionState::Compensating)
    }

    pub fn mark_compensated(&self) -> Result<()> {
        self.transition(TransactionState::Compensated)
    }

    pub fn begin_reload(&self) -> Result<()> {
        self.transition(TransactionState::Reloading)
    }

    pub fn mark_completed(&self) -> Result<()> {
        self.transition(TransactionState::Completed)
    }

    fn ensure_state(&self, expected: TransactionState, target: TransactionState) -> Result<()> {
        let current = self.state();
        if current != expected {
            return Err(Error::illegal_state(
                current.to_string(),
                target.to_string(),
            ));
        }
        Ok(())
    }

    fn transition(&self, next: TransactionState) -> Result<()> {
        let mut state = self.state.lock().expect("transaction state poisoned");
        if !state.can_transition_to(next) {
            return Err(Error::illegal_state(state.to_string(), next.to_string()));
        }
        tracing::debug!(
            transaction_id = %self.id,
            from = %*state,
            to = %next,
            "transaction state change"
        );
        *state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        App, AppConfig, EchoApp, Endpoint, HttpListenerOptions, Listener, ListenerOptions, Route,
        RouteCondition,
    };

    fn valid_config() -> Arc<Config> {
        Arc::new(Config {
            listeners: vec![Listener {
                id: "main".to_string(),
                address: ":8080".to_string(),
                options: Some(ListenerOptions::Http(HttpListenerOptions::default())),
            }],
            endpoints: vec![Endpoint {
                id: "e1".to_string(),
                listener_id: "main".to_string(),
                extra_listener_ids: Vec::new(),
                routes: vec![Route {
                    app_id: "a1".to_string(),
                    condition: Some(RouteCondition::HttpPath {
                        path: "/echo".to_string(),
                        method: None,
                    }),
                    static_data: None,
                }],
            }],
            apps: vec![App {
                id: "a1".to_string(),
                config: AppConfig::Echo(EchoApp {
                    response: "hi".to_string(),
                }),
            }],
            ..Config::default()
        })
    }

    fn invalid_config() -> Arc<Config> {
        Arc::new(Config {
            version: "v0".to_string(),
            ..Config::default()
        })
    }

    #[test]
    fn test_factories_set_source() {
        let tx = Transaction::from_file("/etc/firelynx.toml", valid_config());
        assert_eq!(tx.source(), Source::File);
        assert_eq!(tx.source_detail(), "/etc/firelynx.toml");

        let tx = Transaction::from_api("req-42", valid_config());
        assert_eq!(tx.source(), Source::Api);
        assert_eq!(tx.request_id(), "req-42");

        let tx = Transaction::from_test("scenario", valid_config());
        assert_eq!(tx.source(), Source::Test);
        assert_eq!(tx.state(), TransactionState::Created);
        assert!(!tx.is_valid());
    }

    #[test]
    fn test_validation_moves_to_validated() {
        let tx = Transaction::from_test("happy", valid_config());
        tx.run_validation().expect("valid");
        assert_eq!(tx.state(), TransactionState::Validated);
        assert!(tx.is_valid());
        assert!(tx.config().validation_completed());
    }

    #[test]
    fn test_validation_failure_moves_to_invalid() {
        let tx = Transaction::from_test("broken", invalid_config());
        let err = tx.run_validation().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(tx.state(), TransactionState::Invalid);
        assert!(!tx.is_valid());
        // The failure trail is captured on the transaction itself.
        assert!(!tx.log().lines().is_empty());
    }

    #[test]
    fn test_full_happy_lifecycle() {
        let tx = Transaction::from_test("lifecycle", valid_config());
        tx.run_validation().expect("valid");
        tx.begin_execution().expect("execute");
        tx.mark_succeeded().expect("succeed");
        tx.begin_reload().expect("reload");
        tx.mark_completed().expect("complete");
        assert_eq!(tx.state(), TransactionState::Completed);
        assert!(tx.state().is_terminal());
    }

    #[test]
    fn test_failure_lifecycle() {
        let tx = Transaction::from_test("rollback", valid_config());
        tx.run_validation().expect("valid");
        tx.begin_execution().expect("execute");
        tx.mark_failed().expect("fail");
        tx.begin_compensation().expect("compensate");
        tx.mark_compensated().expect("compensated");
        assert_eq!(tx.state(), TransactionState::Compensated);
    }

    #[test]
    fn test_illegal_transition_leaves_state_untouched() {
        let tx = Transaction::from_test("guarded", valid_config());
        let err = tx.begin_execution().unwrap_err();
        assert!(matches!(err, Error::IllegalState { .. }));
        assert_eq!(tx.state(), TransactionState::Created);

        tx.run_validation().expect("valid");
        let err = tx.mark_succeeded().unwrap_err();
        assert!(matches!(err, Error::IllegalState { .. }));
        assert_eq!(tx.state(), TransactionState::Validated);
    }

    #[test]
    fn test_reject_marks_invalid_from_created_only() {
        let tx = Transaction::from_test("rejected", valid_config());
        tx.reject(&Error::Internal("unusable document".to_string()))
            .expect("reject");
        assert_eq!(tx.state(), TransactionState::Invalid);

        let tx = Transaction::from_test("too-late", valid_config());
        tx.run_validation().expect("valid");
        assert!(tx
            .reject(&Error::Internal("nope".to_string()))
            .is_err());
    }

    #[test]
    fn test_validation_from_wrong_state_is_illegal() {
        let tx = Transaction::from_test("double", valid_config());
        tx.run_validation().expect("valid");
        let err = tx.run_validation().unwrap_err();
        assert!(matches!(err, Error::IllegalState { .. }));
    }
}
