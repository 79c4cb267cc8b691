use crate::error::SubmitError;
use crate::identity::IdentityProvider;
use crate::result::{Fingerprint, TestResult};
use crate::sink::{ResultSink, SubmissionPayload};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

/// First attempt plus one retry
pub const MAX_ATTEMPTS: u8 = 2;

/// User-visible save indicator for the latest result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    InFlight { attempt: u8 },
    Succeeded,
    Failed { attempts: u8 },
}

/// What `evaluate` decided to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Nobody is signed in
    Skipped,
    Submitted { attempt: u8 },
    AlreadySaved,
    InFlight,
    RetriesExhausted,
}

/// Completion of one background save
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub fingerprint: Fingerprint,
    pub result: Result<(), SubmitError>,
}

/// Saves each distinct result at most once.
///
/// Submissions run on their own thread and report back through a caller
/// supplied callback; `on_outcome` must then be applied by the owner.
/// A failed fingerprint is retried only when re-evaluated, and only once.
pub struct ResultReporter {
    sink: Arc<dyn ResultSink>,
    identity: Arc<dyn IdentityProvider>,
    attempts: HashMap<Fingerprint, Attempt>,
    current: Option<Fingerprint>,
    status: SaveStatus,
}

impl ResultReporter {
    pub fn new(sink: Arc<dyn ResultSink>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            sink,
            identity,
            attempts: HashMap::new(),
            current: None,
            status: SaveStatus::Idle,
        }
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Consider saving `result`. `notify` receives the outcome from the
    /// worker thread if a submission is started.
    pub fn evaluate<F>(&mut self, result: &TestResult, typed_len: usize, notify: F) -> Evaluation
    where
        F: FnOnce(SubmissionOutcome) + Send + 'static,
    {
        let fingerprint = result.fingerprint(typed_len);
        self.current = Some(fingerprint);

        let Some(identity) = self.identity.current() else {
            info!("no user signed in, skipping save");
            self.status = SaveStatus::Idle;
            return Evaluation::Skipped;
        };

        let attempt = match self.attempts.get(&fingerprint) {
            None => 1,
            Some(Attempt::Succeeded) => {
                self.status = SaveStatus::Saved;
                return Evaluation::AlreadySaved;
            }
            Some(Attempt::InFlight { .. }) => {
                self.status = SaveStatus::Saving;
                return Evaluation::InFlight;
            }
            Some(Attempt::Failed { attempts }) if *attempts >= MAX_ATTEMPTS => {
                self.status = SaveStatus::Failed;
                return Evaluation::RetriesExhausted;
            }
            Some(Attempt::Failed { attempts }) => attempts + 1,
        };

        self.attempts
            .insert(fingerprint, Attempt::InFlight { attempt });
        self.status = SaveStatus::Saving;
        info!(
            "saving result ({} wpm, {}%) to {} sink, attempt {attempt}",
            result.wpm,
            result.accuracy,
            self.sink.name()
        );

        let sink = Arc::clone(&self.sink);
        let payload = SubmissionPayload::from(result);
        thread::spawn(move || {
            let result = sink.submit(&identity, &payload);
            notify(SubmissionOutcome {
                fingerprint,
                result,
            });
        });

        Evaluation::Submitted { attempt }
    }

    /// Record the completion of a background save
    pub fn on_outcome(&mut self, outcome: SubmissionOutcome) {
        let attempt = match self.attempts.get(&outcome.fingerprint) {
            Some(Attempt::InFlight { attempt }) => *attempt,
            other => {
                warn!("ignoring save outcome for untracked attempt state {other:?}");
                return;
            }
        };

        let (next, status) = match outcome.result {
            Ok(()) => {
                info!("result saved");
                (Attempt::Succeeded, SaveStatus::Saved)
            }
            Err(e) => {
                error!("failed to save result (attempt {attempt}): {e}");
                (Attempt::Failed { attempts: attempt }, SaveStatus::Failed)
            }
        };
        self.attempts.insert(outcome.fingerprint, next);

        if self.current == Some(outcome.fingerprint) {
            self.status = status;
        }
    }

    /// Forget which result is on screen. Saves in flight keep running.
    pub fn clear_current(&mut self) {
        self.current = None;
        self.status = SaveStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ConfiguredIdentity, Identity};
    use crate::level::{Level, TestDuration};
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    struct CountingSink {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl ResultSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        fn submit(&self, _: &Identity, _: &SubmissionPayload) -> Result<(), SubmitError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(SubmitError::Timeout(Duration::from_secs(15)))
            } else {
                Ok(())
            }
        }
    }

    fn reporter(fail_first: usize, signed_in: bool) -> (ResultReporter, Arc<CountingSink>) {
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
            fail_first,
        });
        let identity = signed_in.then(|| Identity {
            user_id: "u".into(),
            email: None,
            token: None,
        });
        let r = ResultReporter::new(sink.clone(), Arc::new(ConfiguredIdentity::new(identity)));
        (r, sink)
    }

    fn result() -> TestResult {
        TestResult {
            wpm: 30,
            accuracy: 95,
            mistakes: 1,
            duration: TestDuration::Fifteen,
            level: Level::Beginner,
        }
    }

    /// Evaluate and, if a worker was spawned, wait for and apply its outcome
    fn evaluate_and_settle(r: &mut ResultReporter) -> Evaluation {
        let (tx, rx) = mpsc::channel();
        let ev = r.evaluate(&result(), 20, move |o| {
            let _ = tx.send(o);
        });
        if let Ok(outcome) = rx.recv_timeout(Duration::from_secs(5)) {
            r.on_outcome(outcome);
        }
        ev
    }

    #[test]
    fn anonymous_never_submits() {
        let (mut r, sink) = reporter(0, false);

        assert_eq!(evaluate_and_settle(&mut r), Evaluation::Skipped);
        assert_eq!(evaluate_and_settle(&mut r), Evaluation::Skipped);

        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        assert_eq!(r.status(), SaveStatus::Idle);
    }

    #[test]
    fn success_is_not_resubmitted() {
        let (mut r, sink) = reporter(0, true);

        assert_matches!(evaluate_and_settle(&mut r), Evaluation::Submitted { attempt: 1 });
        assert_eq!(r.status(), SaveStatus::Saved);
        assert_eq!(evaluate_and_settle(&mut r), Evaluation::AlreadySaved);

        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_allows_exactly_one_retry() {
        let (mut r, sink) = reporter(usize::MAX, true);

        assert_matches!(evaluate_and_settle(&mut r), Evaluation::Submitted { attempt: 1 });
        assert_eq!(r.status(), SaveStatus::Failed);

        assert_matches!(evaluate_and_settle(&mut r), Evaluation::Submitted { attempt: 2 });
        assert_eq!(r.status(), SaveStatus::Failed);

        assert_eq!(evaluate_and_settle(&mut r), Evaluation::RetriesExhausted);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retry_can_succeed() {
        let (mut r, sink) = reporter(1, true);

        evaluate_and_settle(&mut r);
        assert_eq!(r.status(), SaveStatus::Failed);

        evaluate_and_settle(&mut r);
        assert_eq!(r.status(), SaveStatus::Saved);
        assert_eq!(evaluate_and_settle(&mut r), Evaluation::AlreadySaved);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn no_automatic_retry_without_reevaluation() {
        let (mut r, sink) = reporter(usize::MAX, true);

        evaluate_and_settle(&mut r);
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn in_flight_is_not_duplicated() {
        let (mut r, sink) = reporter(0, true);
        let (tx, rx) = mpsc::channel();
        let tx2 = tx.clone();

        let first = r.evaluate(&result(), 20, move |o| {
            let _ = tx.send(o);
        });
        let second = r.evaluate(&result(), 20, move |o| {
            let _ = tx2.send(o);
        });

        assert_matches!(first, Evaluation::Submitted { attempt: 1 });
        assert_eq!(second, Evaluation::InFlight);
        assert_eq!(r.status(), SaveStatus::Saving);

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        r.on_outcome(outcome);
        assert_eq!(r.status(), SaveStatus::Saved);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_outcome_does_not_touch_status() {
        let (mut r, _sink) = reporter(0, true);
        let (tx, rx) = mpsc::channel();

        r.evaluate(&result(), 20, move |o| {
            let _ = tx.send(o);
        });
        r.clear_current();

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        r.on_outcome(outcome);
        assert_eq!(r.status(), SaveStatus::Idle);

        // the record still remembers the success
        assert_eq!(evaluate_and_settle(&mut r), Evaluation::AlreadySaved);
    }

    #[test]
    fn distinct_results_each_save_once() {
        let (mut r, sink) = reporter(0, true);

        evaluate_and_settle(&mut r);
        let (tx, rx) = mpsc::channel();
        let other = TestResult { wpm: 31, ..result() };
        assert_matches!(
            r.evaluate(&other, 20, move |o| {
                let _ = tx.send(o);
            }),
            Evaluation::Submitted { attempt: 1 }
        );
        r.on_outcome(rx.recv_timeout(Duration::from_secs(5)).unwrap());

        assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    }
}
