//! Integration tests for sessions
//!
//! These tests drive a full session over simulated devices and verify:
//! - What reaches the device for a given schedule and options
//! - Send/recv events delivered to the log sink
//! - Validation happening before anything is written
//! - Cancellation, close and write-failure behaviour

use std::sync::Arc;
use std::time::{Duration, Instant};

use rig_engine::{
    Direction, EscapeScheme, LineEnding, MemorySink, RunOutcome, Session, SessionError,
    ValidationError,
};
use rig_sim::{LoopbackProbe, LoopbackTransport};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Session over an echoing loopback device with an in-memory sink
    pub fn echo_session() -> (Session<LoopbackTransport>, LoopbackProbe, Arc<MemorySink>) {
        let (device, probe) = LoopbackTransport::echo();
        let sink = Arc::new(MemorySink::new());
        let session = Session::open("loop0", device, sink.clone());
        (session, probe, sink)
    }

    /// Session over a device that never answers
    pub fn silent_session() -> (Session<LoopbackTransport>, LoopbackProbe, Arc<MemorySink>) {
        let (device, probe) = LoopbackTransport::silent();
        let sink = Arc::new(MemorySink::new());
        let session = Session::open("loop0", device, sink.clone());
        (session, probe, sink)
    }

    /// Poll `check` until it holds or `limit` passes
    pub async fn wait_for(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < limit {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check()
    }
}

// ============================================================================
// End-to-end
// ============================================================================

mod end_to_end_tests {
    use super::*;

    #[tokio::test]
    async fn ping_with_appended_newline() {
        let (mut session, probe, sink) = helpers::echo_session();
        session.set_line_ending(LineEnding {
            precede_lf_with_cr: false,
            append_missing_newline: true,
        });
        session.add_action("0s", "ping").unwrap();

        session.start_run().unwrap();
        let report = session.wait_run().await.unwrap().unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.passes, 1);

        assert_eq!(probe.writes(), vec![b"ping\n".to_vec()]);

        let sent = sink.events_in(Direction::Send);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, b"ping\n");
        assert_eq!(&*sent[0].device, "loop0");

        // the loopback plug sends it straight back
        assert!(
            helpers::wait_for(Duration::from_millis(500), || {
                sink.events_in(Direction::Recv)
                    .iter()
                    .flat_map(|e| e.payload.clone())
                    .collect::<Vec<_>>()
                    == b"ping\n"
            })
            .await
        );

        session.close().await.unwrap();
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn works_over_a_tokio_duplex_stream() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (local, mut remote) = tokio::io::duplex(1024);
        let sink = Arc::new(MemorySink::new());
        let mut session = Session::open("duplex", local, sink.clone());
        session.set_line_ending(LineEnding::NONE);
        session.add_action("0s", "AT\r").unwrap();

        session.start_run().unwrap();
        session.wait_run().await.unwrap().unwrap();

        let mut buf = [0u8; 16];
        let n = remote.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"AT\r");

        remote.write_all(b"OK\r\n").await.unwrap();
        assert!(
            helpers::wait_for(Duration::from_millis(500), || {
                sink.events_in(Direction::Recv)
                    .first()
                    .is_some_and(|e| e.payload == b"OK\r\n")
            })
            .await
        );

        session.close().await.unwrap();
    }
}

// ============================================================================
// Schedule Tests
// ============================================================================

mod schedule_tests {
    use super::*;

    #[tokio::test]
    async fn writes_follow_schedule_order() {
        let (mut session, probe, _sink) = helpers::silent_session();
        session.set_line_ending(LineEnding::NONE);
        for text in ["first", "second", "third"] {
            session.add_action("0s", text).unwrap();
        }

        session.start_run().unwrap();
        session.wait_run().await.unwrap().unwrap();

        assert_eq!(
            probe.writes(),
            vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
        );
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn edits_during_a_run_do_not_affect_it() {
        let (mut session, probe, _sink) = helpers::silent_session();
        session.set_line_ending(LineEnding::NONE);
        session.add_action("100ms", "a").unwrap();
        session.add_action("0s", "b").unwrap();

        session.start_run().unwrap();
        session.clear_schedule();
        session.add_action("0s", "c").unwrap();

        session.wait_run().await.unwrap().unwrap();
        assert_eq!(probe.writes(), vec![b"a".to_vec(), b"b".to_vec()]);

        session.start_run().unwrap();
        session.wait_run().await.unwrap().unwrap();
        assert_eq!(probe.writes().last().unwrap(), b"c");

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn scheme_applies_at_run_start() {
        let (mut session, probe, _sink) = helpers::silent_session();
        session.set_line_ending(LineEnding::NONE);
        session.add_action("0s", "41 42").unwrap();

        session.start_run().unwrap();
        session.wait_run().await.unwrap().unwrap();

        session.select_scheme("Hex").unwrap();
        session.start_run().unwrap();
        session.wait_run().await.unwrap().unwrap();

        assert_eq!(probe.writes(), vec![b"41 42".to_vec(), b"AB".to_vec()]);
        session.close().await.unwrap();
    }
}

// ============================================================================
// Validation Tests
// ============================================================================

mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn bad_input_is_rejected_and_session_stays_usable() {
        let (mut session, probe, _sink) = helpers::silent_session();
        session.set_scheme(EscapeScheme::Binary);

        assert!(matches!(
            session.add_action("-5s", "01000001"),
            Err(ValidationError::NegativeDuration(_))
        ));
        assert!(matches!(
            session.add_action("soon", "01000001"),
            Err(ValidationError::InvalidDuration(_))
        ));
        assert!(matches!(
            session.add_action("0s", "0100"),
            Err(ValidationError::Escape(_))
        ));
        assert!(matches!(
            session.select_scheme("morse"),
            Err(ValidationError::Escape(_))
        ));
        assert_eq!(session.scheme(), EscapeScheme::Binary);
        assert!(session.schedule().is_empty());

        session.add_action("0s", "01000001").unwrap();
        session.set_line_ending(LineEnding::NONE);
        session.start_run().unwrap();
        session.wait_run().await.unwrap().unwrap();
        assert_eq!(probe.writes(), vec![b"A".to_vec()]);

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn decode_failure_writes_nothing() {
        let (mut session, probe, sink) = helpers::silent_session();
        session.add_action("0s", "fine").unwrap();
        session.add_action("0s", "zz").unwrap();
        session.select_scheme("hex").unwrap();

        let err = session.start_run().unwrap_err();
        assert!(matches!(err, SessionError::Validation(ValidationError::Escape(_))));
        assert!(!session.is_sending());
        assert!(session.wait_run().await.is_none());

        assert_eq!(probe.write_count(), 0);
        assert!(sink.events_in(Direction::Send).is_empty());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn remove_reports_missing_entries() {
        let (mut session, _probe, _sink) = helpers::silent_session();
        session.add_action("0s", "x").unwrap();

        assert_eq!(session.remove_action(0).unwrap().text, "x");
        assert_eq!(
            session.remove_action(0).unwrap_err(),
            ValidationError::NoSuchEntry { index: 0, len: 0 }
        );
        session.close().await.unwrap();
    }
}

// ============================================================================
// Run Control Tests
// ============================================================================

mod run_control_tests {
    use super::*;

    #[tokio::test]
    async fn only_one_run_at_a_time() {
        let (mut session, probe, _sink) = helpers::silent_session();
        session.add_action("10s", "hold").unwrap();

        session.start_run().unwrap();
        assert!(session.is_sending());
        assert!(matches!(
            session.start_run(),
            Err(SessionError::RunInProgress)
        ));

        let cancelled_at = Instant::now();
        session.cancel_run();
        let report = session.wait_run().await.unwrap().unwrap();
        assert!(cancelled_at.elapsed() <= Duration::from_millis(600));
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(probe.write_count(), 1);

        // a new run starts fresh after cancellation
        session.start_run().unwrap();
        assert!(helpers::wait_for(Duration::from_millis(500), || probe.write_count() == 2).await);
        session.close().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn repeat_runs_until_cancelled() {
        let (mut session, probe, _sink) = helpers::silent_session();
        session.set_repeat(true);
        session.add_action("0s", "a").unwrap();
        session.add_action("0s", "b").unwrap();

        session.start_run().unwrap();
        assert!(helpers::wait_for(Duration::from_secs(2), || probe.write_count() >= 20).await);

        session.cancel_run();
        let report = tokio::time::timeout(Duration::from_millis(500), session.wait_run())
            .await
            .expect("repeat run should stop promptly")
            .unwrap()
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert!(report.passes >= 10);

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_interrupts_a_long_hold() {
        let (mut session, probe, _sink) = helpers::silent_session();
        session.add_action("10s", "wait").unwrap();
        session.start_run().unwrap();
        assert!(helpers::wait_for(Duration::from_millis(500), || probe.write_count() == 1).await);

        let start = Instant::now();
        session.close().await.unwrap();

        assert!(start.elapsed() < Duration::from_millis(800));
        assert!(probe.is_closed());
    }

    #[tokio::test]
    async fn write_failure_aborts_run_but_not_session() {
        let (mut session, probe, _sink) = helpers::silent_session();
        session.set_line_ending(LineEnding::NONE);
        session.add_action("0s", "one").unwrap();
        session.add_action("0s", "two").unwrap();

        probe.set_write_error(Some(std::io::ErrorKind::BrokenPipe));
        session.start_run().unwrap();
        let err = session.wait_run().await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Transmit(_)));
        assert_eq!(probe.write_count(), 0);

        probe.set_write_error(None);
        session.start_run().unwrap();
        session.wait_run().await.unwrap().unwrap();
        assert_eq!(probe.writes(), vec![b"one".to_vec(), b"two".to_vec()]);

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_a_session_stops_its_run() {
        let (mut session, probe, _sink) = helpers::silent_session();
        session.set_repeat(true);
        session.add_action("50ms", "tick").unwrap();
        session.start_run().unwrap();
        assert!(helpers::wait_for(Duration::from_millis(500), || probe.write_count() >= 1).await);

        drop(session);
        tokio::time::sleep(Duration::from_millis(600)).await;
        let after_drop = probe.write_count();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(probe.write_count(), after_drop);
    }
}
