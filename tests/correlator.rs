//! Request/response correlation over a stub transport.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use openwire::{
    Command,
    Transport,
    TransportError,
    commands::{BrokerError, KeepAliveInfo, Response, ResponseBody, ShutdownInfo},
    transport::ResponseCorrelator,
};
use openwire_testing::{RecordingListener, StubTransport};
use rstest::{fixture, rstest};

struct Harness {
    stub: Arc<StubTransport>,
    correlator: Arc<ResponseCorrelator>,
    listener: Arc<RecordingListener>,
}

#[fixture]
fn harness() -> Harness {
    let stub = StubTransport::new();
    let correlator = ResponseCorrelator::new(stub.clone());
    let listener = RecordingListener::new();
    correlator.set_transport_listener(listener.clone());
    Harness {
        stub,
        correlator,
        listener,
    }
}

fn keep_alive() -> Command { KeepAliveInfo::default().into() }

#[rstest]
#[tokio::test]
async fn oneway_assigns_ids_without_requesting_a_response(harness: Harness) {
    harness.correlator.start().await.expect("start");
    harness.correlator.oneway(keep_alive()).await.expect("first");
    harness.correlator.oneway(keep_alive()).await.expect("second");

    let sent = harness.stub.sent();
    assert_eq!(
        sent.iter().map(Command::command_id).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(sent.iter().all(|c| !c.is_response_required()));
    assert!(harness.stub.is_started());
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ids_are_unique(harness: Harness) {
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let correlator = Arc::clone(&harness.correlator);
            tokio::spawn(async move {
                for _ in 0..25 {
                    correlator.oneway(keep_alive()).await.expect("oneway");
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task");
    }
    let ids: HashSet<u32> = harness.stub.sent().iter().map(Command::command_id).collect();
    assert_eq!(ids.len(), 200);
    assert_eq!(ids.iter().copied().min(), Some(1));
    assert_eq!(ids.iter().copied().max(), Some(200));
}

#[rstest]
#[tokio::test]
async fn responses_complete_requests_in_any_order(harness: Harness) {
    let first = harness
        .correlator
        .async_request(keep_alive(), None)
        .await
        .expect("first");
    let second = harness
        .correlator
        .async_request(keep_alive(), None)
        .await
        .expect("second");
    assert_eq!(harness.correlator.pending_requests(), 2);

    let sent = harness.stub.sent();
    assert!(sent.iter().all(Command::is_response_required));
    harness.stub.deliver(Response::ack(second.command_id()));
    harness.stub.deliver(Response::ack(first.command_id()));

    let second_id = second.command_id();
    let first_id = first.command_id();
    assert_eq!(second.wait().await.expect("second").correlation_id, second_id);
    assert_eq!(first.wait().await.expect("first").correlation_id, first_id);
    assert_eq!(harness.correlator.pending_requests(), 0);
    assert!(harness.listener.commands().is_empty());
}

#[rstest]
#[tokio::test]
async fn callbacks_run_when_the_response_lands(harness: Harness) {
    let seen = Arc::new(AtomicU32::new(0));
    let observed = Arc::clone(&seen);
    let future = harness
        .correlator
        .async_request(
            keep_alive(),
            Some(Box::new(move |response: &Response| {
                observed.store(response.correlation_id, Ordering::SeqCst);
            })),
        )
        .await
        .expect("request");
    harness.stub.deliver(Response::ack(future.command_id()));
    assert_eq!(seen.load(Ordering::SeqCst), future.command_id());
    future.wait().await.expect("response");
}

#[rstest]
#[tokio::test]
async fn unmatched_responses_are_dropped(harness: Harness) {
    harness.stub.deliver(Response::ack(999));
    assert!(harness.listener.commands().is_empty());
    assert!(harness.listener.errors().is_empty());
    assert_eq!(harness.correlator.pending_requests(), 0);
}

#[rstest]
#[tokio::test]
async fn other_commands_reach_the_listener(harness: Harness) {
    harness.stub.deliver(ShutdownInfo::default());
    let commands = harness.listener.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].is_shutdown_info());
}

#[rstest]
#[tokio::test]
async fn timed_out_requests_leave_no_residue(harness: Harness) {
    let err = harness
        .correlator
        .request_timeout(keep_alive(), Duration::from_millis(50))
        .await
        .expect_err("no response");
    let TransportError::Timeout { command_id, waited } = err else {
        panic!("expected timeout, got {err:?}");
    };
    assert_eq!(waited, Duration::from_millis(50));
    assert!(!harness.correlator.is_pending(command_id));

    // A late response is simply unmatched.
    harness.stub.deliver(Response::ack(command_id));
    assert!(harness.listener.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn plain_requests_wait_the_configured_default() {
    let stub = StubTransport::new();
    let correlator = ResponseCorrelator::with_timeout(stub.clone(), Duration::from_millis(20));
    let chain: Arc<dyn Transport> = correlator.clone();
    chain.set_transport_listener(RecordingListener::new());
    assert_eq!(correlator.default_request_timeout(), Duration::from_millis(20));

    let err = chain.request(keep_alive()).await.expect_err("no response");
    assert!(
        matches!(err, TransportError::Timeout { waited, .. } if waited == Duration::from_millis(20)),
        "{err:?}"
    );
    assert_eq!(correlator.pending_requests(), 0);
}

#[rstest]
#[tokio::test]
async fn exception_responses_fail_the_request_and_notify(harness: Harness) {
    let future = harness
        .correlator
        .async_request(keep_alive(), None)
        .await
        .expect("request");
    let error = BrokerError::new("javax.jms.InvalidDestinationException", "no such queue");
    harness
        .stub
        .deliver(Response::exception(future.command_id(), error.clone()));

    let response = future.wait().await.expect("response delivered");
    assert_eq!(response.error(), Some(&error));
    let errors = harness.listener.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("no such queue"), "{errors:?}");
}

#[rstest]
#[tokio::test]
async fn exception_responses_without_details_still_notify(harness: Harness) {
    let future = harness
        .correlator
        .async_request(keep_alive(), None)
        .await
        .expect("request");
    harness.stub.deliver(Response {
        correlation_id: future.command_id(),
        body: ResponseBody::Exception(None),
        ..Response::default()
    });

    let response = future.wait().await.expect("response delivered");
    assert!(response.is_exception());
    assert_eq!(response.error(), None);
    let errors = harness.listener.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("UnknownException"), "{errors:?}");
}

#[rstest]
#[tokio::test]
async fn failed_sends_withdraw_the_request(harness: Harness) {
    harness.stub.fail_writes();
    let err = harness
        .correlator
        .request(keep_alive())
        .await
        .expect_err("write fails");
    assert!(matches!(err, TransportError::Io(_)));
    assert_eq!(harness.correlator.pending_requests(), 0);
}

#[rstest]
#[tokio::test]
async fn closed_correlator_rejects_work(harness: Harness) {
    harness.correlator.close().await.expect("close");
    assert!(harness.correlator.is_closed());
    assert!(matches!(
        harness.correlator.oneway(keep_alive()).await,
        Err(TransportError::Closed)
    ));
    assert!(matches!(
        harness.correlator.request(keep_alive()).await,
        Err(TransportError::Closed)
    ));
    // Closing twice is harmless.
    harness.correlator.close().await.expect("second close");
}

#[rstest]
#[tokio::test]
async fn start_requires_a_listener() {
    let correlator = ResponseCorrelator::new(StubTransport::new());
    assert!(matches!(
        correlator.start().await,
        Err(TransportError::NoListener)
    ));
}

#[rstest]
#[tokio::test]
async fn chain_can_be_narrowed(harness: Harness) {
    let link: &dyn Transport = harness.correlator.as_ref();
    assert!(link.narrow::<ResponseCorrelator>().is_some());
    assert!(link.narrow::<StubTransport>().is_some());
    assert!(matches!(
        link.reconnect(&"tcp://elsewhere:61616".parse().expect("url")).await,
        Err(TransportError::Unsupported("reconnect"))
    ));
}
