//! Log output of the transport filters, captured with `logtest`.

use log::Level;
use openwire::{
    Transport,
    commands::{BrokerError, KeepAliveInfo, Response, ShutdownInfo},
    transport::{LoggingTransport, ResponseCorrelator},
};
use openwire_testing::{LoggerHandle, RecordingListener, StubTransport, logger};
use rstest::rstest;

#[rstest]
#[tokio::test]
async fn command_tracing_logs_both_directions(mut logger: LoggerHandle) {
    let stub = StubTransport::new();
    let tracing_filter = LoggingTransport::new(stub.clone());
    tracing_filter.set_transport_listener(RecordingListener::new());

    tracing_filter
        .oneway(KeepAliveInfo::default().into())
        .await
        .expect("oneway");
    assert!(logger.contains(Level::Debug, "SEND: KeepAliveInfo"));

    stub.deliver(ShutdownInfo::default());
    assert!(logger.contains(Level::Debug, "RECV: ShutdownInfo"));
}

#[rstest]
#[tokio::test]
async fn unmatched_responses_are_logged_at_debug(mut logger: LoggerHandle) {
    let stub = StubTransport::new();
    let correlator = ResponseCorrelator::new(stub.clone());
    correlator.set_transport_listener(RecordingListener::new());

    stub.deliver(Response::ack(41));
    assert!(logger.contains(Level::Debug, "no pending request"));
}

#[rstest]
#[tokio::test]
async fn exception_responses_are_logged_as_warnings(mut logger: LoggerHandle) {
    let stub = StubTransport::new();
    let correlator = ResponseCorrelator::new(stub.clone());
    correlator.set_transport_listener(RecordingListener::new());
    let future = correlator
        .async_request(KeepAliveInfo::default().into(), None)
        .await
        .expect("request");

    stub.deliver(Response::exception(
        future.command_id(),
        BrokerError::new("java.lang.SecurityException", "denied"),
    ));
    assert!(logger.contains(Level::Warn, "broker returned an exception"));
}
