#![cfg(feature = "metrics")]
//! Tests for `openwire` metrics helpers and the counters the transport
//! chain maintains.
//!
//! Counters are read back through `metrics_util::debugging::DebuggingRecorder`.

use std::time::Duration;

use openwire::{
    Transport,
    TransportError,
    commands::{KeepAliveInfo, Response},
    metrics::{self as ow_metrics, Direction},
    transport::ResponseCorrelator,
};
use openwire_testing::{RecordingListener, StubTransport, counter_value, gauge_value, recorder};
use rstest::rstest;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime")
        .block_on(future)
}

#[rstest]
#[case(Direction::Inbound, "inbound")]
#[case(Direction::Outbound, "outbound")]
fn frame_metric_is_labelled_by_direction(#[case] direction: Direction, #[case] label: &str) {
    let (snapshotter, recorder) = recorder();
    metrics::with_local_recorder(&recorder, || ow_metrics::inc_frames(direction));
    assert_eq!(
        counter_value(&snapshotter, ow_metrics::FRAMES_TOTAL, Some(("direction", label))),
        Some(1)
    );
}

#[test]
fn error_metric_is_labelled_by_kind() {
    let (snapshotter, recorder) = recorder();
    metrics::with_local_recorder(&recorder, || {
        ow_metrics::inc_errors("protocol");
        ow_metrics::inc_errors("protocol");
    });
    assert_eq!(
        counter_value(&snapshotter, ow_metrics::ERRORS_TOTAL, Some(("kind", "protocol"))),
        Some(2)
    );
}

#[test]
fn timed_out_requests_are_counted() {
    let (snapshotter, recorder) = recorder();
    metrics::with_local_recorder(&recorder, || {
        block_on(async {
            let correlator = ResponseCorrelator::new(StubTransport::new());
            let err = correlator
                .request_timeout(KeepAliveInfo::default().into(), Duration::from_millis(10))
                .await
                .expect_err("timeout");
            assert!(matches!(err, TransportError::Timeout { .. }));
        });
    });
    assert_eq!(
        counter_value(&snapshotter, ow_metrics::REQUEST_TIMEOUTS_TOTAL, None),
        Some(1)
    );
    assert_eq!(gauge_value(&snapshotter, ow_metrics::PENDING_REQUESTS), Some(0.0));
}

#[test]
fn pending_gauge_tracks_outstanding_requests() {
    let (snapshotter, recorder) = recorder();
    metrics::with_local_recorder(&recorder, || {
        block_on(async {
            let stub = StubTransport::new();
            let correlator = ResponseCorrelator::new(stub.clone());
            correlator.set_transport_listener(RecordingListener::new());
            let first = correlator
                .async_request(KeepAliveInfo::default().into(), None)
                .await
                .expect("first");
            let _second = correlator
                .async_request(KeepAliveInfo::default().into(), None)
                .await
                .expect("second");
            stub.deliver(Response::ack(first.command_id()));
            first.wait().await.expect("response");
        });
    });
    // One fulfilled, one withdrawn when its future was dropped.
    assert_eq!(gauge_value(&snapshotter, ow_metrics::PENDING_REQUESTS), Some(0.0));
}
