//! Reporting task driving the real TCP transport against a local listener

#![cfg(test)]

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use sensornode_connectors::{TcpConfig, TcpTransport};
use sensornode_core::{
    BackoffPolicy, DigitalInputs, Endpoint, NodeContext, Outcome, ReportingTask, Sample, TransportFailure,
};

fn transport() -> TcpTransport {
    TcpTransport::new(
        TcpConfig::new()
            .connect_timeout(Duration::from_secs(2))
            .receive_timeout(Duration::from_secs(5)),
    )
    .expect("valid config")
}

#[test]
fn test_sample_reaches_endpoint() {
    let _ = env_logger::builder().is_test(true).try_init();

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request_line = String::new();
        let mut reader = BufReader::new(&stream);
        reader.read_line(&mut request_line).expect("request line");
        let mut rest = String::new();
        while reader.read_line(&mut rest).expect("header") > 2 {}
        stream.write_all(b"HTTP/1.1 200 OK\r\n\r\n1").expect("respond");
        request_line
    });

    let context = NodeContext::default();
    context
        .mailbox()
        .produce(Sample::new([1000, 1050, 900, 1200], DigitalInputs::new(0b0101)));

    let endpoint = Endpoint {
        host: "127.0.0.1",
        port,
        ..Endpoint::thingspeak()
    }
    .with_api_key("TESTKEY");
    let mut reporting = ReportingTask::new(&context, transport(), endpoint);

    let iteration = reporting.run_iteration();
    assert!(matches!(iteration.outcome, Some(Outcome::Delivered(d)) if d.is_accepted()));
    assert_eq!(iteration.delay, BackoffPolicy::new().delivered);

    let request_line = server.join().expect("server thread");
    assert_eq!(
        request_line,
        "GET /update?api_key=TESTKEY&field1=1000&field2=1050&field3=900&field4=1200 HTTP/1.1\r\n"
    );
    assert_eq!(reporting.transport().stats().delivered, 1);
}

#[test]
fn test_refused_endpoint_paced_by_connect_delay() {
    let port = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("free port")
        .port();

    let context = NodeContext::default();
    let endpoint = Endpoint {
        host: "127.0.0.1",
        port,
        ..Endpoint::thingspeak()
    };
    let mut reporting = ReportingTask::new(&context, transport(), endpoint);

    for _ in 0..3 {
        context.mailbox().produce(Sample::default());
        let iteration = reporting.run_iteration();
        assert_eq!(iteration.outcome, Some(Outcome::Failed(TransportFailure::Connect)));
        assert_eq!(iteration.delay, BackoffPolicy::new().connect);
    }
    assert_eq!(reporting.stats().failures_of(TransportFailure::Connect), 3);
}
