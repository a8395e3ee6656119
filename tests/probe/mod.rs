use crate::{response, GetProber, BAD_REQUEST, HOST, OK, OPTIONS_DOT, OPTIONS_STAR};
use http_pipelining::status::ParseError;
use http_pipelining::{probe, supported, Error, OptionsProber, Prober};
use std::io;
use tokio_test::io::Builder;
use tokio_test::{assert_err, assert_ok};

// The mock only hands out a read once every write scripted before it has happened, so each of
// these also checks that all requests go out before any response is read.

#[tokio::test]
async fn in_order_responses() {
    let mut stream = Builder::new()
        .write(OPTIONS_STAR)
        .write(OPTIONS_DOT)
        .read(OK)
        .read(BAD_REQUEST)
        .build();

    assert!(assert_ok!(supported(&mut stream, HOST).await));
}

#[tokio::test]
async fn responses_in_one_segment() {
    let mut stream = Builder::new()
        .write(OPTIONS_STAR)
        .write(OPTIONS_DOT)
        .read(&[OK, BAD_REQUEST].concat())
        .build();

    assert!(assert_ok!(supported(&mut stream, HOST).await));
}

#[tokio::test]
async fn responses_with_bodies() {
    let mut stream = Builder::new()
        .write(OPTIONS_STAR)
        .write(OPTIONS_DOT)
        .read(&response(200, "OK", "GET, HEAD, OPTIONS"))
        .read(&response(400, "Bad Request", "<h1>Bad Request</h1>"))
        .build();

    assert!(assert_ok!(supported(&mut stream, HOST).await));
}

#[tokio::test]
async fn out_of_order_responses() {
    let mut stream = Builder::new()
        .write(OPTIONS_STAR)
        .write(OPTIONS_DOT)
        .read(BAD_REQUEST)
        .read(OK)
        .build();

    assert!(!assert_ok!(supported(&mut stream, HOST).await));
}

#[tokio::test]
async fn unexpected_status() {
    let mut stream = Builder::new()
        .write(OPTIONS_STAR)
        .write(OPTIONS_DOT)
        .read(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n")
        .read(BAD_REQUEST)
        .build();

    assert!(!assert_ok!(supported(&mut stream, HOST).await));
}

#[tokio::test]
async fn closed_after_first_response() {
    let mut stream = Builder::new()
        .write(OPTIONS_STAR)
        .write(OPTIONS_DOT)
        .read(OK)
        .build();

    assert!(!assert_ok!(supported(&mut stream, HOST).await));
}

#[tokio::test]
async fn closed_without_response() {
    let mut stream = Builder::new()
        .write(OPTIONS_STAR)
        .write(OPTIONS_DOT)
        .build();

    assert!(!assert_ok!(supported(&mut stream, HOST).await));
}

#[tokio::test]
async fn garbage_is_fatal() {
    let mut stream = Builder::new()
        .write(OPTIONS_STAR)
        .write(OPTIONS_DOT)
        .read(b"GARBAGE\r\n\r\n")
        .build();

    let e = assert_err!(supported(&mut stream, HOST).await);
    assert!(
        matches!(
            e,
            Error::MalformedResponse {
                id: 0,
                source: ParseError::InvalidStatusLine
            }
        ),
        "{:?}",
        e
    );
}

#[tokio::test]
async fn truncated_second_response() {
    for partial in [
        &b"HTTP/1.1 40"[..],
        b"HTTP/1.1 400 Bad Request\r\nServer: x\r\n",
        b"HTTP/1.1 400 Bad Request\r\nContent-Length: 20\r\n\r\ntoo short",
    ] {
        let mut stream = Builder::new()
            .write(OPTIONS_STAR)
            .write(OPTIONS_DOT)
            .read(OK)
            .read(partial)
            .build();

        assert!(
            !assert_ok!(supported(&mut stream, HOST).await),
            "{:?}",
            String::from_utf8_lossy(partial)
        );
    }
}

#[tokio::test]
async fn truncated_first_response() {
    let mut stream = Builder::new()
        .write(OPTIONS_STAR)
        .write(OPTIONS_DOT)
        .read(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nab")
        .build();

    assert!(!assert_ok!(supported(&mut stream, HOST).await));
}

#[tokio::test]
async fn options_prober_rejects_unknown_ids() {
    let prober = OptionsProber::new(HOST);

    let mut sink: Vec<u8> = Vec::new();
    let e = assert_err!(prober.write_request(2, &mut sink).await);
    assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
    assert!(sink.is_empty());

    let mut empty = &b""[..];
    let e = assert_err!(prober.read_response(2, &mut empty).await);
    assert!(matches!(e, Error::UnknownRequest(2)), "{:?}", e);
}

#[tokio::test]
async fn write_failure_is_fatal() {
    let mut stream = Builder::new()
        .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"))
        .build();

    let e = assert_err!(supported(&mut stream, HOST).await);
    match e {
        Error::Write { id, source } => {
            assert_eq!(id, 1);
            assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
        }
        e => panic!("expected a write error, got {:?}", e),
    }
}

#[tokio::test]
async fn empty_host() {
    let mut stream = Builder::new().build();
    assert!(matches!(
        supported(&mut stream, "").await,
        Err(Error::MissingHost)
    ));
}

#[tokio::test]
async fn custom_prober() {
    let prober = GetProber::new([("/", 200), ("/missing", 404), ("/moved", 301)]);
    let mut stream = Builder::new()
        .write(&prober.request(0))
        .write(&prober.request(1))
        .write(&prober.request(2))
        .read(&response(200, "OK", "index"))
        .read(&response(404, "Not Found", ""))
        .read(&response(301, "Moved Permanently", "elsewhere"))
        .build();

    assert!(assert_ok!(probe(&mut stream, &prober).await));
}

#[tokio::test]
async fn custom_prober_mismatch_keeps_reading() {
    let prober = GetProber::new([("/", 200), ("/missing", 404), ("/moved", 301)]);
    let mut stream = Builder::new()
        .write(&prober.request(0))
        .write(&prober.request(1))
        .write(&prober.request(2))
        .read(&response(200, "OK", "index"))
        .read(&response(200, "OK", "not what was asked for"))
        .read(&response(301, "Moved Permanently", ""))
        .build();

    // the mock panics on drop if the third response was left unread
    assert!(!assert_ok!(probe(&mut stream, &prober).await));
}

#[tokio::test]
async fn no_requests() {
    let prober = GetProber::new([]);
    let mut stream = Builder::new().build();

    assert!(assert_ok!(probe(&mut stream, &prober).await));
}

#[tokio::test]
async fn trait_object_prober() {
    let prober: Box<dyn Prober> = Box::new(OptionsProber::new(HOST));
    let mut stream = Builder::new()
        .write(OPTIONS_STAR)
        .write(OPTIONS_DOT)
        .read(OK)
        .read(BAD_REQUEST)
        .build();

    assert!(assert_ok!(probe(&mut stream, &*prober).await));
}
