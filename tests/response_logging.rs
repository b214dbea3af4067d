//! Failed responses are logged with the resolved viewer.

mod common;

use std::{
    io,
    sync::{Arc, Mutex},
};

use axum::http::StatusCode;
use tracing_subscriber::fmt::MakeWriter;

use common::TestApp;

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().expect("log buffer").clone()).expect("utf-8 logs")
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn client_errors_are_logged_with_viewer() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = TestApp::new();
    app.user("leo").await;

    let response = app.get("/posts/999/", Some("leo")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let output = logs.contents();
    let line = output
        .lines()
        .find(|line| line.contains("client request error"))
        .expect("404 logged");
    assert!(line.contains("viewer=\"leo\""), "{line}");
    assert!(line.contains("status=404"), "{line}");
}

#[tokio::test]
async fn anonymous_failures_log_empty_viewer() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = TestApp::new();

    let response = app.get("/no/such/page/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let output = logs.contents();
    let line = output
        .lines()
        .find(|line| line.contains("client request error"))
        .expect("404 logged");
    assert!(line.contains("viewer=\"\""), "{line}");
}
