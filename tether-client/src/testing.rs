//! In-process counterpart used by the client tests

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use tether_protocol::{methods, EventEnvelope, Frame, FrameCodec, Request, Response};
use tether_utils::ConnectionDescriptor;

use crate::config::ClientConfig;
use crate::connection::{Session, SessionOptions};

pub(crate) const TEST_TOKEN: &str = "test-token";

/// Counterpart end of one accepted connection
pub(crate) struct MockPeer {
    framed: Framed<TcpStream, FrameCodec>,
}

impl MockPeer {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self {
            framed: Framed::new(stream, FrameCodec::new()),
        }
    }

    /// Next request from the client; `None` once it hangs up
    pub(crate) async fn recv_request(&mut self) -> Option<Request> {
        loop {
            match self.framed.next().await {
                Some(Ok(Frame::Request(request))) => return Some(request),
                Some(Ok(_)) => continue,
                _ => return None,
            }
        }
    }

    pub(crate) async fn send(&mut self, frame: Frame) {
        self.framed.send(frame).await.unwrap();
    }

    pub(crate) async fn respond(&mut self, id: &str, result: Value) {
        self.send(Frame::Response(Response::success(id, result))).await;
    }

    pub(crate) async fn push(&mut self, event: &str, data: Value) {
        self.send(Frame::Event(EventEnvelope::new(event, data))).await;
    }

    /// Write bytes that bypass the codec
    pub(crate) async fn send_raw(&mut self, line: &str) {
        let stream = self.framed.get_mut();
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
    }

    /// Answer the client's `auth.login`
    pub(crate) async fn accept_login(&mut self) {
        let request = self.recv_request().await.unwrap();
        assert_eq!(request.method, methods::AUTH_LOGIN);
        assert_eq!(request.params["token"], json!(TEST_TOKEN));
        self.respond(
            &request.id,
            json!({
                "protocol_version": 1,
                "server_version": "0.0.0-test",
                "session_id": "session-1",
            }),
        )
        .await;
    }
}

pub(crate) async fn listen() -> (TcpListener, ConnectionDescriptor) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, ConnectionDescriptor::new("127.0.0.1", port, TEST_TOKEN))
}

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig::default().with_request_timeout(Duration::from_secs(2))
}

/// Connect a session to a fresh peer that has accepted the login
pub(crate) async fn connect_pair_with(config: ClientConfig) -> (Session, MockPeer) {
    let (listener, descriptor) = listen().await;
    let accept = async {
        let (stream, _) = listener.accept().await.unwrap();
        let mut peer = MockPeer::new(stream);
        peer.accept_login().await;
        peer
    };
    let options = SessionOptions::default().with_config(config);
    let (session, peer) = tokio::join!(Session::connect_with(descriptor, options), accept);
    (session.unwrap(), peer)
}

pub(crate) async fn connect_pair() -> (Session, MockPeer) {
    connect_pair_with(test_config()).await
}

/// Serve every non-login request with `responder` until the client leaves
///
/// The responder returns the frames to write back, in order.
pub(crate) fn serve<F>(mut peer: MockPeer, mut responder: F) -> JoinHandle<Vec<Request>>
where
    F: FnMut(&Request) -> Vec<Frame> + Send + 'static,
{
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(request) = peer.recv_request().await {
            for frame in responder(&request) {
                peer.send(frame).await;
            }
            seen.push(request);
        }
        seen
    })
}

pub(crate) fn ok(request: &Request, result: Value) -> Frame {
    Frame::Response(Response::success(request.id.as_str(), result))
}

pub(crate) fn fail(request: &Request, code: &str, message: &str) -> Frame {
    Frame::Response(Response::failure(request.id.as_str(), code, message, None))
}

pub(crate) fn event(name: &str, data: Value) -> Frame {
    Frame::Event(EventEnvelope::new(name, data))
}
