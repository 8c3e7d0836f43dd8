//! End-to-end tests: OSC datagrams over UDP through the router and command
//! queue into the arbiter

mod helpers;

use helpers::{StatusLine, TestArbiter};
use mediarb::server::ControlServer;
use mediarb::status::StatusReporter;
use mediarb_common::Router;
use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Harness {
    t: TestArbiter,
    addr: SocketAddr,
    client: UdpSocket,
    stop: Option<oneshot::Sender<()>>,
    server: JoinHandle<mediarb::Result<()>>,
}

impl Harness {
    async fn start() -> Self {
        let t = TestArbiter::start().await;
        let (queue, _worker) = t.arbiter.spawn_worker(16);
        let router = Router::from_config(t.arbiter.config());
        let reporter = Arc::clone(&t.reporter) as Arc<dyn StatusReporter>;

        let server = ControlServer::bind("127.0.0.1:0", router, queue, reporter)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(server.run(async move {
            let _ = stopped.await;
        }));

        let client = UdpSocket::bind("127.0.0.1:0").unwrap();

        Self {
            t,
            addr,
            client,
            stop: Some(stop),
            server,
        }
    }

    fn send_packet(&self, packet: &OscPacket) {
        let datagram = rosc::encoder::encode(packet).unwrap();
        self.client.send_to(&datagram, self.addr).unwrap();
    }

    fn send(&self, address: &str) {
        self.send_packet(&OscPacket::Message(OscMessage {
            addr: address.to_string(),
            args: vec![],
        }));
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.server.await.unwrap().unwrap();
    }
}

fn success(text: &str) -> StatusLine {
    StatusLine::Success(text.to_string())
}

fn error(text: &str) -> StatusLine {
    StatusLine::Error(text.to_string())
}

#[tokio::test]
async fn test_track_and_language_addresses() {
    let h = Harness::start().await;

    h.send("/medieval");
    assert!(h.t.reporter.wait_for(success("Music changed to medieval")).await);

    h.send("/anglais");
    assert!(h.t.reporter.wait_for(success("Language set to anglais")).await);

    h.send("/music/futur");
    assert!(h.t.reporter.wait_for(success("Music changed to futur")).await);
    assert_eq!(h.t.background().as_deref(), Some("futur"));

    h.stop().await;
}

#[tokio::test]
async fn test_arguments_are_ignored() {
    let h = Harness::start().await;

    h.send_packet(&OscPacket::Message(OscMessage {
        addr: "/medieval".to_string(),
        args: vec![OscType::Int(1), OscType::String("x".to_string())],
    }));
    assert!(h.t.reporter.wait_for(success("Music changed to medieval")).await);

    h.stop().await;
}

#[tokio::test]
async fn test_bundle_messages_run_in_order() {
    let h = Harness::start().await;

    let message = |addr: &str| {
        OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args: vec![],
        })
    };
    h.send_packet(&OscPacket::Bundle(OscBundle {
        timetag: OscTime::from((0, 1)),
        content: vec![message("/anglais"), message("/medieval")],
    }));

    assert!(h.t.reporter.wait_for(success("Music changed to medieval")).await);
    assert_eq!(
        h.t.reporter.lines(),
        vec![
            success("Language set to anglais"),
            success("Music changed to medieval"),
        ]
    );

    h.stop().await;
}

#[tokio::test]
async fn test_explicit_form_with_unknown_name() {
    let h = Harness::start().await;

    h.send("/music/jazz");
    assert!(h.t.reporter.wait_for(error("No such sound: jazz")).await);

    h.send("/effect/boom");
    assert!(h.t.reporter.wait_for(error("No such effect: boom")).await);

    h.send("/source/deutsch");
    assert!(h.t.reporter.wait_for(error("No path to set for language: deutsch")).await);

    h.stop().await;
}

#[tokio::test]
async fn test_bad_input_is_reported() {
    let h = Harness::start().await;

    h.client.send_to(b"definitely not osc", h.addr).unwrap();
    assert!(
        helpers::wait_until(|| h
            .t
            .reporter
            .lines()
            .iter()
            .any(|l| matches!(l, StatusLine::Error(e) if e.starts_with("Invalid OSC packet"))))
        .await
    );

    h.send("/a/b/c");
    assert!(
        h.t.reporter
            .wait_for(error("Malformed address '/a/b/c': too many path segments"))
            .await
    );

    h.send("/music");
    assert!(
        h.t.reporter
            .wait_for(error("Address '/music' is missing its track parameter"))
            .await
    );

    h.stop().await;
}

#[tokio::test]
async fn test_unmapped_address_is_silent() {
    let h = Harness::start().await;

    h.send("/lights/on");
    h.send("/nothing");
    h.send("/medieval");
    assert!(h.t.reporter.wait_for(success("Music changed to medieval")).await);

    assert_eq!(h.t.reporter.lines(), vec![success("Music changed to medieval")]);

    h.stop().await;
}

#[tokio::test]
async fn test_video_then_reset_over_udp() {
    let h = Harness::start().await;

    h.send("/video");
    assert!(h.t.launcher.wait_for_launches(1).await);

    h.send("/video");
    assert!(h.t.reporter.wait_for(error("Video is already playing")).await);

    h.send("/reset");
    assert!(h.t.reporter.wait_for(success("Reset complete")).await);
    assert_eq!(h.t.launcher.launch_count(), 1);
    assert_eq!(h.t.background().as_deref(), Some("futur"));

    h.stop().await;
}
