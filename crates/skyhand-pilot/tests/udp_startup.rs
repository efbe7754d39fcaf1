use std::sync::{Arc, Mutex};
use std::time::Duration;

use skyhand_fc::udp::UdpLink;
use skyhand_fc::{LinkConfig, SafetyGate, SafetyThresholds};
use skyhand_pilot::{startup, StartupError};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

fn free_udp_port() -> u16 {
    std::net::UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

/// Fake vehicle that acknowledges everything and, once in SDK mode, reports
/// `state` on the state port a little after its reply. Returns the command
/// port and the commands it received.
async fn vehicle(state: &'static str, state_port: u16) -> (u16, Arc<Mutex<Vec<String>>>) {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = sock.local_addr().unwrap().port();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        loop {
            let (n, from) = sock.recv_from(&mut buf).await.unwrap();
            let cmd = String::from_utf8_lossy(&buf[..n]).to_string();
            log.lock().unwrap().push(cmd.clone());
            sock.send_to(b"ok", from).await.unwrap();
            if cmd == "command" {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    let s = UdpSocket::bind("127.0.0.1:0").await.unwrap();
                    s.send_to(state.as_bytes(), ("127.0.0.1", state_port)).await.unwrap();
                });
            }
        }
    });
    (port, seen)
}

fn link_to(command_port: u16, state_port: u16) -> UdpLink {
    UdpLink::new(LinkConfig {
        host: "127.0.0.1".into(),
        command_port,
        state_port,
        state_wait_ms: Some(1_000),
        ..LinkConfig::default()
    })
}

#[tokio::test]
async fn critical_battery_reported_after_ack_blocks_streaming() {
    let state_port = free_udp_port();
    let (port, seen) = vehicle("templ:40;temph:42;h:0;bat:5;time:0;", state_port).await;
    let mut link = link_to(port, state_port);

    let gate = SafetyGate::new(SafetyThresholds::default());
    let result = startup(&mut link, &gate, Duration::ZERO, &CancellationToken::new()).await;

    assert!(matches!(result, Err(StartupError::CriticalBattery(_))), "got {:?}", result);
    assert!(!seen.lock().unwrap().iter().any(|c| c == "streamon"));
}

#[tokio::test]
async fn healthy_vehicle_starts_streaming() {
    let state_port = free_udp_port();
    let (port, seen) = vehicle("templ:40;temph:42;h:0;bat:76;time:0;", state_port).await;
    let mut link = link_to(port, state_port);

    let gate = SafetyGate::new(SafetyThresholds::default());
    let battery = startup(&mut link, &gate, Duration::ZERO, &CancellationToken::new()).await.unwrap();

    assert_eq!(battery, Some(76));
    assert_eq!(*seen.lock().unwrap(), vec!["command".to_string(), "streamon".to_string()]);
}
