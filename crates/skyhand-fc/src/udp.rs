use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use skyhand_proto::VelocityCommand;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::link::{FlightLink, LinkError};
use crate::LinkConfig;

/// Fields of one vehicle state datagram we care about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateFields {
    pub battery: Option<u8>,
    pub temperature: Option<i32>,
    pub height: Option<i32>,
    pub flight_time: Option<u32>,
}

/// Parses `key:value;` pairs, e.g. `templ:60;temph:62;h:30;bat:87;time:12;`.
/// Temperature is the mean of the low and high readings.
pub fn parse_state(datagram: &str) -> StateFields {
    let mut out = StateFields::default();
    let (mut templ, mut temph) = (None::<i32>, None::<i32>);

    for pair in datagram.trim().split(';') {
        let Some((key, value)) = pair.split_once(':') else { continue };
        let value = value.trim();
        match key.trim() {
            "bat" => out.battery = value.parse::<u8>().ok().filter(|b| *b <= 100),
            "templ" => templ = value.parse().ok(),
            "temph" => temph = value.parse().ok(),
            "h" => out.height = value.parse().ok(),
            "time" => out.flight_time = value.parse().ok(),
            _ => {}
        }
    }
    out.temperature = match (templ, temph) {
        (Some(l), Some(h)) => Some((l + h) / 2),
        (l, h) => l.or(h),
    };
    out
}

#[derive(Default)]
struct StateCache {
    latest: Option<(Instant, StateFields)>,
}

/// Vehicle SDK over UDP: plain-text commands with `ok`/`error` replies, and
/// telemetry from the state datagrams the vehicle broadcasts once it has
/// entered SDK mode.
pub struct UdpLink {
    cfg: LinkConfig,
    cmd: Option<UdpSocket>,
    state: Arc<Mutex<StateCache>>,
    /// Count of state datagrams received since bind.
    packets: Option<watch::Receiver<u64>>,
    state_port: u16,
    listener: Option<JoinHandle<()>>,
}

impl UdpLink {
    pub fn new(cfg: LinkConfig) -> Self {
        Self {
            cfg,
            cmd: None,
            state: Arc::new(Mutex::new(StateCache::default())),
            packets: None,
            state_port: 0,
            listener: None,
        }
    }

    async fn bind(&mut self) -> Result<(), LinkError> {
        let sock = UdpSocket::bind(("0.0.0.0", self.cfg.local_command_port)).await?;
        sock.connect((self.cfg.host.as_str(), self.cfg.command_port)).await?;
        info!("command socket {} -> {}:{}", sock.local_addr()?, self.cfg.host, self.cfg.command_port);
        self.cmd = Some(sock);

        let state_sock = UdpSocket::bind(("0.0.0.0", self.cfg.state_port)).await?;
        self.state_port = state_sock.local_addr()?.port();
        let (seen, packets) = watch::channel(0u64);
        self.packets = Some(packets);
        let cache = self.state.clone();
        self.listener = Some(tokio::spawn(async move {
            let mut buf = vec![0u8; 1518];
            loop {
                let len = match state_sock.recv(&mut buf).await {
                    Ok(n) => n,
                    Err(e) => {
                        warn!("state socket recv: {}", e);
                        continue;
                    }
                };
                let fields = parse_state(&String::from_utf8_lossy(&buf[..len]));
                if let Ok(mut c) = cache.lock() {
                    c.latest = Some((Instant::now(), fields));
                }
                seen.send_modify(|n| *n += 1);
            }
        }));
        Ok(())
    }

    /// Sends one command and waits for its reply.
    async fn command(&mut self, op: &str) -> Result<(), LinkError> {
        let wait = self.cfg.response_timeout();
        let sock = self.cmd.as_ref().ok_or(LinkError::NotConnected)?;

        // drop replies that arrived after an earlier command timed out
        let mut buf = [0u8; 256];
        while sock.try_recv(&mut buf).is_ok() {}

        debug!("-> {}", op);
        sock.send(op.as_bytes()).await?;

        let len = match timeout(wait, sock.recv(&mut buf)).await {
            Ok(r) => r?,
            Err(_) => return Err(LinkError::Timeout { op: op.into(), after: wait }),
        };
        let reply = String::from_utf8_lossy(&buf[..len]).trim().to_string();
        debug!("<- {}", reply);
        if reply.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(LinkError::Rejected { op: op.into(), reply })
        }
    }

    /// Waits until at least one state datagram has arrived.
    async fn await_state(&mut self) -> Result<(), LinkError> {
        let within = self.cfg.state_wait();
        let port = self.state_port;
        let packets = self.packets.as_mut().ok_or(LinkError::NotConnected)?;
        let arrived = timeout(within, packets.wait_for(|n| *n > 0)).await.map_or(false, |r| r.is_ok());
        if !arrived {
            return Err(LinkError::NoStateData { port, within });
        }
        debug!("state datagrams arriving on port {}", port);
        Ok(())
    }

    fn latest(&self, what: &'static str) -> Result<StateFields, LinkError> {
        let max_age = self.cfg.state_max_age();
        let cache = self.state.lock().map_err(|_| LinkError::NoTelemetry(what))?;
        match cache.latest {
            Some((at, fields)) if at.elapsed() <= max_age => Ok(fields),
            _ => Err(LinkError::NoTelemetry(what)),
        }
    }
}

impl Drop for UdpLink {
    fn drop(&mut self) {
        if let Some(h) = self.listener.take() {
            h.abort();
        }
    }
}

#[async_trait]
impl FlightLink for UdpLink {
    async fn connect(&mut self) -> Result<(), LinkError> {
        if self.cmd.is_none() {
            self.bind().await?;
        }
        self.command("command").await?;
        self.await_state().await
    }

    async fn get_battery(&mut self) -> Result<u8, LinkError> {
        self.latest("battery")?.battery.ok_or(LinkError::NoTelemetry("battery"))
    }

    async fn get_temperature(&mut self) -> Result<i32, LinkError> {
        self.latest("temperature")?.temperature.ok_or(LinkError::NoTelemetry("temperature"))
    }

    async fn get_height(&mut self) -> Result<i32, LinkError> {
        self.latest("height")?.height.ok_or(LinkError::NoTelemetry("height"))
    }

    async fn get_flight_time(&mut self) -> Result<u32, LinkError> {
        self.latest("flight time")?.flight_time.ok_or(LinkError::NoTelemetry("flight time"))
    }

    async fn streamon(&mut self) -> Result<(), LinkError> {
        self.command("streamon").await
    }

    async fn streamoff(&mut self) -> Result<(), LinkError> {
        self.command("streamoff").await
    }

    async fn takeoff(&mut self) -> Result<(), LinkError> {
        self.command("takeoff").await
    }

    async fn land(&mut self) -> Result<(), LinkError> {
        self.command("land").await
    }

    async fn emergency_stop(&mut self) -> Result<(), LinkError> {
        self.command("emergency").await
    }

    /// `rc` gets no reply; fire and forget.
    async fn set_velocity(&mut self, cmd: VelocityCommand) -> Result<(), LinkError> {
        let sock = self.cmd.as_ref().ok_or(LinkError::NotConnected)?;
        let (lr, fb, ud, yaw) = cmd.as_tuple();
        sock.send(format!("rc {} {} {} {}", lr, fb, ud, yaw).as_bytes()).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("udp {}:{}", self.cfg.host, self.cfg.command_port)
    }
}
