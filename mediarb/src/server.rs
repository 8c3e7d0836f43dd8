//! OSC control server
//!
//! Receives OSC 1.0 packets over UDP. Every message address (bundles are
//! flattened recursively) is routed to a command and queued for the arbiter.
//! Message arguments are ignored; parameters travel in the address.

use crate::arbiter::CommandQueue;
use crate::error::{Error, Result};
use crate::status::StatusReporter;
use mediarb_common::Router;
use rosc::OscPacket;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Largest datagram accepted
const MAX_DATAGRAM: usize = 65_536;

/// UDP listener feeding the command queue
pub struct ControlServer {
    socket: UdpSocket,
    router: Router,
    queue: CommandQueue,
    reporter: Arc<dyn StatusReporter>,
}

impl ControlServer {
    /// Bind the control socket
    pub async fn bind(
        addr: &str,
        router: Router,
        queue: CommandQueue,
        reporter: Arc<dyn StatusReporter>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            Error::Osc(format!("Failed to bind control socket {}: {}", addr, e))
        })?;

        info!(
            "Control channel listening on udp://{} ({} routes)",
            socket.local_addr()?,
            router.len()
        );

        Ok(Self {
            socket,
            router,
            queue,
            reporter,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Control channel stopped");
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => self.handle_datagram(&buf[..len], peer),
                    Err(e) => warn!("Control socket receive failed: {}", e),
                }
            }
        }
    }

    fn handle_datagram(&self, datagram: &[u8], peer: SocketAddr) {
        match rosc::decoder::decode_udp(datagram) {
            Ok((_, packet)) => {
                let mut addresses = Vec::new();
                collect_addresses(packet, &mut addresses);
                for address in addresses {
                    self.handle_address(&address, peer);
                }
            }
            Err(e) => {
                warn!("Undecodable datagram from {}: {}", peer, e);
                self.reporter
                    .report_error(&format!("Invalid OSC packet from {}: {}", peer, e));
            }
        }
    }

    fn handle_address(&self, address: &str, peer: SocketAddr) {
        match self.router.route(address) {
            Ok(Some(command)) => {
                debug!("{} from {} -> {}", address, peer, command);
                self.queue.submit(command);
            }
            Ok(None) => debug!("Ignoring unmapped address {} from {}", address, peer),
            Err(e) => self.reporter.report_error(&e.to_string()),
        }
    }
}

/// Message addresses in packet order
fn collect_addresses(packet: OscPacket, out: &mut Vec<String>) {
    match packet {
        OscPacket::Message(message) => out.push(message.addr),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                collect_addresses(inner, out);
            }
        }
    }
}
