//! mediarb-send - send one command address to a running arbiter
//!
//! ```text
//! mediarb-send /medieval
//! mediarb-send /video --host 10.0.0.5 --port 9999
//! ```

use std::net::UdpSocket;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rosc::{OscMessage, OscPacket};

/// Command-line arguments for mediarb-send
#[derive(Parser, Debug)]
#[command(name = "mediarb-send")]
#[command(about = "Send an OSC command to the media arbiter")]
#[command(version)]
struct Args {
    /// Command address, e.g. /futur, /anglais, /effet1, /video, /reset
    address: String,

    /// Arbiter host
    #[arg(long, default_value = "127.0.0.1", env = "MEDIARB_HOST")]
    host: String,

    /// Arbiter control port
    #[arg(short, long, default_value = "9999", env = "MEDIARB_PORT")]
    port: u16,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if !args.address.starts_with('/') {
        bail!("Address must start with '/': {}", args.address);
    }

    let packet = OscPacket::Message(OscMessage {
        addr: args.address.clone(),
        args: vec![],
    });
    let datagram = rosc::encoder::encode(&packet)
        .map_err(|e| anyhow::anyhow!("Failed to encode OSC message: {}", e))?;

    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to open UDP socket")?;
    let target = format!("{}:{}", args.host, args.port);
    socket
        .send_to(&datagram, &target)
        .with_context(|| format!("Failed to send to {}", target))?;

    println!("Sent {} to {}", args.address, target);
    Ok(())
}
