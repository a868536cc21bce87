//! Backbone TMF agent over UDP

use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};

use futures::{SinkExt, StreamExt};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::udp::UdpFramed;
use tracing::{debug, error, info, warn};

use crate::bbr::BackboneTransport;
use crate::core::{BackboneConfig, Error, Result};
use crate::protocol::{Message, MessageCodec, MessageInfo};

/// Sends TMF messages on the backbone link
///
/// The socket lives in a task on the current tokio runtime; `send` only
/// queues, so the manager never waits on I/O.
pub struct UdpBackboneAgent {
    config: BackboneConfig,
    outbound: Option<mpsc::UnboundedSender<(Message, MessageInfo)>>,
    task: Option<JoinHandle<()>>,
}

impl UdpBackboneAgent {
    /// Creates a stopped agent
    pub fn new(config: BackboneConfig) -> Self {
        UdpBackboneAgent {
            config,
            outbound: None,
            task: None,
        }
    }

    /// Returns whether the socket task is running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().map_or(false, |task| !task.is_finished())
    }

    fn bind(&self) -> Result<std::net::UdpSocket> {
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_only_v6(true)?;
        socket.set_reuse_address(true)?;
        socket.set_multicast_if_v6(self.config.interface_index)?;
        socket.set_multicast_hops_v6(u32::from(self.config.hop_limit))?;
        socket.set_nonblocking(true)?;

        let addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, self.config.port, 0, 0);
        socket
            .bind(&SocketAddr::V6(addr).into())
            .map_err(|e| Error::transport(format!("failed to bind backbone port {}: {}", self.config.port, e)))?;

        Ok(socket.into())
    }
}

impl BackboneTransport for UdpBackboneAgent {
    fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let handle = Handle::try_current().map_err(|e| Error::invalid_state(format!("no tokio runtime: {}", e)))?;
        let std_socket = self.bind()?;
        let socket = {
            let _guard = handle.enter();
            UdpSocket::from_std(std_socket)?
        };

        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);
        self.task = Some(handle.spawn(run_socket(socket, rx)));
        info!(port = self.config.port, "backbone agent listening");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.outbound = None;
        if let Some(task) = self.task.take() {
            task.abort();
            info!("backbone agent stopped");
        }
        Ok(())
    }

    fn send(&mut self, message: Message, info: &MessageInfo) -> Result<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| Error::invalid_state("backbone agent is not started"))?;
        outbound
            .send((message, info.clone()))
            .map_err(|_| Error::transport("backbone agent task has exited"))
    }
}

impl Drop for UdpBackboneAgent {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_socket(socket: UdpSocket, mut outbound: mpsc::UnboundedReceiver<(Message, MessageInfo)>) {
    let mut framed = UdpFramed::new(socket, MessageCodec::new());

    loop {
        tokio::select! {
            queued = outbound.recv() => {
                let Some((message, info)) = queued else { break };
                if info.hop_limit != 0 {
                    if let Err(e) = SockRef::from(framed.get_ref()).set_multicast_hops_v6(u32::from(info.hop_limit)) {
                        warn!(error = %e, "failed to set multicast hop limit");
                    }
                }
                let dest = SocketAddr::V6(SocketAddrV6::new(info.peer_addr, info.peer_port, 0, 0));
                if let Err(e) = framed.send((message, dest)).await {
                    warn!(%dest, error = %e, "backbone send failed");
                }
            }
            inbound = framed.next() => match inbound {
                Some(Ok((message, from))) => {
                    debug!(%from, path = ?message.uri_path, code = %message.code, "backbone message ignored");
                }
                Some(Err(e)) => debug!(error = %e, "undecodable backbone datagram"),
                None => {
                    error!("backbone socket closed");
                    break;
                }
            },
        }
    }
}
