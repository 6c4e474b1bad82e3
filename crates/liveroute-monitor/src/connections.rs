use anyhow::{Context, Result};
use log::debug;
use netstat2::{get_sockets_info, AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, TcpState};
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use sysinfo::{Pid, System};

/// An established connection as seen in the OS connection table.
/// Normalizes a remote endpoint so IPv4 peers on dual-stack sockets share
/// one key with their plain form. Local and unspecified peers yield `None`.
pub fn traceable_remote(remote: IpAddr) -> Option<IpAddr> {
    let remote = remote.to_canonical();
    if remote.is_unspecified() || remote.is_loopback() {
        return None;
    }
    Some(remote)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub remote: IpAddr,
    pub pid: Option<u32>,
}

pub trait ConnectionSource: Send + Sync {
    fn established(&self) -> Result<Vec<Connection>>;

    /// Best-effort name of the process owning `pid`.
    fn process_name(&self, _pid: u32) -> Option<String> {
        None
    }
}

/// Reads TCP sockets through `netstat2` and names owners with `sysinfo`.
pub struct SystemConnections {
    system: Mutex<System>,
}

impl SystemConnections {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemConnections {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionSource for SystemConnections {
    fn established(&self) -> Result<Vec<Connection>> {
        let sockets = get_sockets_info(
            AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6,
            ProtocolFlags::TCP,
        )
        .context("failed to read connection table")?;

        let connections: Vec<Connection> = sockets
            .into_iter()
            .filter_map(|socket| match socket.protocol_socket_info {
                ProtocolSocketInfo::Tcp(tcp) if matches!(tcp.state, TcpState::Established) => {
                    Some(Connection {
                        remote: traceable_remote(tcp.remote_addr)?,
                        pid: socket.associated_pids.first().copied(),
                    })
                }
                _ => None,
            })
            .collect();

        debug!("{} established connections", connections.len());
        Ok(connections)
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        let pid = Pid::from_u32(pid);
        if !system.refresh_process(pid) {
            return None;
        }
        system.process(pid).map(|process| process.name().to_string())
    }
}
