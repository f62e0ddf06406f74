/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::os::fd::RawFd;

use log::trace;
use tokio::net::{lookup_host, TcpStream};

use via_types::net::{ConnectError, Host, UpstreamAddr};

use super::TcpConnectError;

/// Connect to `ups`, trying every resolved address in order.
///
/// A failed connect to `::1` is skipped quietly so a following IPv4
/// address can still win; otherwise the first failure is what gets
/// reported when no address works out.
pub(crate) async fn tcp_connect_to(ups: &UpstreamAddr) -> Result<TcpStream, TcpConnectError> {
    let addrs: Vec<SocketAddr> = match ups.host() {
        Host::Ip(ip) => vec![SocketAddr::new(*ip, ups.port())],
        Host::Domain(domain) => lookup_host((domain.as_str(), ups.port()))
            .await
            .map_err(TcpConnectError::ResolveFailed)?
            .collect(),
    };
    if addrs.is_empty() {
        return Err(TcpConnectError::NoAddressConnected);
    }

    let mut first_err: Option<ConnectError> = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(e) => {
                if addr.ip() == IpAddr::V6(Ipv6Addr::LOCALHOST) {
                    trace!("skipped unreachable [::1]:{}", addr.port());
                    continue;
                }
                if first_err.is_none() {
                    first_err = Some(ConnectError::from(e));
                }
            }
        }
    }
    match first_err {
        Some(e) => Err(TcpConnectError::ConnectFailed(e)),
        None => Err(TcpConnectError::NoAddressConnected),
    }
}

/// Toggle `SO_KEEPALIVE` on an already connected socket.
pub(crate) fn set_tcp_keepalive(fd: RawFd, enable: bool) -> io::Result<()> {
    let val: libc::c_int = libc::c_int::from(enable);
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            std::ptr::from_ref(&val).cast(),
            size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
