//! Local interface discovery: which IPv4 are we, and where does a subnet
//! broadcast go. Both degrade gracefully on odd hosts (loopback-only
//! machines, containers without a netmask).

use std::net::{IpAddr, Ipv4Addr};

use if_addrs::IfAddr;

/// Primary IPv4 of this host; loopback when nothing better exists.
pub fn local_ip() -> Ipv4Addr {
    match local_ip_address::local_ip() {
        Ok(IpAddr::V4(ip)) => ip,
        _ => Ipv4Addr::LOCALHOST,
    }
}

/// Subnet broadcast address of the primary interface, falling back to the
/// limited broadcast address.
pub fn broadcast_address() -> Ipv4Addr {
    if let Ok(interfaces) = if_addrs::get_if_addrs() {
        for iface in interfaces {
            if iface.is_loopback() {
                continue;
            }
            if let IfAddr::V4(v4) = iface.addr {
                if let Some(bcast) = v4.broadcast {
                    return bcast;
                }
                return Ipv4Addr::from(u32::from(v4.ip) | !u32::from(v4.netmask));
            }
        }
    }
    Ipv4Addr::BROADCAST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ip_is_v4() {
        // whatever the host looks like, we get *some* usable IPv4
        let ip = local_ip();
        assert!(!ip.is_multicast());
    }

    #[test]
    fn broadcast_address_is_not_loopback() {
        let bcast = broadcast_address();
        assert!(!bcast.is_loopback());
    }
}
