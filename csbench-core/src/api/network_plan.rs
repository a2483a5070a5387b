use std::net::Ipv4Addr;

use rand::Rng;

/// Addressing and VLAN for one shared network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPlan {
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub start_ip: Ipv4Addr,
    pub end_ip: Ipv4Addr,
    pub vlan: u16,
}

/// Carves block `index` of size `2^(32 - mask)` out of `subnet`.
///
/// For `10.10.0.0/22`: index 0 is gateway `10.10.0.1`, range `10.10.0.2 - 10.10.3.255`;
/// index 1 is gateway `10.10.4.1`, range `10.10.4.2 - 10.10.7.255`.
/// Returns `None` when the block would overflow the address space.
pub fn addressing(
    subnet: Ipv4Addr,
    mask: u8,
    index: u32,
) -> Option<(Ipv4Addr, Ipv4Addr, Ipv4Addr, Ipv4Addr)> {
    if !(1..=30).contains(&mask) {
        return None;
    }
    let block: u32 = 1u32 << (32 - u32::from(mask));
    let base = u32::from(subnet);

    let gateway = base.checked_add(index.checked_mul(block)?)?.checked_add(1)?;
    let start = gateway.checked_add(1)?;
    let end = gateway.checked_add(block - 2)?;
    let netmask = u32::MAX << (32 - u32::from(mask));

    Some((
        Ipv4Addr::from(gateway),
        Ipv4Addr::from(netmask),
        Ipv4Addr::from(start),
        Ipv4Addr::from(end),
    ))
}

/// VLAN in `[start, end)`; `start` when the range is empty.
pub fn random_vlan<R: Rng + ?Sized>(rng: &mut R, start: u16, end: u16) -> u16 {
    if end <= start {
        return start;
    }
    rng.gen_range(start..end)
}

pub fn plan<R: Rng + ?Sized>(
    rng: &mut R,
    subnet: Ipv4Addr,
    mask: u8,
    index: u32,
    vlan_range: (u16, u16),
) -> Option<NetworkPlan> {
    let (gateway, netmask, start_ip, end_ip) = addressing(subnet, mask, index)?;
    Some(NetworkPlan {
        gateway,
        netmask,
        start_ip,
        end_ip,
        vlan: random_vlan(rng, vlan_range.0, vlan_range.1),
    })
}
