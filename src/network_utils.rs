use std::net::{IpAddr, Ipv4Addr};

use local_ip_address::{list_afinet_netifas, local_ip};

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInterface {
    pub name: String,
    pub ip: IpAddr,
    pub display_name: String,
}

impl NetworkInterface {
    pub fn new(name: String, ip: IpAddr) -> Self {
        let display_name = format!("{} ({})", friendly_name(&name), ip);
        Self { name, ip, display_name }
    }

    fn priority(&self) -> u8 {
        match (self.ip.is_loopback(), friendly_name(&self.name)) {
            (true, _) => 3,
            (false, "Ethernet") => 0,
            (false, "Wi-Fi") => 1,
            (false, _) => 2,
        }
    }
}

fn friendly_name(name: &str) -> &str {
    match name {
        n if n.starts_with("en") && n.len() <= 4 => "Ethernet",
        n if n.starts_with("eth") => "Ethernet",
        n if n.starts_with("wl") => "Wi-Fi",
        n if n.starts_with("wi") => "Wi-Fi",
        "lo" | "lo0" => "Loopback",
        n if n.contains("docker") => "Docker",
        n if n.contains("vmnet") => "VMware",
        n if n.contains("vbox") => "VirtualBox",
        n if n.contains("bridge") => "Bridge",
        n if n.contains("tap") => "TAP",
        n if n.contains("tun") => "TUN",
        _ => name,
    }
}

/// Interfaces a SIP account can bind to, most likely choice first
pub fn get_available_interfaces(ipv6_enabled: bool) -> Vec<NetworkInterface> {
    let found = list_afinet_netifas().unwrap_or_default();
    sort_interfaces(
        found
            .into_iter()
            .filter(|(_, ip)| ipv6_enabled || ip.is_ipv4())
            .map(|(name, ip)| NetworkInterface::new(name, ip))
            .collect(),
    )
}

fn sort_interfaces(mut interfaces: Vec<NetworkInterface>) -> Vec<NetworkInterface> {
    // Keep loopback only when nothing else is up
    if interfaces.iter().any(|i| !i.ip.is_loopback()) {
        interfaces.retain(|i| !i.ip.is_loopback());
    }
    if interfaces.is_empty() {
        interfaces.push(NetworkInterface::new(
            "lo".to_string(),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
        ));
    }
    interfaces.sort_by_key(NetworkInterface::priority);
    interfaces
}

/// Address advertised in the SIP identity when none is configured
pub fn default_identity_ip() -> String {
    local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn iface(name: &str, ip: IpAddr) -> NetworkInterface {
        NetworkInterface::new(name.to_string(), ip)
    }

    #[test]
    fn ethernet_before_wifi_and_loopback_dropped() {
        let sorted = sort_interfaces(vec![
            iface("lo", IpAddr::V4(Ipv4Addr::LOCALHOST)),
            iface("docker0", IpAddr::V4(Ipv4Addr::new(172, 17, 0, 1))),
            iface("wlan0", IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))),
            iface("eth0", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
        ]);
        let names: Vec<&str> = sorted.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["eth0", "wlan0", "docker0"]);
        assert_eq!(sorted[0].display_name, "Ethernet (10.0.0.2)");
    }

    #[test]
    fn loopback_is_the_fallback() {
        let sorted = sort_interfaces(vec![iface("lo", IpAddr::V6(Ipv6Addr::LOCALHOST))]);
        assert_eq!(sorted.len(), 1);
        assert!(sorted[0].ip.is_loopback());

        let sorted = sort_interfaces(Vec::new());
        assert_eq!(sorted[0].ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
