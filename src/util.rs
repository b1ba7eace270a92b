use std::net::{IpAddr, Ipv4Addr};

use nix::unistd::Uid;

const MONITOR_PORT: &str = "MONITOR_PORT";

pub const DEFAULT_PORT: u16 = 8080;

pub fn get_port() -> u16 {
    let port_from_env = std::env::var(MONITOR_PORT);
    port_from_env.map_or(DEFAULT_PORT, |res| res.parse().unwrap_or(DEFAULT_PORT))
}

const MONITOR_HOST: &str = "MONITOR_HOST";

const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

pub fn get_host() -> IpAddr {
    let host_from_env = std::env::var(MONITOR_HOST);
    host_from_env.map_or(DEFAULT_HOST, |res| res.parse().unwrap_or(DEFAULT_HOST))
}

/// Warning for a monitor started without root, which cannot restart services
pub fn privilege_warning(euid: Uid) -> Option<&'static str> {
    (!euid.is_root()).then_some(
        "not running as root, restarting services and saving logs will likely fail",
    )
}
