//! Pairing token generation and the host's advertised identity.

use std::net::{IpAddr, Ipv4Addr};

use deskbridge_protocol::PairingInfo;
use deskbridge_protocol::constants::TOKEN_LENGTH;
use rand::Rng;

/// Token alphabet: lowercase ASCII letters and digits.
const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a random pairing token of [`TOKEN_LENGTH`] characters.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LENGTH)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}

/// Compares a device-supplied token with the process token byte for byte.
///
/// Runs in constant time for equal-length inputs.
pub fn validate_token(received: &str, expected: &str) -> bool {
    if received.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in received.bytes().zip(expected.bytes()) {
        diff |= a ^ b;
    }
    diff == 0
}

/// Returns the first non-loopback, non-link-local IPv4 address, falling
/// back to `127.0.0.1`.
pub fn local_ip() -> IpAddr {
    if_addrs::get_if_addrs()
        .unwrap_or_default()
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .find_map(|iface| match iface.addr.ip() {
            IpAddr::V4(ip) if !ip.is_link_local() => Some(IpAddr::V4(ip)),
            _ => None,
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Creates the process-wide pairing identity with a fresh token.
pub fn issue_pairing_info(port: u16) -> PairingInfo {
    PairingInfo {
        server_ip: local_ip().to_string(),
        port_no: port,
        pairing_token: generate_token(),
    }
}
