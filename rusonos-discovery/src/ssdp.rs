//! SSDP search socket and response parsing.

use std::net::IpAddr;

use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::error::Result;

const MULTICAST_GROUP: &str = "239.255.255.250:1900";
const SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:ZonePlayer:1";

/// One parsed SSDP search response.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SsdpResponse {
    /// Address the datagram came from; this is the player itself, so it is
    /// what we key the identity cache on.
    pub source_ip: IpAddr,
    pub location: Option<String>,
    pub server: Option<String>,
    pub usn: Option<String>,
}

impl SsdpResponse {
    /// Only ZonePlayers should answer given the search target, but a
    /// misbehaving device could respond anyway, so require a Sonos build
    /// string in the SERVER header.
    pub fn is_sonos(&self) -> bool {
        self.server
            .as_deref()
            .map(|server| server.to_ascii_lowercase().contains("sonos/"))
            .unwrap_or(false)
    }
}

/// An in-flight M-SEARCH: the socket with the search datagram already sent.
pub(crate) struct SsdpSearch {
    socket: UdpSocket,
}

impl SsdpSearch {
    /// Bind a search socket and multicast the M-SEARCH datagram.
    pub async fn begin() -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        // UPnP v1.0 requires a multicast TTL of 4.
        socket.set_multicast_ttl_v4(4)?;

        let request = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {MULTICAST_GROUP}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: 1\r\n\
             ST: {SEARCH_TARGET}\r\n\
             USER-AGENT: rusonos/0.1 UPnP/1.0\r\n\
             \r\n"
        );
        tracing::debug!(group = MULTICAST_GROUP, "multicasting M-SEARCH");
        socket.send_to(request.as_bytes(), MULTICAST_GROUP).await?;

        Ok(Self { socket })
    }

    /// Wait for the next parseable response, or `None` once `deadline`
    /// passes. Unparseable datagrams are skipped, not fatal.
    pub async fn next_response(&self, deadline: Instant) -> Result<Option<SsdpResponse>> {
        let mut buffer = [0u8; 2048];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let received =
                tokio::time::timeout(remaining, self.socket.recv_from(&mut buffer)).await;
            match received {
                Err(_) => return Ok(None),
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok((size, source))) => {
                    let Ok(text) = std::str::from_utf8(&buffer[..size]) else {
                        tracing::debug!(%source, "non-UTF-8 SSDP datagram, skipping");
                        continue;
                    };
                    return Ok(Some(parse_response(source.ip(), text)));
                }
            }
        }
    }
}

/// Parse the header lines of an SSDP response.
fn parse_response(source_ip: IpAddr, text: &str) -> SsdpResponse {
    let mut response = SsdpResponse {
        source_ip,
        location: None,
        server: None,
        usn: None,
    };

    for line in text.lines() {
        let line = line.trim();
        if let Some(value) = header_value(line, "LOCATION:") {
            response.location = Some(value);
        } else if let Some(value) = header_value(line, "SERVER:") {
            response.server = Some(value);
        } else if let Some(value) = header_value(line, "USN:") {
            response.usn = Some(value);
        }
    }
    response
}

/// Extract the value of a `HEADER: value` line, ignoring header case.
fn header_value(line: &str, header: &str) -> Option<String> {
    if line.len() > header.len() && line[..header.len()].eq_ignore_ascii_case(header) {
        Some(line[header.len()..].trim().to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    const SONOS_RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
        CACHE-CONTROL: max-age = 1800\r\n\
        EXT:\r\n\
        LOCATION: http://192.168.1.100:1400/xml/device_description.xml\r\n\
        SERVER: Linux UPnP/1.0 Sonos/26.1-76230 (ZPS3)\r\n\
        ST: urn:schemas-upnp-org:device:ZonePlayer:1\r\n\
        USN: uuid:RINCON_B8E937000100::urn:schemas-upnp-org:device:ZonePlayer:1\r\n\
        \r\n";

    #[test]
    fn parses_a_real_response() {
        let response = parse_response(ip("192.168.1.100"), SONOS_RESPONSE);
        assert_eq!(
            response.location.as_deref(),
            Some("http://192.168.1.100:1400/xml/device_description.xml")
        );
        assert!(response.is_sonos());
        assert!(response.usn.as_deref().unwrap().starts_with("uuid:RINCON_"));
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let text = "HTTP/1.1 200 OK\r\n\
            location: http://192.168.1.101:1400/xml/device_description.xml\r\n\
            server: Linux UPnP/1.0 Sonos/70.3-35220\r\n\
            \r\n";
        let response = parse_response(ip("192.168.1.101"), text);
        assert!(response.is_sonos());
        assert!(response.location.is_some());
    }

    #[test]
    fn non_sonos_responders_are_rejected() {
        let text = "HTTP/1.1 200 OK\r\n\
            LOCATION: http://192.168.1.1:5000/rootDesc.xml\r\n\
            SERVER: SomeRouter UPnP/1.0\r\n\
            \r\n";
        let response = parse_response(ip("192.168.1.1"), text);
        assert!(!response.is_sonos());
    }

    #[test]
    fn missing_server_header_is_rejected() {
        let response = parse_response(ip("192.168.1.2"), "HTTP/1.1 200 OK\r\n\r\n");
        assert!(!response.is_sonos());
    }

    #[tokio::test]
    async fn next_response_times_out_cleanly() {
        // A bound socket with nothing sent to it: the deadline must win.
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let search = SsdpSearch { socket };
        let deadline = Instant::now() + std::time::Duration::from_millis(50);
        let result = search.next_response(deadline).await.unwrap();
        assert!(result.is_none());
    }
}
