//! SOAP action client and raw HTTP request helper.

use std::collections::HashMap;
use std::time::Duration;

use xmltree::Element;

use crate::error::{Result, UpnpError};
use crate::service::{error_description, Service};

/// Response to a raw HTTP request issued through [`SoapClient::request`].
///
/// Header names are stored lowercased so lookups are case-insensitive, the
/// way GENA peers expect them to be treated.
#[derive(Debug, Clone)]
pub struct UpnpResponse {
    pub status: u16,
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl UpnpResponse {
    /// Look up a header value, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client for sending SOAP actions and raw HTTP requests to UPnP devices.
///
/// Wraps one shared `reqwest::Client`, so every clone reuses the same
/// connection pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: reqwest::Client,
}

impl SoapClient {
    /// Create a new client with sane timeouts for LAN devices.
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self { http }
    }

    /// Send a SOAP action to a device and return the response arguments.
    ///
    /// `base_url` is the player's base URL (with trailing slash); the
    /// control path comes from the service descriptor. `args` are wrapped as
    /// `<Name>value</Name>` elements with XML escaping applied to values.
    ///
    /// A `200` response is unwrapped into a map of output arguments. A `500`
    /// response is required by UPnP to carry a SOAP fault, which is parsed
    /// and surfaced as [`UpnpError::Upnp`]. Anything else is
    /// [`UpnpError::Http`].
    pub async fn send_command(
        &self,
        base_url: &str,
        service: Service,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<HashMap<String, String>> {
        let info = service.info();
        let url = format!("{base_url}{}", info.control_path);
        let body = build_envelope(info.service_type, action, args);
        let soap_action = format!("\"{}#{}\"", info.service_type, action);

        tracing::debug!(%url, action, "sending SOAP action");

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "text/xml; charset=\"utf-8\"")
            .header("SOAPACTION", &soap_action)
            .body(body)
            .send()
            .await
            .map_err(|e| UpnpError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| UpnpError::Network(e.to_string()))?;

        match status {
            200 => unwrap_arguments(&text),
            500 => Err(parse_fault(&url, &text)),
            _ => Err(UpnpError::Http { url, status }),
        }
    }

    /// Issue a raw HTTP request with an arbitrary method.
    ///
    /// This is the escape hatch for the GENA verbs (SUBSCRIBE, UNSUBSCRIBE),
    /// which reqwest has no shorthand for. The status is returned as-is;
    /// callers decide which statuses are acceptable.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<UpnpResponse> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|e| UpnpError::Network(format!("invalid HTTP method {method}: {e}")))?;

        let mut request = self.http.request(method, url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpnpError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let mut header_map = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                header_map.insert(name.as_str().to_ascii_lowercase(), value.to_string());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpnpError::Network(e.to_string()))?
            .to_vec();

        Ok(UpnpResponse {
            status,
            headers: header_map,
            body,
        })
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the SOAP envelope for one action.
fn build_envelope(service_type: &str, action: &str, args: &[(&str, &str)]) -> String {
    let mut arguments = String::new();
    for (name, value) in args {
        arguments.push_str(&format!("<{name}>{}</{name}>", escape_xml(value)));
    }
    format!(
        "<?xml version=\"1.0\"?>\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"\
         \u{20}s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">\
         <s:Body>\
         <u:{action} xmlns:u=\"{service_type}\">{arguments}</u:{action}>\
         </s:Body>\
         </s:Envelope>"
    )
}

/// Escape a value for inclusion in XML element content.
fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Extract the output arguments from a successful SOAP response.
///
/// The first child of the Body element is `<action>Response`; its children
/// are the output arguments, mapped tag -> text.
fn unwrap_arguments(xml: &str) -> Result<HashMap<String, String>> {
    let tree = Element::parse(xml.as_bytes()).map_err(|e| UpnpError::Parse(e.to_string()))?;
    let body = tree
        .get_child("Body")
        .ok_or_else(|| UpnpError::Parse("missing SOAP Body".to_string()))?;
    let response = body
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .next()
        .ok_or_else(|| UpnpError::Parse("empty SOAP Body".to_string()))?;

    let mut result = HashMap::new();
    for child in response.children.iter().filter_map(|node| node.as_element()) {
        let text = child.get_text().map(|t| t.into_owned()).unwrap_or_default();
        result.insert(child.name.clone(), text);
    }
    Ok(result)
}

/// Dissect a UPnP fault response into a typed error.
///
/// Only the errorCode matters; devices rarely fill in errorDescription, so
/// the description comes from the static UPnP error table instead.
fn parse_fault(url: &str, xml: &str) -> UpnpError {
    let tree = match Element::parse(xml.as_bytes()) {
        Ok(tree) => tree,
        Err(e) => return UpnpError::Parse(format!("unparseable fault body: {e}")),
    };

    match find_descendant(&tree, "errorCode").and_then(|el| {
        el.get_text()
            .and_then(|text| text.trim().parse::<u16>().ok())
    }) {
        Some(code) => UpnpError::Upnp {
            url: url.to_string(),
            code,
            description: error_description(code),
        },
        None => UpnpError::Parse(format!("fault response without errorCode from {url}")),
    }
}

/// Depth-first search for the first descendant element with the given local
/// name.
fn find_descendant<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    for child in element.children.iter().filter_map(|node| node.as_element()) {
        if child.name == name {
            return Some(child);
        }
        if let Some(found) = find_descendant(child, name) {
            return Some(found);
        }
    }
    None
}
