//! Static descriptors for the UPnP services exposed by Sonos players.

/// The UPnP services this library can control and subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Zone group topology: household structure, diagnostics, updates.
    ZoneGroupTopology,

    /// Transport control: play, pause, stop, seek, queue manipulation.
    AVTransport,

    /// Audio rendering: volume, mute, EQ.
    RenderingControl,

    /// The music library and queue browser.
    ContentDirectory,

    /// The Sonos queue service.
    Queue,
}

/// Endpoint paths and the service type URN for one [`Service`].
///
/// All paths are relative to the player's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// The UPnP service type URN used in SOAPACTION headers.
    pub service_type: &'static str,

    /// The control endpoint for SOAP actions.
    pub control_path: &'static str,

    /// The event subscription endpoint for GENA SUBSCRIBE/UNSUBSCRIBE.
    pub event_path: &'static str,

    /// The service control protocol description document.
    pub scpd_path: &'static str,
}

impl Service {
    /// The service name as it appears in URNs and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Service::ZoneGroupTopology => "ZoneGroupTopology",
            Service::AVTransport => "AVTransport",
            Service::RenderingControl => "RenderingControl",
            Service::ContentDirectory => "ContentDirectory",
            Service::Queue => "Queue",
        }
    }

    /// The endpoint and URN information for this service.
    pub fn info(&self) -> ServiceInfo {
        match self {
            Service::ZoneGroupTopology => ServiceInfo {
                service_type: "urn:schemas-upnp-org:service:ZoneGroupTopology:1",
                control_path: "ZoneGroupTopology/Control",
                event_path: "ZoneGroupTopology/Event",
                scpd_path: "xml/ZoneGroupTopology1.xml",
            },
            Service::AVTransport => ServiceInfo {
                service_type: "urn:schemas-upnp-org:service:AVTransport:1",
                control_path: "MediaRenderer/AVTransport/Control",
                event_path: "MediaRenderer/AVTransport/Event",
                scpd_path: "xml/AVTransport1.xml",
            },
            Service::RenderingControl => ServiceInfo {
                service_type: "urn:schemas-upnp-org:service:RenderingControl:1",
                control_path: "MediaRenderer/RenderingControl/Control",
                event_path: "MediaRenderer/RenderingControl/Event",
                scpd_path: "xml/RenderingControl1.xml",
            },
            Service::ContentDirectory => ServiceInfo {
                service_type: "urn:schemas-upnp-org:service:ContentDirectory:1",
                control_path: "MediaServer/ContentDirectory/Control",
                event_path: "MediaServer/ContentDirectory/Event",
                scpd_path: "xml/ContentDirectory1.xml",
            },
            Service::Queue => ServiceInfo {
                service_type: "urn:schemas-sonos-com:service:Queue:1",
                control_path: "MediaRenderer/Queue/Control",
                event_path: "MediaRenderer/Queue/Event",
                scpd_path: "xml/Queue1.xml",
            },
        }
    }
}

/// Human-readable descriptions of the UPnP error codes from table 3.3 of the
/// UPnP Device Architecture, plus the 6xx range defined for services.
/// Codes above 800 are vendor specific and come back with an empty
/// description.
pub(crate) fn error_description(code: u16) -> &'static str {
    match code {
        400 => "Bad Request",
        401 => "Invalid Action",
        402 => "Invalid Args",
        404 => "Invalid Var",
        412 => "Precondition Failed",
        501 => "Action Failed",
        600 => "Argument Value Invalid",
        601 => "Argument Value Out of Range",
        602 => "Optional Action Not Implemented",
        603 => "Out Of Memory",
        604 => "Human Intervention Required",
        605 => "String Argument Too Long",
        606 => "Action Not Authorized",
        607 => "Signature Failure",
        608 => "Signature Missing",
        609 => "Not Encrypted",
        610 => "Invalid Sequence",
        611 => "Invalid Control URL",
        612 => "No Such Session",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_paths() {
        let info = Service::AVTransport.info();
        assert_eq!(info.control_path, "MediaRenderer/AVTransport/Control");
        assert_eq!(info.event_path, "MediaRenderer/AVTransport/Event");
        assert_eq!(
            info.service_type,
            "urn:schemas-upnp-org:service:AVTransport:1"
        );

        let info = Service::ZoneGroupTopology.info();
        assert_eq!(info.control_path, "ZoneGroupTopology/Control");
        assert_eq!(info.event_path, "ZoneGroupTopology/Event");
    }

    #[test]
    fn queue_service_uses_sonos_urn() {
        assert_eq!(
            Service::Queue.info().service_type,
            "urn:schemas-sonos-com:service:Queue:1"
        );
    }

    #[test]
    fn all_services_have_info() {
        for service in [
            Service::ZoneGroupTopology,
            Service::AVTransport,
            Service::RenderingControl,
            Service::ContentDirectory,
            Service::Queue,
        ] {
            let info = service.info();
            assert!(info.scpd_path.starts_with("xml/"));
            assert!(info.service_type.contains(service.name()));
        }
    }

    #[test]
    fn error_descriptions() {
        assert_eq!(error_description(401), "Invalid Action");
        assert_eq!(error_description(412), "Precondition Failed");
        assert_eq!(error_description(714), "");
        assert_eq!(error_description(800), "");
    }
}
