//! The embedded HTTP server that receives NOTIFY callbacks.
//!
//! One server instance handles notifications for every subscription in the
//! process. It starts lazily on the first subscribe, bound to the local
//! address the host would use to reach that device (the interface facing
//! the player on a multi-homed host, never a wildcard address), on an
//! ephemeral port chosen by the kernel.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use rusonos_model::{Player, PlayerRegistry};
use rusonos_parsers::parse_event_body;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::http::StatusCode;
use warp::Filter;

use crate::error::{EventError, Result};
use crate::event::Event;
use crate::registry::SubscriptionRegistry;

struct RunningServer {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// HTTP endpoint for inbound UPnP event notifications.
///
/// Lifecycle is one-way: not started → listening → stopped. `ensure_running`
/// is idempotent and safe to race; only the first caller binds.
pub struct EventServer {
    registry: Arc<SubscriptionRegistry>,
    players: Arc<PlayerRegistry>,
    running: tokio::sync::Mutex<Option<RunningServer>>,
    url: parking_lot::RwLock<Option<String>>,
}

impl EventServer {
    pub fn new(registry: Arc<SubscriptionRegistry>, players: Arc<PlayerRegistry>) -> Self {
        Self {
            registry,
            players,
            running: tokio::sync::Mutex::new(None),
            url: parking_lot::RwLock::new(None),
        }
    }

    /// Start the server if it is not already listening.
    ///
    /// The bind address is chosen per the first device we need to hear
    /// from: a throwaway UDP socket is connected toward `player` and its
    /// local endpoint is the interface address we advertise.
    pub async fn ensure_running(&self, player: &Player) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        let local_ip = local_addr_toward(player)?;
        let routes = notify_route(self.registry.clone(), self.players.clone())
            .recover(handle_rejection);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(SocketAddr::new(local_ip, 0), async move {
                shutdown_rx.await.ok();
            })
            .map_err(|e| EventError::ServerStart(e.to_string()))?;

        let task = tokio::spawn(server);
        let url = format!("http://{addr}/");
        tracing::info!(%url, "event server listening");

        *self.url.write() = Some(url);
        *running = Some(RunningServer { shutdown_tx, task });
        Ok(())
    }

    /// The URL devices should NOTIFY, once the server is listening.
    pub fn callback_url(&self) -> Result<String> {
        self.url.read().clone().ok_or(EventError::ServerNotRunning)
    }

    /// Stop the server and wait for in-flight requests to drain.
    pub async fn shutdown(&self) {
        let mut running = self.running.lock().await;
        if let Some(server) = running.take() {
            *self.url.write() = None;
            let _ = server.shutdown_tx.send(());
            let _ = server.task.await;
            tracing::info!("event server stopped");
        }
    }
}

/// The local address this host would use to reach `player`.
///
/// Connecting a datagram socket sends nothing but makes the kernel commit
/// to a route, which is what picks the right interface on a multi-homed
/// host.
fn local_addr_toward(player: &Player) -> Result<IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| EventError::ServerStart(format!("failed to probe local address: {e}")))?;
    socket
        .connect(player.addr())
        .map_err(|e| EventError::ServerStart(format!("failed to probe local address: {e}")))?;
    let local = socket
        .local_addr()
        .map_err(|e| EventError::ServerStart(format!("failed to probe local address: {e}")))?;
    Ok(local.ip())
}

/// Rejection carrying a client error for malformed NOTIFY requests.
#[derive(Debug)]
struct InvalidNotifyHeaders;

impl warp::reject::Reject for InvalidNotifyHeaders {}

/// The server's sole route: NOTIFY on any path.
pub(crate) fn notify_route(
    registry: Arc<SubscriptionRegistry>,
    players: Arc<PlayerRegistry>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::method()
        .and(warp::header::optional::<String>("sid"))
        .and(warp::header::optional::<String>("seq"))
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::bytes())
        .and_then(
            move |method: warp::http::Method,
                  sid: Option<String>,
                  seq: Option<String>,
                  content_type: Option<String>,
                  body: bytes::Bytes| {
                let registry = registry.clone();
                let players = players.clone();
                async move {
                    handle_notify(registry, players, method, sid, seq, content_type, body).await
                }
            },
        )
}

/// Recover rejections into plain status replies.
pub(crate) async fn handle_rejection(
    err: warp::Rejection,
) -> std::result::Result<impl warp::Reply, std::convert::Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found")
    } else if err.find::<InvalidNotifyHeaders>().is_some() {
        (StatusCode::BAD_REQUEST, "invalid NOTIFY headers")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    };
    Ok(warp::reply::with_status(message, code))
}

/// Validate and dispatch one inbound notification.
///
/// Protocol compliance requires acknowledging well-formed NOTIFYs with a
/// success response no matter what happens internally, so unknown SIDs and
/// unparseable bodies are logged and acknowledged. Only requests that are
/// malformed at the HTTP level (wrong verb, wrong content type, missing or
/// garbled SID/SEQ) are rejected, and that happens before the registry is
/// consulted at all.
async fn handle_notify(
    registry: Arc<SubscriptionRegistry>,
    players: Arc<PlayerRegistry>,
    method: warp::http::Method,
    sid: Option<String>,
    seq: Option<String>,
    content_type: Option<String>,
    body: bytes::Bytes,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    if method.as_str() != "NOTIFY" {
        return Err(warp::reject::not_found());
    }

    let xml_content = content_type
        .as_deref()
        .map(|ct| ct.starts_with("text/xml"))
        .unwrap_or(false);
    if !xml_content {
        tracing::debug!(?content_type, "rejecting NOTIFY with non-XML content type");
        return Err(warp::reject::custom(InvalidNotifyHeaders));
    }

    let Some(sid) = sid.filter(|sid| !sid.is_empty()) else {
        tracing::debug!("rejecting NOTIFY without SID header");
        return Err(warp::reject::custom(InvalidNotifyHeaders));
    };
    let Some(seq) = seq.and_then(|seq| seq.trim().parse::<u32>().ok()) else {
        tracing::debug!(%sid, "rejecting NOTIFY without usable SEQ header");
        return Err(warp::reject::custom(InvalidNotifyHeaders));
    };

    let Some(subscription) = registry.lookup(&sid) else {
        // Late delivery after unsubscribe, or an id we never knew. The
        // device still gets its acknowledgment.
        tracing::warn!(%sid, seq, "notification for unknown subscription, dropping");
        return Ok(warp::reply());
    };

    match parse_event_body(&body, &players) {
        Ok(properties) => {
            let event = Event {
                player: subscription.player().clone(),
                service: subscription.service(),
                subscription: subscription.clone(),
                seq,
                properties,
            };
            // Acknowledge the device first: delivery happens on its own
            // task so a slow handler cannot stall the accept loop or the
            // device's retry logic.
            tokio::spawn(async move {
                subscription.handle_event(event);
            });
        }
        Err(e) => {
            tracing::warn!(%sid, seq, error = %e, "undecodable notification body, dropping");
        }
    }

    Ok(warp::reply())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventConfig;
    use crate::subscription::Subscription;
    use rusonos_upnp::{Service, SoapClient};
    use tokio::sync::mpsc;

    const BODY: &str = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
<e:property><LastChange>&lt;Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/"&gt;&lt;InstanceID val="0"&gt;&lt;TransportState val="PLAYING"/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange></e:property>
</e:propertyset>"#;

    struct Fixture {
        registry: Arc<SubscriptionRegistry>,
        players: Arc<PlayerRegistry>,
        events: mpsc::UnboundedReceiver<Event>,
    }

    /// Build a registry holding one subscription under `sid`, with a
    /// handler that forwards every delivered event to a channel.
    fn fixture(sid: &str) -> Fixture {
        let registry = Arc::new(SubscriptionRegistry::new());
        let players = Arc::new(PlayerRegistry::new());
        let server = Arc::new(EventServer::new(registry.clone(), players.clone()));

        let (tx, events) = mpsc::unbounded_channel();
        let subscription = Subscription::new(
            SoapClient::new(),
            EventConfig::default(),
            server,
            registry.clone(),
            players.get_or_create("192.168.1.50:1400".parse().unwrap()),
            Service::AVTransport,
            Box::new(move |event| {
                let _ = tx.send(event);
            }),
        );
        registry.register(sid, subscription);

        Fixture {
            registry,
            players,
            events,
        }
    }

    async fn recv_event(events: &mut mpsc::UnboundedReceiver<Event>) -> Option<Event> {
        tokio::time::timeout(std::time::Duration::from_secs(1), events.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn well_formed_notify_is_dispatched_once() {
        let mut fixture = fixture("uuid:sub-1");
        let route = notify_route(fixture.registry.clone(), fixture.players.clone())
            .recover(handle_rejection);

        let response = warp::test::request()
            .method("NOTIFY")
            .path("/")
            .header("content-type", "text/xml")
            .header("SID", "uuid:sub-1")
            .header("SEQ", "5")
            .body(BODY)
            .reply(&route)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let event = recv_event(&mut fixture.events).await.expect("event delivered");
        assert_eq!(event.seq, 5);
        assert_eq!(
            event.properties["TransportState"].as_text(),
            Some("PLAYING")
        );
        assert!(recv_event(&mut fixture.events).await.is_none());
    }

    #[tokio::test]
    async fn unknown_sid_is_acknowledged_but_not_dispatched() {
        let mut fixture = fixture("uuid:sub-1");
        let route = notify_route(fixture.registry.clone(), fixture.players.clone())
            .recover(handle_rejection);

        let response = warp::test::request()
            .method("NOTIFY")
            .path("/")
            .header("content-type", "text/xml")
            .header("SID", "uuid:someone-else")
            .header("SEQ", "0")
            .body(BODY)
            .reply(&route)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(recv_event(&mut fixture.events).await.is_none());
    }

    #[tokio::test]
    async fn missing_seq_is_rejected_before_dispatch() {
        let mut fixture = fixture("uuid:sub-1");
        let route = notify_route(fixture.registry.clone(), fixture.players.clone())
            .recover(handle_rejection);

        let response = warp::test::request()
            .method("NOTIFY")
            .path("/")
            .header("content-type", "text/xml")
            .header("SID", "uuid:sub-1")
            .body(BODY)
            .reply(&route)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(recv_event(&mut fixture.events).await.is_none());
    }

    #[tokio::test]
    async fn malformed_seq_is_rejected() {
        let fixture = fixture("uuid:sub-1");
        let route = notify_route(fixture.registry.clone(), fixture.players.clone())
            .recover(handle_rejection);

        let response = warp::test::request()
            .method("NOTIFY")
            .path("/")
            .header("content-type", "text/xml")
            .header("SID", "uuid:sub-1")
            .header("SEQ", "not-a-number")
            .body(BODY)
            .reply(&route)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_method_is_not_found() {
        let fixture = fixture("uuid:sub-1");
        let route = notify_route(fixture.registry.clone(), fixture.players.clone())
            .recover(handle_rejection);

        let response = warp::test::request()
            .method("POST")
            .path("/")
            .header("content-type", "text/xml")
            .header("SID", "uuid:sub-1")
            .header("SEQ", "1")
            .body(BODY)
            .reply(&route)
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unparseable_body_is_still_acknowledged() {
        let mut fixture = fixture("uuid:sub-1");
        let route = notify_route(fixture.registry.clone(), fixture.players.clone())
            .recover(handle_rejection);

        let response = warp::test::request()
            .method("NOTIFY")
            .path("/")
            .header("content-type", "text/xml")
            .header("SID", "uuid:sub-1")
            .header("SEQ", "1")
            .body("definitely not xml")
            .reply(&route)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(recv_event(&mut fixture.events).await.is_none());
    }

    #[tokio::test]
    async fn panicking_handler_does_not_poison_the_server() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let players = Arc::new(PlayerRegistry::new());
        let server = Arc::new(EventServer::new(registry.clone(), players.clone()));
        let subscription = Subscription::new(
            SoapClient::new(),
            EventConfig::default(),
            server,
            registry.clone(),
            players.get_or_create("192.168.1.50:1400".parse().unwrap()),
            Service::AVTransport,
            Box::new(|_| panic!("handler bug")),
        );
        registry.register("uuid:panics", subscription);

        let route = notify_route(registry.clone(), players.clone()).recover(handle_rejection);
        for seq in 0..2 {
            let response = warp::test::request()
                .method("NOTIFY")
                .path("/")
                .header("content-type", "text/xml")
                .header("SID", "uuid:panics")
                .header("SEQ", seq.to_string())
                .body(BODY)
                .reply(&route)
                .await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        // Give the spawned deliveries a moment to run (and panic) without
        // taking anything else down.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(registry.lookup("uuid:panics").is_some());
    }

    #[tokio::test]
    async fn callback_url_requires_running_server() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let players = Arc::new(PlayerRegistry::new());
        let server = EventServer::new(registry, players);
        assert!(matches!(
            server.callback_url(),
            Err(EventError::ServerNotRunning)
        ));
    }

    #[tokio::test]
    async fn ensure_running_is_idempotent() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let players = Arc::new(PlayerRegistry::new());
        let server = EventServer::new(registry, players.clone());

        // Loopback player: the probe socket resolves to 127.0.0.1.
        let player = players.get_or_create("127.0.0.1:1400".parse().unwrap());
        server.ensure_running(&player).await.unwrap();
        let url = server.callback_url().unwrap();
        assert!(url.starts_with("http://127.0.0.1:"));

        server.ensure_running(&player).await.unwrap();
        assert_eq!(server.callback_url().unwrap(), url);

        server.shutdown().await;
        assert!(matches!(
            server.callback_url(),
            Err(EventError::ServerNotRunning)
        ));
    }
}
