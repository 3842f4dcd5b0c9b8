//! Shared test fixtures: a mock UPnP device and handler plumbing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rusonos_events::{Event, EventHandler};
use rusonos_model::{Player, PlayerRegistry};
use tokio::sync::mpsc;
use warp::http::StatusCode;
use warp::Filter;

/// Distinguishes SIDs issued by different mock devices within one test.
static DEVICE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Knobs for how the mock device answers.
#[derive(Clone)]
pub struct MockBehavior {
    /// Status for the initial SUBSCRIBE. 200 normally, 503 to simulate a
    /// device refusing subscriptions.
    pub subscribe_status: u16,
    /// Status for UNSUBSCRIBE: 200 normally, 412 for a rebooted device,
    /// 500 for a misbehaving one.
    pub unsubscribe_status: u16,
    /// TIMEOUT header returned on subscribe and renewal.
    pub timeout_header: String,
    /// Return an empty SID header, simulating a malformed response.
    pub blank_sid: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            subscribe_status: 200,
            unsubscribe_status: 200,
            timeout_header: "Second-1800".to_string(),
            blank_sid: false,
        }
    }
}

/// A fake player: answers SUBSCRIBE/UNSUBSCRIBE on a loopback port and
/// counts what it saw.
pub struct MockDevice {
    pub addr: SocketAddr,
    pub subscribes: Arc<AtomicUsize>,
    pub renews: Arc<AtomicUsize>,
    pub unsubscribes: Arc<AtomicUsize>,
    pub last_callback: Arc<Mutex<Option<String>>>,
}

impl MockDevice {
    pub async fn start(behavior: MockBehavior) -> Self {
        let device_id = DEVICE_SEQ.fetch_add(1, Ordering::SeqCst);
        let subscribes = Arc::new(AtomicUsize::new(0));
        let renews = Arc::new(AtomicUsize::new(0));
        let unsubscribes = Arc::new(AtomicUsize::new(0));
        let last_callback = Arc::new(Mutex::new(None));

        let filter = {
            let subscribes = subscribes.clone();
            let renews = renews.clone();
            let unsubscribes = unsubscribes.clone();
            let last_callback = last_callback.clone();

            warp::method()
                .and(warp::header::optional::<String>("sid"))
                .and(warp::header::optional::<String>("callback"))
                .map(
                    move |method: warp::http::Method,
                          sid: Option<String>,
                          callback: Option<String>| {
                        let (status, sid_value) = match method.as_str() {
                            "SUBSCRIBE" => match sid {
                                None => {
                                    let n = subscribes.fetch_add(1, Ordering::SeqCst) + 1;
                                    if let Some(cb) = callback {
                                        *last_callback.lock().unwrap() = Some(cb);
                                    }
                                    let sid_value = if behavior.blank_sid {
                                        String::new()
                                    } else {
                                        format!("uuid:mock-{device_id}-sub-{n}")
                                    };
                                    (behavior.subscribe_status, sid_value)
                                }
                                Some(existing) => {
                                    renews.fetch_add(1, Ordering::SeqCst);
                                    (200, existing)
                                }
                            },
                            "UNSUBSCRIBE" => {
                                unsubscribes.fetch_add(1, Ordering::SeqCst);
                                (behavior.unsubscribe_status, sid.unwrap_or_default())
                            }
                            _ => (405, String::new()),
                        };

                        warp::reply::with_status(
                            warp::reply::with_header(
                                warp::reply::with_header(warp::reply(), "SID", sid_value),
                                "TIMEOUT",
                                behavior.timeout_header.clone(),
                            ),
                            StatusCode::from_u16(status)
                                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                        )
                    },
                )
        };

        let (addr, server) = warp::serve(filter).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        Self {
            addr,
            subscribes,
            renews,
            unsubscribes,
            last_callback,
        }
    }

    /// The identity-cached player handle for this mock device.
    pub fn player(&self, players: &PlayerRegistry) -> Player {
        players.get_or_create(self.addr)
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn renew_count(&self) -> usize {
        self.renews.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }
}

/// A handler that forwards every event into a channel.
pub fn handler_channel() -> (EventHandler, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler: EventHandler = Box::new(move |event| {
        let _ = tx.send(event);
    });
    (handler, rx)
}

/// A handler that drops everything.
pub fn noop_handler() -> EventHandler {
    Box::new(|_| {})
}
