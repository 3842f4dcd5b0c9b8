//! The GENA subscription state machine.
//!
//! One [`Subscription`] represents one (player, service, handler) tuple and
//! owns the whole protocol for it: the initial SUBSCRIBE advertising the
//! callback server, optional background renewal, and UNSUBSCRIBE on the way
//! out. A subscription is single-use: once unsubscribed it can never be
//! re-subscribed; create a new one instead.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use rusonos_model::Player;
use rusonos_upnp::{Service, SoapClient};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::EventConfig;
use crate::error::{EventError, Result};
use crate::event::{Event, EventHandler};
use crate::registry::SubscriptionRegistry;
use crate::server::EventServer;

/// Sentinel for a subscription the device granted with no expiry.
pub const TIMEOUT_INFINITE: i64 = -1;

/// Lifecycle states of a subscription. Transitions are monotonic:
/// `New → Subscribed → Unsubscribed`, and nothing leaves `Unsubscribed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    New,
    Subscribed,
    Unsubscribed,
}

impl SubscriptionState {
    pub fn name(&self) -> &'static str {
        match self {
            SubscriptionState::New => "new",
            SubscriptionState::Subscribed => "subscribed",
            SubscriptionState::Unsubscribed => "unsubscribed",
        }
    }
}

/// What an [`unsubscribe`](Subscription::unsubscribe) attempt amounted to.
///
/// Teardown never raises: every attempt out of the subscribed state is
/// locally terminal (renewal cancelled, state advanced, registry entry
/// removed), and the outcome reports how the device took it so callers can
/// still make policy decisions.
#[derive(Debug)]
pub enum UnsubscribeOutcome {
    /// The device acknowledged the UNSUBSCRIBE.
    Unsubscribed,
    /// The device answered 412: it had already dropped the subscription,
    /// typically after a reboot. Success-equivalent.
    AlreadyGone,
    /// The subscription was not in the subscribed state; nothing was sent.
    NotSubscribed,
    /// The UNSUBSCRIBE failed on the wire or was rejected. The local side
    /// is torn down anyway; the device will expire it on its own.
    Failed(EventError),
}

impl UnsubscribeOutcome {
    /// True unless the network attempt failed.
    pub fn is_clean(&self) -> bool {
        !matches!(self, UnsubscribeOutcome::Failed(_))
    }
}

struct SubscriptionInner {
    soap: SoapClient,
    config: EventConfig,
    server: Arc<EventServer>,
    registry: Arc<SubscriptionRegistry>,
    player: Player,
    service: Service,
    handler: EventHandler,
    /// Serializes subscribe/renew/unsubscribe, which suspend mid-operation
    /// on their network calls.
    op: tokio::sync::Mutex<()>,
    /// Quick-access state; never held across an await point.
    state: parking_lot::Mutex<State>,
}

struct State {
    state: SubscriptionState,
    /// Device-assigned subscription id; empty until subscribed.
    sid: String,
    /// Granted timeout in seconds, or [`TIMEOUT_INFINITE`].
    timeout: i64,
    /// When the last successful (re)subscribe completed.
    last_refresh: Option<Instant>,
    /// Highest SEQ seen, for gap and reorder logging.
    last_seq: Option<u32>,
    /// Cancellation handle for the background renewal task.
    renew_task: Option<JoinHandle<()>>,
}

/// One subscription to one service on one player, delivering to one handler.
///
/// Cheap to clone; all clones share the same state. Clones are what the
/// registry stores and what [`Event`]s carry back to handlers.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    pub(crate) fn new(
        soap: SoapClient,
        config: EventConfig,
        server: Arc<EventServer>,
        registry: Arc<SubscriptionRegistry>,
        player: Player,
        service: Service,
        handler: EventHandler,
    ) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                soap,
                config,
                server,
                registry,
                player,
                service,
                handler,
                op: tokio::sync::Mutex::new(()),
                state: parking_lot::Mutex::new(State {
                    state: SubscriptionState::New,
                    sid: String::new(),
                    timeout: TIMEOUT_INFINITE,
                    last_refresh: None,
                    last_seq: None,
                    renew_task: None,
                }),
            }),
        }
    }

    pub fn player(&self) -> &Player {
        &self.inner.player
    }

    pub fn service(&self) -> Service {
        self.inner.service
    }

    pub fn state(&self) -> SubscriptionState {
        self.inner.state.lock().state
    }

    /// The device-assigned subscription id, once subscribed.
    pub fn sid(&self) -> Option<String> {
        let state = self.inner.state.lock();
        (!state.sid.is_empty()).then(|| state.sid.clone())
    }

    /// The granted timeout in seconds ([`TIMEOUT_INFINITE`] for no expiry),
    /// once subscribed.
    pub fn timeout_seconds(&self) -> Option<i64> {
        let state = self.inner.state.lock();
        matches!(state.state, SubscriptionState::Subscribed).then_some(state.timeout)
    }

    /// When the last successful subscribe or renewal completed.
    pub fn last_refresh(&self) -> Option<Instant> {
        self.inner.state.lock().last_refresh
    }

    /// Whether a background renewal task is currently scheduled.
    pub fn auto_renew_active(&self) -> bool {
        self.inner.state.lock().renew_task.is_some()
    }

    /// Establish the subscription with the device.
    ///
    /// Valid only on a brand-new subscription. Ensures the event server is
    /// running and reachable from this player, advertises its callback URL,
    /// and on success registers this subscription under the device-assigned
    /// SID. With `auto_renew` and a finite granted timeout, a background
    /// task re-subscribes shortly before each expiry until the subscription
    /// is unsubscribed.
    pub async fn subscribe(&self, auto_renew: bool) -> Result<()> {
        let _op = self.inner.op.lock().await;
        self.expect_state(SubscriptionState::New)?;

        self.inner.server.ensure_running(&self.inner.player).await?;
        let callback_url = self.inner.server.callback_url()?;

        let url = self.event_url();
        let callback = format!("<{callback_url}>");
        let requested = self
            .inner
            .config
            .requested_timeout
            .map(|seconds| format!("Second-{seconds}"));
        let mut headers: Vec<(&str, &str)> = vec![("CALLBACK", &callback), ("NT", "upnp:event")];
        if let Some(requested) = &requested {
            headers.push(("TIMEOUT", requested));
        }

        let response = self
            .inner
            .soap
            .request("SUBSCRIBE", &url, &headers, self.inner.config.subscribe_timeout)
            .await?;
        if !response.is_success() {
            return Err(EventError::Rejected {
                url,
                status: response.status,
            });
        }

        let sid = response
            .header("sid")
            .map(str::to_string)
            .filter(|sid| !sid.is_empty())
            .ok_or_else(|| {
                EventError::MalformedResponse("missing SID header in SUBSCRIBE response".into())
            })?;
        let timeout = parse_timeout_header(response.header("timeout").ok_or_else(|| {
            EventError::MalformedResponse("missing TIMEOUT header in SUBSCRIBE response".into())
        })?)?;

        {
            let mut state = self.inner.state.lock();
            state.state = SubscriptionState::Subscribed;
            state.sid = sid.clone();
            state.timeout = timeout;
            state.last_refresh = Some(Instant::now());
        }
        self.inner.registry.register(&sid, self.clone());
        tracing::debug!(%sid, %url, timeout, "subscribed");

        if auto_renew && timeout > 0 {
            let delay = renewal_delay(timeout);
            let task = tokio::spawn(auto_renew_loop(self.clone(), delay));
            self.inner.state.lock().renew_task = Some(task);
        }

        Ok(())
    }

    /// Re-subscribe before the granted timeout elapses.
    ///
    /// Valid only while subscribed. The device already knows the callback
    /// URL, so the request carries the SID alone. On success the granted
    /// timeout and refresh timestamp are updated in place; the SID and the
    /// state never change.
    pub async fn renew(&self) -> Result<()> {
        let _op = self.inner.op.lock().await;
        self.expect_state(SubscriptionState::Subscribed)?;

        let sid = self.inner.state.lock().sid.clone();
        let url = self.event_url();
        tracing::info!(%sid, %url, "renewing");

        let response = self
            .inner
            .soap
            .request(
                "SUBSCRIBE",
                &url,
                &[("SID", &sid)],
                self.inner.config.renew_timeout,
            )
            .await?;
        if !response.is_success() {
            return Err(EventError::Rejected {
                url,
                status: response.status,
            });
        }

        let timeout = parse_timeout_header(response.header("timeout").ok_or_else(|| {
            EventError::MalformedResponse("missing TIMEOUT header in renewal response".into())
        })?)?;

        {
            let mut state = self.inner.state.lock();
            state.timeout = timeout;
            state.last_refresh = Some(Instant::now());
        }
        tracing::debug!(%sid, timeout, "renewed");
        Ok(())
    }

    /// Tear the subscription down.
    ///
    /// A no-op from any state other than subscribed, which makes redundant
    /// cleanup calls during shutdown races safe. From the subscribed state
    /// this cancels the renewal task, sends UNSUBSCRIBE, and removes the
    /// registry entry. The local teardown happens even when the device is
    /// unreachable, since its server-side state no longer matters to this
    /// process.
    pub async fn unsubscribe(&self) -> UnsubscribeOutcome {
        let _op = self.inner.op.lock().await;

        let sid = {
            let mut state = self.inner.state.lock();
            if state.state != SubscriptionState::Subscribed {
                tracing::debug!(
                    state = state.state.name(),
                    "nothing to unsubscribe"
                );
                return UnsubscribeOutcome::NotSubscribed;
            }
            // Stop the renewal task before anything else so a renewal can
            // never fire against an id the device no longer knows.
            if let Some(task) = state.renew_task.take() {
                task.abort();
            }
            state.sid.clone()
        };

        let url = self.event_url();
        let result = self
            .inner
            .soap
            .request(
                "UNSUBSCRIBE",
                &url,
                &[("SID", &sid)],
                self.inner.config.unsubscribe_timeout,
            )
            .await;

        let outcome = match result {
            Ok(response) if response.is_success() => UnsubscribeOutcome::Unsubscribed,
            Ok(response) if response.status == 412 => {
                tracing::info!(%sid, "device had already dropped the subscription (412)");
                UnsubscribeOutcome::AlreadyGone
            }
            Ok(response) => {
                tracing::warn!(%sid, status = response.status, "UNSUBSCRIBE rejected");
                UnsubscribeOutcome::Failed(EventError::Rejected {
                    url,
                    status: response.status,
                })
            }
            Err(e) => {
                tracing::warn!(%sid, error = %e, "UNSUBSCRIBE failed");
                UnsubscribeOutcome::Failed(e.into())
            }
        };

        self.inner.state.lock().state = SubscriptionState::Unsubscribed;
        self.inner.registry.unregister(&sid);
        tracing::debug!(%sid, "unsubscribed");
        outcome
    }

    /// Deliver one event to the handler.
    ///
    /// Called by the event server, on a task of its own, after the device
    /// has already received its acknowledgment. A panicking handler is
    /// caught and logged here; it must never take down the server's accept
    /// loop or the renewal task.
    pub(crate) fn handle_event(&self, event: Event) {
        {
            let mut state = self.inner.state.lock();
            match state.last_seq {
                Some(last) if event.seq <= last => {
                    tracing::warn!(
                        sid = %state.sid,
                        seq = event.seq,
                        last,
                        "duplicate or out-of-order notification"
                    );
                }
                Some(last) if event.seq > last + 1 => {
                    tracing::warn!(
                        sid = %state.sid,
                        seq = event.seq,
                        last,
                        "gap in notification sequence"
                    );
                    state.last_seq = Some(event.seq);
                }
                _ => state.last_seq = Some(event.seq),
            }
        }

        tracing::info!(event = %event, "delivering event");
        if catch_unwind(AssertUnwindSafe(|| (self.inner.handler)(event))).is_err() {
            tracing::error!(
                service = self.inner.service.name(),
                player = %self.inner.player,
                "event handler panicked"
            );
        }
    }

    fn event_url(&self) -> String {
        format!(
            "{}{}",
            self.inner.player.base_url(),
            self.inner.service.info().event_path
        )
    }

    fn expect_state(&self, required: SubscriptionState) -> Result<()> {
        let actual = self.inner.state.lock().state;
        if actual == required {
            Ok(())
        } else {
            Err(EventError::InvalidState {
                required: required.name(),
                actual: actual.name(),
            })
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Subscription")
            .field("player", &self.inner.player)
            .field("service", &self.inner.service.name())
            .field("sid", &state.sid)
            .field("state", &state.state)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        if state.sid.is_empty() {
            write!(f, "?")
        } else {
            write!(f, "{}", state.sid)
        }
    }
}

/// Background renewal: sleep, renew, repeat until cancelled.
///
/// Failures are logged and retried on the next cycle; sustained failure
/// eventually lets the device expire the subscription server-side, which is
/// the accepted terminal failure mode for auto-renewed subscriptions.
async fn auto_renew_loop(subscription: Subscription, initial_delay: Duration) {
    let mut delay = initial_delay;
    loop {
        tokio::time::sleep(delay).await;
        match subscription.renew().await {
            Ok(()) => {
                // The device may grant a different timeout on renewal;
                // recompute the delay from the fresh value.
                if let Some(next) = subscription.current_renewal_delay() {
                    delay = next;
                }
            }
            Err(e) => {
                tracing::warn!(
                    subscription = %subscription,
                    error = %e,
                    "auto-renew failed; retrying after the same delay"
                );
            }
        }
    }
}

impl Subscription {
    fn current_renewal_delay(&self) -> Option<Duration> {
        let timeout = self.inner.state.lock().timeout;
        (timeout > 0).then(|| renewal_delay(timeout))
    }
}

/// How long to wait before renewing a subscription granted for
/// `timeout` seconds: 95% of the timeout for grants up to an hour, three
/// minutes before expiry for longer grants.
pub(crate) fn renewal_delay(timeout: i64) -> Duration {
    debug_assert!(timeout > 0);
    let seconds = if timeout <= 3600 {
        timeout * 95 / 100
    } else {
        timeout - 180
    };
    Duration::from_secs(seconds.max(1) as u64)
}

/// Parse a GENA TIMEOUT header value.
///
/// UPnP allows `infinite` (any letter case) or `Second-<N>`; Sonos
/// writes the capitalized form. Infinite is stored as [`TIMEOUT_INFINITE`].
pub(crate) fn parse_timeout_header(value: &str) -> Result<i64> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("infinite") {
        return Ok(TIMEOUT_INFINITE);
    }

    const PREFIX: &str = "Second-";
    if value.len() > PREFIX.len() && value[..PREFIX.len()].eq_ignore_ascii_case(PREFIX) {
        if let Ok(seconds) = value[PREFIX.len()..].trim().parse::<i64>() {
            if seconds >= 0 {
                return Ok(seconds);
            }
        }
    }
    Err(EventError::MalformedResponse(format!(
        "unparseable TIMEOUT header: {value:?}"
    )))
}
