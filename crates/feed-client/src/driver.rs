//! Feed driver: the single task that owns connection state
//!
//! Transports never touch state directly. Push sessions and pollers send
//! [`Inbound`] messages, the handle sends [`Command`]s, and the reconnect
//! timer lives inside the select loop, so there is at most one pending
//! reconnect and nothing fires once the loop has exited.

use crate::config::{FeedConfig, SubscriptionConfig};
use crate::poller::{PollRole, PullPoller, SnapshotSource};
use crate::push::{self, PushConnector, PushSignal};
use crate::reconnect::{ReconnectController, ReconnectDecision};
use crate::router::EventRouter;
use crate::selector::{self, Availability, Transport};
use crate::state::{ConnectionState, FeedStatus};
use feed_types::{Event, EventKind};
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};

/// Capacity of the transport → driver channel
const INBOUND_CAPACITY: usize = 1024;

/// Messages from transport tasks
#[derive(Debug)]
pub(crate) enum Inbound {
    Push {
        generation: u64,
        signal: PushSignal,
    },
    Poll {
        role: PollRole,
        generation: u64,
        event: Event,
    },
}

/// Messages from the feed handle
#[derive(Debug)]
pub(crate) enum Command {
    Teardown(oneshot::Sender<()>),
}

pub(crate) struct FeedDriver {
    config: FeedConfig,
    router: EventRouter,
    connector: Option<Arc<dyn PushConnector>>,
    available: Availability,
    reconnect: ReconnectController,
    state: ConnectionState,
    ever_connected: bool,
    push_generation: u64,
    push_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    fallback: Option<PullPoller>,
    refresh: Option<PullPoller>,
    inbound_tx: mpsc::Sender<Inbound>,
    inbound_rx: mpsc::Receiver<Inbound>,
    commands: mpsc::Receiver<Command>,
    status: watch::Sender<FeedStatus>,
}

impl FeedDriver {
    pub(crate) fn new(
        subscription: SubscriptionConfig,
        connector: Option<Arc<dyn PushConnector>>,
        source: Option<Arc<dyn SnapshotSource>>,
        commands: mpsc::Receiver<Command>,
        status: watch::Sender<FeedStatus>,
    ) -> Self {
        let SubscriptionConfig { config, handlers } = subscription;
        let router = EventRouter::new(handlers);

        // The endpoint only yields stats, so polling without a stats
        // listener would be wasted requests.
        let listens_for_stats = router.has_handler(EventKind::StatsUpdate);
        if source.is_some() && !listens_for_stats {
            tracing::debug!("No stats handler configured, polling disabled");
        }
        let source = source.filter(|_| listens_for_stats);

        let available = Availability {
            push: connector.is_some(),
            pull: source.is_some(),
        };

        let fallback = source
            .clone()
            .map(|s| PullPoller::new(s, config.poll_interval(), PollRole::Fallback));
        let refresh = match (source, config.stats_refresh_interval()) {
            (Some(s), Some(interval)) => Some(PullPoller::new(s, interval, PollRole::StatsRefresh)),
            _ => None,
        };

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

        Self {
            reconnect: ReconnectController::new(config.max_reconnect_attempts, config.backoff()),
            config,
            router,
            connector,
            available,
            state: ConnectionState::Disconnected,
            ever_connected: false,
            push_generation: 0,
            push_task: None,
            reconnect_timer: None,
            fallback,
            refresh,
            inbound_tx,
            inbound_rx,
            commands,
            status,
        }
    }

    pub(crate) async fn run(mut self) {
        self.initialize();

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    let ack = match command {
                        Some(Command::Teardown(ack)) => Some(ack),
                        None => None,
                    };
                    self.teardown();
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                    return;
                }
                _ = wait_for(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    self.on_reconnect_due();
                }
                Some(inbound) = self.inbound_rx.recv() => self.handle_inbound(inbound),
            }
        }
    }

    fn initialize(&mut self) {
        if self.config.use_push && !self.available.push {
            tracing::debug!("{}, skipping push", crate::FeedError::TransportUnavailable);
        }

        let initial = selector::select_initial(&self.config, self.available);
        match initial {
            Transport::Push => {
                if selector::wants_stats_refresh(&self.config, self.available, initial) {
                    if let Some(refresh) = self.refresh.as_mut() {
                        refresh.start(self.inbound_tx.clone());
                    }
                }
                self.connect();
            }
            Transport::Pull => self.start_fallback_poller(),
            Transport::Inert => {
                tracing::info!("No transport enabled, realtime feed is inert");
                self.publish_status();
            }
        }
    }

    fn connect(&mut self) {
        let Some(connector) = self.connector.clone() else {
            return;
        };

        if let Some(task) = self.push_task.take() {
            task.abort();
        }
        self.push_generation += 1;
        tracing::info!("Connecting to {}", connector.describe());

        self.push_task = Some(push::spawn_session(
            connector,
            self.push_generation,
            self.config.connect_timeout(),
            self.inbound_tx.clone(),
        ));
        self.set_state(ConnectionState::Connecting);
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Push { generation, signal } => {
                if generation != self.push_generation {
                    tracing::trace!("Discarding signal from superseded push session {}", generation);
                    return;
                }
                self.handle_push(signal);
            }
            Inbound::Poll {
                role,
                generation,
                event,
            } => {
                let poller = match role {
                    PollRole::Fallback => self.fallback.as_ref(),
                    PollRole::StatsRefresh => self.refresh.as_ref(),
                };
                let current = poller.is_some_and(|p| p.is_running() && p.generation() == generation);
                if current {
                    let _ = self.router.dispatch(&event);
                } else {
                    tracing::trace!("Discarding result from stopped {} poller", role);
                }
            }
        }
    }

    fn handle_push(&mut self, signal: PushSignal) {
        match signal {
            PushSignal::Connected => self.on_connected(),
            PushSignal::Event(event) => {
                if self.state == ConnectionState::Connected {
                    let _ = self.router.dispatch(&event);
                }
            }
            PushSignal::Closed(reason) => {
                tracing::info!("Disconnected from push channel: {}", reason);
                self.push_task = None;
                self.on_disconnected();
            }
            PushSignal::ConnectFailed(e) => {
                tracing::warn!("Push connection error: {}", e);
                self.push_task = None;
                if selector::wants_safety_net(&self.config, self.available, self.ever_connected)
                    && !self.is_polling()
                {
                    tracing::info!("Starting poller while push retries");
                    self.start_fallback_poller();
                }
                self.on_disconnected();
            }
        }
    }

    fn on_connected(&mut self) {
        tracing::info!("Connected to push channel");
        self.ever_connected = true;
        self.reconnect.on_connected();
        self.reconnect_timer = None;
        self.set_state(ConnectionState::Connected);
        self.router.notify_connected();
    }

    fn on_disconnected(&mut self) {
        self.set_state(ConnectionState::Disconnected);
        self.router.notify_disconnected();

        match self.reconnect.on_disconnected() {
            ReconnectDecision::Retry { attempt, delay } => {
                tracing::info!(
                    "Attempting reconnect in {}ms (attempt {})",
                    delay.as_millis(),
                    attempt
                );
                self.reconnect_timer = Some(Box::pin(sleep(delay)));
                self.set_state(ConnectionState::Backoff);
            }
            ReconnectDecision::Exhausted => {
                tracing::warn!(
                    "Max reconnect attempts ({}) reached, giving up on push",
                    self.config.max_reconnect_attempts
                );
                match selector::select_fallback(&self.config, self.available) {
                    Transport::Pull => {
                        if !self.is_polling() {
                            tracing::info!("Falling back to polling");
                            self.start_fallback_poller();
                        }
                    }
                    _ => tracing::warn!("No fallback transport, live updates stopped"),
                }
                self.publish_status();
            }
        }
    }

    fn on_reconnect_due(&mut self) {
        if self.state == ConnectionState::Connected {
            return;
        }
        self.connect();
    }

    fn start_fallback_poller(&mut self) {
        if let Some(refresh) = self.refresh.as_mut() {
            refresh.stop();
        }
        if let Some(poller) = self.fallback.as_mut() {
            poller.start(self.inbound_tx.clone());
        }
        self.publish_status();
    }

    fn is_polling(&self) -> bool {
        self.fallback.as_ref().is_some_and(PullPoller::is_running)
    }

    fn teardown(&mut self) {
        if let Some(task) = self.push_task.take() {
            task.abort();
        }
        self.reconnect_timer = None;
        if let Some(poller) = self.fallback.as_mut() {
            poller.stop();
        }
        if let Some(refresh) = self.refresh.as_mut() {
            refresh.stop();
        }
        self.state = ConnectionState::Disconnected;

        let mut status = self.snapshot();
        status.torn_down = true;
        self.status.send_replace(status);

        tracing::info!("Realtime feed disconnected");
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!("Connection state {} -> {}", self.state, state);
            self.state = state;
        }
        self.publish_status();
    }

    fn snapshot(&self) -> FeedStatus {
        FeedStatus {
            connection: self.state,
            attempt: self.reconnect.attempt(),
            push_exhausted: self.reconnect.is_exhausted(),
            polling: self.is_polling(),
            stats_refresh: self.refresh.as_ref().is_some_and(PullPoller::is_running),
            torn_down: false,
        }
    }

    fn publish_status(&self) {
        self.status.send_replace(self.snapshot());
    }
}

async fn wait_for(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}
