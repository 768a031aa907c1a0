//! # SessionManager: the lifecycle root.
//!
//! Owns the one logical connection, the timer registry, the teardown set,
//! and the `manually_ended` flag. Every mutation of session state happens on
//! this task; everything else sends [`Command`]s or reads view snapshots.
//!
//! ## State machine
//! ```text
//! Disconnected ──connect/reconnect──► Connecting ──spawn──► Active
//!      ▲                                                      │
//!      │   end/kick/leave/restart:                            │
//!      │     1. drop the event receiver (suppress late ends)  │
//!      │     2. TimerRegistry::cancel_all                     │
//!      │     3. Teardown::close_all (bounded)                 │
//!      │     4. discard / quit the gateway                    │
//!      └───────────────────── Ending ◄───────────────────────┘
//! ```
//!
//! ## Rules
//! - One session at a time: `connect` is refused while a session exists or a
//!   connect is pending.
//! - Auto-reconnect (20s) fires only when the end was not operator-initiated.
//! - Spawn side effects (behaviors, auxiliary servers) fail soft: a feature
//!   that cannot start is logged and skipped for this session.
//! - The scheduled restart runs any enabled auto-pay transaction to
//!   completion between `cancel_all` and teardown, then reconnects after
//!   8 minutes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::behaviors::{autopay, clicker, follow, reactions, restart, roster};
use crate::config::Config;
use crate::control::{AssetServer, ControlServer, ViewerRegistry};
use crate::error::SessionError;
use crate::events::{Bus, Event, EventKind};
use crate::gateway::{Connector, GatewayEvent, GatewayRef, Identity};
use crate::notify::Notify;
use crate::teardown::Teardown;
use crate::timers::TimerRegistry;

use super::command::{AdminAction, Command, StatusReport};

/// Delay before reconnecting after a non-operator end.
const RECONNECT_DELAY: Duration = Duration::from_secs(20);
/// Gap between freeing old auxiliary ports and dialing on a manual connect.
const CONNECT_SETTLE_DELAY: Duration = Duration::from_secs(2);
/// Radians of look rotation per pointer unit.
const LOOK_SENSITIVITY: f64 = 0.003;

const RECONNECT_TIMER: &str = "reconnect";
const CONNECT_TIMER: &str = "connect-settle";
const COMMAND_QUEUE: usize = 64;

/// Outcome of one loop iteration's select.
enum Step {
    Cmd(Option<Command>),
    Ev(Option<GatewayEvent>),
}

/// Owns all mutable session state; constructed once per process.
pub struct SessionManager {
    cfg: Config,
    connector: Arc<dyn Connector>,
    notifier: Arc<dyn Notify>,
    roster_notifier: Arc<dyn Notify>,
    bus: Bus,
    timers: TimerRegistry,
    viewers: Arc<ViewerRegistry>,
    aux: Teardown,
    commands: mpsc::Sender<Command>,
    inbox: mpsc::Receiver<Command>,
    current: Option<GatewayRef>,
    spawned: bool,
    connecting: bool,
    manually_ended: bool,
}

impl SessionManager {
    pub fn new(
        cfg: Config,
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn Notify>,
        roster_notifier: Arc<dyn Notify>,
    ) -> Self {
        let (commands, inbox) = mpsc::channel(COMMAND_QUEUE);
        let bus = Bus::new(cfg.bus_capacity);
        Self {
            cfg,
            connector,
            notifier,
            roster_notifier,
            bus,
            timers: TimerRegistry::new(),
            viewers: Arc::new(ViewerRegistry::new()),
            aux: Teardown::new(),
            commands,
            inbox,
            current: None,
            spawned: false,
            connecting: false,
            manually_ended: false,
        }
    }

    /// Sender every input surface uses to reach this manager.
    pub fn handle(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Event bus (for additional listeners).
    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    /// Drives the lifecycle until [`Command::Shutdown`] or the command
    /// channel closes. Connects immediately on entry.
    pub async fn run(mut self) {
        self.spawn_log_listener();
        self.spawn_relay();

        let mut events: Option<mpsc::Receiver<GatewayEvent>> = None;
        self.try_connect(&mut events).await;

        loop {
            let step = tokio::select! {
                cmd = self.inbox.recv() => Step::Cmd(cmd),
                ev = recv_event(&mut events) => Step::Ev(ev),
            };
            match step {
                Step::Cmd(Some(cmd)) => {
                    if !self.handle_command(cmd, &mut events).await {
                        break;
                    }
                }
                Step::Cmd(None) => break,
                Step::Ev(Some(ev)) => self.handle_event(ev, &mut events).await,
                // Receiver closed without an end event: treat as one.
                Step::Ev(None) => {
                    let ev = GatewayEvent::Ended("event channel closed".to_string());
                    self.handle_event(ev, &mut events).await;
                }
            }
        }

        self.final_cleanup(&mut events).await;
    }

    // ── Command handling ────────────────────────────────────────────────────

    /// Returns false once the loop should stop.
    async fn handle_command(
        &mut self,
        cmd: Command,
        events: &mut Option<mpsc::Receiver<GatewayEvent>>,
    ) -> bool {
        match cmd {
            Command::Connect { reply } => {
                let result = self.begin_connect().await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Command::Leave { reply } => {
                let result = self.do_leave(events).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Command::Reconnect => {
                if self.current.is_none() {
                    self.try_connect(events).await;
                }
            }
            Command::Chat(text) => self.send_chat(&text).await,
            Command::Controls(controls) => {
                if let (Some(gateway), true) = (&self.current, self.spawned) {
                    if let Err(e) = gateway.set_controls(controls).await {
                        debug!(error = %e, "controls not applied");
                    }
                }
            }
            Command::Look { dx, dy } => self.apply_look(dx, dy).await,
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Players { reply } => {
                let players = self.current.as_ref().map(|gateway| {
                    gateway
                        .snapshot()
                        .players
                        .keys()
                        .filter(|name| **name != self.cfg.username)
                        .cloned()
                        .collect()
                });
                let _ = reply.send(players);
            }
            Command::Coords { reply } => {
                let coords = self.current.as_ref().map(|g| g.snapshot().position);
                let _ = reply.send(coords);
            }
            Command::Admin {
                actor,
                action,
                reply,
            } => {
                let result = self.handle_admin(&actor, action, events).await;
                let _ = reply.send(result);
            }
            Command::Restart => self.run_restart(events).await,
            Command::Shutdown => return false,
        }
        true
    }

    /// Manual connect: free old ports, settle, then dial via the timer.
    async fn begin_connect(&mut self) -> Result<(), SessionError> {
        if self.current.is_some() || self.connecting {
            return Err(SessionError::AlreadyConnected);
        }
        self.manually_ended = false;
        self.connecting = true;
        self.aux.close_all().await;

        let tx = self.commands.clone();
        self.timers
            .start_once(CONNECT_TIMER, CONNECT_SETTLE_DELAY, async move {
                let _ = tx.send(Command::Reconnect).await;
            })
            .await;
        Ok(())
    }

    /// Operator disconnect; no reconnect follows.
    async fn do_leave(
        &mut self,
        events: &mut Option<mpsc::Receiver<GatewayEvent>>,
    ) -> Result<(), SessionError> {
        if self.current.is_none() {
            return Err(SessionError::NotConnected);
        }
        info!("operator disconnect");
        self.manually_ended = true;
        self.end_session(events, true).await;
        Ok(())
    }

    async fn handle_admin(
        &mut self,
        actor: &str,
        action: AdminAction,
        events: &mut Option<mpsc::Receiver<GatewayEvent>>,
    ) -> Result<String, SessionError> {
        let admin = self.cfg.admin_id.trim();
        if !admin.is_empty() && actor != admin {
            warn!(actor, "admin command rejected");
            return Err(SessionError::PermissionDenied);
        }
        match action {
            AdminAction::Leave => {
                self.do_leave(events).await?;
                Ok("session disconnected".to_string())
            }
            AdminAction::Connect => {
                self.begin_connect().await?;
                Ok("connecting".to_string())
            }
            AdminAction::Say(text) => {
                if self.current.is_none() {
                    return Err(SessionError::NotConnected);
                }
                self.send_chat(&text).await;
                Ok(format!("sent: {text}"))
            }
        }
    }

    // ── Gateway events ──────────────────────────────────────────────────────

    async fn handle_event(
        &mut self,
        ev: GatewayEvent,
        events: &mut Option<mpsc::Receiver<GatewayEvent>>,
    ) {
        match ev {
            GatewayEvent::Spawned => self.on_spawn().await,
            GatewayEvent::Line(line) => {
                self.bus.publish(Event::now(EventKind::ChatLine).with_line(line));
            }
            GatewayEvent::Kicked(reason) => {
                self.notifier.send(&format!("kicked: {reason}"));
                self.bus
                    .publish(Event::now(EventKind::Kicked).with_reason(reason));
            }
            GatewayEvent::Ended(reason) => {
                self.bus
                    .publish(Event::now(EventKind::Ended).with_reason(reason.clone()));
                self.end_session(events, false).await;
                if self.manually_ended {
                    info!("operator-initiated end, not reconnecting");
                } else {
                    self.notifier.send(&format!(
                        "disconnected: {reason}; reconnecting in {}s",
                        RECONNECT_DELAY.as_secs()
                    ));
                    self.schedule_reconnect(RECONNECT_DELAY).await;
                }
            }
            GatewayEvent::Error(message) => {
                self.notifier.send(&format!("error: {message}"));
                self.bus
                    .publish(Event::now(EventKind::TransportError).with_reason(message));
            }
        }
    }

    /// Connecting → Active: notify, then start features (each fails soft).
    async fn on_spawn(&mut self) {
        self.spawned = true;
        self.notifier.send("session spawned");
        self.bus.publish(Event::now(EventKind::Spawned));
        self.start_aux().await;
        self.start_behaviors().await;
    }

    // ── Connect / teardown paths ────────────────────────────────────────────

    async fn try_connect(&mut self, events: &mut Option<mpsc::Receiver<GatewayEvent>>) {
        self.bus.publish(Event::now(EventKind::Connecting));
        info!(host = %self.cfg.host, port = self.cfg.port, "connecting");

        let identity = Identity {
            host: self.cfg.host.clone(),
            port: self.cfg.port,
            username: self.cfg.username.clone(),
        };
        match self.connector.connect(&identity).await {
            Ok((gateway, rx)) => {
                self.current = Some(gateway);
                *events = Some(rx);
                self.spawned = false;
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
                self.notifier.send(&format!(
                    "connect failed: {e}; retrying in {}s",
                    RECONNECT_DELAY.as_secs()
                ));
                self.schedule_reconnect(RECONNECT_DELAY).await;
            }
        }
        self.connecting = false;
    }

    /// The ordered Active → Ending → Disconnected path.
    ///
    /// The event receiver is dropped first: from here on this teardown is
    /// the authority, and the underlying connection's own end notification
    /// cannot re-enter. `quit` is sent only when we initiated the end.
    async fn end_session(
        &mut self,
        events: &mut Option<mpsc::Receiver<GatewayEvent>>,
        quit: bool,
    ) {
        *events = None;
        self.timers.cancel_all().await;
        self.aux.close_all().await;
        if let Some(gateway) = self.current.take() {
            if quit {
                gateway.quit().await;
            }
        }
        self.spawned = false;
        self.bus.publish(Event::now(EventKind::TeardownFinished));
    }

    /// Scheduled restart: teardown with the pre-restart auto-pay transaction
    /// run to completion, then a delayed reconnect.
    async fn run_restart(&mut self, events: &mut Option<mpsc::Receiver<GatewayEvent>>) {
        if self.current.is_none() {
            return;
        }
        info!("scheduled restart: logging out");
        self.notifier.send("scheduled restart: logging out");

        // Behaviors stop first so the hourly trigger cannot overlap the
        // pre-restart transaction.
        self.timers.cancel_all().await;

        // The transaction still needs inbound chat; pump lines (and only
        // lines) onto the bus while it runs.
        let pump = events.take().map(|mut rx| {
            let bus = self.bus.clone();
            tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    if let GatewayEvent::Line(line) = ev {
                        bus.publish(Event::now(EventKind::ChatLine).with_line(line));
                    }
                }
            })
        });

        if self.cfg.enable_autopay && !self.cfg.autopay_recipient.is_empty() {
            if let Some(gateway) = self.current.clone() {
                autopay::run(&gateway, &self.bus, &self.cfg.autopay_recipient).await;
            }
        }

        self.aux.close_all().await;
        if let Some(pump) = pump {
            pump.abort();
        }
        if let Some(gateway) = self.current.take() {
            gateway.quit().await;
        }
        self.spawned = false;
        self.bus.publish(Event::now(EventKind::TeardownFinished));

        self.notifier.send(&format!(
            "reconnecting in {} minutes",
            restart::REJOIN_DELAY.as_secs() / 60
        ));
        self.schedule_reconnect(restart::REJOIN_DELAY).await;
    }

    async fn schedule_reconnect(&self, delay: Duration) {
        self.bus
            .publish(Event::now(EventKind::ReconnectScheduled).with_delay(delay));
        let tx = self.commands.clone();
        self.timers
            .start_once(RECONNECT_TIMER, delay, async move {
                let _ = tx.send(Command::Reconnect).await;
            })
            .await;
    }

    async fn final_cleanup(&mut self, events: &mut Option<mpsc::Receiver<GatewayEvent>>) {
        if self.current.is_some() {
            self.manually_ended = true;
            self.end_session(events, true).await;
        } else {
            self.timers.cancel_all().await;
            self.aux.close_all().await;
        }
        info!("session manager stopped");
    }

    // ── Spawn side effects ──────────────────────────────────────────────────

    async fn start_aux(&mut self) {
        if self.cfg.enable_control {
            let bind = ControlServer::bind(
                self.cfg.control_port,
                self.commands.clone(),
                Arc::clone(&self.viewers),
            )
            .await;
            match bind {
                Ok(server) => {
                    self.aux.push(Box::new(server));
                    self.feature_started("control");
                }
                Err(e) => self.feature_failed("control", &e.to_string()),
            }
        }
        if self.cfg.enable_assets {
            match AssetServer::bind(self.cfg.asset_port).await {
                Ok(server) => {
                    self.aux.push(Box::new(server));
                    self.feature_started("assets");
                }
                Err(e) => self.feature_failed("assets", &e.to_string()),
            }
        }
    }

    async fn start_behaviors(&mut self) {
        let Some(gateway) = self.current.clone() else {
            return;
        };

        if self.cfg.enable_follow && !self.cfg.follow_target.is_empty() {
            let gw = Arc::clone(&gateway);
            let target = self.cfg.follow_target.clone();
            self.timers
                .start_repeating(follow::NAME, follow::PERIOD, follow::PERIOD, move || {
                    let gw = Arc::clone(&gw);
                    let target = target.clone();
                    async move { follow::tick(&gw, &target).await }
                })
                .await;
            self.feature_started("follow");
        }

        if self.cfg.enable_clicker {
            let gw = Arc::clone(&gateway);
            self.timers
                .start_repeating(clicker::NAME, clicker::PERIOD, clicker::PERIOD, move || {
                    let gw = Arc::clone(&gw);
                    async move { clicker::tick(&gw).await }
                })
                .await;
            self.feature_started("clicker");
        }

        if self.cfg.enable_roster {
            let gw = Arc::clone(&gateway);
            let notifier = Arc::clone(&self.roster_notifier);
            self.timers
                .start_repeating(roster::NAME, roster::INITIAL_DELAY, roster::PERIOD, move || {
                    let gw = Arc::clone(&gw);
                    let notifier = Arc::clone(&notifier);
                    async move { roster::tick(&gw, &notifier).await }
                })
                .await;
            self.feature_started("roster");
        }

        if self.cfg.enable_restart {
            let tz = self.cfg.timezone();
            let tx = self.commands.clone();
            self.timers
                .start_repeating(
                    restart::NAME,
                    restart::POLL_PERIOD,
                    restart::POLL_PERIOD,
                    move || {
                        let tx = tx.clone();
                        async move { restart::tick(tz, &tx).await }
                    },
                )
                .await;
            self.feature_started("restart");
        }

        if self.cfg.enable_reactions {
            let rx = self.bus.subscribe();
            let gw = Arc::clone(&gateway);
            self.timers
                .start(reactions::NAME, move |token| reactions::run(rx, gw, token))
                .await;
            self.feature_started("reactions");
        }

        if self.cfg.enable_autopay && !self.cfg.autopay_recipient.is_empty() {
            let gw = Arc::clone(&gateway);
            let bus = self.bus.clone();
            let recipient = self.cfg.autopay_recipient.clone();
            self.timers
                .start_repeating(autopay::NAME, autopay::PERIOD, autopay::PERIOD, move || {
                    let gw = Arc::clone(&gw);
                    let bus = bus.clone();
                    let recipient = recipient.clone();
                    async move { autopay::run(&gw, &bus, &recipient).await }
                })
                .await;

            let gw = Arc::clone(&gateway);
            let bus = self.bus.clone();
            let recipient = self.cfg.autopay_recipient.clone();
            self.timers
                .start_once(autopay::KICKOFF_NAME, autopay::KICKOFF_DELAY, async move {
                    autopay::run(&gw, &bus, &recipient).await;
                })
                .await;
            self.feature_started("autopay");
        }
    }

    fn feature_started(&self, feature: &'static str) {
        self.bus
            .publish(Event::now(EventKind::FeatureStarted).with_feature(feature));
    }

    fn feature_failed(&self, feature: &'static str, reason: &str) {
        self.bus.publish(
            Event::now(EventKind::FeatureFailed)
                .with_feature(feature)
                .with_reason(reason.to_string()),
        );
    }

    // ── Narrow session operations ───────────────────────────────────────────

    async fn send_chat(&self, text: &str) {
        match &self.current {
            Some(gateway) => {
                if let Err(e) = gateway.send_chat(text).await {
                    warn!(error = %e, "chat send failed");
                }
            }
            None => warn!("chat dropped: no active session"),
        }
    }

    async fn apply_look(&self, dx: f64, dy: f64) {
        let (Some(gateway), true) = (&self.current, self.spawned) else {
            return;
        };
        let view = gateway.snapshot();
        let yaw = view.yaw - dx * LOOK_SENSITIVITY;
        let pitch = (view.pitch - dy * LOOK_SENSITIVITY)
            .clamp(-std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2);
        if let Err(e) = gateway.set_look(yaw, pitch).await {
            debug!(error = %e, "look not applied");
        }
    }

    fn status(&self) -> StatusReport {
        let (health, food) = self
            .current
            .as_ref()
            .map(|g| {
                let v = g.snapshot();
                (v.health, v.food)
            })
            .unwrap_or((0.0, 0.0));
        StatusReport {
            connected: self.current.is_some() && self.spawned,
            host: self.cfg.host.clone(),
            port: self.cfg.port,
            username: self.cfg.username.clone(),
            health,
            food,
        }
    }

    // ── Bus listeners ───────────────────────────────────────────────────────

    /// Single log surface for bus events.
    fn spawn_log_listener(&self) {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => log_event(&ev),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "log listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Chat relay: every line to the viewers verbatim, non-blank lines to
    /// the notification channel.
    fn spawn_relay(&self) {
        let mut rx = self.bus.subscribe();
        let notifier = Arc::clone(&self.notifier);
        let viewers = Arc::clone(&self.viewers);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        if let Some(line) = ev.chat_line() {
                            if !line.trim().is_empty() {
                                notifier.send(line);
                            }
                            viewers.broadcast(line);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "chat relay lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

async fn recv_event(events: &mut Option<mpsc::Receiver<GatewayEvent>>) -> Option<GatewayEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn log_event(ev: &Event) {
    match ev.kind {
        EventKind::ChatLine => info!(line = ev.line.as_deref().unwrap_or(""), "[chat]"),
        EventKind::Connecting => info!("[session] connecting"),
        EventKind::Spawned => info!("[session] spawned"),
        EventKind::Kicked => warn!(reason = ev.reason.as_deref().unwrap_or(""), "[session] kicked"),
        EventKind::Ended => info!(reason = ev.reason.as_deref().unwrap_or(""), "[session] ended"),
        EventKind::TransportError => {
            warn!(reason = ev.reason.as_deref().unwrap_or(""), "[session] transport error");
        }
        EventKind::FeatureStarted => {
            info!(feature = ev.feature.as_deref().unwrap_or(""), "[feature] started");
        }
        EventKind::FeatureFailed => warn!(
            feature = ev.feature.as_deref().unwrap_or(""),
            reason = ev.reason.as_deref().unwrap_or(""),
            "[feature] failed to start, skipped for this session"
        ),
        EventKind::ReconnectScheduled => {
            info!(delay_ms = ev.delay_ms.unwrap_or(0), "[session] reconnect scheduled");
        }
        EventKind::TeardownFinished => info!("[session] teardown finished"),
    }
}
