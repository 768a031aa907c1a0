//! In-process gateway fakes for tests: a recording [`FakeGateway`] and a
//! [`FakeConnector`] that hands out pre-scripted sessions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::GatewayError;

use super::{
    Connector, Controls, Gateway, GatewayEvent, GatewayRef, Identity, InteractPhase, Vec3,
    ViewState,
};

/// One recorded gateway operation, chat stamped with virtual time.
#[derive(Clone, Debug)]
pub enum Call {
    Chat(String, tokio::time::Instant),
    Controls(Controls),
    Look(f64, f64),
    LookAt(Vec3),
    Follow(String, f64),
    Interact(Vec3, InteractPhase),
    Quit,
}

/// Gateway that records every operation and serves a settable view.
#[derive(Default)]
pub struct FakeGateway {
    pub calls: Mutex<Vec<Call>>,
    pub view: Mutex<ViewState>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_view(&self, view: ViewState) {
        *self.view.lock().unwrap() = view;
    }

    /// Chat lines sent so far, with their virtual-time stamps.
    pub fn chats(&self) -> Vec<(String, tokio::time::Instant)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Chat(text, at) => Some((text.clone(), *at)),
                _ => None,
            })
            .collect()
    }

    pub fn quit_called(&self) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, Call::Quit))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    fn snapshot(&self) -> ViewState {
        self.view.lock().unwrap().clone()
    }

    async fn send_chat(&self, text: &str) -> Result<(), GatewayError> {
        self.record(Call::Chat(text.to_string(), tokio::time::Instant::now()));
        Ok(())
    }

    async fn set_controls(&self, controls: Controls) -> Result<(), GatewayError> {
        self.record(Call::Controls(controls));
        Ok(())
    }

    async fn set_look(&self, yaw: f64, pitch: f64) -> Result<(), GatewayError> {
        self.record(Call::Look(yaw, pitch));
        Ok(())
    }

    async fn look_at(&self, target: Vec3) -> Result<(), GatewayError> {
        self.record(Call::LookAt(target));
        Ok(())
    }

    async fn follow(&self, target: &str, range: f64) -> Result<(), GatewayError> {
        self.record(Call::Follow(target.to_string(), range));
        Ok(())
    }

    async fn interact(&self, target: Vec3, phase: InteractPhase) -> Result<(), GatewayError> {
        self.record(Call::Interact(target, phase));
        Ok(())
    }

    async fn quit(&self) {
        self.record(Call::Quit);
    }
}

/// Connector yielding pre-scripted sessions in order; connects past the
/// script fail with a `Connect` error.
#[derive(Default)]
pub struct FakeConnector {
    sessions: Mutex<VecDeque<(Arc<FakeGateway>, mpsc::Receiver<GatewayEvent>)>>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues one scripted session; returns the gateway and the event feed
    /// the test drives.
    pub fn script(&self) -> (Arc<FakeGateway>, mpsc::Sender<GatewayEvent>) {
        let gateway = FakeGateway::new();
        let (tx, rx) = mpsc::channel(16);
        self.sessions
            .lock()
            .unwrap()
            .push_back((Arc::clone(&gateway), rx));
        (gateway, tx)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _identity: &Identity,
    ) -> Result<(GatewayRef, mpsc::Receiver<GatewayEvent>), GatewayError> {
        let _ = self.connects.fetch_add(1, Ordering::SeqCst);
        match self.sessions.lock().unwrap().pop_front() {
            Some((gateway, rx)) => {
                let gateway: GatewayRef = gateway;
                Ok((gateway, rx))
            }
            None => Err(GatewayError::Connect("no scripted session".to_string())),
        }
    }
}
