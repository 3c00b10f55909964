//! Debounced automatic switching
//!
//! A single control task owns the debounce timer. Topology notifications
//! re-arm it; when it expires the task runs one [`SwitchCore`] evaluation on
//! the blocking pool and waits for it. Notifications arriving meanwhile queue
//! in the channel and are handled once the switch is done.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::switch::SwitchCore;
use crate::common::types::Fingerprint;
use crate::monitor::{TopologyNotifier, TopologySource, TopologySubscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPhase {
    Idle,
    PendingDebounce,
    Switching,
}

#[derive(Debug)]
enum SwitcherEvent {
    TopologyChanged,
    /// Carries the generation of the timer that fired
    DebounceElapsed(u64),
    CheckNow,
}

struct Running {
    events: mpsc::UnboundedSender<SwitcherEvent>,
    stop: oneshot::Sender<()>,
    subscription: Box<dyn TopologySubscription>,
    task: JoinHandle<()>,
}

pub struct AutoSwitcher {
    core: Arc<SwitchCore>,
    topology: Arc<dyn TopologySource>,
    debounce: Duration,
    phase: Arc<watch::Sender<SwitchPhase>>,
    evaluations: Arc<watch::Sender<u64>>,
    running: Option<Running>,
}

impl AutoSwitcher {
    pub fn new(core: Arc<SwitchCore>, topology: Arc<dyn TopologySource>, debounce: Duration) -> Self {
        let (phase, _) = watch::channel(SwitchPhase::Idle);
        let (evaluations, _) = watch::channel(0);
        Self {
            core,
            topology,
            debounce,
            phase: Arc::new(phase),
            evaluations: Arc::new(evaluations),
            running: None,
        }
    }

    /// Subscribe to topology changes and evaluate once right away
    ///
    /// Must be called from within a tokio runtime. Calling it while already
    /// running does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            debug!("Auto switcher already running");
            return Ok(());
        }

        let (events, events_rx) = mpsc::unbounded_channel();
        // Queued first, so the startup evaluation precedes any notification
        let _ = events.send(SwitcherEvent::CheckNow);

        let notify_tx = events.clone();
        let notifier = TopologyNotifier::new(move || {
            let _ = notify_tx.send(SwitcherEvent::TopologyChanged);
        });
        let subscription = self
            .topology
            .subscribe(notifier)
            .context("Failed to subscribe to monitor topology changes")?;

        let (stop, stop_rx) = oneshot::channel();
        let control = ControlLoop {
            core: Arc::clone(&self.core),
            debounce: self.debounce,
            events: events.clone(),
            phase: Arc::clone(&self.phase),
            evaluations: Arc::clone(&self.evaluations),
            timer: None,
            generation: 0,
        };
        let task = tokio::spawn(control.run(events_rx, stop_rx));

        self.running = Some(Running {
            events,
            stop,
            subscription,
            task,
        });
        info!(
            debounce_ms = self.debounce.as_millis() as u64,
            "Auto switcher started"
        );
        Ok(())
    }

    /// Unsubscribe, drop any pending timer and end the control task
    ///
    /// A switch already in progress finishes first; nothing runs afterwards.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.stop.send(());

        // Joining a listener thread can block for one poll interval
        let subscription = running.subscription;
        if let Err(e) = tokio::task::spawn_blocking(move || subscription.unsubscribe()).await {
            warn!(error = %e, "Failed to unsubscribe from topology changes");
        }

        if let Err(e) = running.task.await {
            error!(error = %e, "Auto switcher task failed");
        }
        info!("Auto switcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Queue an immediate evaluation; returns false when not running
    pub fn check_now(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| running.events.send(SwitcherEvent::CheckNow).is_ok())
    }

    pub fn phase(&self) -> SwitchPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<SwitchPhase> {
        self.phase.subscribe()
    }

    /// Count of finished evaluations, successful or not
    pub fn evaluations(&self) -> watch::Receiver<u64> {
        self.evaluations.subscribe()
    }

    /// "Fingerprint observed" events
    pub fn subscribe(&self) -> broadcast::Receiver<Fingerprint> {
        self.core.subscribe()
    }
}

impl Drop for AutoSwitcher {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop.send(());
            // Dropping the subscription without joining stops delivery lazily
            drop(running.subscription);
        }
    }
}

struct ControlLoop {
    core: Arc<SwitchCore>,
    debounce: Duration,
    events: mpsc::UnboundedSender<SwitcherEvent>,
    phase: Arc<watch::Sender<SwitchPhase>>,
    evaluations: Arc<watch::Sender<u64>>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

impl ControlLoop {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<SwitcherEvent>,
        mut stop: oneshot::Receiver<()>,
    ) {
        loop {
            // Stop wins over anything still queued
            let event = tokio::select! {
                biased;
                _ = &mut stop => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                SwitcherEvent::TopologyChanged => self.arm_timer(),
                SwitcherEvent::DebounceElapsed(generation) => {
                    if generation != self.generation || self.timer.is_none() {
                        debug!(generation, "Ignoring superseded debounce timer");
                        continue;
                    }
                    self.timer = None;
                    self.switch().await;
                }
                SwitcherEvent::CheckNow => self.switch().await,
            }
        }

        self.cancel_timer();
        self.phase.send_replace(SwitchPhase::Idle);
        debug!("Auto switcher control loop exited");
    }

    fn arm_timer(&mut self) {
        self.cancel_timer();
        self.generation += 1;

        let generation = self.generation;
        let delay = self.debounce;
        let events = self.events.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SwitcherEvent::DebounceElapsed(generation));
        }));

        self.phase.send_replace(SwitchPhase::PendingDebounce);
        debug!(generation, "Topology changed, debounce timer armed");
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    async fn switch(&mut self) {
        self.phase.send_replace(SwitchPhase::Switching);

        let core = Arc::clone(&self.core);
        if let Err(e) = tokio::task::spawn_blocking(move || core.check_and_switch()).await {
            error!(error = %e, "Layout switch task panicked");
        }
        self.evaluations.send_modify(|count| *count += 1);

        let next = if self.timer.is_some() {
            SwitchPhase::PendingDebounce
        } else {
            SwitchPhase::Idle
        };
        self.phase.send_replace(next);
    }
}
