use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{LiveSession, LiveSessionState, LiveSlots, LiveSnapshot};
use crate::frame::FrameSource;
use crate::locale::Language;

/// Operator actions forwarded to the runner thread.
pub enum LiveCommand {
    SetLiveEnabled(bool),
    AttachSource(Box<dyn FrameSource>),
    DetachSource,
    Stop,
}

/// Drives a `LiveSession` on a fixed period from a background thread.
///
/// While the session is idle the thread blocks on its command channel and no
/// timer runs.
pub struct LiveRunner {
    session: LiveSession,
    period: Duration,
}

impl LiveRunner {
    pub fn new(session: LiveSession, period: Duration) -> Self {
        Self { session, period }
    }

    pub fn spawn(self) -> Result<LiveHandle> {
        if self.period.is_zero() {
            return Err(anyhow!("live period must be greater than zero"));
        }
        let (commands, rx) = mpsc::channel();
        let slots = self.session.slots();
        let active = Arc::new(AtomicBool::new(
            self.session.state() == LiveSessionState::Active,
        ));
        let active_thread = active.clone();
        let join = std::thread::Builder::new()
            .name("vbic-live".to_string())
            .spawn(move || run_live(self.session, self.period, rx, active_thread))?;

        Ok(LiveHandle {
            commands,
            slots,
            active,
            join: Some(join),
        })
    }
}

fn run_live(
    mut session: LiveSession,
    period: Duration,
    rx: Receiver<LiveCommand>,
    active: Arc<AtomicBool>,
) {
    let mut next_tick = Instant::now() + period;
    loop {
        let is_active = session.state() == LiveSessionState::Active;
        active.store(is_active, Ordering::SeqCst);

        let command = if is_active {
            let now = Instant::now();
            if now >= next_tick {
                let outcome = session.tick();
                log::debug!("live: tick -> {:?}", outcome);
                next_tick += period;
                if next_tick <= now {
                    // Fell behind (slow capture); skip missed ticks.
                    next_tick = now + period;
                }
                continue;
            }
            match rx.recv_timeout(next_tick - now) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            }
        };

        let was_active = is_active;
        match command {
            LiveCommand::SetLiveEnabled(enabled) => session.set_live_enabled(enabled),
            LiveCommand::AttachSource(source) => {
                session.attach_source(source);
                next_tick = Instant::now() + period;
            }
            LiveCommand::DetachSource => {
                session.detach_source();
            }
            LiveCommand::Stop => break,
        }
        if !was_active && session.state() == LiveSessionState::Active {
            next_tick = Instant::now() + period;
        }
    }
    session.shutdown();
    active.store(false, Ordering::SeqCst);
    log::info!("live: runner stopped");
}

/// Control handle for a running live session.
///
/// Dropping the handle stops the runner and releases the source.
#[derive(Debug)]
pub struct LiveHandle {
    commands: Sender<LiveCommand>,
    slots: LiveSlots,
    active: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for LiveCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveCommand::SetLiveEnabled(enabled) => write!(f, "SetLiveEnabled({enabled})"),
            LiveCommand::AttachSource(source) => write!(f, "AttachSource({})", source.describe()),
            LiveCommand::DetachSource => write!(f, "DetachSource"),
            LiveCommand::Stop => write!(f, "Stop"),
        }
    }
}

impl LiveHandle {
    pub fn set_live_enabled(&self, enabled: bool) -> Result<()> {
        self.send(LiveCommand::SetLiveEnabled(enabled))
    }

    pub fn attach_source(&self, source: Box<dyn FrameSource>) -> Result<()> {
        self.send(LiveCommand::AttachSource(source))
    }

    pub fn detach_source(&self) -> Result<()> {
        self.send(LiveCommand::DetachSource)
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.slots.snapshot()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Caption for the live view, or `None` while idle.
    pub fn caption(&self, language: Language) -> Option<String> {
        self.is_active()
            .then(|| self.snapshot().caption(language))
    }

    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn send(&self, command: LiveCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("live runner is not running"))
    }

    fn shutdown(&mut self) -> Result<()> {
        let _ = self.commands.send(LiveCommand::Stop);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("live runner thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("live: {}", err);
        }
    }
}
