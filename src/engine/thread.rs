//! Render worker threads and the single-slot command mailbox driving
//! them. A worker keeps no state of its own between commands; every
//! command carries the data it needs, and every command is acknowledged
//! before the next may be placed.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use inlinable_string::InlinableString;

use crate::display::target::RenderTarget;
use crate::errors::Result;

use super::renderer;
use super::system::EngineCore;

/// One frame's work assigned to a single thread.
pub(crate) struct WorkOrder {
    pub frame: u64,
    /// Targets whose queued release runs before anything else.
    pub releases: Vec<Arc<RenderTarget>>,
    /// Window targets whose platform events this thread pumps.
    pub events: Vec<Arc<RenderTarget>>,
    /// Fused cull-and-draw targets.
    pub cull_draws: Vec<TargetWork>,
    /// Split-model targets this thread culls for; results go out through
    /// the per-target handoff slot.
    pub culls: Vec<TargetWork>,
    /// Split-model targets this thread draws; their cull output arrives
    /// through the per-target handoff slot.
    pub draws: Vec<Arc<RenderTarget>>,
}

/// A target pinned for one frame together with its region snapshot.
pub(crate) struct TargetWork {
    pub target: Arc<RenderTarget>,
    pub regions: crate::display::region::RegionSnapshot,
}

impl WorkOrder {
    pub fn new(frame: u64) -> Self {
        WorkOrder {
            frame,
            releases: Vec::new(),
            events: Vec::new(),
            cull_draws: Vec::new(),
            culls: Vec::new(),
            draws: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
            && self.events.is_empty()
            && self.cull_draws.is_empty()
            && self.culls.is_empty()
            && self.draws.is_empty()
    }

    /// True when the order carries a draw stage that counts towards the
    /// flip handshake.
    pub fn has_draw_stage(&self) -> bool {
        !self.cull_draws.is_empty() || !self.draws.is_empty()
    }

    fn stage_targets(&self) -> impl Iterator<Item = &Arc<RenderTarget>> {
        self.cull_draws
            .iter()
            .map(|v| &v.target)
            .chain(self.culls.iter().map(|v| &v.target))
            .chain(self.draws.iter())
    }

    /// True when every target with stage work opted into fire-and-forget,
    /// letting the frame driver skip this order's completion wait.
    pub fn is_fire_and_forget(&self) -> bool {
        let mut any = false;
        for target in self.stage_targets() {
            if !target.is_fire_and_forget() {
                return false;
            }
            any = true;
        }

        any
    }
}

/// Command a render thread executes.
pub(crate) enum Command {
    /// Execute one frame's stage buckets.
    Frame(WorkOrder),
    /// Present the finished frame of the targets drawn on this thread.
    Flip(Vec<Arc<RenderTarget>>),
    /// Release the rendering resources of targets owned by this thread.
    Release(Vec<Arc<RenderTarget>>),
    /// Exit the worker loop.
    Terminate,
}

struct Slot {
    pending: Option<Command>,
    running: bool,
}

/// Single-slot command channel between the frame driver and one worker.
/// `send` waits until the worker is idle, so a new command can never
/// overwrite one whose completion has not been signaled.
pub(crate) struct Mailbox {
    slot: Mutex<Slot>,
    cv: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Mailbox {
            slot: Mutex::new(Slot {
                pending: None,
                running: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Places a command once the worker has drained and acknowledged the
    /// previous one.
    pub fn send(&self, cmd: Command) {
        let mut slot = self.slot.lock().unwrap();
        while slot.pending.is_some() || slot.running {
            slot = self.cv.wait(slot).unwrap();
        }

        slot.pending = Some(cmd);
        self.cv.notify_all();
    }

    /// Worker side: blocks for the next command, marking the worker busy
    /// in the same critical section.
    fn recv(&self) -> Command {
        let mut slot = self.slot.lock().unwrap();
        loop {
            if let Some(cmd) = slot.pending.take() {
                slot.running = true;
                return cmd;
            }

            slot = self.cv.wait(slot).unwrap();
        }
    }

    /// Worker side: signals completion of the command taken by `recv`.
    fn ack(&self) {
        let mut slot = self.slot.lock().unwrap();
        assert!(slot.running, "command acknowledged with none running");
        slot.running = false;
        self.cv.notify_all();
    }

    /// Blocks until the worker has drained its slot and acknowledged.
    pub fn wait_idle(&self) {
        let mut slot = self.slot.lock().unwrap();
        while slot.pending.is_some() || slot.running {
            slot = self.cv.wait(slot).unwrap();
        }
    }
}

/// A named worker owning exactly one OS thread. Lives from the first
/// time a threading model references its name until engine teardown.
pub(crate) struct RenderThread {
    name: InlinableString,
    mailbox: Arc<Mailbox>,
    join: Option<thread::JoinHandle<()>>,
}

impl RenderThread {
    /// Spawns the worker's OS thread, parked on its mailbox.
    pub fn spawn(name: &str, core: Arc<EngineCore>) -> Result<Self> {
        let mailbox = Arc::new(Mailbox::new());
        let join = {
            let mailbox = mailbox.clone();
            let label = name.to_string();
            thread::Builder::new()
                .name(label.clone())
                .spawn(move || run(&label, &mailbox, &core))?
        };

        Ok(RenderThread {
            name: InlinableString::from(name),
            mailbox,
            join: Some(join),
        })
    }

    #[inline]
    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    /// Sends `terminate` and joins the worker. A join failure is logged
    /// and teardown proceeds best-effort.
    pub fn terminate(mut self) {
        self.mailbox.send(Command::Terminate);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("render thread '{}' went down with a panic", self.name);
            }
        }
    }
}

fn run(name: &str, mailbox: &Mailbox, core: &Arc<EngineCore>) {
    debug!("render thread '{}' started", name);

    loop {
        match mailbox.recv() {
            Command::Frame(order) => {
                renderer::execute(core, &order);
                mailbox.ack();
            }
            Command::Flip(targets) => {
                renderer::flip(core, &targets);
                mailbox.ack();
            }
            Command::Release(targets) => {
                renderer::release(&targets);
                mailbox.ack();
            }
            Command::Terminate => {
                mailbox.ack();
                break;
            }
        }
    }

    debug!("render thread '{}' stopped", name);
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    fn echo_worker(mailbox: Arc<Mailbox>, seen: Arc<Mutex<Vec<u64>>>) -> thread::JoinHandle<()> {
        thread::spawn(move || loop {
            match mailbox.recv() {
                Command::Frame(order) => {
                    seen.lock().unwrap().push(order.frame);
                    mailbox.ack();
                }
                Command::Terminate => {
                    mailbox.ack();
                    break;
                }
                _ => mailbox.ack(),
            }
        })
    }

    #[test]
    fn commands_arrive_one_at_a_time_in_order() {
        let mailbox = Arc::new(Mailbox::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = echo_worker(mailbox.clone(), seen.clone());

        for frame in 1..=32 {
            mailbox.send(Command::Frame(WorkOrder::new(frame)));
        }
        mailbox.send(Command::Terminate);
        worker.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), (1..=32).collect::<Vec<_>>());
    }

    #[test]
    fn wait_idle_observes_completion() {
        let mailbox = Arc::new(Mailbox::new());
        let done = Arc::new(AtomicBool::new(false));

        let worker = {
            let mailbox = mailbox.clone();
            let done = done.clone();
            thread::spawn(move || loop {
                match mailbox.recv() {
                    Command::Frame(_) => {
                        done.store(true, Ordering::SeqCst);
                        mailbox.ack();
                    }
                    _ => {
                        mailbox.ack();
                        break;
                    }
                }
            })
        };

        mailbox.send(Command::Frame(WorkOrder::new(1)));
        mailbox.wait_idle();
        assert!(done.load(Ordering::SeqCst));

        mailbox.send(Command::Terminate);
        worker.join().unwrap();
    }

    #[test]
    fn empty_order_has_no_draw_stage() {
        let order = WorkOrder::new(1);
        assert!(order.is_empty());
        assert!(!order.has_draw_stage());
        assert!(!order.is_fire_and_forget());
    }
}
