//! Cleanup of external processes launched by process steps.
//!
//! Process steps stay in the executor's process group so they keep full use of
//! the inherited terminal. Each live child is tracked by PID in a
//! [`ChildRegistry`]; a parallel fan-out can have several entries at once.
//! On SIGINT, SIGTERM or SIGHUP, or when a [`RunGuard`] is dropped, every
//! tracked child receives SIGTERM and, if it is still running after the grace
//! period, SIGKILL. Children also get SIGTERM from the kernel if the thread
//! that launched them dies.

use nix::libc;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Registry shared by every process step of the run
pub static CHILDREN: ChildRegistry = ChildRegistry::new();

/// Grace period between SIGTERM and SIGKILL when a run ends early
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

const SIGNAL_GRACE_PERIOD: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// PIDs of process steps that are currently running.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: Mutex<BTreeSet<u32>>,
}

impl ChildRegistry {
    pub const fn new() -> Self {
        Self {
            pids: Mutex::new(BTreeSet::new()),
        }
    }

    /// Track `pid` until the returned handle is dropped.
    pub fn track(&self, pid: u32) -> TrackedChild<'_> {
        self.lock().insert(pid);
        debug!("Tracking process step PID {}", pid);
        TrackedChild {
            registry: self,
            pid,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stop every tracked child: SIGTERM, wait up to `grace_period`, then
    /// SIGKILL for the ones still running. Returns how many were signalled.
    ///
    /// The lock is not held while waiting, so the threads waiting on those
    /// children can still untrack them.
    pub fn terminate_all(&self, grace_period: Duration) -> usize {
        let pids: Vec<u32> = self.lock().iter().copied().collect();
        if pids.is_empty() {
            return 0;
        }

        info!("Stopping {} running process step(s)", pids.len());
        for &pid in &pids {
            signal_child(pid, Signal::SIGTERM);
        }

        let deadline = Instant::now() + grace_period;
        let mut running: Vec<u32> = pids.clone();
        while !running.is_empty() && Instant::now() < deadline {
            std::thread::sleep(POLL_INTERVAL);
            running.retain(|&pid| is_running(pid));
        }

        for &pid in &running {
            warn!("Process step PID {} ignored SIGTERM, killing it", pid);
            signal_child(pid, Signal::SIGKILL);
        }
        pids.len()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<u32>> {
        // A panic elsewhere never leaves the set half-updated
        self.pids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A live child in a [`ChildRegistry`]; untracked on drop.
#[derive(Debug)]
pub struct TrackedChild<'a> {
    registry: &'a ChildRegistry,
    pid: u32,
}

impl TrackedChild<'_> {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for TrackedChild<'_> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.pid);
        debug!("Process step PID {} finished", self.pid);
    }
}

fn signal_child(pid: u32, signal: Signal) {
    if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
        debug!("Could not send {:?} to PID {}: {}", signal, pid, e);
    }
}

/// Running means the PID exists and is not an unreaped zombie.
fn is_running(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // State follows the parenthesised command name, which may hold spaces
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| !matches!(state, "Z" | "X")),
        Err(_) => false,
    }
}

/// Stops the run's remaining process steps when dropped. The binary holds one
/// for the duration of a run.
#[derive(Debug)]
pub struct RunGuard {
    grace_period: Duration,
}

impl RunGuard {
    pub fn new() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn live_children(&self) -> usize {
        CHILDREN.len()
    }
}

impl Default for RunGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        CHILDREN.terminate_all(self.grace_period);
    }
}

/// Install a handler thread for SIGINT, SIGTERM and SIGHUP that stops running
/// process steps and exits with `128 + signal`.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            warn!("Interrupted by signal {}, stopping plan execution", sig);
            CHILDREN.terminate_all(SIGNAL_GRACE_PERIOD);
            std::process::exit(128 + sig);
        }
    });
    Ok(())
}

/// Tie a child's lifetime to the thread that launches it.
pub trait KillOnParentExit {
    fn kill_on_parent_exit(&mut self) -> &mut Self;
}

impl KillOnParentExit for std::process::Command {
    fn kill_on_parent_exit(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: the hook only makes an async-signal-safe prctl call
        unsafe {
            self.pre_exec(|| {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}
