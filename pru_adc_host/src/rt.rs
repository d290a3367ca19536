//! Real-time setup of the core thread.
//!
//! Applied from inside the core thread, before the first iteration:
//! 1. lock current and future pages in RAM,
//! 2. touch the part of the stack the loop will use,
//! 3. pin the thread to one CPU,
//! 4. switch it to `SCHED_FIFO`.
//!
//! Without the `rt` feature steps 1, 3 and 4 are no-ops, so development
//! builds run unprivileged.

use std::fmt;

use crate::error::CaptureError;

/// Stack size of the core thread.
pub const CORE_STACK_SIZE: usize = 1024 * 1024;

/// Stack bytes touched before the loop starts. The rest of
/// [`CORE_STACK_SIZE`] stays free for the frames above the loop.
const PREFAULT_BYTES: usize = CORE_STACK_SIZE / 4;

/// Where and how the core thread runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtSettings {
    /// CPU to pin to.
    pub cpu: usize,
    /// SCHED_FIFO priority.
    pub priority: i32,
}

/// Setup step, named in the error it produces.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(not(feature = "rt"), allow(dead_code))]
enum Step {
    LockPages,
    PinCpu(usize),
    Fifo(i32),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LockPages => f.write_str("mlockall(MCL_CURRENT | MCL_FUTURE)"),
            Self::PinCpu(cpu) => write!(f, "sched_setaffinity(cpu {cpu})"),
            Self::Fifo(priority) => write!(f, "sched_setscheduler(SCHED_FIFO, {priority})"),
        }
    }
}

#[cfg_attr(not(feature = "rt"), allow(dead_code))]
impl Step {
    fn failed(self, cause: impl fmt::Display) -> CaptureError {
        CaptureError::DriverInit(format!("{self} failed: {cause}"))
    }
}

#[cfg(feature = "rt")]
fn lock_pages() -> Result<(), CaptureError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| Step::LockPages.failed(e))
}

#[cfg(feature = "rt")]
fn pin_cpu(cpu: usize) -> Result<(), CaptureError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut set = CpuSet::new();
    set.set(cpu).map_err(|e| Step::PinCpu(cpu).failed(e))?;
    // pid 0 is the calling thread
    sched_setaffinity(Pid::from_raw(0), &set).map_err(|e| Step::PinCpu(cpu).failed(e))
}

#[cfg(feature = "rt")]
fn use_fifo(priority: i32) -> Result<(), CaptureError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call and pid 0 names the calling thread.
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
        return Err(Step::Fifo(priority).failed(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn lock_pages() -> Result<(), CaptureError> {
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn pin_cpu(_cpu: usize) -> Result<(), CaptureError> {
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn use_fifo(_priority: i32) -> Result<(), CaptureError> {
    Ok(())
}

/// Touch [`PREFAULT_BYTES`] of stack so the loop does not fault on it later.
#[inline(never)]
fn prefault_stack() {
    let mut buf = [0u8; PREFAULT_BYTES];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is an exclusive reference into `buf`; the volatile
        // write only keeps the store from being elided.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Apply the full setup to the calling thread.
///
/// Meant for a thread spawned with [`CORE_STACK_SIZE`].
pub fn rt_setup(settings: RtSettings) -> Result<(), CaptureError> {
    lock_pages()?;
    prefault_stack();
    pin_cpu(settings.cpu)?;
    use_fifo(settings.priority)
}

/// Whether the calling thread runs under a real-time policy.
pub fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: querying the calling thread's policy has no preconditions.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefault_leaves_stack_headroom() {
        assert!(PREFAULT_BYTES < CORE_STACK_SIZE);
        let handle = std::thread::Builder::new()
            .stack_size(CORE_STACK_SIZE)
            .spawn(prefault_stack)
            .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn step_errors_name_the_call() {
        let err = Step::Fifo(80).failed("EPERM");
        assert!(matches!(
            err,
            CaptureError::DriverInit(ref msg) if msg == "sched_setscheduler(SCHED_FIFO, 80) failed: EPERM"
        ));
        let err = Step::PinCpu(3).failed("EINVAL");
        assert!(err.to_string().contains("cpu 3"));
    }

    #[cfg(not(feature = "rt"))]
    #[test]
    fn setup_without_rt_feature_is_noop() {
        let settings = RtSettings {
            cpu: 0,
            priority: 80,
        };
        assert!(rt_setup(settings).is_ok());
        assert!(!detect_rt_mode());
    }
}
