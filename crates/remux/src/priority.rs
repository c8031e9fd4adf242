//! Scheduling priority de-escalation for engine child processes.
//!
//! Transcodes are background work: each child is dropped to the lowest
//! priority class right after spawning. The operation is best-effort; callers
//! log failures and carry on.

use std::io;

/// Lowers the scheduling priority of another process.
pub trait PriorityControl: Send + Sync {
    fn lower_priority(&self, pid: u32) -> io::Result<()>;
}

/// `setpriority(PRIO_PROCESS, pid, 19)`.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct NicePriority;

#[cfg(unix)]
impl NicePriority {
    /// Lowest niceness honoured across Linux and macOS.
    pub const LOWEST: libc::c_int = 19;
}

#[cfg(unix)]
impl PriorityControl for NicePriority {
    fn lower_priority(&self, pid: u32) -> io::Result<()> {
        // SAFETY: setpriority takes plain integers and touches no memory.
        let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, pid as libc::id_t, Self::LOWEST) };
        if rc == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

/// `SetPriorityClass(IDLE_PRIORITY_CLASS)`.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct IdlePriorityClass;

#[cfg(windows)]
impl PriorityControl for IdlePriorityClass {
    fn lower_priority(&self, pid: u32) -> io::Result<()> {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Threading::{
            OpenProcess, SetPriorityClass, IDLE_PRIORITY_CLASS, PROCESS_SET_INFORMATION,
        };

        // SAFETY: the handle is checked before use and closed on every path.
        unsafe {
            let handle = OpenProcess(PROCESS_SET_INFORMATION, 0, pid);
            if handle == 0 {
                return Err(io::Error::last_os_error());
            }
            let ok = SetPriorityClass(handle, IDLE_PRIORITY_CLASS);
            let err = io::Error::last_os_error();
            CloseHandle(handle);
            if ok == 0 {
                Err(err)
            } else {
                Ok(())
            }
        }
    }
}

/// Leaves priority untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepPriority;

impl PriorityControl for KeepPriority {
    fn lower_priority(&self, _pid: u32) -> io::Result<()> {
        Ok(())
    }
}

/// The implementation for the current OS family.
pub fn platform_priority() -> Box<dyn PriorityControl> {
    #[cfg(unix)]
    {
        Box::new(NicePriority)
    }
    #[cfg(windows)]
    {
        Box::new(IdlePriorityClass)
    }
    #[cfg(not(any(unix, windows)))]
    {
        Box::new(KeepPriority)
    }
}
