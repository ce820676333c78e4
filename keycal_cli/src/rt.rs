//! Real-time setup for the simulate loop: page locking and SCHED_FIFO.
//!
//! Both steps are best effort. A failure is logged with the missing
//! capability and the run continues at normal priority.

#[cfg(target_os = "linux")]
mod linux {
    use std::io;

    fn is_limit_error(err: &io::Error) -> bool {
        matches!(err.raw_os_error(), Some(libc::EPERM | libc::ENOMEM))
    }

    fn memlock_soft_limit_kib() -> Option<u64> {
        let mut rlim = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: rlim is a valid, writable rlimit.
        if unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, &mut rlim) } != 0 {
            return None;
        }
        (rlim.rlim_cur != libc::RLIM_INFINITY).then_some(rlim.rlim_cur / 1024)
    }

    /// Lock current and future pages, degrading to current pages only when
    /// the memlock limit is too small for future growth.
    pub fn lock_pages() -> eyre::Result<&'static str> {
        // SAFETY: mlockall takes only flags.
        if unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) } == 0 {
            return Ok("current|future");
        }
        let err = io::Error::last_os_error();
        if !is_limit_error(&err) {
            eyre::bail!("mlockall failed: {err}");
        }
        // SAFETY: as above.
        if unsafe { libc::mlockall(libc::MCL_CURRENT) } == 0 {
            return Ok("current");
        }
        let limit = memlock_soft_limit_kib()
            .map_or_else(|| "unlimited".to_string(), |k| format!("{k} KiB"));
        eyre::bail!("mlockall failed: {err} (memlock limit {limit}; needs CAP_IPC_LOCK or a larger 'ulimit -l')")
    }

    /// Switch the calling thread to SCHED_FIFO. `prio` is clamped into the
    /// range the kernel reports; `None` takes the maximum.
    pub fn fifo(prio: Option<i32>) -> eyre::Result<i32> {
        // SAFETY: plain queries with a valid policy constant.
        let (lo, hi) = unsafe {
            (
                libc::sched_get_priority_min(libc::SCHED_FIFO),
                libc::sched_get_priority_max(libc::SCHED_FIFO),
            )
        };
        let (lo, hi) = if lo < 0 || hi < 0 { (1, 99) } else { (lo, hi) };
        let chosen = prio.map_or(hi, |p| p.clamp(lo, hi));
        let param = libc::sched_param {
            sched_priority: chosen,
        };
        // SAFETY: pid 0 is the calling thread; param outlives the call.
        if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
            let err = io::Error::last_os_error();
            // SAFETY: geteuid has no preconditions.
            let euid = unsafe { libc::geteuid() };
            eyre::bail!("SCHED_FIFO {chosen} refused: {err} (needs CAP_SYS_NICE, euid {euid})");
        }
        Ok(chosen)
    }
}

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>) {
    use std::sync::OnceLock;
    static APPLIED: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }
    APPLIED.get_or_init(|| {
        match linux::lock_pages() {
            Ok(scope) => tracing::info!(scope, "memory locked"),
            Err(e) => tracing::warn!(error = %e, "memory lock unavailable; continuing"),
        }
        match linux::fifo(prio) {
            Ok(p) => tracing::info!(prio = p, "SCHED_FIFO enabled"),
            Err(e) => tracing::warn!(error = %e, "real-time priority unavailable; continuing"),
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool, _prio: Option<i32>) {
    if rt {
        tracing::warn!("real-time mode is only supported on Linux; ignoring --rt");
    }
}
