use std::io;

use rama::telemetry::tracing;

pub use libc::rlim_t;

/// Raise the soft limit of open file descriptors towards `target`,
/// capped by the hard limit. Returns the soft limit in effect afterwards.
///
/// A load generator keeps thousands of connections open,
/// which quickly exhausts the common default of 1024.
pub fn raise_nofile(target: rlim_t) -> io::Result<rlim_t> {
    let mut limit = get_nofile_limit()?;

    let new_soft = target.min(limit.rlim_max);
    if limit.rlim_cur >= new_soft {
        tracing::debug!(
            ulimit.current = limit.rlim_cur,
            ulimit.target = new_soft,
            "ulimit: current soft limit is sufficient",
        );
        return Ok(limit.rlim_cur);
    }

    let previous = limit.rlim_cur;
    limit.rlim_cur = new_soft;
    set_nofile_limit(&limit)?;

    tracing::info!(
        ulimit.previous = previous,
        ulimit.current = new_soft,
        "ulimit: raised soft limit of open file descriptors",
    );
    Ok(new_soft)
}

fn get_nofile_limit() -> io::Result<libc::rlimit> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid, exclusively borrowed rlimit struct
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(limit)
}

fn set_nofile_limit(limit: &libc::rlimit) -> io::Result<()> {
    // SAFETY: `limit` points to a valid rlimit struct
    if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, limit) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
