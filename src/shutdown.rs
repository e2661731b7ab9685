//! Process-wide stop request, raised by SIGINT/SIGTERM or by typing `q`.

use std::{
    io::BufRead,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn request() {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

pub fn requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

/// Install SIGINT/SIGTERM handlers. The handler only stores to an atomic.
#[cfg(unix)]
pub fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
pub fn install_signal_handlers() {
    log::info!("signal handlers unavailable on this platform, type `q` to quit");
}

#[cfg(unix)]
extern "C" fn signal_handler(_sig: libc::c_int) {
    request();
}

/// Watch stdin on a detached thread and request shutdown on a `q` line.
pub fn watch_stdin() {
    let spawned = thread::Builder::new()
        .name("stdin-quit".into())
        .spawn(|| {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                        request();
                        break;
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        });
    if let Err(err) = spawned {
        log::warn!("failed to watch stdin for `q`: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_sticky_and_idempotent() {
        request();
        request();
        assert!(requested());
    }

    #[cfg(unix)]
    #[test]
    fn sigterm_sets_the_flag() {
        install_signal_handlers();
        unsafe {
            libc::raise(libc::SIGTERM);
        }
        assert!(requested());
    }
}
