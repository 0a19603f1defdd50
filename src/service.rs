//! Service execution control.
//!
//! All services are basically a loop, and we would like to be able to
//! gracefully terminate them, and handle a top-level error of any of
//! them by gracefully stopping everything else.

pub mod api;
pub mod settlement;
pub mod signal_feed;
pub mod sweeper;

use crate::event_log::{self, LogEvent};
use anyhow::{bail, format_err, Result};
use std::{
    sync::{
        atomic::{self, AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use tracing::error;

/// A service that handles events on the log
pub trait LogFollowerService: Send {
    fn name(&self) -> &'static str;

    fn handle_event(&mut self, event: &LogEvent) -> Result<()>;
}

/// A service that is a loop that does something
pub trait LoopService: Send {
    fn name(&self) -> &'static str;

    fn run_iteration(&mut self) -> Result<()>;
}

const FOLLOWER_READ_LIMIT: usize = 16;
const FOLLOWER_READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Default)]
pub struct ServiceControl {
    stop_all: Arc<AtomicBool>,
}

impl ServiceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_all(&self) {
        self.stop_all.store(true, Ordering::SeqCst);
    }

    pub fn spawn_loop(&self, mut service: impl LoopService + 'static) -> JoinHandle {
        self.spawn_loop_raw(service.name(), move || service.run_iteration())
    }

    /// Follow the event log from its start, feeding each event to the
    /// service. The read blocks with a short timeout so the stop flag
    /// is still checked regularly on an idle log.
    pub fn spawn_log_follower(
        &self,
        mut service: impl LogFollowerService + 'static,
        event_reader: event_log::SharedReader,
    ) -> JoinHandle {
        let name = service.name();
        let mut progress = None;

        self.spawn_loop_raw(name, move || {
            let offset = match progress {
                Some(offset) => offset,
                None => event_reader.get_start_offset()?,
            };

            let batch = event_reader.read(
                offset,
                FOLLOWER_READ_LIMIT,
                Some(FOLLOWER_READ_TIMEOUT),
            )?;

            for event in &batch.data {
                service.handle_event(event)?;
            }
            progress = Some(batch.offset);
            Ok(())
        })
    }

    /// Start a new service as a loop, with a certain body
    ///
    /// This will take care of checking the termination condition and
    /// handling any errors returned by `f`
    fn spawn_loop_raw<F>(&self, name: &'static str, mut f: F) -> JoinHandle
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));

        JoinHandle::new(
            stop.clone(),
            thread::spawn({
                let stop_all = self.stop_all.clone();
                move || match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    while !stop.load(atomic::Ordering::SeqCst)
                        && !stop_all.load(atomic::Ordering::SeqCst)
                    {
                        if let Err(e) = f() {
                            error!(service = name, err = %e, "service failed");
                            stop_all.store(true, atomic::Ordering::SeqCst);
                            return Err(e);
                        }
                    }
                    Ok(())
                })) {
                    Err(_e) => {
                        stop_all.store(true, atomic::Ordering::SeqCst);
                        bail!("service panicked: {name}");
                    }
                    Ok(res) => res,
                }
            }),
        )
    }
}

/// Simple thread join wrapper that stops and joins the thread on drop
pub struct JoinHandle {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<Result<()>>>,
}

impl JoinHandle {
    fn new(stop: Arc<AtomicBool>, handle: thread::JoinHandle<Result<()>>) -> Self {
        JoinHandle {
            stop,
            thread: Some(handle),
        }
    }

    fn join_mut(&mut self) -> Result<()> {
        if let Some(h) = self.thread.take() {
            h.join().map_err(|e| format_err!("join failed: {:?}", e))?
        } else {
            Ok(())
        }
    }

    pub fn join(mut self) -> Result<()> {
        self.join_mut()
    }
}

impl Drop for JoinHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.join_mut() {
            error!(err = %e, "service terminated with error");
        }
    }
}
