//! Connection dispatcher
//!
//! The accept loop runs on the calling thread. Every step of a request runs
//! as a scheduler task and the loop waits on each task's future before
//! starting the next one:
//!
//! ```text
//! accept → receive → parse → route → decode → persist → respond
//! ```
//!
//! Failures after `receive` are still answered with a status line. Only a
//! closed scheduler ends the loop.

use crate::error::{ServerError, ServerResult, Status};
use crate::request::{Request, Route};
use crate::store::{StoreFile, StoreRecord};
use canteen_sched::{SchedError, SchedResult, Scheduler, TaskFuture};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Bytes read from a connection; the request line must fit
pub const BUFFER_SIZE: usize = 1024;

/// Read timeout applied to accepted connections
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Accepts connections and drives each request through the scheduler
pub struct Dispatcher<'s> {
    listener: TcpListener,
    local_addr: SocketAddr,
    scheduler: &'s Scheduler,
    store: Arc<StoreFile>,
    stop: Arc<AtomicBool>,
    read_timeout: Option<Duration>,
}

impl<'s> Dispatcher<'s> {
    /// Bind the listening socket
    pub fn bind<A>(addr: A, scheduler: &'s Scheduler, store: StoreFile) -> ServerResult<Self>
    where
        A: ToSocketAddrs + fmt::Display,
    {
        let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            scheduler,
            store: Arc::new(store),
            stop: Arc::new(AtomicBool::new(false)),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
        })
    }

    /// Override the per-connection read timeout; `None` blocks forever
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Store records are appended to
    pub fn store(&self) -> &StoreFile {
        &self.store
    }

    /// Handle that stops [`Dispatcher::serve`] from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            stop: Arc::clone(&self.stop),
            addr: self.local_addr,
        }
    }

    /// Run the accept loop.
    ///
    /// Returns the number of connections handled once the shutdown handle
    /// fires or the scheduler stops accepting tasks. A failing accept is
    /// returned as an error.
    pub fn serve(&self) -> ServerResult<u64> {
        tracing::info!(
            addr = %self.local_addr,
            workers = self.scheduler.worker_count(),
            store = %self.store.path().display(),
            "dispatcher listening"
        );

        let mut handled = 0u64;
        while !self.stop.load(Ordering::Acquire) {
            let (stream, peer) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    continue
                }
                Err(e) => return Err(e.into()),
            };

            if self.stop.load(Ordering::Acquire) {
                break;
            }

            match self.handle_connection(stream) {
                Ok(status) => {
                    handled += 1;
                    tracing::debug!(peer = %peer, status = status.code(), "request handled");
                }
                Err(e) if e.is_pool_closed() => {
                    tracing::warn!(peer = %peer, "scheduler closed, dispatcher stopping");
                    break;
                }
                Err(e) => {
                    handled += 1;
                    tracing::warn!(peer = %peer, status = e.status().code(), error = %e, "request failed");
                }
            }
        }

        tracing::info!(addr = %self.local_addr, handled, "dispatcher stopped");
        Ok(handled)
    }

    fn handle_connection(&self, stream: TcpStream) -> ServerResult<Status> {
        let (stream, bytes) = await_stage(
            self.scheduler
                .submit("receive", receive, (stream, self.read_timeout)),
            ServerError::Receive,
        )?;

        let outcome = self.process(bytes);
        let status = match &outcome {
            Ok(()) => Status::Ok,
            Err(e) if e.is_pool_closed() => return Err(ServerError::PoolClosed),
            Err(e) => e.status(),
        };

        await_stage(
            self.scheduler.submit("respond", respond, (stream, status)),
            ServerError::Respond,
        )?;
        outcome.map(|()| status)
    }

    fn process(&self, bytes: Vec<u8>) -> ServerResult<()> {
        let request = await_stage(
            self.scheduler
                .submit("parse", |bytes: Vec<u8>| Request::parse(&bytes), bytes),
            ServerError::Parse,
        )?;
        tracing::debug!(method = %request.method, path = %request.path, "request parsed");

        match request.route().map_err(ServerError::Route)? {
            Route::CreateStoreFile => {
                let record = await_stage(
                    self.scheduler.submit(
                        "decode",
                        |query: Vec<(String, String)>| StoreRecord::from_query(&query),
                        request.query,
                    ),
                    ServerError::Decode,
                )?;

                let store = Arc::clone(&self.store);
                await_stage(
                    self.scheduler.submit(
                        "persist",
                        move |record: StoreRecord| store.append(&record),
                        record,
                    ),
                    ServerError::Persist,
                )?;
            }
        }
        Ok(())
    }
}

/// Wait for a stage's task, tagging its failure with the stage
fn await_stage<R>(
    submitted: SchedResult<TaskFuture<R>>,
    stage: fn(SchedError) -> ServerError,
) -> ServerResult<R> {
    let tag = |err: SchedError| match err {
        SchedError::PoolClosed => ServerError::PoolClosed,
        other => stage(other),
    };
    submitted.map_err(tag)?.wait().map_err(tag)
}

fn receive(
    (mut stream, timeout): (TcpStream, Option<Duration>),
) -> io::Result<(TcpStream, Vec<u8>)> {
    stream.set_read_timeout(timeout)?;
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let n = stream.read(&mut buffer)?;
    buffer.truncate(n);
    Ok((stream, buffer))
}

fn respond((mut stream, status): (TcpStream, Status)) -> io::Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status.code(),
        status.reason()
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()
}

/// Stops a running [`Dispatcher`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl ShutdownHandle {
    /// Ask the accept loop to stop.
    ///
    /// A connection to the listener wakes an `accept` that is blocked.
    /// Calling this more than once has no further effect.
    pub fn trigger(&self) {
        if self.stop.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut wake = self.addr;
        if wake.ip().is_unspecified() {
            match wake {
                SocketAddr::V4(_) => wake.set_ip(Ipv4Addr::LOCALHOST.into()),
                SocketAddr::V6(_) => wake.set_ip(Ipv6Addr::LOCALHOST.into()),
            }
        }
        if let Err(e) = TcpStream::connect_timeout(&wake, Duration::from_secs(1)) {
            tracing::debug!(addr = %wake, error = %e, "wake connection failed");
        }
    }

    /// Whether [`ShutdownHandle::trigger`] has been called
    pub fn is_triggered(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canteen_sched::SchedulerConfig;

    #[test]
    fn test_await_stage_tags_failures() {
        let scheduler = Scheduler::new(SchedulerConfig::with_workers(1)).unwrap();

        let failed = await_stage(
            scheduler.submit("parse", |_: ()| Err::<(), _>("bad line"), ()),
            ServerError::Parse,
        );
        assert!(matches!(failed, Err(ServerError::Parse(SchedError::TaskFailure { .. }))));
        assert_eq!(failed.unwrap_err().status(), Status::BadRequest);

        scheduler.shutdown(canteen_sched::ShutdownMode::Graceful);
        let closed = await_stage(
            scheduler.submit("parse", |_: ()| Ok::<_, String>(()), ()),
            ServerError::Parse,
        );
        assert!(matches!(closed, Err(ServerError::PoolClosed)));
    }

    #[test]
    fn test_bind_error_names_address() {
        let scheduler = Scheduler::new(SchedulerConfig::with_workers(1)).unwrap();
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        match Dispatcher::bind(addr.as_str(), &scheduler, StoreFile::new("unused.txt")) {
            Err(ServerError::Bind { addr: reported, .. }) => assert_eq!(reported, addr),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("second bind succeeded"),
        }
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let scheduler = Scheduler::new(SchedulerConfig::with_workers(1)).unwrap();
        let dispatcher =
            Dispatcher::bind("127.0.0.1:0", &scheduler, StoreFile::new("unused.txt")).unwrap();
        let handle = dispatcher.shutdown_handle();
        assert!(!handle.is_triggered());
        handle.trigger();
        handle.trigger();
        assert!(handle.is_triggered());
        assert_eq!(dispatcher.serve().unwrap(), 0);
    }
}
