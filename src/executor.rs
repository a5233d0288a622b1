//! Cross-thread job execution on the event loop thread
//!
//! Some work has to happen on the thread driving the [`calloop`] event loop (everything touching the
//! scene, the surfaces or the seat), while the code that produces it runs elsewhere: backend setup
//! threads, blocking hardware callbacks and the like. A [`JobExecutor`] bridges the two.
//!
//! It owns a unidirectional pipe whose read end is registered with the event loop. Every call to
//! [`JobSubmitter::submit`] queues the job, releases the queue and then writes a single `NEW_JOB`
//! byte. The event loop wakes up, reads the pending bytes, takes the whole queue in one go and runs
//! it in submission order. [`JobSubmitter::fire_finished_event`] writes a `FINISHED` byte instead,
//! which closes both ends of the pipe and removes the event source once the jobs queued before it
//! have run.
//!
//! Both ends of the pipe are non-blocking. A submitter finding the pipe full skips its byte: the
//! event loop has unread wakeups at that point and picks the job up with the rest of the queue.
//!
//! ```no_run
//! use calloop::EventLoop;
//! use compositor_core::executor::JobExecutor;
//!
//! let mut event_loop = EventLoop::<()>::try_new().unwrap();
//! let mut executor = JobExecutor::new().unwrap();
//! executor.start(&event_loop.handle()).unwrap();
//!
//! let submitter = executor.submitter();
//! std::thread::spawn(move || {
//!     // blocking work happens here...
//!     submitter
//!         .submit(|| println!("back on the event loop thread"))
//!         .unwrap();
//! });
//!
//! event_loop.dispatch(None, &mut ()).unwrap();
//! ```

use std::{
    collections::VecDeque,
    fmt, io, mem,
    os::fd::{AsFd, OwnedFd},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use calloop::{generic::Generic, Interest, LoopHandle, Mode, PostAction, RegistrationToken};
use rustix::{
    io::Errno,
    pipe::{pipe_with, PipeFlags},
};
use tracing::{debug, error, trace, warn};

const EVENT_FINISHED: u8 = 0;
const EVENT_NEW_JOB: u8 = 1;

// bytes read from the pipe per wakeup, the source fires again while more are pending
const READ_CHUNK: usize = 4096;

/// A unit of work run on the event loop thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors of the [`JobExecutor`]
///
/// All of them are lifecycle or protocol violations committed by this process, not by a client.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// [`JobExecutor::start`] was called more than once
    #[error("job executor already started")]
    AlreadyStarted,
    /// The executor was told to finish, no further jobs are accepted
    #[error("job executor has been shut down")]
    ShutDown,
    /// A byte that is neither `NEW_JOB` nor `FINISHED` was read from the pipe
    #[error("illegal job executor event code {0}")]
    IllegalEvent(u8),
    /// Reading or writing the pipe failed
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The pipe could not be registered with the event loop
    #[error("failed to register the job executor with the event loop: {0}")]
    Insert(#[source] calloop::Error),
}

impl From<ExecutorError> for io::Error {
    fn from(err: ExecutorError) -> io::Error {
        match err {
            ExecutorError::Io(err) => err,
            err => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

struct JobQueue {
    pending: VecDeque<Job>,
    // `None` once the event loop processed the FINISHED event
    writer: Option<Arc<OwnedFd>>,
    finishing: bool,
    // FINISHED was requested while the pipe was full
    finish_unsignaled: bool,
}

/// Write one event byte, returns `false` if the pipe was full
fn write_event(writer: &OwnedFd, event: u8) -> io::Result<bool> {
    match rustix::io::retry_on_intr(|| rustix::io::write(writer, &[event])) {
        Ok(_) => Ok(true),
        Err(Errno::AGAIN) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn lock(queue: &Mutex<JobQueue>) -> MutexGuard<'_, JobQueue> {
    // jobs never run while the lock is held, the queue itself stays consistent
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe handle to submit jobs to a [`JobExecutor`]
///
/// It can be cloned and sent to any thread.
#[derive(Clone)]
pub struct JobSubmitter {
    queue: Arc<Mutex<JobQueue>>,
}

impl fmt::Debug for JobSubmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = lock(&self.queue);
        f.debug_struct("JobSubmitter")
            .field("pending", &queue.pending.len())
            .field("finishing", &queue.finishing)
            .finish()
    }
}

impl JobSubmitter {
    /// Queue a job and wake up the event loop
    ///
    /// Jobs run on the event loop thread, one at a time, in the order they were submitted. This never
    /// blocks on the pipe, so it may be called from a job as well.
    pub fn submit<F>(&self, job: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        let writer = {
            let mut queue = lock(&self.queue);
            let Some(writer) = queue.writer.clone().filter(|_| !queue.finishing) else {
                return Err(ExecutorError::ShutDown);
            };
            queue.pending.push_back(Box::new(job));
            writer
        };

        match write_event(&writer, EVENT_NEW_JOB) {
            Ok(true) => trace!("job submitted"),
            Ok(false) => trace!("job submitted, wakeups already pending"),
            // the reader is only gone once the queue was drained for FINISHED
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                trace!("job submitted while the executor finished")
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    /// Ask the executor to shut down
    ///
    /// Jobs submitted before this call still run, later submissions fail with
    /// [`ExecutorError::ShutDown`]. Calling it again has no effect.
    pub fn fire_finished_event(&self) -> Result<(), ExecutorError> {
        let writer = {
            let mut queue = lock(&self.queue);
            let Some(writer) = queue.writer.clone().filter(|_| !queue.finishing) else {
                return Ok(());
            };
            queue.finishing = true;
            writer
        };

        if !write_event(&writer, EVENT_FINISHED)? {
            // a full pipe wakes the event loop anyway, it finds the request in the queue
            lock(&self.queue).finish_unsignaled = true;
        }
        debug!("job executor finish requested");
        Ok(())
    }

    /// Whether the executor has processed its `FINISHED` event
    pub fn is_finished(&self) -> bool {
        lock(&self.queue).writer.is_none()
    }

    #[cfg(test)]
    fn write_raw_event(&self, event: u8) -> io::Result<bool> {
        let writer = lock(&self.queue).writer.clone();
        match writer {
            Some(writer) => write_event(&writer, event),
            None => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
        }
    }
}

/// Runs jobs submitted from arbitrary threads on the event loop thread
pub struct JobExecutor<D> {
    submitter: JobSubmitter,
    reader: Option<OwnedFd>,
    handle: Option<LoopHandle<'static, D>>,
    token: Option<RegistrationToken>,
}

impl<D> fmt::Debug for JobExecutor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobExecutor")
            .field("submitter", &self.submitter)
            .field("started", &self.reader.is_none())
            .field("token", &self.token)
            .finish()
    }
}

impl<D: 'static> JobExecutor<D> {
    /// Create a new executor and its pipe
    ///
    /// Jobs may be submitted right away, they run once [`JobExecutor::start`] registered the
    /// executor with an event loop.
    pub fn new() -> Result<JobExecutor<D>, ExecutorError> {
        let (reader, writer) =
            pipe_with(PipeFlags::CLOEXEC | PipeFlags::NONBLOCK).map_err(io::Error::from)?;
        Ok(JobExecutor {
            submitter: JobSubmitter {
                queue: Arc::new(Mutex::new(JobQueue {
                    pending: VecDeque::new(),
                    writer: Some(Arc::new(writer)),
                    finishing: false,
                    finish_unsignaled: false,
                })),
            },
            reader: Some(reader),
            handle: None,
            token: None,
        })
    }

    /// Register the read end of the pipe with the event loop
    ///
    /// Fails with [`ExecutorError::AlreadyStarted`] when called a second time.
    pub fn start(&mut self, handle: &LoopHandle<'static, D>) -> Result<(), ExecutorError> {
        let Some(reader) = self.reader.take() else {
            return Err(ExecutorError::AlreadyStarted);
        };

        let queue = self.submitter.queue.clone();
        let token = handle
            .insert_source(
                Generic::new(reader, Interest::READ, Mode::Level),
                move |_, reader, _| drain(&queue, reader.as_fd()),
            )
            .map_err(|err| ExecutorError::Insert(err.error))?;

        debug!("job executor started");
        self.handle = Some(handle.clone());
        self.token = Some(token);
        Ok(())
    }

    /// A handle to submit jobs from any thread
    pub fn submitter(&self) -> JobSubmitter {
        self.submitter.clone()
    }

    /// Queue a job, see [`JobSubmitter::submit`]
    pub fn submit<F>(&self, job: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submitter.submit(job)
    }

    /// Ask the executor to shut down, see [`JobSubmitter::fire_finished_event`]
    pub fn fire_finished_event(&self) -> Result<(), ExecutorError> {
        self.submitter.fire_finished_event()
    }

    /// Whether the executor has processed its `FINISHED` event
    pub fn is_finished(&self) -> bool {
        self.submitter.is_finished()
    }
}

impl<D> Drop for JobExecutor<D> {
    fn drop(&mut self) {
        if let (Some(handle), Some(token)) = (self.handle.take(), self.token.take()) {
            // a finished executor already removed its source
            if lock(&self.submitter.queue).writer.is_some() {
                handle.remove(token);
            }
        }
    }
}

fn drain(queue: &Mutex<JobQueue>, reader: impl AsFd) -> io::Result<PostAction> {
    let mut events = [0u8; READ_CHUNK];
    let read = match rustix::io::retry_on_intr(|| rustix::io::read(&reader, &mut events)) {
        Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
        Ok(read) => read,
        Err(Errno::AGAIN) => 0,
        Err(err) => return Err(err.into()),
    };

    let mut finished = false;
    for event in &events[..read] {
        match *event {
            EVENT_NEW_JOB => {}
            EVENT_FINISHED => finished = true,
            event => {
                error!(event, "illegal job executor event");
                return Err(ExecutorError::IllegalEvent(event).into());
            }
        }
    }

    // everything queued so far, jobs submitted while these run wait for the next wakeup
    let jobs = {
        let mut queue = lock(queue);
        finished |= mem::take(&mut queue.finish_unsignaled);
        mem::take(&mut queue.pending)
    };
    if jobs.is_empty() {
        trace!(wakeups = read, "no job left for these wakeups");
    }
    for job in jobs {
        job();
    }

    if !finished {
        return Ok(PostAction::Continue);
    }
    let (writer, left) = {
        let mut queue = lock(queue);
        (queue.writer.take(), mem::take(&mut queue.pending))
    };
    // the write end closes with its last user, the reader with the event source
    drop(writer);
    if !left.is_empty() {
        warn!(dropped = left.len(), "job executor finished with jobs left");
    }
    debug!("job executor finished");
    Ok(PostAction::Remove)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::{Duration, Instant},
    };

    use calloop::EventLoop;

    fn dispatch_until(event_loop: &mut EventLoop<'static, ()>, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for jobs");
            event_loop
                .dispatch(Some(Duration::from_millis(50)), &mut ())
                .unwrap();
        }
    }

    fn started() -> (EventLoop<'static, ()>, JobExecutor<()>) {
        crate::utils::test_logging();
        let event_loop = EventLoop::try_new().unwrap();
        let mut executor = JobExecutor::new().unwrap();
        executor.start(&event_loop.handle()).unwrap();
        (event_loop, executor)
    }

    #[test]
    fn jobs_run_in_submission_order() {
        let (mut event_loop, executor) = started();
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in 1..=3 {
            let log = log.clone();
            executor.submit(move || log.lock().unwrap().push(id)).unwrap();
        }

        dispatch_until(&mut event_loop, || log.lock().unwrap().len() == 3);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn jobs_from_many_threads_run_exactly_once() {
        const THREADS: usize = 4;
        const JOBS: usize = 250;

        let (mut event_loop, executor) = started();
        let log = Arc::new(Mutex::new(Vec::new()));

        let workers: Vec<_> = (0..THREADS)
            .map(|worker| {
                let submitter = executor.submitter();
                let log = log.clone();
                thread::spawn(move || {
                    for job in 0..JOBS {
                        let log = log.clone();
                        submitter
                            .submit(move || log.lock().unwrap().push((worker, job)))
                            .unwrap();
                    }
                })
            })
            .collect();

        dispatch_until(&mut event_loop, || log.lock().unwrap().len() == THREADS * JOBS);
        for worker in workers {
            worker.join().unwrap();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), THREADS * JOBS);
        for worker in 0..THREADS {
            // each thread's own jobs keep their relative order
            let own: Vec<usize> = log.iter().filter(|(w, _)| *w == worker).map(|(_, j)| *j).collect();
            assert_eq!(own, (0..JOBS).collect::<Vec<_>>());
        }
    }

    #[test]
    fn jobs_submitted_while_draining_run_after_the_current_batch() {
        let (mut event_loop, executor) = started();
        let log = Arc::new(Mutex::new(Vec::new()));

        {
            let submitter = executor.submitter();
            let log = log.clone();
            executor
                .submit(move || {
                    log.lock().unwrap().push("outer");
                    let inner_log = log.clone();
                    submitter
                        .submit(move || inner_log.lock().unwrap().push("inner"))
                        .unwrap();
                })
                .unwrap();
        }
        {
            let log = log.clone();
            executor.submit(move || log.lock().unwrap().push("second")).unwrap();
        }

        dispatch_until(&mut event_loop, || log.lock().unwrap().len() == 3);
        assert_eq!(*log.lock().unwrap(), vec!["outer", "second", "inner"]);
    }

    // more wakeups than a pipe buffer holds
    const FLOOD: usize = 70_000;

    #[test]
    fn submitting_never_blocks_on_a_full_pipe() {
        let (mut event_loop, executor) = started();
        let ran = Arc::new(AtomicUsize::new(0));

        let worker = {
            let submitter = executor.submitter();
            let ran = ran.clone();
            thread::spawn(move || {
                for _ in 0..FLOOD {
                    let ran = ran.clone();
                    submitter
                        .submit(move || {
                            ran.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            })
        };
        // the event loop has not read anything yet
        worker.join().unwrap();

        dispatch_until(&mut event_loop, || ran.load(Ordering::SeqCst) == FLOOD);
        event_loop.dispatch(Some(Duration::from_millis(10)), &mut ()).unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), FLOOD);
    }

    #[test]
    fn jobs_may_flood_the_pipe_from_the_event_loop_thread() {
        let (mut event_loop, executor) = started();
        let ran = Arc::new(AtomicUsize::new(0));

        {
            let submitter = executor.submitter();
            let ran = ran.clone();
            executor
                .submit(move || {
                    for _ in 0..FLOOD {
                        let ran = ran.clone();
                        submitter
                            .submit(move || {
                                ran.fetch_add(1, Ordering::SeqCst);
                            })
                            .unwrap();
                    }
                })
                .unwrap();
        }

        dispatch_until(&mut event_loop, || ran.load(Ordering::SeqCst) == FLOOD);
    }

    #[test]
    fn finish_requested_on_a_full_pipe_still_runs_queued_jobs() {
        let (mut event_loop, executor) = started();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..FLOOD {
            let ran = ran.clone();
            executor
                .submit(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        executor.fire_finished_event().unwrap();

        dispatch_until(&mut event_loop, || executor.is_finished());
        assert_eq!(ran.load(Ordering::SeqCst), FLOOD);
    }

    #[test]
    fn jobs_submitted_before_start_run_once_started() {
        let mut event_loop = EventLoop::try_new().unwrap();
        let mut executor = JobExecutor::new().unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        {
            let ran = ran.clone();
            executor.submit(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        event_loop.dispatch(Some(Duration::ZERO), &mut ()).unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        executor.start(&event_loop.handle()).unwrap();
        dispatch_until(&mut event_loop, || ran.load(Ordering::SeqCst) == 1);
    }

    #[test]
    fn starting_twice_fails() {
        let (event_loop, mut executor) = started();

        assert!(matches!(
            executor.start(&event_loop.handle()),
            Err(ExecutorError::AlreadyStarted)
        ));
    }

    #[test]
    fn finished_event_shuts_down_once() {
        let (mut event_loop, executor) = started();
        let ran = Arc::new(AtomicUsize::new(0));

        {
            let ran = ran.clone();
            executor.submit(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        executor.fire_finished_event().unwrap();
        // a second request must not put another FINISHED byte in the pipe
        executor.fire_finished_event().unwrap();
        assert!(matches!(executor.submit(|| ()), Err(ExecutorError::ShutDown)));

        dispatch_until(&mut event_loop, || executor.is_finished());
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        // nothing is left to wake the loop up
        event_loop.dispatch(Some(Duration::from_millis(10)), &mut ()).unwrap();
        assert!(executor.fire_finished_event().is_ok());
        assert!(matches!(executor.submit(|| ()), Err(ExecutorError::ShutDown)));
    }

    #[test]
    fn illegal_event_code_is_fatal() {
        let (mut event_loop, executor) = started();

        executor.submitter().write_raw_event(42).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            assert!(Instant::now() < deadline, "illegal event was never processed");
            if event_loop
                .dispatch(Some(Duration::from_millis(50)), &mut ())
                .is_err()
            {
                break;
            }
        }
    }
}
