//! bwt daemon process management

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use bwtctl_core::logging::DAEMON_OUTPUT_TARGET;
use bwtctl_core::prelude::*;
use bwtctl_core::{DaemonEvent, Generation, LogRecord};

use crate::binary::resolve_daemon_binary;
use crate::log_parser::{is_readiness, parse_log_line};

/// Called from the reader task the first time a launch reports readiness.
///
/// Receives the launch generation and its RPC port. Runs on a tokio worker
/// thread, so whatever it touches must be `Send + Sync`.
pub type ReadyHook = Arc<dyn Fn(Generation, u16) + Send + Sync>;

/// Everything needed to start one daemon instance
pub struct LaunchRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub generation: Generation,
    /// Port passed in `--electrum-addr`, reported back in `RpcReady`
    pub port: u16,
    pub event_tx: mpsc::Sender<DaemonEvent>,
    pub on_ready: Option<ReadyHook>,
}

/// A live daemon instance as seen by the supervisor
pub trait RunningDaemon: Send {
    fn id(&self) -> Option<u32>;

    fn generation(&self) -> Generation;

    /// Request termination without waiting for the process to exit
    fn terminate(&mut self);
}

/// Starts daemon instances.
///
/// The supervisor only talks to this trait so tests can substitute a fake.
pub trait Launcher: Send + Sync {
    /// Locate the daemon executable, honoring a configured path
    fn resolve_program(&self, configured: Option<&Path>) -> Result<PathBuf> {
        resolve_daemon_binary(configured)
    }

    fn launch(&self, request: LaunchRequest) -> Result<Box<dyn RunningDaemon>>;
}

/// Manages one bwt child process and its output reader.
///
/// stdout and stderr are read by a single background task, so records reach
/// the event channel in the order they were read. The task ends on its own
/// once both streams are closed; nobody joins it.
pub struct DaemonProcess {
    child: Child,
    pid: Option<u32>,
    generation: Generation,
    #[cfg_attr(not(test), allow(dead_code))]
    reader: JoinHandle<()>,
}

impl DaemonProcess {
    /// Spawn the daemon. Must be called from within a tokio runtime.
    pub fn spawn(request: LaunchRequest) -> Result<Self> {
        let LaunchRequest {
            program,
            args,
            generation,
            port,
            event_tx,
            on_ready,
        } = request;

        info!(
            "Spawning bwt {}: {} ({} args)",
            generation,
            program.display(),
            args.len()
        );

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::DaemonNotFound {
                        searched: program.display().to_string(),
                    }
                } else {
                    Error::process_spawn(e.to_string())
                }
            })?;

        let pid = child.id();
        info!("bwt process {} started with PID: {:?}", generation, pid);

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(Error::process_spawn("daemon output pipes were not captured"));
        };

        let context = ReaderContext {
            generation,
            port,
            event_tx,
            on_ready,
            ready_fired: false,
            forwarding: true,
            dropped: 0,
        };
        let reader = tokio::spawn(Self::output_reader(stdout, stderr, context));

        Ok(Self {
            child,
            pid,
            generation,
            reader,
        })
    }

    /// Read both output streams line by line until each reaches EOF
    async fn output_reader(stdout: ChildStdout, stderr: ChildStderr, mut context: ReaderContext) {
        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            let line = tokio::select! {
                line = stdout.next_line(), if stdout_open => {
                    match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            stdout_open = false;
                            continue;
                        }
                        Err(e) => {
                            warn!("Error reading daemon stdout: {}", e);
                            stdout_open = false;
                            continue;
                        }
                    }
                }
                line = stderr.next_line(), if stderr_open => {
                    match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            stderr_open = false;
                            continue;
                        }
                        Err(e) => {
                            warn!("Error reading daemon stderr: {}", e);
                            stderr_open = false;
                            continue;
                        }
                    }
                }
            };

            context.handle_line(&line).await;
        }

        info!("bwt {} output closed", context.generation);
        let generation = context.generation;
        context
            .forward(DaemonEvent::OutputClosed { generation })
            .await;
    }

    /// Ask the daemon to shut down and return immediately.
    ///
    /// On unix this is a SIGTERM the daemon may handle to clean up its
    /// listeners. Elsewhere, or if the signal cannot be sent, the process is
    /// killed. Nothing waits for the exit; `kill_on_drop` reaps stragglers.
    pub fn terminate(&mut self) {
        if let Ok(Some(status)) = self.child.try_wait() {
            debug!("bwt {} already exited: {}", self.generation, status);
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    Ok(()) => {
                        info!("Sent SIGTERM to bwt {} (PID {})", self.generation, pid);
                        return;
                    }
                    Err(e) => warn!("SIGTERM to bwt {} failed: {}", self.generation, e),
                }
            }
        }

        match self.child.start_kill() {
            Ok(()) => info!("Killed bwt {}", self.generation),
            // already exited and reaped
            Err(e) => debug!("bwt {} not killed: {}", self.generation, e),
        }
    }

    /// Whether the process has exited (non-blocking)
    #[cfg(test)]
    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Whether the output reader task is still running
    #[cfg(test)]
    fn is_reading(&self) -> bool {
        !self.reader.is_finished()
    }

    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}

impl RunningDaemon for DaemonProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn generation(&self) -> Generation {
        self.generation
    }

    fn terminate(&mut self) {
        DaemonProcess::terminate(self)
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        // kill_on_drop on the Child covers the process itself
        debug!("DaemonProcess {} dropped", self.generation);
    }
}

/// Per-launch state owned by the reader task
struct ReaderContext {
    generation: Generation,
    port: u16,
    event_tx: mpsc::Sender<DaemonEvent>,
    on_ready: Option<ReadyHook>,
    ready_fired: bool,
    /// Cleared when the receiver goes away; reading continues so the
    /// daemon never blocks on a full pipe
    forwarding: bool,
    /// Log records discarded since the channel last had room
    dropped: u64,
}

impl ReaderContext {
    async fn handle_line(&mut self, raw: &str) {
        debug!(target: DAEMON_OUTPUT_TARGET, "{} {}", self.generation, raw);

        if raw.trim().is_empty() {
            return;
        }

        let record = parse_log_line(raw);
        let ready = !self.ready_fired && is_readiness(&record);

        if ready {
            self.ready_fired = true;
            info!("bwt {} RPC server ready on port {}", self.generation, self.port);
            if let Some(hook) = &self.on_ready {
                hook(self.generation, self.port);
            }
        }

        self.forward_record(record);

        if ready {
            let event = DaemonEvent::RpcReady {
                generation: self.generation,
                port: self.port,
            };
            self.forward(event).await;
        }
    }

    /// Log records never wait for the consumer.
    ///
    /// A full channel drops the record so the reader keeps up with the
    /// daemon's output and still sees a later readiness line.
    fn forward_record(&mut self, record: LogRecord) {
        if !self.forwarding {
            return;
        }
        let event = DaemonEvent::Log {
            generation: self.generation,
            record,
        };
        match self.event_tx.try_send(event) {
            Ok(()) => {
                if self.dropped > 0 {
                    warn!(
                        "Event channel drained, {} bwt {} log lines were dropped",
                        self.dropped, self.generation
                    );
                    self.dropped = 0;
                }
            }
            Err(TrySendError::Full(_)) => {
                if self.dropped == 0 {
                    warn!("Event channel full, dropping bwt {} log lines", self.generation);
                }
                self.dropped += 1;
            }
            Err(TrySendError::Closed(_)) => self.stop_forwarding(),
        }
    }

    /// Lifecycle events (readiness, output closed) wait for room
    async fn forward(&mut self, event: DaemonEvent) {
        if !self.forwarding {
            return;
        }
        if self.event_tx.send(event).await.is_err() {
            self.stop_forwarding();
        }
    }

    fn stop_forwarding(&mut self) {
        debug!(
            "Event channel closed, draining bwt {} output",
            self.generation
        );
        self.forwarding = false;
    }
}

/// [`Launcher`] that spawns real processes on a tokio runtime
#[derive(Clone)]
pub struct ProcessLauncher {
    handle: Handle,
}

impl ProcessLauncher {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Launcher bound to the runtime of the calling task
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, request: LaunchRequest) -> Result<Box<dyn RunningDaemon>> {
        let _guard = self.handle.enter();
        let process = DaemonProcess::spawn(request)?;
        Ok(Box::new(process))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use bwtctl_core::LogLevel;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    fn shell_request(
        script: &str,
        generation: u64,
        event_tx: mpsc::Sender<DaemonEvent>,
        on_ready: Option<ReadyHook>,
    ) -> LaunchRequest {
        LaunchRequest {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            generation: Generation(generation),
            port: 50001,
            event_tx,
            on_ready,
        }
    }

    /// Collect events until `OutputClosed` (or a timeout)
    async fn collect_until_closed(rx: &mut mpsc::Receiver<DaemonEvent>) -> Vec<DaemonEvent> {
        let mut events = Vec::new();
        loop {
            match timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Some(event)) => {
                    let closed = matches!(event, DaemonEvent::OutputClosed { .. });
                    events.push(event);
                    if closed {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => panic!("timed out waiting for OutputClosed, got {:?}", events),
            }
        }
        events
    }

    fn records(events: &[DaemonEvent]) -> Vec<LogRecord> {
        events.iter().filter_map(|e| e.record().cloned()).collect()
    }

    #[tokio::test]
    async fn test_lines_are_classified_and_forwarded() {
        let (tx, mut rx) = mpsc::channel(16);
        let script = "echo '2023-01-01T00:00:00Z INFO bwt::indexer > Initial sync started'; \
                      echo 'error: something broke'; \
                      echo 'random garbage'";
        let _process = DaemonProcess::spawn(shell_request(script, 1, tx, None)).unwrap();

        let events = collect_until_closed(&mut rx).await;
        let records = records(&events);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[0].tag, "bwt::indexer");
        assert_eq!(records[1].level, LogLevel::Error);
        assert_eq!(records[1].message, "something broke");
        assert_eq!(records[2].tag, "daemon");
        assert!(events.iter().all(|e| e.generation() == Generation(1)));
        assert!(matches!(
            events.last(),
            Some(DaemonEvent::OutputClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_stderr_is_part_of_the_stream() {
        let (tx, mut rx) = mpsc::channel(16);
        let script = "echo 'Error: bad flag' 1>&2";
        let _process = DaemonProcess::spawn(shell_request(script, 1, tx, None)).unwrap();

        let records = records(&collect_until_closed(&mut rx).await);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Error);
        assert_eq!(records[0].message, "bad flag");
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let (tx, mut rx) = mpsc::channel(16);
        let script = "echo; echo '   '; echo 'INFO bwt::app > hi'";
        let _process = DaemonProcess::spawn(shell_request(script, 1, tx, None)).unwrap();

        let records = records(&collect_until_closed(&mut rx).await);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "hi");
    }

    #[tokio::test]
    async fn test_readiness_hook_fires_once() {
        let (tx, mut rx) = mpsc::channel(16);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let hook_calls = Arc::clone(&calls);
        let hook: ReadyHook = Arc::new(move |generation, port| {
            hook_calls.lock().unwrap().push((generation, port));
        });

        let script = "echo 'INFO bwt::electrum::server > Electrum RPC server running on 127.0.0.1:50001'; \
                      echo 'INFO bwt::electrum::server > Electrum RPC server running again'";
        let _process = DaemonProcess::spawn(shell_request(script, 4, tx, Some(hook))).unwrap();

        let events = collect_until_closed(&mut rx).await;

        assert_eq!(*calls.lock().unwrap(), vec![(Generation(4), 50001)]);
        let ready: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, DaemonEvent::RpcReady { .. }))
            .collect();
        assert_eq!(ready.len(), 1);

        // the log record precedes the readiness event
        assert!(matches!(events[0], DaemonEvent::Log { .. }));
        assert!(matches!(
            events[1],
            DaemonEvent::RpcReady {
                port: 50001,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_terminate_does_not_block() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut process =
            DaemonProcess::spawn(shell_request("echo started; exec sleep 30", 2, tx, None))
                .unwrap();
        assert!(process.id().is_some());

        // wait for the first line so the shell is up
        let first = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("first line")
            .expect("event");
        assert!(first.record().is_some());

        process.terminate();

        let events = collect_until_closed(&mut rx).await;
        assert!(matches!(
            events.last(),
            Some(DaemonEvent::OutputClosed {
                generation: Generation(2)
            })
        ));
    }

    #[tokio::test]
    async fn test_terminate_lets_daemon_clean_up() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("cleaned-up");
        let script = format!(
            "trap 'touch \"{}\"; exit 0' TERM; echo started; while :; do sleep 0.1; done",
            marker.display()
        );
        let (tx, mut rx) = mpsc::channel(16);
        let mut process = DaemonProcess::spawn(shell_request(&script, 3, tx, None)).unwrap();

        // the trap is installed before the first line is printed
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("first line")
            .expect("event");

        process.terminate();
        collect_until_closed(&mut rx).await;

        timeout(Duration::from_secs(5), async {
            while !marker.exists() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("TERM handler should run");
    }

    #[tokio::test]
    async fn test_stalled_consumer_does_not_delay_readiness() {
        // receiver stays alive but is never drained
        let (tx, _rx) = mpsc::channel(1);

        let calls = Arc::new(Mutex::new(0));
        let hook_calls = Arc::clone(&calls);
        let hook: ReadyHook = Arc::new(move |_, _| *hook_calls.lock().unwrap() += 1);

        let script = "i=0; while [ $i -lt 200 ]; do echo \"INFO bwt::app > line $i\"; i=$((i+1)); done; \
                      echo 'INFO bwt::electrum > Electrum RPC server running'; exec sleep 30";
        let _process = DaemonProcess::spawn(shell_request(script, 1, tx, Some(hook))).unwrap();

        timeout(Duration::from_secs(5), async {
            while *calls.lock().unwrap() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("readiness hook should fire");
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_terminate_after_exit_is_harmless() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut process = DaemonProcess::spawn(shell_request("exit 0", 1, tx, None)).unwrap();
        collect_until_closed(&mut rx).await;

        process.terminate();
        process.terminate();
    }

    #[tokio::test]
    async fn test_reader_keeps_draining_without_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let calls = Arc::new(Mutex::new(0));
        let hook_calls = Arc::clone(&calls);
        let hook: ReadyHook = Arc::new(move |_, _| *hook_calls.lock().unwrap() += 1);

        let script = "i=0; while [ $i -lt 200 ]; do echo \"INFO bwt::app > line $i\"; i=$((i+1)); done; \
                      echo 'INFO bwt::electrum > Electrum RPC server running'";
        let mut process = DaemonProcess::spawn(shell_request(script, 1, tx, Some(hook))).unwrap();

        timeout(Duration::from_secs(5), async {
            while process.is_reading() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("reader should finish after EOF");

        // readiness is still observed even though no one listens to events
        assert_eq!(*calls.lock().unwrap(), 1);

        timeout(Duration::from_secs(5), async {
            while !process.has_exited() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("shell should exit");
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let (tx, _rx) = mpsc::channel(1);
        let request = LaunchRequest {
            program: PathBuf::from("/nonexistent/bwt"),
            args: Vec::new(),
            generation: Generation(1),
            port: 1,
            event_tx: tx,
            on_ready: None,
        };
        let result = DaemonProcess::spawn(request);
        assert!(matches!(result, Err(Error::DaemonNotFound { .. })));
    }

    #[test]
    fn test_process_launcher_enters_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let launcher = ProcessLauncher::new(runtime.handle().clone());
        let (tx, mut rx) = mpsc::channel(16);

        // called from a plain thread, outside any runtime context
        let mut daemon = launcher
            .launch(shell_request("echo 'INFO bwt::app > hello'", 9, tx, None))
            .unwrap();
        assert_eq!(daemon.generation(), Generation(9));

        let events = runtime.block_on(collect_until_closed(&mut rx));
        assert_eq!(records(&events)[0].message, "hello");
        daemon.terminate();
    }
}
