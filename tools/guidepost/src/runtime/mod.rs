use crate::errors::GuidepostError;
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Written to stdin to ask the process to finish cleanly before it is
    /// killed. `None` leaves stdin closed.
    pub stop_input: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub trait ProcessRunner: Send + Sync {
    fn spawn(&self, request: ProcessRequest) -> Result<u64, GuidepostError>;
    /// Returns the output once the process has exited, `None` while it runs.
    fn try_wait(&self, handle: u64) -> Result<Option<ProcessOutput>, GuidepostError>;
    /// Asks the process to finish, waits up to `grace`, then kills it.
    fn stop(&self, handle: u64, grace: Duration) -> Result<StopOutcome, GuidepostError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Exited,
    Killed,
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, GuidepostError>;
    fn write_string(&self, path: &Path, contents: &str) -> Result<(), GuidepostError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), GuidepostError>;
    fn exists(&self, path: &Path) -> bool;
}

pub trait Terminal: Send + Sync {
    fn stdin_is_tty(&self) -> bool;
    fn write_line(&self, line: &str) -> Result<(), GuidepostError>;
    fn draw(&self, frame: &str) -> Result<(), GuidepostError>;
    /// Next line of participant input without its trailing newline, or
    /// `None` once input is exhausted.
    fn read_line(&self) -> Result<Option<String>, GuidepostError>;
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, GuidepostError> {
        std::fs::read_to_string(path).map_err(|e| GuidepostError::Io(e.to_string()))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), GuidepostError> {
        std::fs::write(path, contents).map_err(|e| GuidepostError::Io(e.to_string()))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), GuidepostError> {
        std::fs::create_dir_all(path).map_err(|e| GuidepostError::Io(e.to_string()))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Bytes of capture stderr kept for error reporting; older output is dropped.
pub const STDERR_TAIL_BYTES: usize = 16 * 1024;

struct RunningChild {
    child: Child,
    stop_input: Option<String>,
    stderr_tail: Arc<Mutex<VecDeque<u8>>>,
    stderr_reader: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct ProcessState {
    next_handle: u64,
    children: HashMap<u64, RunningChild>,
}

pub struct ProductionProcessRunner {
    state: Mutex<ProcessState>,
}

impl ProductionProcessRunner {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProcessState::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ProcessState>, GuidepostError> {
        self.state
            .lock()
            .map_err(|_| GuidepostError::Process("process lock poisoned".to_string()))
    }
}

impl Default for ProductionProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps reading `stderr` so the child never blocks on a full pipe. Only the
/// last [`STDERR_TAIL_BYTES`] are retained.
fn drain_stderr(mut stderr: ChildStderr, tail: Arc<Mutex<VecDeque<u8>>>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            let read = match stderr.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            };
            let Ok(mut buffer) = tail.lock() else {
                break;
            };
            buffer.extend(&chunk[..read]);
            let excess = buffer.len().saturating_sub(STDERR_TAIL_BYTES);
            buffer.drain(..excess);
        }
    })
}

fn collect_stderr(running: RunningChild) -> String {
    if let Some(reader) = running.stderr_reader {
        // The pipe closes when the child exits unless a grandchild still holds it.
        let deadline = Instant::now() + Duration::from_millis(500);
        while !reader.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        if reader.is_finished() {
            let _ = reader.join();
        }
    }
    match running.stderr_tail.lock() {
        Ok(mut buffer) => String::from_utf8_lossy(buffer.make_contiguous()).to_string(),
        Err(_) => String::new(),
    }
}

impl ProcessRunner for ProductionProcessRunner {
    fn spawn(&self, request: ProcessRequest) -> Result<u64, GuidepostError> {
        let mut cmd = std::process::Command::new(&request.program);
        cmd.args(&request.args);
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        let stdin = if request.stop_input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        cmd.stdin(stdin).stdout(Stdio::null()).stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| GuidepostError::Process(format!("{}: {e}", request.program)))?;
        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));
        let stderr_reader = child
            .stderr
            .take()
            .map(|stderr| drain_stderr(stderr, stderr_tail.clone()));

        let mut state = self.lock()?;
        let handle = state.next_handle;
        state.next_handle += 1;
        state.children.insert(
            handle,
            RunningChild {
                child,
                stop_input: request.stop_input,
                stderr_tail,
                stderr_reader,
            },
        );
        Ok(handle)
    }

    fn try_wait(&self, handle: u64) -> Result<Option<ProcessOutput>, GuidepostError> {
        let mut state = self.lock()?;
        let running = state
            .children
            .get_mut(&handle)
            .ok_or_else(|| GuidepostError::Process(format!("unknown handle {handle}")))?;
        let status = running
            .child
            .try_wait()
            .map_err(|e| GuidepostError::Process(e.to_string()))?;
        let Some(status) = status else {
            return Ok(None);
        };
        let running = state.children.remove(&handle);
        drop(state);
        let stderr = running.map(collect_stderr).unwrap_or_default();
        Ok(Some(ProcessOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: String::new(),
            stderr,
        }))
    }

    fn stop(&self, handle: u64, grace: Duration) -> Result<StopOutcome, GuidepostError> {
        let mut running = {
            let mut state = self.lock()?;
            state.children.remove(&handle)
        }
        .ok_or_else(|| GuidepostError::Process(format!("unknown handle {handle}")))?;

        if let Some(mut stdin) = running.child.stdin.take() {
            if let Some(input) = &running.stop_input {
                let _ = stdin.write_all(input.as_bytes());
                let _ = stdin.flush();
            }
        }

        let deadline = Instant::now() + grace;
        loop {
            match running.child.try_wait() {
                Ok(Some(_)) => return Ok(StopOutcome::Exited),
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                _ => break,
            }
        }

        running
            .child
            .kill()
            .map_err(|e| GuidepostError::Process(e.to_string()))?;
        let _ = running.child.wait();
        Ok(StopOutcome::Killed)
    }
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn stdin_is_tty(&self) -> bool {
        std::io::IsTerminal::is_terminal(&std::io::stdin())
    }

    fn write_line(&self, line: &str) -> Result<(), GuidepostError> {
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| GuidepostError::Io(e.to_string()))
    }

    fn draw(&self, frame: &str) -> Result<(), GuidepostError> {
        use crossterm::{cursor::MoveTo, execute, terminal::Clear, terminal::ClearType};
        let mut out = std::io::stdout();
        execute!(out, Clear(ClearType::All), MoveTo(0, 0))
            .map_err(|e| GuidepostError::Io(e.to_string()))?;
        self.write_line(frame)
    }

    fn read_line(&self) -> Result<Option<String>, GuidepostError> {
        let mut line = String::new();
        let read = std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| GuidepostError::Io(e.to_string()))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

pub struct ProductionRuntime {
    pub file_system: Arc<dyn FileSystem>,
    pub process_runner: Arc<dyn ProcessRunner>,
    pub terminal: Arc<dyn Terminal>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            file_system: Arc::new(ProductionFileSystem),
            process_runner: Arc::new(ProductionProcessRunner::new()),
            terminal: Arc::new(ProductionTerminal),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    dirs: Arc<Mutex<Vec<PathBuf>>>,
    fail_next: Arc<Mutex<Option<GuidepostError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let mut map = HashMap::new();
        map.insert(path.into(), contents.into());
        Self {
            files: Arc::new(Mutex::new(map)),
            dirs: Arc::new(Mutex::new(Vec::new())),
            fail_next: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_fail_next(&self, error: GuidepostError) {
        *self.fail_next.lock().expect("fail lock") = Some(error);
    }

    fn maybe_fail(&self) -> Result<(), GuidepostError> {
        if let Some(err) = self.fail_next.lock().expect("fail lock").take() {
            return Err(err);
        }
        Ok(())
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, GuidepostError> {
        self.maybe_fail()?;
        self.files
            .lock()
            .expect("files lock")
            .get(path)
            .cloned()
            .ok_or_else(|| GuidepostError::Io(format!("missing file {}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), GuidepostError> {
        self.maybe_fail()?;
        self.files
            .lock()
            .expect("files lock")
            .insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), GuidepostError> {
        self.maybe_fail()?;
        self.dirs
            .lock()
            .expect("dirs lock")
            .push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().expect("files lock").contains_key(path)
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    pub is_tty: bool,
    input: Arc<Mutex<VecDeque<String>>>,
    writes: Arc<Mutex<Vec<String>>>,
    draws: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn new(is_tty: bool) -> Self {
        Self {
            is_tty,
            ..Self::default()
        }
    }

    pub fn with_input<I, S>(is_tty: bool, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terminal = Self::new(is_tty);
        terminal
            .input
            .lock()
            .expect("input lock")
            .extend(lines.into_iter().map(Into::into));
        terminal
    }

    pub fn written_lines(&self) -> Vec<String> {
        self.writes.lock().expect("writes lock").clone()
    }

    pub fn drawn_frames(&self) -> Vec<String> {
        self.draws.lock().expect("draw lock").clone()
    }
}

impl Terminal for FakeTerminal {
    fn stdin_is_tty(&self) -> bool {
        self.is_tty
    }

    fn write_line(&self, line: &str) -> Result<(), GuidepostError> {
        self.writes
            .lock()
            .expect("writes lock")
            .push(line.to_string());
        Ok(())
    }

    fn draw(&self, frame: &str) -> Result<(), GuidepostError> {
        self.draws
            .lock()
            .expect("draw lock")
            .push(frame.to_string());
        Ok(())
    }

    fn read_line(&self) -> Result<Option<String>, GuidepostError> {
        Ok(self.input.lock().expect("input lock").pop_front())
    }
}

#[derive(Default, Clone)]
pub struct FakeProcessRunner {
    spawn_failures: Arc<Mutex<VecDeque<GuidepostError>>>,
    exits: Arc<Mutex<HashMap<u64, ProcessOutput>>>,
    spawned: Arc<Mutex<Vec<ProcessRequest>>>,
    stops: Arc<Mutex<Vec<u64>>>,
    next_handle: Arc<Mutex<u64>>,
}

impl FakeProcessRunner {
    pub fn fail_next_spawn(&self, error: GuidepostError) {
        self.spawn_failures
            .lock()
            .expect("failures lock")
            .push_back(error);
    }

    /// Marks a spawned process as exited so the next `try_wait` reports it.
    pub fn exit(&self, handle: u64, output: ProcessOutput) {
        self.exits.lock().expect("exits lock").insert(handle, output);
    }

    pub fn spawned(&self) -> Vec<ProcessRequest> {
        self.spawned.lock().expect("spawned lock").clone()
    }

    pub fn stops(&self) -> Vec<u64> {
        self.stops.lock().expect("stops lock").clone()
    }
}

impl ProcessRunner for FakeProcessRunner {
    fn spawn(&self, request: ProcessRequest) -> Result<u64, GuidepostError> {
        if let Some(err) = self.spawn_failures.lock().expect("failures lock").pop_front() {
            return Err(err);
        }
        self.spawned.lock().expect("spawned lock").push(request);
        let mut next = self.next_handle.lock().expect("next lock");
        let handle = *next;
        *next += 1;
        Ok(handle)
    }

    fn try_wait(&self, handle: u64) -> Result<Option<ProcessOutput>, GuidepostError> {
        Ok(self.exits.lock().expect("exits lock").remove(&handle))
    }

    fn stop(&self, handle: u64, _grace: Duration) -> Result<StopOutcome, GuidepostError> {
        self.stops.lock().expect("stops lock").push(handle);
        Ok(StopOutcome::Exited)
    }
}
