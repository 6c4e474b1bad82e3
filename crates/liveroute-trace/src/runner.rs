use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::OnceLock;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const REAP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct TraceSettings {
    pub max_hops: u32,
    pub probes: u32,
    pub wait_ms: u64,
    /// Upper bound for one whole tracer run. `None` waits forever.
    pub run_timeout: Option<Duration>,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            max_hops: 30,
            probes: 3,
            wait_ms: 2000,
            run_timeout: Some(Duration::from_secs(90)),
        }
    }
}

/// Which argument dialect the tracer binary speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFlavor {
    /// Unix `traceroute -n`.
    Traceroute,
    /// Windows `tracert -d`.
    Tracert,
}

#[derive(Debug, Clone)]
pub struct TraceProgram {
    pub flavor: TraceFlavor,
    pub binary: PathBuf,
}

impl TraceProgram {
    /// The tracer for the host OS, chosen once per process.
    pub fn host() -> &'static TraceProgram {
        static HOST: OnceLock<TraceProgram> = OnceLock::new();
        HOST.get_or_init(|| {
            let program = if cfg!(windows) {
                TraceProgram::new(TraceFlavor::Tracert, "tracert")
            } else {
                TraceProgram::new(TraceFlavor::Traceroute, "traceroute")
            };
            debug!("using {:?} as path tracer", program.binary);
            program
        })
    }

    pub fn new(flavor: TraceFlavor, binary: impl Into<PathBuf>) -> Self {
        Self {
            flavor,
            binary: binary.into(),
        }
    }

    pub fn command(&self, target: &str, settings: &TraceSettings) -> Command {
        let mut cmd = Command::new(&self.binary);
        match self.flavor {
            TraceFlavor::Traceroute => {
                let wait_secs = settings.wait_ms.div_ceil(1000).max(1);
                cmd.arg("-n")
                    .arg("-q")
                    .arg(settings.probes.to_string())
                    .arg("-m")
                    .arg(settings.max_hops.to_string())
                    .arg("-w")
                    .arg(wait_secs.to_string());
            }
            TraceFlavor::Tracert => {
                cmd.arg("-d")
                    .arg("-h")
                    .arg(settings.max_hops.to_string())
                    .arg("-w")
                    .arg(settings.wait_ms.to_string());
            }
        }
        cmd.arg(target);
        cmd
    }
}

pub trait TracerouteRunner: Send + Sync {
    fn run(&self, target: &str, settings: &TraceSettings) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct SystemTracerouteRunner {
    program: TraceProgram,
}

impl SystemTracerouteRunner {
    pub fn with_program(program: TraceProgram) -> Self {
        Self { program }
    }
}

impl Default for SystemTracerouteRunner {
    fn default() -> Self {
        Self::with_program(TraceProgram::host().clone())
    }
}

impl TracerouteRunner for SystemTracerouteRunner {
    fn run(&self, target: &str, settings: &TraceSettings) -> Result<String> {
        run_program(&self.program, target, settings)
    }
}

/// Runs the tracer to completion and returns its stdout. The child is always
/// reaped before this returns, including on timeout and read errors.
pub fn run_program(program: &TraceProgram, target: &str, settings: &TraceSettings) -> Result<String> {
    let child = program
        .command(target, settings)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {:?} for {target}", program.binary))?;
    let mut guard = ChildGuard::new(child);

    let stdout = guard
        .child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("missing tracer stdout"))?;
    let stderr = guard
        .child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("missing tracer stderr"))?;

    let out_reader = drain(stdout);
    let err_reader = drain(stderr);

    let status = guard
        .wait(settings.run_timeout)
        .with_context(|| format!("tracer did not finish for {target}"))?;

    let stdout = join_reader(out_reader)?;
    let stderr = join_reader(err_reader).unwrap_or_default();

    if !status.success() {
        bail!(
            "tracer failed for {target} (status: {}): {}{}",
            status,
            stderr.trim(),
            stdout.trim()
        );
    }

    Ok(stdout)
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<String>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    })
}

fn join_reader(handle: JoinHandle<std::io::Result<String>>) -> Result<String> {
    handle
        .join()
        .map_err(|_| anyhow!("tracer output reader panicked"))?
        .context("failed to read tracer output")
}

/// Owns a spawned child; kills and reaps it on drop unless it was already
/// waited on.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn wait(&mut self, timeout: Option<Duration>) -> Result<ExitStatus> {
        let Some(timeout) = timeout else {
            let status = self.child.wait()?;
            self.reaped = true;
            return Ok(status);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.reaped = true;
                return Ok(status);
            }
            if Instant::now() >= deadline {
                bail!("timed out after {:?}", timeout);
            }
            thread::sleep(REAP_POLL);
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
