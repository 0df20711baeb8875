//! Scoped fluidsynth subprocesses.
//!
//! A child is always owned by a [`ChildGuard`]; whichever way the caller
//! leaves (success, timeout, cancellation, an early `?`), the guard makes
//! sure the process is terminated and reaped.

use super::locate::{detect_audio_driver, locate_fluidsynth};
use crate::cancel::CancellationToken;
use crate::config::SynthConfig;
use crate::error::{FontshelfError, Result};
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Output settings shared by playback and rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayOptions {
    /// Audio driver; detected when `None`. Ignored when rendering.
    pub driver: Option<String>,
    pub gain: f32,
    pub sample_rate: u32,
    pub timeout: Duration,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            driver: None,
            gain: SynthConfig::DEFAULT_GAIN,
            sample_rate: SynthConfig::DEFAULT_SAMPLE_RATE,
            timeout: SynthConfig::PLAY_TIMEOUT,
        }
    }
}

/// Runs fluidsynth for playback and offline rendering.
#[derive(Debug, Clone)]
pub struct SynthRunner {
    executable: PathBuf,
    poll_interval: Duration,
    grace: Duration,
}

impl SynthRunner {
    /// Runner for a known executable.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            poll_interval: SynthConfig::POLL_INTERVAL,
            grace: SynthConfig::TERMINATE_GRACE,
        }
    }

    /// Runner for the first fluidsynth found, see [`locate_fluidsynth`].
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        locate_fluidsynth(explicit).map(Self::new)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Play `midi` through the sound card.
    pub fn play(
        &self,
        soundfont: &Path,
        midi: &Path,
        options: &PlayOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let driver = options
            .driver
            .clone()
            .unwrap_or_else(|| detect_audio_driver().to_string());
        info!(
            "Playing {} with {} (driver {})",
            midi.display(),
            soundfont.display(),
            driver
        );
        self.run(play_args(soundfont, midi, &driver, options), options.timeout, cancel)
            .map(|_| ())
    }

    /// Render `midi` to a WAV file at `wav`.
    pub fn render(
        &self,
        soundfont: &Path,
        midi: &Path,
        wav: &Path,
        options: &PlayOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!("Rendering {} to {}", midi.display(), wav.display());
        self.run(render_args(soundfont, midi, wav, options), options.timeout, cancel)?;

        if !wav.is_file() {
            return Err(FontshelfError::SynthFailed {
                message: format!("no audio written to {}", wav.display()),
                status: Some(0),
            });
        }
        Ok(())
    }

    /// Run the executable with `args`, waiting at most `timeout`.
    ///
    /// A non-zero exit is a [`FontshelfError::SynthFailed`] carrying the tail
    /// of the child's stderr.
    pub fn run<I, S>(&self, args: I, timeout: Duration, cancel: &CancellationToken) -> Result<ExitStatus>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut stderr = tempfile::tempfile()?;
        let child = Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()
            .map_err(|e| FontshelfError::SynthUnavailable {
                message: format!("failed to start {}: {}", self.executable.display(), e),
            })?;
        debug!("Started {} (pid {})", self.executable.display(), child.id());

        let mut guard = ChildGuard::new(child, self.grace);
        let status = guard.wait(timeout, self.poll_interval, cancel)?;

        if status.success() {
            return Ok(status);
        }

        let detail = read_tail(&mut stderr);
        Err(FontshelfError::SynthFailed {
            message: if detail.is_empty() {
                format!("{} exited with {}", self.executable.display(), status)
            } else {
                format!("{} exited with {}: {}", self.executable.display(), status, detail)
            },
            status: status.code(),
        })
    }
}

fn play_args(soundfont: &Path, midi: &Path, driver: &str, options: &PlayOptions) -> Vec<OsString> {
    vec![
        "-a".into(),
        driver.into(),
        "-g".into(),
        options.gain.to_string().into(),
        "-r".into(),
        options.sample_rate.to_string().into(),
        "-l".into(),
        "-q".into(),
        soundfont.into(),
        midi.into(),
    ]
}

fn render_args(soundfont: &Path, midi: &Path, wav: &Path, options: &PlayOptions) -> Vec<OsString> {
    vec![
        "-ni".into(),
        "-g".into(),
        options.gain.to_string().into(),
        "-r".into(),
        options.sample_rate.to_string().into(),
        "-F".into(),
        wav.into(),
        soundfont.into(),
        midi.into(),
    ]
}

/// Last non-empty line of the captured stderr.
fn read_tail(file: &mut File) -> String {
    let mut text = String::new();
    if file.seek(SeekFrom::Start(0)).is_err() || file.read_to_string(&mut text).is_err() {
        return String::new();
    }
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_default()
}

// ============================================================================
// Child guard
// ============================================================================

/// Owns a running child and terminates it on drop.
struct ChildGuard {
    child: Option<Child>,
    grace: Duration,
}

impl ChildGuard {
    fn new(child: Child, grace: Duration) -> Self {
        Self {
            child: Some(child),
            grace,
        }
    }

    /// Poll until the child exits, `timeout` elapses or `cancel` fires.
    fn wait(&mut self, timeout: Duration, poll: Duration, cancel: &CancellationToken) -> Result<ExitStatus> {
        let started = Instant::now();
        loop {
            let Some(child) = self.child.as_mut() else {
                return Err(FontshelfError::Other("child already reaped".into()));
            };
            if let Some(status) = child.try_wait()? {
                self.child = None;
                return Ok(status);
            }
            if cancel.is_cancelled() {
                self.terminate();
                return Err(FontshelfError::Cancelled);
            }
            if started.elapsed() >= timeout {
                warn!("Synthesizer still running after {:?}, terminating", timeout);
                self.terminate();
                return Err(FontshelfError::SynthTimeout(timeout));
            }
            std::thread::sleep(poll);
        }
    }

    /// Ask the child to stop, then kill it after the grace period. Always reaps.
    fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            debug!("Sending SIGTERM to {}", pid);
            if let Err(e) = kill(pid, Signal::SIGTERM) {
                debug!("SIGTERM to {} failed: {}", pid, e);
            }

            let deadline = Instant::now() + self.grace;
            while Instant::now() < deadline {
                if matches!(child.try_wait(), Ok(Some(_))) {
                    return;
                }
                std::thread::sleep(SynthConfig::POLL_INTERVAL);
            }
            debug!("Process {} ignored SIGTERM, killing", pid);
        }

        if let Err(e) = child.kill() {
            debug!("Failed to kill synthesizer: {}", e);
        }
        if let Err(e) = child.wait() {
            warn!("Failed to reap synthesizer: {}", e);
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}
