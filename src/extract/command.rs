use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::extract::parse_word_timings;
use crate::pipeline::traits::WordTimingExtractor;
use crate::types::WordTiming;

const AUDIO_PLACEHOLDER: &str = "{audio}";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs an external transcribe + forced-align tool.
///
/// The transcript goes to the child's stdin, `{audio}` in the argument list
/// is replaced with the audio path, and stdout must hold the JSON word list.
/// A child still running at the deadline is killed and reaped.
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandExtractor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs_f64(SyncConfig::DEFAULT_EXTRACTION_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn expanded_args(&self, audio_path: &Path) -> Vec<String> {
        let audio = audio_path.to_string_lossy();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(AUDIO_PLACEHOLDER, &audio))
            .collect();
        if !self.args.iter().any(|arg| arg.contains(AUDIO_PLACEHOLDER)) {
            args.push(audio.into_owned());
        }
        args
    }
}

impl WordTimingExtractor for CommandExtractor {
    fn extract(&self, audio_path: &Path, transcript: &str) -> Result<Vec<WordTiming>, SyncError> {
        if !audio_path.exists() {
            return Err(SyncError::invalid_input(format!(
                "narration audio does not exist: {}",
                audio_path.display()
            )));
        }

        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(&self.program)
            .args(self.expanded_args(audio_path))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SyncError::io("spawn word timing extractor", e))?;

        // Pipes are serviced on their own threads so a child that stops
        // reading or floods its output cannot stall the deadline check.
        let stdin_writer = child.stdin.take().map(|mut stdin| {
            let transcript = transcript.to_string();
            thread::spawn(move || stdin.write_all(transcript.as_bytes()))
        });
        let stdout_reader = child.stdout.take().map(read_in_background);
        let stderr_reader = child.stderr.take().map(read_in_background);

        let status = match wait_until(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                shutdown_child(&mut child, &self.program);
                return Err(SyncError::runtime(
                    "word timing extractor",
                    format!(
                        "{} did not finish within {:.1}s and was killed",
                        self.program,
                        self.timeout.as_secs_f64()
                    ),
                ));
            }
            Err(err) => {
                shutdown_child(&mut child, &self.program);
                return Err(SyncError::io("wait for word timing extractor", err));
            }
        };

        if let Some(Ok(Err(err))) = stdin_writer.map(JoinHandle::join) {
            // A tool that exits without reading its whole stdin is not an error.
            if err.kind() != io::ErrorKind::BrokenPipe {
                return Err(SyncError::io("write transcript to extractor", err));
            }
        }
        let stdout = join_output(stdout_reader);
        let stderr = join_output(stderr_reader);

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(SyncError::runtime(
                "word timing extractor",
                format!("{} exited with {}: {}", self.program, status, stderr.trim()),
            ));
        }

        parse_word_timings(&String::from_utf8_lossy(&stdout))
    }
}

fn read_in_background(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_output(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default()
}

fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn shutdown_child(child: &mut Child, program: &str) {
    if let Err(err) = child.kill() {
        tracing::warn!(program, error = %err, "extract: failed to kill extractor");
    }
    if let Err(err) = child.wait() {
        tracing::warn!(program, error = %err, "extract: failed to reap extractor");
    }
}
