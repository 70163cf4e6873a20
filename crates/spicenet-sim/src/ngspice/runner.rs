//! Batch-mode ngspice runs.
//!
//! Each run gets a scratch directory holding the netlist and the rawfile
//! ngspice writes with `-r`; the directory is removed when the run ends.

use std::borrow::Cow;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::ngspice::rawfile::parse_rawfile_plots;
use crate::ngspice::types::RawfileData;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How ngspice is invoked.
#[derive(Debug, Clone)]
pub struct NgspiceConfig {
    /// Executable name or path, looked up in `PATH` when bare.
    pub executable: String,
    /// Seconds before a run is killed.
    pub timeout_secs: u64,
    /// Circuit temperature in °C, written as `.options temp`.
    pub temperature: Option<f64>,
    /// Temperature model parameters were measured at, `.options tnom`.
    pub nominal_temperature: Option<f64>,
}

impl Default for NgspiceConfig {
    fn default() -> Self {
        Self {
            executable: "ngspice".to_string(),
            timeout_secs: 60,
            temperature: None,
            nominal_temperature: None,
        }
    }
}

impl NgspiceConfig {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command.stdin(Stdio::null());
        command
    }

    fn not_found(&self, err: impl std::fmt::Display) -> Error {
        Error::NgspiceNotFound(format!("{}: {}", self.executable, err))
    }
}

/// Whether the configured executable runs and reports a version.
pub fn is_ngspice_available(config: &NgspiceConfig) -> bool {
    ngspice_version(config).is_ok()
}

/// First line of `ngspice --version`, without its banner stars.
pub fn ngspice_version(config: &NgspiceConfig) -> Result<String> {
    let output = config
        .command()
        .arg("--version")
        .output()
        .map_err(|e| config.not_found(e))?;
    if !output.status.success() {
        return Err(config.not_found(format!("--version exited with {}", output.status)));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| line.trim_matches(|c: char| c == '*' || c.is_whitespace()))
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| config.not_found("--version printed nothing"))
}

/// Run a netlist through ngspice and return every plot it wrote.
///
/// A final `.end` card is added when the netlist lacks one.
pub fn run_ngspice(netlist: &str, config: &NgspiceConfig) -> Result<Vec<RawfileData>> {
    let run = BatchRun::prepare(netlist)?;
    let finished = run.execute(config)?;

    if !finished.status.success() {
        return Err(Error::NgspiceExecutionFailed(finished.report()));
    }
    let raw = match fs::read(&run.rawfile) {
        Ok(raw) if !raw.is_empty() => raw,
        _ => {
            return Err(Error::NgspiceExecutionFailed(format!(
                "no rawfile written; {}",
                finished.report()
            )));
        }
    };

    let plots = parse_rawfile_plots(&raw)?;
    log::debug!("ngspice wrote {} plot(s)", plots.len());
    Ok(plots)
}

/// Scratch files for one ngspice invocation.
struct BatchRun {
    netlist: PathBuf,
    rawfile: PathBuf,
    /// Removes both files on drop.
    _dir: TempDir,
}

impl BatchRun {
    fn prepare(netlist: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("spicenet-")
            .tempdir()
            .map_err(|e| Error::TempFile(e.to_string()))?;
        let netlist_path = dir.path().join("circuit.cir");
        fs::write(&netlist_path, terminated(netlist).as_bytes())
            .map_err(|e| Error::TempFile(format!("{}: {}", netlist_path.display(), e)))?;

        Ok(Self {
            netlist: netlist_path,
            rawfile: dir.path().join("circuit.raw"),
            _dir: dir,
        })
    }

    fn execute(&self, config: &NgspiceConfig) -> Result<Finished> {
        log::debug!("{} -b -r {}", config.executable, self.rawfile.display());
        let child = config
            .command()
            .arg("-b")
            .arg("-r")
            .arg(&self.rawfile)
            .arg(&self.netlist)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| config.not_found(e))?;
        Finished::wait(child, Duration::from_secs(config.timeout_secs))
    }
}

/// The netlist with a closing `.end` card.
fn terminated(netlist: &str) -> Cow<'_, str> {
    let last = netlist.lines().map(str::trim).rfind(|line| !line.is_empty());
    match last {
        Some(line) if line.eq_ignore_ascii_case(".end") => Cow::Borrowed(netlist),
        _ => Cow::Owned(format!("{}\n.end\n", netlist.trim_end())),
    }
}

/// Exit status and captured output of an ngspice process.
struct Finished {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl Finished {
    /// Wait for `child`, killing it once `timeout` has passed. Both pipes
    /// are read on their own threads while the process runs.
    fn wait(mut child: Child, timeout: Duration) -> Result<Self> {
        let stdout = capture(child.stdout.take());
        let stderr = capture(child.stderr.take());
        let deadline = Instant::now() + timeout;

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                child.kill().ok();
                child.wait().ok();
                return Err(Error::NgspiceTimeout(timeout.as_secs()));
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(Self {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }

    /// The error lines ngspice printed, or all of stderr when none are
    /// marked as errors.
    fn report(&self) -> String {
        let errors: Vec<&str> = self
            .stdout
            .lines()
            .chain(self.stderr.lines())
            .filter(|line| line.to_lowercase().contains("error"))
            .collect();
        let detail = if errors.is_empty() {
            self.stderr.trim().to_string()
        } else {
            errors.join("\n")
        };
        format!("ngspice exited with {}: {}", self.status, detail)
    }
}

fn capture<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut bytes).ok();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NgspiceConfig::default();
        assert_eq!(config.executable, "ngspice");
        assert_eq!(config.timeout_secs, 60);
        assert!(config.temperature.is_none());
    }

    #[test]
    fn test_terminated_adds_missing_end() {
        assert_eq!(terminated("R1 1 0 1k\n.op\n"), "R1 1 0 1k\n.op\n.end\n");
        assert!(matches!(
            terminated("* t\nR1 1 0 1k\n.END\n\n"),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_terminated_is_not_fooled_by_ends() {
        let netlist = "* t\n.subckt DIV a b\nR1 a b 1k\n.ends DIV\nX1 1 0 DIV\n.op\n";
        let text = terminated(netlist);
        assert!(text.ends_with(".op\n.end\n"));
        assert_eq!(text.lines().filter(|l| l.eq_ignore_ascii_case(".end")).count(), 1);
    }

    #[test]
    fn test_missing_executable() {
        let config = NgspiceConfig {
            executable: "/nonexistent/ngspice-binary".into(),
            ..Default::default()
        };
        assert!(!is_ngspice_available(&config));
        assert!(matches!(
            run_ngspice("R1 1 0 1k\n.op\n", &config),
            Err(Error::NgspiceNotFound(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_report_prefers_error_lines() {
        use std::os::unix::process::ExitStatusExt;

        let finished = Finished {
            status: ExitStatus::from_raw(1 << 8),
            stdout: "Circuit: t\nError on line 2 : r1 1\n".into(),
            stderr: "noise\n".into(),
        };
        let report = finished.report();
        assert!(report.contains("Error on line 2"));
        assert!(!report.contains("noise"));
    }

    #[test]
    #[ignore = "requires ngspice"]
    fn test_ngspice_version() {
        let config = NgspiceConfig::default();
        if is_ngspice_available(&config) {
            let version = ngspice_version(&config).unwrap();
            assert!(version.to_lowercase().contains("ngspice"));
        }
    }

    #[test]
    #[ignore = "requires ngspice"]
    fn test_run_simple_circuit() {
        let config = NgspiceConfig::default();
        if !is_ngspice_available(&config) {
            return;
        }

        let netlist = "* divider\nV1 1 0 DC 10\nR1 1 2 1k\nR2 2 0 1k\n.op\n.end\n";
        let plots = run_ngspice(netlist, &config).unwrap();
        assert_eq!(plots.len(), 1);
        assert!((plots[0].to_waveforms()["2"].real[0] - 5.0).abs() < 1e-6);
    }
}
