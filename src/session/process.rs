//! Target process lifecycle.
//!
//! Spawn mode runs the script under the inspector flags and pipes stdio back
//! to the console; remote mode attaches to an already-listening inspector,
//! optionally poking a process by pid first so it starts listening.

use crate::session::error::Error;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};

pub const DEFAULT_INSPECT_PORT: u16 = 9229;

/// The target prints a devtools url to stderr once the inspector listens;
/// spawn mode waits for this substring before the first connection attempt.
pub const LISTENING_HINT: &str = "chrome-devtools://";

pub const CONNECT_ATTEMPTS: u32 = 10;
pub const CONNECT_BACKOFF_MS: u64 = 500;

/// Where the debuggee comes from, decided by CLI shape.
#[derive(Debug, Clone)]
pub enum TargetSource {
    /// Run the script under `node --inspect --debug-brk=<port>`.
    Spawn {
        script: String,
        args: Vec<String>,
        port: u16,
    },
    /// Attach to a running inspector.
    Remote { host: String, port: u16 },
}

/// A spawned target with its stdio still attached. Killed on drop so no
/// orphan survives an abnormal exit.
pub struct TargetProcess {
    child: Child,
    script: String,
    args: Vec<String>,
    port: u16,
}

impl TargetProcess {
    pub fn spawn(script: &str, args: &[String], port: u16) -> Result<Self, Error> {
        let child = Command::new("node")
            .arg("--inspect")
            .arg(format!("--debug-brk={port}"))
            .arg(script)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(Error::Spawn)?;

        Ok(Self {
            child,
            script: script.to_string(),
            args: args.to_vec(),
            port,
        })
    }

    /// Take the stdio handles for the output pump threads. Each handle is
    /// only available once per spawn.
    pub fn take_output(&mut self) -> (Option<ChildStdout>, Option<ChildStderr>) {
        (self.child.stdout.take(), self.child.stderr.take())
    }

    pub fn kill(&mut self) {
        _ = self.child.kill();
        _ = self.child.wait();
    }

    /// Kill and start over with the same script, arguments and port.
    pub fn respawn(&mut self) -> Result<(), Error> {
        self.kill();
        *self = Self::spawn(&self.script.clone(), &self.args.clone(), self.port)?;
        Ok(())
    }
}

impl Drop for TargetProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// `-p <pid>`: ask the process to start its inspector (SIGUSR1), then attach
/// over localhost.
pub fn wake_target(pid: i32) -> Result<(), Error> {
    match kill(Pid::from_raw(pid), Signal::SIGUSR1) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(Error::TargetNotFound(pid)),
        Err(e) => Err(Error::IO(std::io::Error::from_raw_os_error(e as i32))),
    }
}
