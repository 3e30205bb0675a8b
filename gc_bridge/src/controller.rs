//! Supervision of the external game controller process.

use std::io;
use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to launch controller {binary:?}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to stop controller: {0}")]
    Stop(#[source] io::Error),
}

/// How to start a controller that publishes referee messages to
/// `publish_addr` and accepts CI connections on `ci_addr`.
#[derive(Debug, Clone)]
pub struct ControllerLaunch {
    pub binary: PathBuf,
    pub publish_addr: SocketAddrV4,
    pub ci_addr: SocketAddrV4,
    pub suppress_logs: bool,
}

impl ControllerLaunch {
    pub fn args(&self) -> Vec<String> {
        vec![
            "--timeAcquisitionMode".to_string(),
            "ci".to_string(),
            "-publishAddress".to_string(),
            self.publish_addr.to_string(),
            "-ciAddress".to_string(),
            self.ci_addr.to_string(),
        ]
    }
}

/// Running controller. Killed and reaped when dropped.
#[derive(Debug)]
pub struct ControllerProcess {
    child: Option<Child>,
}

impl ControllerProcess {
    pub fn spawn(launch: &ControllerLaunch) -> Result<Self, ControllerError> {
        let mut command = Command::new(&launch.binary);
        command.args(launch.args());
        if launch.suppress_logs {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let child = command.spawn().map_err(|source| ControllerError::Spawn {
            binary: launch.binary.clone(),
            source,
        })?;
        tracing::info!(
            target: "gc_bridge::controller",
            pid = child.id(),
            publish = %launch.publish_addr,
            ci = %launch.ci_addr,
            "controller.started"
        );
        Ok(Self { child: Some(child) })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Kill the controller and wait for it to exit.
    pub fn terminate(mut self) -> io::Result<Option<ExitStatus>> {
        self.stop()
    }

    fn stop(&mut self) -> io::Result<Option<ExitStatus>> {
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };
        if child.try_wait()?.is_none() {
            child.kill()?;
        }
        let status = child.wait()?;
        tracing::info!(target: "gc_bridge::controller", %status, "controller.stopped");
        Ok(Some(status))
    }
}

impl Drop for ControllerProcess {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(target: "gc_bridge::controller", error = %err, "controller.stop_failed");
        }
    }
}
