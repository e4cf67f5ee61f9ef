// Spawns the actual cachegate binary as a subprocess, pointed at a caller
// supplied daemon address, with its own temp directory for param/VCL/secret
// files. Kills the process on drop.

use std::fs;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::Context;
use tempfile::TempDir;

pub struct GatewayProc {
    child: Child,
    tmp_dir: TempDir,
    pub console_addr: String,
    pub master_addr: String,
}

impl GatewayProc {
    /// Spawns with fresh, empty param/VCL files.
    pub fn spawn(daemon_addr: &str, secret: Option<&str>) -> anyhow::Result<GatewayProc> {
        Self::spawn_with_opts(daemon_addr, secret, None, None, None)
    }

    /// Spawns with a specific `agent.stat` shell-out command.
    pub fn spawn_with_stats_command(daemon_addr: &str, secret: Option<&str>, stats_command: &str) -> anyhow::Result<GatewayProc> {
        Self::spawn_with_opts(daemon_addr, secret, None, None, Some(stats_command))
    }

    /// Spawns with the param/VCL files pre-populated so a Master Session has
    /// something to replay on connect-in.
    pub fn spawn_with_seed(
        daemon_addr: &str,
        secret: Option<&str>,
        seed_params: Option<&str>,
        seed_vcl: Option<&str>,
    ) -> anyhow::Result<GatewayProc> {
        Self::spawn_with_opts(daemon_addr, secret, seed_params, seed_vcl, None)
    }

    fn spawn_with_opts(
        daemon_addr: &str,
        secret: Option<&str>,
        seed_params: Option<&str>,
        seed_vcl: Option<&str>,
        stats_command: Option<&str>,
    ) -> anyhow::Result<GatewayProc> {
        let tmp_dir = tempfile::Builder::new()
            .prefix("cachegate-test")
            .tempdir()
            .context("creating tmp dir")?;

        let console_addr = format!("127.0.0.1:{}", pick_free_port()?);
        let master_addr = format!("127.0.0.1:{}", pick_free_port()?);
        let param_file = tmp_dir.path().join("params");
        let vcl_file = tmp_dir.path().join("vcl");

        if let Some(contents) = seed_params {
            fs::write(&param_file, contents)?;
        }
        if let Some(contents) = seed_vcl {
            fs::write(&vcl_file, contents)?;
        }

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_cachegate"));
        cmd.arg("--console-addr")
            .arg(&console_addr)
            .arg("--daemon-addr")
            .arg(daemon_addr)
            .arg("--master-addr")
            .arg(&master_addr)
            .arg("--param-file")
            .arg(&param_file)
            .arg("--vcl-file")
            .arg(&vcl_file)
            .arg("-v")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(secret) = secret {
            let secret_file = tmp_dir.path().join("secret");
            fs::write(&secret_file, secret)?;
            cmd.arg("--secret-file").arg(&secret_file);
        }

        if let Some(stats_command) = stats_command {
            cmd.arg("--stats-command").arg(stats_command);
        }

        let child = cmd.spawn().context("spawning cachegate")?;

        // spin until the console port accepts connections
        let mut sleep_dur = Duration::from_millis(5);
        for _ in 0..12 {
            if TcpStream::connect(&console_addr).is_ok() {
                break;
            }
            std::thread::sleep(sleep_dur);
            sleep_dur *= 2;
        }

        Ok(GatewayProc { child, tmp_dir, console_addr, master_addr })
    }

    pub fn param_file(&self) -> PathBuf {
        self.tmp_dir.path().join("params")
    }

    pub fn vcl_file(&self) -> PathBuf {
        self.tmp_dir.path().join("vcl")
    }
}

impl Drop for GatewayProc {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn pick_free_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("binding ephemeral port")?;
    Ok(listener.local_addr()?.port())
}
