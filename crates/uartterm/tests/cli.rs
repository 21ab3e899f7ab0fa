use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn help_lists_subcommands_and_serial_flags() -> Result<()> {
  let mut cmd = Command::cargo_bin("uartterm")?;
  cmd.arg("--help");
  cmd.assert().success().stdout(
    predicate::str::contains("Usage")
      .and(predicate::str::contains("ports"))
      .and(predicate::str::contains("connect"))
      .and(predicate::str::contains("--baud"))
      .and(predicate::str::contains("--no-suffix"))
      .and(predicate::str::contains("-V, --version")),
  );
  Ok(())
}

#[test]
fn defaults_prints_embedded_config() -> Result<()> {
  let mut cmd = Command::cargo_bin("uartterm")?;
  cmd.arg("defaults");
  cmd.assert().success().stdout(
    predicate::str::contains("[serial]")
      .and(predicate::str::contains("baud_rate = 115200"))
      .and(predicate::str::contains("suffix = \"<CL><RF>\"")),
  );
  Ok(())
}

#[test]
fn ports_runs_without_hardware() -> Result<()> {
  let mut cmd = Command::cargo_bin("uartterm")?;
  cmd.arg("ports");
  cmd.assert().success();
  Ok(())
}

#[test]
fn out_of_range_data_bits_are_rejected() -> Result<()> {
  let mut cmd = Command::cargo_bin("uartterm")?;
  cmd.args(["connect", "--data-bits", "9"]);
  cmd
    .assert()
    .failure()
    .stderr(predicate::str::contains("data-bits"));
  Ok(())
}

#[test]
fn connect_without_tty_exits_cleanly() -> Result<()> {
  let project = tempfile::tempdir()?;
  let xdg = tempfile::tempdir()?;
  let mut cmd = Command::cargo_bin("uartterm")?;
  cmd
    .current_dir(project.path())
    .env("XDG_CONFIG_HOME", xdg.path())
    .env("XDG_STATE_HOME", xdg.path())
    .args(["--port", "/dev/uartterm-missing-port"]);
  cmd
    .assert()
    .success()
    .stdout(predicate::str::contains("requires a TTY"));
  Ok(())
}
