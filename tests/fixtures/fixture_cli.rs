use std::process::Command;

/// Runs the `buildroot` binary with a clean environment and keeps what it
/// printed.
pub struct BuildrootCli {
    pub last_stdout: String,
    pub last_stderr: String,
    pub last_code: Option<i32>,
    pub env: Vec<(String, String)>,
}

impl BuildrootCli {
    pub fn new() -> Self {
        Self {
            last_stdout: String::new(),
            last_stderr: String::new(),
            last_code: None,
            env: Vec::new(),
        }
    }

    pub fn run(&mut self, args: &[&str]) -> Option<i32> {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_buildroot"));
        for (key, _) in std::env::vars() {
            if key.starts_with("BUILDROOT_") || key == "COMPLETE" {
                cmd.env_remove(key);
            }
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        let output = cmd.args(args).output().unwrap();
        self.last_stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        self.last_stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        self.last_code = output.status.code();
        self.last_code
    }

    pub fn pass(&mut self, args: &[&str]) -> bool {
        self.run(args) == Some(0)
    }

    pub fn xfail(&mut self, args: &[&str]) -> bool {
        !self.pass(args)
    }
}
