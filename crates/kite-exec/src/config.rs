use std::path::PathBuf;

/// Command run once per reconcile pass.
#[derive(Clone, Debug)]
pub struct ExecConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Also run the command when a key disappears.
    pub run_on_absent: bool,
    /// Exit codes that mark the object as unfixable instead of worth retrying.
    pub permanent_exit_codes: Vec<i32>,
    /// Time between SIGTERM and SIGKILL when the call is cancelled.
    pub kill_grace_ms: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            run_on_absent: true,
            permanent_exit_codes: Vec::new(),
            kill_grace_ms: 2_000,
        }
    }
}

impl ExecConfig {
    pub fn program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Run `script` through the platform shell (`sh -c` / `cmd /C`).
    pub fn shell(script: impl Into<String>) -> Self {
        let script = script.into();
        cfg_if::cfg_if! {
            if #[cfg(target_family = "windows")] {
                let (program, flag) = ("cmd", "/C");
            } else {
                let (program, flag) = ("sh", "-c");
            }
        }
        Self {
            program: program.to_string(),
            args: vec![flag.to_string(), script],
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_permanent_exit_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.permanent_exit_codes = codes.into_iter().collect();
        self
    }

    pub fn with_run_on_absent(mut self, run: bool) -> Self {
        self.run_on_absent = run;
        self
    }
}
