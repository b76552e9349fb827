use std::{
    io::Write,
    process::{Command, Stdio},
};

use tracing::debug;

use crate::error::{Error, Result};

/// Turns note HTML into markdown.
pub trait MarkupConverter {
    fn convert(&self, html: &str) -> Result<String>;

    /// Short human-readable description, shown by `info`.
    fn describe(&self) -> String;
}

/// Runs `<program> -f html -t markdown`, HTML on stdin, markdown on stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PandocConverter {
    program: String,
}

impl PandocConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl MarkupConverter for PandocConverter {
    fn convert(&self, html: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(["-f", "html", "-t", "markdown"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::Conversion(format!(
                    "failed to run {}: {e}",
                    self.program
                ))
            })?;

        // Feed stdin from a second thread so a large note cannot fill both
        // pipes at once.
        let mut stdin = child.stdin.take().ok_or_else(|| {
            Error::Conversion("converter stdin unavailable".to_string())
        })?;
        let (output, written) = std::thread::scope(|s| {
            let writer = s.spawn(move || stdin.write_all(html.as_bytes()));
            (child.wait_with_output(), writer.join())
        });
        let output = output?;

        if !output.status.success() {
            return Err(Error::Conversion(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        match written {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Conversion(
                    "stdin writer panicked".to_string(),
                ));
            }
        }

        debug!(
            program = %self.program,
            input = html.len(),
            output = output.stdout.len(),
            "converted note"
        );
        String::from_utf8(output.stdout).map_err(|e| {
            Error::Conversion(format!("converter output is not UTF-8: {e}"))
        })
    }

    fn describe(&self) -> String {
        format!("{} -f html -t markdown", self.program)
    }
}
