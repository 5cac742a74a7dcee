use std::io::{self, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::output::{ClosedPipeGuard, OutputSink, StdoutSink};

/// An opened destination: stdout, a buffer, or a pager's stdin.
///
/// Call [`Output::finish`] when done so a pager gets EOF and is waited on.
pub struct Output {
    writer: ClosedPipeGuard<Box<dyn Write + Send>>,
    child: Option<Child>,
    colors: bool,
}

impl Output {
    pub fn direct(writer: Box<dyn Write + Send>, colors: bool) -> Self {
        Self {
            writer: ClosedPipeGuard::new(writer),
            child: None,
            colors,
        }
    }

    fn paged(stdin: ChildStdin, child: Child, colors: bool) -> Self {
        Self {
            writer: ClosedPipeGuard::new(Box::new(stdin)),
            child: Some(child),
            colors,
        }
    }

    pub fn colors(&self) -> bool {
        self.colors
    }

    pub fn is_paged(&self) -> bool {
        self.child.is_some()
    }

    /// Flush, close the pipe and wait for the pager (if any) to exit.
    pub fn finish(self) -> io::Result<()> {
        let Output {
            mut writer, child, ..
        } = self;
        writer.flush()?;
        drop(writer.into_inner());
        if let Some(mut child) = child {
            let status = child.wait()?;
            tracing::debug!(%status, "pager exited");
        }
        Ok(())
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Feeds output to the user's pager through a pipe.
///
/// If the pager cannot be started the fallback sink is used instead.
pub struct PagerSink {
    program: String,
    colors: bool,
    fallback: StdoutSink,
}

impl PagerSink {
    pub fn new(program: String, colors: bool, fallback: StdoutSink) -> Self {
        Self {
            program,
            colors,
            fallback,
        }
    }

    fn spawn(&self, label: &str) -> io::Result<(Child, ChildStdin)> {
        let mut parts = self.program.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty pager command"))?;

        let prompt = pager_prompt(label);
        let mut child = Command::new(program)
            .args(parts)
            .env("LESS", &prompt)
            .env("MORE", &prompt)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("pager stdin unavailable"))?;
        Ok((child, stdin))
    }
}

impl OutputSink for PagerSink {
    fn open(&self, label: &str) -> io::Result<Output> {
        match self.spawn(label) {
            Ok((child, stdin)) => {
                tracing::debug!(pager = %self.program, "streaming output through pager");
                Ok(Output::paged(stdin, child, self.colors))
            }
            Err(err) => {
                tracing::warn!(
                    pager = %self.program,
                    error = %err,
                    "pager unavailable, writing directly"
                );
                self.fallback.open(label)
            }
        }
    }
}

/// `less`/`more` options: keep ANSI colours raw and title the prompt.
fn pager_prompt(label: &str) -> String {
    // `less` ends a -P prompt at the first `$`; escape it along with `?`/`:`
    // which start prompt conditionals.
    let escaped: String = label
        .chars()
        .flat_map(|c| match c {
            '$' | '?' | ':' | '.' | '%' | '\\' => vec!['\\', c],
            other => vec![other],
        })
        .collect();
    format!("-r -P {escaped}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_escapes_less_metacharacters() {
        assert_eq!(pager_prompt("builds list"), "-r -P builds list");
        assert_eq!(pager_prompt("cost: $5?"), "-r -P cost\\: \\$5\\?");
    }

    #[test]
    fn missing_pager_falls_back_to_direct_output() {
        let sink = PagerSink::new(
            "definitely-not-a-real-pager-binary".to_string(),
            true,
            StdoutSink { colors: false },
        );
        let output = sink.open("label").unwrap();
        assert!(!output.is_paged());
        assert!(!output.colors());
        output.finish().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn pager_receives_output_and_is_waited_on() {
        let sink = PagerSink::new("cat".to_string(), false, StdoutSink { colors: false });
        let mut output = sink.open("label").unwrap();
        assert!(output.is_paged());
        writeln!(output, "through the pager").unwrap();
        output.finish().unwrap();
    }
}
