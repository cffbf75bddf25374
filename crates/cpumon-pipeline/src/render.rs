//! Render sinks driven by the printer stage.

use std::io::{self, Write};

use crate::sample::UsageSnapshot;

/// Clears the terminal and homes the cursor.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Consumes one usage snapshot per printer iteration.
pub trait RenderSink: Send {
    /// Render `snapshot`.
    ///
    /// # Errors
    ///
    /// Render errors are logged by the printer and never retried.
    fn render(&mut self, snapshot: &UsageSnapshot) -> io::Result<()>;
}

impl<S: RenderSink + ?Sized> RenderSink for Box<S> {
    fn render(&mut self, snapshot: &UsageSnapshot) -> io::Result<()> {
        (**self).render(snapshot)
    }
}

/// Format a snapshot as a table, one line per entry.
///
/// The aggregate is labelled `CPU:` and core `n` is labelled `CPU<n>:`.
#[must_use]
pub fn format_usage(snapshot: &UsageSnapshot) -> String {
    let mut out = String::new();
    for (index, fraction) in snapshot.fractions().iter().enumerate() {
        let percent = fraction * 100.0;
        let line = match index.checked_sub(1) {
            None => format!("CPU:\t{percent:.1}%\n"),
            Some(core) => format!("CPU{core}:\t{percent:.1}%\n"),
        };
        out.push_str(&line);
    }
    out
}

/// Writes each snapshot to a terminal, redrawing the whole screen.
#[derive(Debug)]
pub struct TerminalRenderer<W: Write> {
    out: W,
    clear_screen: bool,
}

impl TerminalRenderer<io::Stdout> {
    /// Render to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    /// Render to `out`, clearing the screen before every frame.
    pub fn new(out: W) -> Self {
        Self {
            out,
            clear_screen: true,
        }
    }

    /// Append frames instead of redrawing.
    #[must_use]
    pub fn without_clear(mut self) -> Self {
        self.clear_screen = false;
        self
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RenderSink for TerminalRenderer<W> {
    fn render(&mut self, snapshot: &UsageSnapshot) -> io::Result<()> {
        let mut frame = String::new();
        if self.clear_screen {
            frame.push_str(CLEAR_SCREEN);
        }
        frame.push_str(&format_usage(snapshot));
        frame.push('\n');

        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usage() {
        let snapshot = UsageSnapshot::new(vec![0.5, 0.25, 0.125, 1.0]);
        insta::assert_snapshot!(format_usage(&snapshot), @r"
        CPU:	50.0%
        CPU0:	25.0%
        CPU1:	12.5%
        CPU2:	100.0%
        ");
    }

    #[test]
    fn test_format_empty_snapshot() {
        assert_eq!(format_usage(&UsageSnapshot::default()), "");
    }

    #[test]
    fn test_renderer_clears_screen_per_frame() -> io::Result<()> {
        let mut renderer = TerminalRenderer::new(Vec::new());
        renderer.render(&UsageSnapshot::new(vec![0.0]))?;
        renderer.render(&UsageSnapshot::new(vec![1.0]))?;

        let written = String::from_utf8_lossy(&renderer.into_inner()).into_owned();
        assert_eq!(
            written,
            "\x1b[2J\x1b[HCPU:\t0.0%\n\n\x1b[2J\x1b[HCPU:\t100.0%\n\n"
        );
        Ok(())
    }

    #[test]
    fn test_renderer_without_clear() -> io::Result<()> {
        let mut renderer = TerminalRenderer::new(Vec::new()).without_clear();
        renderer.render(&UsageSnapshot::new(vec![0.125]))?;
        let written = String::from_utf8_lossy(&renderer.into_inner()).into_owned();
        assert_eq!(written, "CPU:\t12.5%\n\n");
        Ok(())
    }
}
