use anyhow::{Context, bail};
use crossterm::{
    ExecutableCommand, cursor,
    terminal::{self, ClearType},
};
use std::io::{Stdout, Write, stdout};

/// Smallest terminal (columns, rows) that leaves room for one raster row.
pub const MIN_TERMINAL: (u16, u16) = (4, 2);

/// Raw mode and the alternate screen, held for the visualizer's lifetime.
pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        // Built first so Drop also unwinds a partial setup.
        let guard = Self { _private: () };

        let mut out = stdout();
        out.execute(terminal::EnterAlternateScreen)
            .context("enter alternate screen")?;
        out.execute(terminal::Clear(ClearType::All))
            .context("clear screen")?;
        out.execute(cursor::Hide).context("hide cursor")?;

        Ok(guard)
    }

    pub fn stdout() -> Stdout {
        stdout()
    }

    /// Terminal size in cells (columns, rows).
    pub fn size() -> anyhow::Result<(u16, u16)> {
        terminal::size().context("get terminal size")
    }

    /// Like [`TerminalGuard::size`] but rejects terminals below [`MIN_TERMINAL`].
    pub fn checked_size() -> anyhow::Result<(u16, u16)> {
        let (cols, rows) = Self::size()?;
        if cols < MIN_TERMINAL.0 || rows < MIN_TERMINAL.1 {
            bail!(
                "terminal too small (need at least {}x{}, got {cols}x{rows})",
                MIN_TERMINAL.0,
                MIN_TERMINAL.1
            );
        }
        Ok((cols, rows))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut out = stdout();
        // A frame cut short can leave sync output on and autowrap off.
        let _ = out.write_all(b"\x1b[?2026l\x1b[?7h\x1b[0m");
        let _ = out.flush();
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
    }
}

/// Surface size in pixels for a terminal of `size` cells with `hud_rows`
/// reserved at the bottom. At least one raster row is always kept.
pub fn raster_size(size: (u16, u16), hud_rows: u16, cell: (usize, usize)) -> (usize, usize) {
    let (cols, rows) = size;
    let visual_rows = rows.saturating_sub(hud_rows).max(1);
    (
        (cols as usize).saturating_mul(cell.0),
        (visual_rows as usize).saturating_mul(cell.1),
    )
}
