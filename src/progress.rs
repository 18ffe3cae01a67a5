use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::tty::IsTty;
use crossterm::{execute, queue};
use std::io::{Stderr, Write, stderr};
use std::time::{Duration, Instant};

const REDRAW_EVERY: Duration = Duration::from_millis(200);

/// Single status line on stderr, redrawn in place. Does nothing when stderr
/// is not a terminal.
pub struct Progress {
    out: Option<Stderr>,
    total: Option<u64>,
    started: Instant,
    last_draw: Option<Instant>,
}

impl Progress {
    pub fn new(total: Option<u64>) -> Self {
        let err = stderr();
        Self {
            out: err.is_tty().then_some(err),
            total,
            started: Instant::now(),
            last_draw: None,
        }
    }

    pub fn update(&mut self, done: u64, faces: usize) {
        let Some(out) = self.out.as_mut() else {
            return;
        };
        let now = Instant::now();
        if self
            .last_draw
            .is_some_and(|last| now.duration_since(last) < REDRAW_EVERY)
        {
            return;
        }
        self.last_draw = Some(now);

        let line = render_line(done, self.total, faces, now.duration_since(self.started));
        let _ = queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(line));
        let _ = out.flush();
    }

    pub fn finish(&mut self) {
        if let Some(out) = self.out.as_mut() {
            let _ = execute!(out, MoveToColumn(0), Clear(ClearType::CurrentLine));
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish();
        self.out = None;
    }
}

fn render_line(done: u64, total: Option<u64>, faces: usize, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f32();
    let rate = if secs > 0. { done as f32 / secs } else { 0. };

    match total {
        Some(total) if total > 0 => {
            let pct = (done.min(total) as f32 / total as f32) * 100.;
            format!("{done}/{total} frames ({pct:.0}%), {faces} faces masked, {rate:.1} fps")
        }
        _ => format!("{done} frames, {faces} faces masked, {rate:.1} fps"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_line() {
        assert_eq!(
            render_line(50, Some(200), 12, Duration::from_secs(5)),
            "50/200 frames (25%), 12 faces masked, 10.0 fps"
        );
        assert_eq!(
            render_line(7, None, 0, Duration::ZERO),
            "7 frames, 0 faces masked, 0.0 fps"
        );
    }

    #[test]
    fn test_render_line_overrun() {
        // container frame counts are estimates
        assert_eq!(
            render_line(210, Some(200), 3, Duration::from_secs(21)),
            "210/200 frames (100%), 3 faces masked, 10.0 fps"
        );
    }
}
