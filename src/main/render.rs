// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use arcana::error::Result;

/// Prints published text incrementally.
///
/// Published values are prefix-consistent, so only the part past what has
/// already been printed is written.
#[derive(Clone, Default)]
pub(super) struct StreamPrinter {
    printed: Arc<AtomicUsize>,
}

impl StreamPrinter {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Start a new answer
    pub(super) fn reset(&self) {
        self.printed.store(0, Ordering::SeqCst);
    }

    /// Whether anything has been printed since the last reset
    pub(super) fn has_output(&self) -> bool {
        self.printed.load(Ordering::SeqCst) > 0
    }

    pub(super) fn subscriber(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let printed = Arc::clone(&self.printed);
        move |text: &str| {
            let start = printed.load(Ordering::SeqCst);
            if let Some(suffix) = text.get(start..) {
                if suffix.is_empty() {
                    return;
                }
                let mut stdout = io::stdout();
                let _ = stdout.write_all(suffix.as_bytes());
                let _ = stdout.flush();
                printed.store(text.len(), Ordering::SeqCst);
            }
        }
    }
}

/// Print a colored speaker label such as `arcana: `
pub(super) fn print_label(label: &str, color: Color) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(color))?;
    print!("{}: ", label);
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

/// Print an error with an optional hint line
pub(super) fn print_error(message: &str, hint: Option<&str>) -> Result<()> {
    let mut stderr = io::stderr();
    stderr.execute(SetForegroundColor(Color::Red))?;
    eprint!("error: ");
    stderr.execute(ResetColor)?;
    eprintln!("{}", message);
    if let Some(hint) = hint {
        stderr.execute(SetForegroundColor(Color::DarkGrey))?;
        eprintln!("hint: {}", hint);
        stderr.execute(ResetColor)?;
    }
    Ok(())
}

/// Read one line from stdin; `None` at end of input
pub(super) fn read_user_input() -> Result<Option<String>> {
    print_label("you", Color::Green)?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}
