//! Terminal spinner for pending remote calls
//!
//! Only animates on a TTY; piped output gets one plain line.

use owo_colors::OwoColorize;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const SPINNER_INTERVAL_MS: u64 = 120;

pub const PREFIX: &str = "[healers]";

pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
    start_time: Instant,
    is_tty: bool,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let is_tty = io::stdout().is_terminal();

        if !is_tty {
            println!("{}  ... {}", PREFIX, message);
            return Self {
                running,
                handle: None,
                start_time: Instant::now(),
                is_tty,
            };
        }

        let running_clone = running.clone();
        let message = message.to_string();
        let handle = std::thread::spawn(move || {
            let mut frame = 0;
            while running_clone.load(Ordering::Relaxed) {
                print!(
                    "\r{}  {} {}",
                    PREFIX.bright_cyan(),
                    SPINNER_FRAMES[frame].bright_yellow(),
                    message.dimmed()
                );
                let _ = io::stdout().flush();
                frame = (frame + 1) % SPINNER_FRAMES.len();
                std::thread::sleep(Duration::from_millis(SPINNER_INTERVAL_MS));
            }
        });

        Self {
            running,
            handle: Some(handle),
            start_time: Instant::now(),
            is_tty,
        }
    }

    /// Stop spinner and return elapsed time
    pub fn stop(mut self) -> Duration {
        self.halt();
        self.start_time.elapsed()
    }

    fn halt(&mut self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if self.is_tty {
            print!("\r{}\r", " ".repeat(80));
            let _ = io::stdout().flush();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.halt();
    }
}
