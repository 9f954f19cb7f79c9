use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while a network-bound step (fetch, clone) runs.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    const TICK_RATE: Duration = Duration::from_millis(80);
    const TEMPLATE: &'static str = "{spinner:.green} {msg}";

    /// Start a spinner with the provided message.
    pub fn new(message: String) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template(Self::TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Self::TICK_RATE);
        Spinner { pb }
    }

    /// Stop the spinner and clear it from the terminal.
    pub fn stop(&self) {
        self.pb.finish_and_clear();
    }

    /// Run `f` with the spinner active, clearing it afterwards whatever the outcome.
    pub fn run<T, F: FnOnce() -> T>(message: String, f: F) -> T {
        let spinner = Self::new(message);
        let result = f();
        spinner.stop();
        result
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_run_returns_closure_value() {
        let value = Spinner::run("Fetching".to_string(), || 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_spinner_stop_is_idempotent_with_drop() {
        let spinner = Spinner::new("Cloning".to_string());
        spinner.stop();
        drop(spinner);
    }
}
