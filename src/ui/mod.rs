//! The `Ui` port: everything the run loop needs to display to, and collect
//! input from, a human. `TerminalUi` is the stdio implementation used by the
//! CLI debug driver; `RecordingUi` is the test double used by the run-loop
//! scenario tests.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Mutex;

const RESET: &str = "\x1b[0m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";

/// Display and input surface for the run loop. `Send + Sync` so a future
/// multi-agent host could share one implementation across agents, though
/// the CLI debug driver only ever constructs a single `TerminalUi`.
pub trait Ui: Send + Sync {
    fn print(&self, text: &str) {
        self.print_end(text, "\n");
    }

    fn print_end(&self, text: &str, end: &str);

    fn info(&self, text: &str);

    fn error(&self, text: &str);

    fn success(&self, text: &str);

    fn warning(&self, text: &str);

    /// A framed block announcing a tool call or other structured event.
    /// `titles` are joined with " | " as the frame's title bar.
    fn panel(&self, titles: &[&str], content: &str, color: Option<&str>);

    fn acquire_user_input(&self, prompt: &str) -> String;

    fn choices(&self, prompt: &str, options: &[&str]) -> String;

    fn flush(&self);
}

/// Stdio UI with ANSI coloring. Streamed assistant text is written with
/// `print_end(text, "")` so fragments from successive `StreamEvent::Text`
/// land on the same line without the caller tracking newline state.
pub struct TerminalUi {
    stdout: Mutex<()>,
}

impl TerminalUi {
    pub fn new() -> Self {
        Self { stdout: Mutex::new(()) }
    }
}

impl Default for TerminalUi {
    fn default() -> Self {
        Self::new()
    }
}

impl Ui for TerminalUi {
    fn print_end(&self, text: &str, end: &str) {
        let _guard = self.stdout.lock().unwrap();
        print!("{}{}", text, end);
        let _ = io::stdout().flush();
    }

    fn info(&self, text: &str) {
        let _guard = self.stdout.lock().unwrap();
        println!("{}", text);
    }

    fn error(&self, text: &str) {
        let _guard = self.stdout.lock().unwrap();
        println!("{RED}[ERROR] {text}{RESET}");
    }

    fn success(&self, text: &str) {
        let _guard = self.stdout.lock().unwrap();
        println!("{GREEN}[SUCCESS] {text}{RESET}");
    }

    fn warning(&self, text: &str) {
        let _guard = self.stdout.lock().unwrap();
        println!("{YELLOW}[WARNING] {text}{RESET}");
    }

    fn panel(&self, titles: &[&str], content: &str, color: Option<&str>) {
        let color = color.unwrap_or(CYAN);
        let title = titles.join(" | ");
        let _guard = self.stdout.lock().unwrap();
        println!("{color}┌─ {title} {RESET}");
        for line in content.lines() {
            println!("{color}│{RESET} {line}");
        }
        println!("{color}└─{RESET}");
    }

    fn acquire_user_input(&self, prompt: &str) -> String {
        {
            let _guard = self.stdout.lock().unwrap();
            print!("{prompt}");
            let _ = io::stdout().flush();
        }
        let mut line = String::new();
        io::stdin().read_line(&mut line).unwrap_or(0);
        line.trim_end_matches(['\n', '\r']).to_string()
    }

    fn choices(&self, prompt: &str, options: &[&str]) -> String {
        let joined = options.join("/");
        loop {
            let reply = self.acquire_user_input(&format!("{prompt} [{joined}]: "));
            if options.iter().any(|o| o.eq_ignore_ascii_case(&reply)) {
                return reply;
            }
            self.warning(&format!("Please answer one of: {joined}"));
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

/// Test double that records every call instead of touching stdio, and
/// replays a scripted queue of answers for `acquire_user_input`/`choices`.
#[derive(Default)]
pub struct RecordingUi {
    pub events: Mutex<Vec<String>>,
    pub scripted_replies: Mutex<VecDeque<String>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies are consumed front-to-back by `acquire_user_input`/`choices`.
    pub fn with_replies(replies: Vec<&str>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            scripted_replies: Mutex::new(replies.into_iter().map(String::from).collect()),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Ui for RecordingUi {
    fn print_end(&self, text: &str, _end: &str) {
        self.record(format!("print:{text}"));
    }

    fn info(&self, text: &str) {
        self.record(format!("info:{text}"));
    }

    fn error(&self, text: &str) {
        self.record(format!("error:{text}"));
    }

    fn success(&self, text: &str) {
        self.record(format!("success:{text}"));
    }

    fn warning(&self, text: &str) {
        self.record(format!("warning:{text}"));
    }

    fn panel(&self, titles: &[&str], content: &str, _color: Option<&str>) {
        self.record(format!("panel:{}:{}", titles.join("|"), content));
    }

    fn acquire_user_input(&self, prompt: &str) -> String {
        self.record(format!("input:{prompt}"));
        self.scripted_replies.lock().unwrap().pop_front().unwrap_or_default()
    }

    fn choices(&self, prompt: &str, options: &[&str]) -> String {
        self.record(format!("choices:{}:{}", prompt, options.join(",")));
        self.scripted_replies.lock().unwrap().pop_front().unwrap_or_default()
    }

    fn flush(&self) {
        self.record("flush".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_ui_captures_events_in_order() {
        let ui = RecordingUi::new();
        ui.info("hello");
        ui.error("bad");
        assert_eq!(ui.events(), vec!["info:hello".to_string(), "error:bad".to_string()]);
    }

    #[test]
    fn recording_ui_replies_are_consumed_in_order() {
        let ui = RecordingUi::with_replies(vec!["yes", "no"]);
        assert_eq!(ui.acquire_user_input("approve? "), "yes");
        assert_eq!(ui.acquire_user_input("approve? "), "no");
    }
}
