//! Status output for the injector
//!
//! Step status normally goes to stdout/stderr. When the injector is driven as a library, a caller
//! can pass a callback instead and receive every fragment of text, which is how embedding UIs
//! (and the tests) observe progress.

use std::io::Write;

/// Type alias for output callback function
pub type OutputCallback = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
pub enum Output {
    #[default]
    Stdio,
    Callback(OutputCallback),
}

impl Output {
    pub fn callback<F>(callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Output::Callback(Box::new(callback))
    }

    /// Write without a trailing newline, so a status can be appended to the same line later.
    pub fn print(&self, s: &str) {
        match self {
            Output::Stdio => {
                std::print!("{s}");
                let _ = std::io::stdout().flush();
            }
            Output::Callback(callback) => callback(s),
        }
    }

    pub fn println(&self, s: &str) {
        match self {
            Output::Stdio => std::println!("{s}"),
            Output::Callback(callback) => {
                callback(s);
                callback("\n");
            }
        }
    }

    pub fn eprintln(&self, s: &str) {
        match self {
            Output::Stdio => {
                std::eprintln!("{s}");
                let _ = std::io::stderr().flush();
            }
            Output::Callback(callback) => {
                callback(s);
                callback("\n");
            }
        }
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Stdio => f.write_str("Stdio"),
            Output::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}
