// Output formatting and styling

use std::io::IsTerminal;

use colored::Colorize;

/// Output styling configuration
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: std::io::stdout().is_terminal(),
        }
    }
}

impl OutputStyle {
    /// Colors when stderr is a terminal
    pub fn for_stderr() -> Self {
        Self {
            use_colors: std::io::stderr().is_terminal(),
        }
    }

    /// Style without colors, for tests and pipes
    pub fn plain() -> Self {
        Self { use_colors: false }
    }

    /// Format success message
    pub fn success(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✓".green().bold(), msg)
        } else {
            format!("✓ {}", msg)
        }
    }

    /// Format error message
    pub fn error(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✗".red().bold(), msg)
        } else {
            format!("✗ {}", msg)
        }
    }

    /// Format warning message
    pub fn warning(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "⚠".yellow(), msg)
        } else {
            format!("⚠ {}", msg)
        }
    }

    /// Format a section header
    pub fn header(&self, msg: &str) -> String {
        if self.use_colors {
            msg.bold().to_string()
        } else {
            msg.to_string()
        }
    }
}

/// Print a section header
pub fn print_header(msg: &str) {
    println!("{}", OutputStyle::default().header(msg));
}

/// Print success message
pub fn print_success(msg: &str) {
    println!("{}", OutputStyle::default().success(msg));
}

/// Print error message
pub fn print_error(msg: &str) {
    eprintln!("{}", OutputStyle::for_stderr().error(msg));
}

/// Print warning message
pub fn print_warning(msg: &str) {
    eprintln!("{}", OutputStyle::for_stderr().warning(msg));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_style() {
        let style = OutputStyle::plain();
        assert_eq!(style.success("done"), "✓ done");
        assert_eq!(style.error("failed"), "✗ failed");
        assert_eq!(style.header("Report"), "Report");
    }
}
