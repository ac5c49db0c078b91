//! Human-readable progress output on stdout
//!
//! Diagnostics go through `tracing` to stderr; this is only what the user is
//! meant to read.

use ethers::types::U256;
use ethers::utils::format_units;
use std::io::Write;

/// Section header
pub fn section(title: &str) {
    println!();
    println!("{}", title);
    println!("----------------------------------------");
}

/// One progress line
pub fn progress(message: impl AsRef<str>) {
    println!("  {}", message.as_ref());
}

/// Warning the user should act on
pub fn warning(message: impl AsRef<str>) {
    println!("  \x1b[33m! {}\x1b[0m", message.as_ref());
}

/// Labelled value, aligned
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<14} {}", label, value);
}

/// Dots printed while waiting on the status service, one per observed status
#[derive(Debug, Default)]
pub struct Ticker {
    ticks: u32,
}

impl Ticker {
    pub fn tick(&mut self) {
        self.ticks += 1;
        print!(".");
        let _ = std::io::stdout().flush();
    }

    /// Terminate the current run of dots with a newline
    pub fn finish(&mut self) {
        if self.ticks > 0 {
            println!();
            self.ticks = 0;
        }
    }
}

/// Format a smallest-unit amount with at most four fractional digits
pub fn format_amount(amount: U256, decimals: u8) -> String {
    let full = match format_units(amount, decimals as u32) {
        Ok(full) => full,
        Err(_) => return amount.to_string(),
    };

    match full.split_once('.') {
        Some((whole, frac)) => {
            let frac: String = frac.chars().take(4).collect();
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{}.{}", whole, frac)
            }
        }
        None => full,
    }
}
