//! Console presentation. Logging goes through `tracing`; this is for people.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::pack::{ArchiveEntry, Exclusion, ExclusionObserver, PackProgress};

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(spinner_style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn finish_spinner_success(spinner: &ProgressBar, msg: &str) {
    spinner.finish_with_message(format!("{} {}", style("✓").green().bold(), msg));
}

pub fn finish_spinner_error(spinner: &ProgressBar, msg: &str) {
    spinner.finish_with_message(format!("{} {}", style("✗").red().bold(), msg));
}

/// Byte progress for a download; a spinner when the size is unknown.
pub fn download_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            if let Ok(bar_style) = ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
            {
                pb.set_style(bar_style.progress_chars("=> "));
            }
            pb
        }
        None => spinner("downloading..."),
    }
}

pub fn warning(msg: &str) {
    eprintln!("{}", style(format!("WARNING: {msg}")).yellow());
}

pub fn failure(msg: &str) {
    eprintln!("{}{}", style("packnow ").red(), msg);
}

pub fn host_banner(url: &str) {
    println!();
    println!("{}running at {}", style("packnow host ").green(), url);
    println!(
        "{}",
        style(format!(
            "Try using\n\n  packnow get --url {url}\n\n...somewhere else to get this pack"
        ))
        .dim()
    );
}

pub fn host_closing() {
    println!("{}", style("\nClosing server...").red());
}

/// Prints ignored entries when asked to, and always traces them.
pub struct ConsoleObserver {
    pub show: bool,
}

impl ExclusionObserver for ConsoleObserver {
    fn excluded(&self, path: &Path, reason: &Exclusion) {
        tracing::debug!(path = %path.display(), %reason, "excluded");
        if self.show {
            println!("{}", style(format!("! ignoring  {}", path.display())).dim());
        }
    }
}

/// Prints one line per packed file.
pub struct ConsolePackProgress;

impl PackProgress for ConsolePackProgress {
    fn packed(&self, entry: &ArchiveEntry) {
        println!("{}{}", style("packnow ").green(), entry.source_path.display());
    }
}
