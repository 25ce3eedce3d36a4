//! Solver statistics tracking.

use std::time::Instant;

/// Get current process memory usage in bytes (RSS - Resident Set Size).
/// Returns None if unable to determine.
#[cfg(target_os = "linux")]
pub fn get_memory_usage() -> Option<u64> {
    use std::fs;

    let status = fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if line.starts_with("VmRSS:") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                let kb: u64 = parts[1].parse().ok()?;
                return Some(kb * 1024);
            }
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
pub fn get_memory_usage() -> Option<u64> {
    None
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Statistics collected during a solve.
#[derive(Debug, Default)]
pub struct SolveStats {
    /// Single-move engine simulations (one fresh engine each)
    pub trials: u64,

    /// States expanded (dequeued from the frontier and tried in all four
    /// directions)
    pub expanded: u64,

    /// Children skipped because the visited bookkeeping already covered them
    pub revisits: u64,

    /// Trials that ended with a dead hero
    pub losses: u64,

    /// Deepest path length reached
    pub max_depth: u64,

    /// For rate calculation
    start_time: Option<Instant>,
    last_log_time: Option<Instant>,
    last_log_trials: u64,
}

impl SolveStats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            last_log_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Track the deepest path length seen so far.
    pub fn observe_depth(&mut self, depth: usize) {
        self.max_depth = self.max_depth.max(depth as u64);
    }

    /// Get current trials per second
    pub fn trials_per_sec(&self) -> f64 {
        if let Some(start) = self.start_time {
            let elapsed = start.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                return self.trials as f64 / elapsed;
            }
        }
        0.0
    }

    /// Check if we should log progress
    pub fn should_log(&self, interval_secs: u64) -> bool {
        if let Some(last) = self.last_log_time {
            last.elapsed().as_secs() >= interval_secs
        } else {
            true
        }
    }

    /// Log progress and reset log timer
    pub fn log_progress(&mut self, visited: usize) {
        let now = Instant::now();
        let elapsed_total = self.start_time.map(|s| s.elapsed().as_secs()).unwrap_or(0);

        // Calculate rate since last log
        let rate = if let Some(last) = self.last_log_time {
            let elapsed = last.elapsed().as_secs_f64();
            let trials = self.trials - self.last_log_trials;
            if elapsed > 0.0 {
                trials as f64 / elapsed
            } else {
                0.0
            }
        } else {
            self.trials_per_sec()
        };

        let mem_str = get_memory_usage()
            .map(|m| format!(" mem={}", format_bytes(m)))
            .unwrap_or_default();

        println!(
            "[{:02}:{:02}:{:02}] trials={} expanded={} visited={} losses={} rate={:.0}/s depth={}{}",
            elapsed_total / 3600,
            (elapsed_total % 3600) / 60,
            elapsed_total % 60,
            self.trials,
            self.expanded,
            visited,
            self.losses,
            rate,
            self.max_depth,
            mem_str,
        );

        self.last_log_time = Some(now);
        self.last_log_trials = self.trials;
    }

    /// Print final summary
    pub fn print_summary(&self) {
        println!("Trials: {}", self.trials);
        println!("States expanded: {}", self.expanded);
        println!("Revisits skipped: {}", self.revisits);
        println!("Losing trials: {}", self.losses);
        println!("Max depth: {}", self.max_depth);

        if let Some(start) = self.start_time {
            let elapsed = start.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                println!("Average rate: {:.0} trials/sec", self.trials as f64 / elapsed);
            }
        }
    }
}
