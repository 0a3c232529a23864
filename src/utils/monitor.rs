use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 單一匯入階段的耗時與資源使用量
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub duration: Duration,
    pub cpu_usage: Option<f32>,
    pub memory_mb: Option<u64>,
}

/// 匯入各階段的耗時，啟用 `cli` 時附帶 CPU / 記憶體
pub struct SystemMonitor {
    enabled: bool,
    started: Instant,
    last_mark: Mutex<Instant>,
    phases: Mutex<Vec<PhaseStats>>,
    #[cfg(feature = "cli")]
    system: Mutex<sysinfo::System>,
    #[cfg(feature = "cli")]
    pid: Option<sysinfo::Pid>,
}

impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            started: now,
            last_mark: Mutex::new(now),
            phases: Mutex::new(Vec::new()),
            #[cfg(feature = "cli")]
            system: Mutex::new(sysinfo::System::new()),
            #[cfg(feature = "cli")]
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[cfg(feature = "cli")]
    fn sample(&self) -> (Option<f32>, Option<u64>) {
        let (Ok(mut system), Some(pid)) = (self.system.lock(), self.pid) else {
            return (None, None);
        };
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
        match system.process(pid) {
            Some(process) => (
                Some(process.cpu_usage()),
                Some(process.memory() / 1024 / 1024),
            ),
            None => (None, None),
        }
    }

    #[cfg(not(feature = "cli"))]
    fn sample(&self) -> (Option<f32>, Option<u64>) {
        (None, None)
    }

    /// 結束一個階段：記錄距上一個階段的耗時
    pub fn mark_phase(&self, phase: &str) -> Option<PhaseStats> {
        if !self.enabled {
            return None;
        }

        let now = Instant::now();
        let duration = match self.last_mark.lock() {
            Ok(mut last) => {
                let elapsed = now.duration_since(*last);
                *last = now;
                elapsed
            }
            Err(_) => return None,
        };
        let (cpu_usage, memory_mb) = self.sample();

        let stats = PhaseStats {
            phase: phase.to_string(),
            duration,
            cpu_usage,
            memory_mb,
        };
        if let Ok(mut phases) = self.phases.lock() {
            phases.push(stats.clone());
        }
        Some(stats)
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(stats) = self.mark_phase(phase) {
            match (stats.cpu_usage, stats.memory_mb) {
                (Some(cpu), Some(memory)) => tracing::info!(
                    "📊 {} - {:?}, CPU: {:.1}%, Memory: {}MB",
                    stats.phase,
                    stats.duration,
                    cpu,
                    memory
                ),
                _ => tracing::info!("📊 {} - {:?}", stats.phase, stats.duration),
            }
        }
    }

    pub fn phases(&self) -> Vec<PhaseStats> {
        self.phases
            .lock()
            .map(|phases| phases.clone())
            .unwrap_or_default()
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        let phases = self.phases();
        let peak = phases.iter().filter_map(|p| p.memory_mb).max();
        let slowest = phases.iter().max_by_key(|p| p.duration);

        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}",
            self.started.elapsed(),
            peak.map(|mb| format!("{}MB", mb))
                .unwrap_or_else(|| "n/a".to_string())
        );
        if let Some(slowest) = slowest {
            tracing::debug!("Slowest phase: {} ({:?})", slowest.phase, slowest.duration);
        }
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
