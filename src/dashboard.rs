//! Text rendering of the CPU, memory and disk gauges

use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::time::{Duration, Instant};

use crate::metrics::{fraction_to_percent, MetricsSampler, SystemReading};
use crate::timer::PeriodicTimer;

const BAR_WIDTH: usize = 30;

/// One gauge as shown on screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gauge {
    pub label: &'static str,
    /// Rounded percentage of the clamped fraction
    pub percent: u32,
    /// `x.x GiB / y.y GiB`, empty for CPU
    pub caption: String,
}

impl Gauge {
    fn new(label: &'static str, fraction: f64, caption: String) -> Self {
        Self {
            label,
            percent: fraction_to_percent(fraction).round() as u32,
            caption,
        }
    }

    pub fn render(&self) -> String {
        let filled = (self.percent as usize * BAR_WIDTH + 50) / 100;
        let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
        let line = format!("{:<7}[{bar}] {:>3}%", self.label, self.percent);
        if self.caption.is_empty() {
            line
        } else {
            format!("{line}  {}", self.caption)
        }
    }
}

pub fn gauges(reading: &SystemReading) -> [Gauge; 3] {
    [
        Gauge::new("CPU", reading.cpu, String::new()),
        Gauge::new("MEMORY", reading.memory.fraction, reading.memory.caption()),
        Gauge::new("DISK", reading.disk.fraction, reading.disk.caption()),
    ]
}

/// The gauges as three lines of text
pub fn render(reading: &SystemReading) -> String {
    gauges(reading)
        .iter()
        .map(Gauge::render)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    reading: &'a SystemReading,
}

/// One JSON object per reading, timestamped
pub fn render_json(reading: &SystemReading) -> Result<String> {
    let line = JsonLine {
        timestamp: chrono::Local::now().to_rfc3339(),
        reading,
    };
    Ok(serde_json::to_string(&line)?)
}

/// Periodically samples system utilization
///
/// The first reading is available immediately.
pub struct Dashboard {
    sampler: MetricsSampler,
    timer: PeriodicTimer,
}

impl Dashboard {
    pub fn new(sampler: MetricsSampler, interval: Duration) -> Self {
        Self {
            sampler,
            timer: PeriodicTimer::start_immediate(interval, Instant::now()),
        }
    }

    /// Take a reading if the sampling timer has expired
    pub fn poll(&mut self, now: Instant) -> Option<SystemReading> {
        if self.timer.fire(now) {
            Some(self.sampler.sample())
        } else {
            None
        }
    }

    pub fn until_due(&self, now: Instant) -> Duration {
        self.timer.until_due(now)
    }

    /// Print `count` readings (forever when `None`) to `out`
    pub fn run<W: Write>(&mut self, count: Option<u64>, json: bool, out: &mut W) -> Result<()> {
        let mut printed = 0;
        while count.map_or(true, |n| printed < n) {
            let now = Instant::now();
            let Some(reading) = self.poll(now) else {
                std::thread::sleep(self.until_due(now));
                continue;
            };

            if json {
                writeln!(out, "{}", render_json(&reading)?)?;
            } else {
                if printed > 0 {
                    writeln!(out)?;
                }
                writeln!(out, "{}", render(&reading))?;
            }
            out.flush()?;
            printed += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricSample;

    fn reading() -> SystemReading {
        SystemReading {
            cpu: 0.424,
            memory: MetricSample {
                fraction: 0.5,
                used: 8.0,
                total: 16.0,
            },
            disk: MetricSample {
                fraction: 1.7,
                used: 120.25,
                total: 100.0,
            },
        }
    }

    #[test]
    fn test_gauges() {
        let [cpu, memory, disk] = gauges(&reading());
        assert_eq!(cpu.percent, 42);
        assert_eq!(cpu.caption, "");
        assert_eq!(memory.percent, 50);
        assert_eq!(memory.caption, "8.0 GiB / 16.0 GiB");
        // Out of range fractions are clamped
        assert_eq!(disk.percent, 100);
    }

    #[test]
    fn test_render_gauge() {
        let [cpu, memory, _] = gauges(&reading());
        assert_eq!(
            memory.render(),
            format!("MEMORY [{}{}]  50%  8.0 GiB / 16.0 GiB", "#".repeat(15), "-".repeat(15))
        );
        assert!(cpu.render().starts_with("CPU    ["));
        assert!(cpu.render().ends_with(" 42%"));
    }

    #[test]
    fn test_render_json() {
        let line = render_json(&reading()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["cpu"], 0.424);
        assert_eq!(value["memory"]["total"], 16.0);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_run_prints_count_readings() {
        let mut dashboard = Dashboard::new(MetricsSampler::new(), Duration::from_millis(10));
        let mut out = Vec::new();
        dashboard.run(Some(2), true, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
