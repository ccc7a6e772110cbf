use crate::metrics::SamplingError;

const CPU_TAG: &str = "cpu";
/// user, nice and system are always present; later fields depend on the kernel
const MIN_FIELDS: usize = 4;

/// Aggregate CPU time counters from the first line of `/proc/stat`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounterSnapshot {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuCounterSnapshot {
    /// Parse the aggregate `cpu` line
    ///
    /// Counters missing at the end of the line (older kernels) read as zero.
    pub fn parse(line: &str) -> Result<Self, SamplingError> {
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some(CPU_TAG) => {}
            other => {
                return Err(SamplingError::Malformed(format!(
                    "expected '{CPU_TAG}' tag, found {other:?}"
                )))
            }
        }

        let mut values = [0u64; 10];
        let mut count = 0;
        for (slot, field) in values.iter_mut().zip(fields) {
            *slot = field
                .parse()
                .map_err(|_| SamplingError::Malformed(format!("bad cpu counter {field:?}")))?;
            count += 1;
        }
        if count < MIN_FIELDS {
            return Err(SamplingError::Malformed(format!(
                "only {count} cpu counters present"
            )));
        }

        let [user, nice, system, idle, iowait, irq, softirq, steal, guest, guest_nice] = values;
        Ok(Self {
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
            guest,
            guest_nice,
        })
    }

    /// Parse the whole contents of `/proc/stat`
    pub fn parse_stat(contents: &str) -> Result<Self, SamplingError> {
        let line = contents
            .lines()
            .next()
            .ok_or_else(|| SamplingError::Malformed("empty stat file".to_string()))?;
        Self::parse(line)
    }

    fn idle_time(&self) -> i128 {
        i128::from(self.idle) + i128::from(self.iowait)
    }

    fn active_time(&self) -> i128 {
        [self.user, self.nice, self.system, self.irq, self.softirq, self.steal]
            .into_iter()
            .map(i128::from)
            .sum()
    }
}

/// Fraction of CPU time spent busy between two snapshots
///
/// Zero when no time passed or the counters went backwards.
pub fn utilization(prev: &CpuCounterSnapshot, now: &CpuCounterSnapshot) -> f64 {
    let idle = now.idle_time() - prev.idle_time();
    let active = now.active_time() - prev.active_time();
    let total = idle + active;
    if total <= 0 {
        return 0.0;
    }
    (active as f64 / total as f64).clamp(0.0, 1.0)
}
