use crate::backend::{DockerApi, ResourceUsage};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Poll container stats until cancelled, keeping the peak readings
pub(crate) async fn sample_peaks(
    docker: Arc<dyn DockerApi>,
    name: String,
    interval: Duration,
    cancel: CancellationToken,
) -> ResourceUsage {
    let mut peaks = ResourceUsage::default();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Some(usage) = docker.stats_once(&name).await {
                    if usage.memory_mb > peaks.memory_mb {
                        peaks.memory_mb = usage.memory_mb;
                    }
                    if usage.cpu_percent > peaks.cpu_percent {
                        peaks.cpu_percent = usage.cpu_percent;
                    }
                }
            }
        }
    }

    peaks
}

/// Parse one `docker stats --format '{{.MemUsage}};{{.CPUPerc}}'` line
pub(crate) fn parse_stats_line(line: &str) -> Option<ResourceUsage> {
    let (mem, cpu) = line.split_once(';')?;
    Some(ResourceUsage {
        memory_mb: parse_mem_usage(mem)?,
        cpu_percent: parse_percent(cpu)?,
    })
}

/// "12.5MiB / 1.944GiB" -> MiB of the usage half
fn parse_mem_usage(raw: &str) -> Option<f64> {
    let used = raw.split('/').next()?.trim();
    let split = used.find(|c: char| c.is_ascii_alphabetic())?;
    let (value, unit) = used.split_at(split);
    let value: f64 = value.trim().parse().ok()?;

    let mib = match unit.trim() {
        "B" => value / (1024.0 * 1024.0),
        "KiB" | "kB" => value / 1024.0,
        "MiB" | "MB" => value,
        "GiB" | "GB" => value * 1024.0,
        _ => return None,
    };
    Some(mib)
}

/// "0.50%" -> 0.5
fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mem_and_cpu() {
        let usage = parse_stats_line("12.5MiB / 1.944GiB;0.50%").unwrap();
        assert_eq!(usage.memory_mb, 12.5);
        assert_eq!(usage.cpu_percent, 0.5);
    }

    #[test]
    fn converts_units_to_mib() {
        assert_eq!(parse_mem_usage("512KiB / 1GiB"), Some(0.5));
        assert_eq!(parse_mem_usage("1.5GiB / 4GiB"), Some(1536.0));
        assert_eq!(parse_mem_usage("2MiB"), Some(2.0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_stats_line("no-separator").is_none());
        assert!(parse_stats_line("12.5XiB / 1GiB;0.5%").is_none());
        assert!(parse_percent("abc").is_none());
    }
}
