use std::path::Path;

use anyhow::{anyhow, Result};
use indoc::indoc;

use filemetrics::{collector::SystemClock, source::MemFs, Collector, FileCollector};

fn main() -> Result<()> {
    let config = indoc! {r#"
        [{
          "file": "/proc/loadavg",
          "metrics": {
            "/proc/loadavg/1m": "{1m}",
            "/proc/loadavg/1m_per_cpu": "{1m},{NUM_CPU},:div"
          },
          "parser": {
            "format": "table",
            "columns": ["1m", "5m", "15m", "tasks", "last_pid"]
          }
        }]
    "#};

    let mut args = std::env::args();
    let progname = args.next().ok_or(anyhow!("ARGV[0] was not set??"))?;

    // Read the live file when asked to, otherwise a canned snapshot
    let loadavg = match args.next().as_deref() {
        Some("--help") => {
            println!("Usage: {} [--live]", progname);
            return Ok(());
        }
        Some("--live") => std::fs::read_to_string("/proc/loadavg")?,
        Some(other) => Err(anyhow!("unknown argument: {}", other))?,
        None => "0.31 0.42 0.40 2/512 4242\n".to_string(),
    };

    let fs = MemFs::new()
        .with_file("/etc/filemetrics.json", config)
        .with_file("/proc/loadavg", loadavg);
    let collector = FileCollector::with_source(fs, SystemClock);

    for metric in collector.collect(Path::new("/etc/filemetrics.json"))? {
        println!("{} = {}", metric.namespace, metric.value);
    }

    Ok(())
}
