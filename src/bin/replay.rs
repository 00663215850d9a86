//! Decodes a TLV timeseries file and prints per-record-type counts plus
//! the final navigation solution, for manual smoke-testing a logged run.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use usv_twin_core::codec::{read_timeseries, Record};
use usv_twin_core::codec::io::ReadOptions;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path: PathBuf = match args.next() {
        Some(p) => PathBuf::from(p),
        None => bail!("usage: twin-replay <timeseries.bin>"),
    };

    let data = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let parsed = read_timeseries(&data, ReadOptions::default())?;

    log::info!(
        "fw_model_schema={} t0_us={}",
        parsed.header.fw_model_schema,
        parsed.header.t0_us
    );

    for (name, count) in &parsed.record_counts {
        println!("{name}: {count} records");
    }
    if !parsed.unknown.is_empty() {
        println!("{} unknown records skipped", parsed.unknown.len());
    }

    if let Some(nav) = parsed.records.get("REC_NAV_SOLUTION").and_then(|v| v.last()) {
        if let Record::NavSolution { x, y, psi, v, r, b_g } = nav.record {
            println!(
                "final nav solution @ t_us={}: x={x:.3} y={y:.3} psi={psi:.3} v={v:.3} r={r:.3} b_g={b_g:.4}",
                nav.t_us
            );
        }
    }

    Ok(())
}
