use crate::ui;
use anyhow::Result;
use probe_core::CollectorRegistry;

pub async fn execute() -> Result<()> {
    ui::heading("Available collectors");

    let collectors = CollectorRegistry::with_defaults().list();
    ui::field(0, "Total", collectors.len());
    println!();

    for collector in &collectors {
        ui::item(collector);
    }

    println!();
    ui::hint("disable collectors with 'collectors.disabled' in the agent config");

    Ok(())
}
