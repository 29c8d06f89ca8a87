use anyhow::{Context, Result};
use tracing::{debug, error};
use vulkan_triangle::{logging, App, ResourceLedger};

fn main() -> Result<()> {
    logging::init()?;

    let ledger = ResourceLedger::new();
    let run = App::new(&ledger).and_then(App::run);

    // every guard has been dropped by now, whether init succeeded or not
    let audit = ledger.audit();
    if let Err(violation) = &audit {
        error!("Teardown audit failed: {}", violation);
        for event in ledger.events() {
            debug!("{:?}", event);
        }
    }

    run.context("failed to draw the triangle")?;
    audit.context("objects were not released cleanly")?;
    Ok(())
}
