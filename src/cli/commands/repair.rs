//! Duplicate host name repair

use crate::config::Config;
use crate::db::Store;
use crate::services::HostRegistry;

pub async fn cmd_repair_duplicates(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let registry = HostRegistry::new(store, config);

    let renamed = registry.repair_duplicate_names().await?;
    if renamed.is_empty() {
        println!("No duplicate host names found.");
        return Ok(());
    }

    println!("Renamed {} host(s)", renamed.len());
    println!("{:-<60}", "");
    for host in renamed {
        println!("  #{:<6} {} -> {}", host.id, host.from, host.to);
    }

    Ok(())
}
