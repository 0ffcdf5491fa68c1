//! List hosts command handler

use crate::config::Config;
use crate::db::Store;
use crate::models::HostStatus;
use crate::services::HostRegistry;

pub async fn cmd_list_hosts(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let registry = HostRegistry::new(store, config);
    registry.load().await?;

    let hosts = registry.snapshot().await;
    if hosts.is_empty() {
        println!("No hosts registered.");
        return Ok(());
    }

    println!("Hosts ({} total)", hosts.len());
    println!("{:-<70}", "");

    for host in hosts {
        let indicator = if host.status == HostStatus::Online.as_str() {
            "🟢"
        } else if host.status == HostStatus::ScheduledForDeletion.as_str() {
            "🗑"
        } else {
            "•"
        };
        println!("{indicator} {} [{}]", host.name, host.inventory);
        println!(
            "  IP: {} | OS: {} | Version: {} | Groups: {}",
            host.ip_address, host.os, host.monokit_version, host.groups
        );
    }

    Ok(())
}
