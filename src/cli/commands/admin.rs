//! Create admin command handler

use crate::config::Config;
use crate::db::{NewUser, Store, generate_token};
use crate::domain::Role;

pub async fn cmd_create_admin(
    config: &Config,
    username: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let username = username.trim();
    if username.is_empty() {
        anyhow::bail!("Username cannot be empty");
    }

    let store = Store::new(&config.general.database_path).await?;
    if store.get_user_by_username(username).await?.is_some() {
        anyhow::bail!("User '{username}' already exists");
    }

    let generated = password.is_none();
    let password = password.unwrap_or_else(|| generate_token()[..24].to_string());
    if password.len() < 8 {
        anyhow::bail!("Password must be at least 8 characters");
    }

    store
        .create_user(
            NewUser {
                username: username.to_string(),
                password: Some(password.clone()),
                email: String::new(),
                role: Role::Admin,
                inventories: vec![config.fleet.default_inventory.clone()],
                auth_source: "local",
            },
            &config.security,
        )
        .await?;

    println!("✓ Admin '{username}' created");
    if generated {
        println!("  Password: {password}");
    }

    Ok(())
}
