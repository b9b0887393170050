//! Out-of-band operational commands.
//!
//! `perksctl` talks to the backing store directly with infrastructure
//! credentials. It exists for the operations the online service cannot
//! perform by construction: granting the very first admin claim (the online
//! grant requires an existing admin) and sweeping for accounts orphaned by
//! a profile write that failed after account creation.

use anyhow::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::{self, StorageBackend};
use crate::identity::postgres::PgIdentityProvider;
use crate::identity::{IdentityProvider, NewAccount};
use crate::profile::postgres::PgProfileStore;
use crate::profile::ProfileStore;

#[derive(Parser)]
#[command(name = "perksctl")]
#[command(about = "Operational CLI for the Perks provisioning backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Grant the admin claim to an account (first-admin bootstrap)")]
    GrantAdmin {
        #[arg(long, help = "Account id to grant the admin claim to")]
        account_id: Uuid,
    },

    #[command(about = "List identity accounts that have no vendor profile")]
    SweepOrphans,

    #[command(about = "Create an identity account directly (no claim, no profile)")]
    CreateAccount {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, help = "Display name for the account")]
        name: String,
        #[arg(long, help = "Leave the account email unverified")]
        unverified: bool,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::config();

    // The CLI is only meaningful against durable storage: a memory backend
    // lives and dies with the server process it belongs to.
    if config.storage.backend != StorageBackend::Postgres {
        anyhow::bail!("perksctl requires the postgres backend (set PERKS_BACKEND=postgres and DATABASE_URL)");
    }

    let url = config
        .storage
        .database_url
        .as_deref()
        .context("DATABASE_URL is required")?;

    let identity = PgIdentityProvider::connect(url, config.security.min_password_len)
        .await
        .context("failed to connect identity backend")?;
    identity.ensure_schema().await?;

    let profiles = PgProfileStore::new(identity.pool().clone());
    profiles.ensure_schema().await?;

    match cli.command {
        Commands::GrantAdmin { account_id } => grant_admin(&identity, account_id).await,
        Commands::SweepOrphans => {
            let orphans = sweep_orphans(&identity, &profiles).await?;
            if orphans.is_empty() {
                println!("no orphaned accounts");
            } else {
                for id in &orphans {
                    println!("{id}");
                }
                println!("{} orphaned account(s)", orphans.len());
            }
            Ok(())
        }
        Commands::CreateAccount { email, password, name, unverified } => {
            let account = identity
                .create_account(NewAccount {
                    email,
                    password,
                    display_name: name,
                    email_verified: !unverified,
                })
                .await?;
            println!("created account {}", account.id);
            Ok(())
        }
    }
}

/// Merge the admin claim into an existing account, exactly like the online
/// grant. Open sessions keep their pre-grant snapshot.
pub async fn grant_admin(
    identity: &dyn IdentityProvider,
    account_id: Uuid,
) -> anyhow::Result<()> {
    identity.set_claim(account_id, "admin", true).await?;

    tracing::info!(target: "audit", account_id = %account_id, "admin claim granted via perksctl");
    println!("admin claim set for {account_id}");
    println!("the account must sign in again for the claim to take effect");

    Ok(())
}

/// Report identity accounts with no corresponding profile document. These
/// are the residue of a profile write failing after account creation;
/// cleanup stays a manual decision.
pub async fn sweep_orphans(
    identity: &dyn IdentityProvider,
    profiles: &dyn ProfileStore,
) -> anyhow::Result<Vec<Uuid>> {
    let account_ids = identity.list_account_ids().await?;
    let profiled: std::collections::HashSet<Uuid> =
        profiles.list_ids().await?.into_iter().collect();

    let orphans: Vec<Uuid> = account_ids
        .into_iter()
        .filter(|id| !profiled.contains(id))
        .collect();

    for id in &orphans {
        tracing::warn!(target: "audit", account_id = %id, "orphaned account (no vendor profile)");
    }

    Ok(orphans)
}
