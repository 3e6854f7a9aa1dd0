//! Stored-token management.
//!
//! The OAuth flow itself happens outside this tool; these commands only
//! stash the resulting bearer token where the sync client can find it.

use chrono::Utc;
use clap::{Args, Subcommand};

use crate::store::LocalStore;
use crate::sync::{
    SETTING_ACCESS_TOKEN, SETTING_SPREADSHEET_ID, SETTING_TOKEN_EXPIRES_AT,
};

/// Manage the stored spreadsheet access token
#[derive(Debug, Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum AuthSubcommand {
    /// Store an externally-acquired bearer token
    SetToken {
        token: String,
        /// Token lifetime in seconds; sync treats the token as expired
        /// afterwards
        #[arg(long)]
        expires_in_secs: Option<i64>,
    },
    /// Forget the stored token and spreadsheet binding
    Signout,
}

impl AuthCommand {
    pub async fn run(&self, store: &LocalStore) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            AuthSubcommand::SetToken {
                token,
                expires_in_secs,
            } => {
                store.set_setting(SETTING_ACCESS_TOKEN, token).await;
                match expires_in_secs {
                    Some(secs) => {
                        let expires_at = Utc::now().timestamp_millis() + secs * 1000;
                        store
                            .set_setting(SETTING_TOKEN_EXPIRES_AT, &expires_at.to_string())
                            .await;
                        println!("✓ token stored, expires in {} seconds", secs);
                    }
                    None => {
                        store.set_setting(SETTING_TOKEN_EXPIRES_AT, "").await;
                        println!("✓ token stored");
                    }
                }
                Ok(())
            }
            AuthSubcommand::Signout => {
                store.set_setting(SETTING_ACCESS_TOKEN, "").await;
                store.set_setting(SETTING_TOKEN_EXPIRES_AT, "").await;
                store.set_setting(SETTING_SPREADSHEET_ID, "").await;
                println!("✓ signed out");
                Ok(())
            }
        }
    }
}
