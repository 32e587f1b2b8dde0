use super::GameContext;
use clap::Subcommand;
use dialoguer::Confirm;
use flipit_core::{Completion, FlipItError, Result};

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Load funds into the game balance
    Load {
        /// Amount in ether
        amount: String,
    },
    /// Withdraw funds from the game balance (admin only)
    Withdraw {
        /// Amount in ether
        amount: String,
    },
    /// Set the minimum wager (admin only)
    SetMinimum {
        /// Amount in ether
        amount: String,
    },
}

pub async fn handle_admin_command(cmd: AdminCommands, game: &GameContext) -> Result<()> {
    match cmd {
        AdminCommands::Load { amount } => {
            let completion = game.service().load_game(&amount).await?;
            match completion {
                Completion::Receipted(receipt) => {
                    println!(
                        "Loaded {} ether into the game (block {}).",
                        amount, receipt.block_number
                    );
                }
                Completion::Confirmed(_) => {
                    println!("Loaded {} ether into the game.", amount);
                }
            }
        }

        AdminCommands::Withdraw { amount } => {
            if !game.service().is_admin().await? {
                println!("The active account is not the game administrator.");
                return Ok(());
            }

            let confirmed = Confirm::new()
                .with_prompt(format!("Withdraw {} ether from the game balance?", amount))
                .default(false)
                .interact()
                .map_err(|e| FlipItError::internal(format!("prompt failed: {e}")))?;
            if !confirmed {
                println!("Withdrawal cancelled.");
                return Ok(());
            }

            game.service().withdraw(&amount).await?;
            println!("Withdrew {} ether from the game.", amount);
        }

        AdminCommands::SetMinimum { amount } => {
            game.service().set_minimum_bet(&amount).await?;
            println!("Minimum wager set to {} ether.", amount);
            println!("The new threshold applies once the next stats query observes it.");
        }
    }

    Ok(())
}
