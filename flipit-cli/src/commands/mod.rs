mod admin;
mod game;

pub use admin::{handle_admin_command, AdminCommands};
pub use game::{account, claim, events, stats, toss};

use flipit_core::{Address, ChainState, FlipItError, FlipItService, Result, SimulatedChain};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CHAIN_STATE_FILE: &str = "chain.json";

/// Address the simulated FlipIt contract is deployed at.
const CONTRACT_ADDRESS: &str = "0x46c5f2fabe9bab44411b2e2548d135961b5e2090";

/// An initialized game session over the locally persisted simulated chain.
pub struct GameContext {
    chain: Arc<SimulatedChain>,
    service: FlipItService,
    state_path: PathBuf,
}

impl GameContext {
    pub async fn open(data_dir: &Path, account: Option<&str>) -> Result<Self> {
        let state_path = data_dir.join(CHAIN_STATE_FILE);
        let chain = if state_path.exists() {
            let content = std::fs::read_to_string(&state_path).map_err(|e| {
                FlipItError::internal(format!("failed to read chain state: {e}"))
            })?;
            let state: ChainState = serde_json::from_str(&content)?;
            Arc::new(SimulatedChain::from_state(state))
        } else {
            tracing::info!("no chain state found; starting a fresh simulated chain");
            Arc::new(SimulatedChain::new())
        };

        if let Some(account) = account {
            chain.activate_account(&Address::new(account))?;
        }

        let service = FlipItService::new(
            chain.clone(),
            chain.clone(),
            Address::new(CONTRACT_ADDRESS),
        );
        service.init().await?;

        Ok(Self {
            chain,
            service,
            state_path,
        })
    }

    pub fn service(&self) -> &FlipItService {
        &self.service
    }

    pub fn chain(&self) -> &SimulatedChain {
        &self.chain
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.chain.state())?;
        std::fs::write(&self.state_path, content)
            .map_err(|e| FlipItError::internal(format!("failed to write chain state: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipit_core::Denomination;
    use tempfile::tempdir;

    #[tokio::test]
    async fn chain_state_survives_a_reopen() {
        let dir = tempdir().unwrap();

        let game = GameContext::open(dir.path(), None).await.unwrap();
        let handle = game
            .service()
            .do_toss(0, "0.01", Denomination::Ether)
            .await
            .unwrap();
        drop(handle);
        game.save().unwrap();

        let reopened = GameContext::open(dir.path(), None).await.unwrap();
        let report = reopened.service().game_stats().await.unwrap();
        assert_eq!(report.stats.wagers_made, 1);
    }

    #[tokio::test]
    async fn unknown_account_is_rejected_on_open() {
        let dir = tempdir().unwrap();
        let result = GameContext::open(dir.path(), Some("0xnobody")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn a_named_account_becomes_the_active_player() {
        let dir = tempdir().unwrap();
        let game = GameContext::open(dir.path(), None).await.unwrap();
        let second = game.chain().accounts()[1].clone();
        game.save().unwrap();

        let game = GameContext::open(dir.path(), Some(second.as_str()))
            .await
            .unwrap();
        assert_eq!(game.service().player_account().unwrap(), second);
        assert!(!game.service().is_admin().await.unwrap());
    }
}
