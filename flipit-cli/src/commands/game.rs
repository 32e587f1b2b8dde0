use super::GameContext;
use comfy_table::{presets::UTF8_FULL, Table};
use flipit_core::{Completion, Denomination, QueryId, Result, WagerChoice};
use std::time::Duration;

pub async fn toss(game: &GameContext, choice: &str, amount: &str, denomination: &str) -> Result<()> {
    let choice: WagerChoice = choice.parse()?;
    let denomination: Denomination = denomination.parse()?;
    let service = game.service();

    // subscribe before submitting so the resolution event is not missed
    let mut results = service.toss_result_returned_events()?;
    let handle = service.do_toss(choice.index(), amount, denomination).await?;
    println!("Toss submitted: {}", handle.transaction_hash());

    match tokio::time::timeout(Duration::from_secs(5), results.next()).await {
        Ok(Some(event)) => {
            let side = match event.payload.get("result").and_then(|v| v.as_u64()) {
                Some(1) => "tails",
                _ => "heads",
            };
            let won = event
                .payload
                .get("win")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if won {
                println!("The coin came up {side}. You won!");
                println!("Claim your payout with 'flipit claim'.");
            } else {
                println!("The coin came up {side}. Better luck next time.");
            }
        }
        _ => println!("No toss result observed yet; check 'flipit stats' later."),
    }

    Ok(())
}

pub async fn claim(game: &GameContext, query_id: Option<&str>) -> Result<()> {
    let service = game.service();

    let query_id = match query_id {
        Some(raw) => QueryId::new(raw),
        None => {
            let report = service.game_stats().await?;
            match report.unclaimed_query_id {
                Some(id) => {
                    println!("Claiming unclaimed win {}", id);
                    id
                }
                None => {
                    println!("No unclaimed win to claim.");
                    return Ok(());
                }
            }
        }
    };

    match service.claim_win(&query_id).await? {
        Completion::Receipted(receipt) => {
            println!("Win claimed in block {}.", receipt.block_number);
        }
        Completion::Confirmed(confirmations) => {
            println!("Win claimed ({confirmations} confirmation(s)).");
        }
    }

    Ok(())
}

pub async fn stats(game: &GameContext) -> Result<()> {
    let report = game.service().game_stats().await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Statistic", "Value"]);
    table.add_row(vec!["Wagers made", &report.stats.wagers_made.to_string()]);
    table.add_row(vec!["Wagers won", &report.stats.wagers_won.to_string()]);
    table.add_row(vec![
        "Amount wagered (wei)",
        &report.stats.amount_wagered.to_string(),
    ]);
    table.add_row(vec![
        "Amount paid out (wei)",
        &report.stats.amount_paid_out.to_string(),
    ]);
    table.add_row(vec![
        "Available balance (wei)",
        &report.stats.available_balance.to_string(),
    ]);
    table.add_row(vec![
        "Win multiplier",
        &report.stats.win_multiplier.to_string(),
    ]);
    table.add_row(vec![
        "Minimum wager (wei)",
        &report.stats.minimum_wager.to_string(),
    ]);
    println!("{table}");

    if let Some(query_id) = &report.unclaimed_query_id {
        println!();
        println!("You have an unclaimed win! Query id: {query_id}");
        println!("Claim it with 'flipit claim'.");
    }

    Ok(())
}

pub async fn account(game: &GameContext) -> Result<()> {
    let service = game.service();
    let account = service.player_account()?;
    let is_admin = service.is_admin().await?;

    println!("Active account: {}", account);
    println!(
        "Role: {}",
        if is_admin { "game administrator" } else { "player" }
    );
    println!();
    println!("Known accounts:");
    for known in game.chain().accounts() {
        println!("  {}", known);
    }

    Ok(())
}

pub fn events(game: &GameContext, limit: usize) -> Result<()> {
    let events = game.chain().recent_events(limit);
    if events.is_empty() {
        println!("No contract events recorded yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Time", "Event", "Tx", "Payload"]);
    for event in events {
        table.add_row(vec![
            &event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            &event.name,
            &event.transaction_hash[..10].to_string(),
            &serde_json::to_string(&event.payload)?,
        ]);
    }
    println!("{table}");

    Ok(())
}
