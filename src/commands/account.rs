//! `account`: address, native balance and every wrapped balance on the home network

use super::Session;
use crate::chain::{BalanceRecord, BalanceSource, NativeFunds};
use crate::error::BridgeResult;
use crate::ui;

use ethers::types::{Address, U256};
use tracing::info;

pub async fn run(session: &Session) -> BridgeResult<()> {
    let home = session.home_network();
    let pool = session.chains.pool(home)?;

    ui::section("Wallet Info");
    ui::field("Address", format!("{:?}", session.wallet.address()));
    ui::field("TAO address", session.wallet.ss58_address());

    let native = session.wallet.native_balance(pool).await?;
    ui::field("Balance", format!("{} {}", ui::format_amount(native, 18), home));
    let funds = NativeFunds::classify(native, U256::from(session.settings.bridge.low_balance_wei));
    if let Some(warning) = funds.warning() {
        ui::warning(warning);
    }

    let contracts: Vec<Address> = session
        .settings
        .netuid_contracts(home)
        .into_iter()
        .map(|(_, address)| address)
        .collect();
    info!("Reading {} wrapped token balances on {}", contracts.len(), home);

    let mut records = session.balances().token_balances(home, &contracts).await?;
    sort_by_balance(&mut records);

    ui::section(if records.len() == 1 {
        "Wrapped Token Balance"
    } else {
        "Wrapped Token Balances"
    });
    if records.is_empty() {
        ui::progress("No wrapped tokens configured");
    }
    for record in &records {
        ui::field(&record.symbol, ui::format_amount(record.balance, record.decimals));
    }

    Ok(())
}

/// Largest balance first; ties keep configuration order
fn sort_by_balance(records: &mut [BalanceRecord]) {
    records.sort_by(|a, b| b.balance.cmp(&a.balance));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(symbol: &str, balance: u64) -> BalanceRecord {
        BalanceRecord {
            symbol: symbol.to_string(),
            balance: U256::from(balance),
            decimals: 9,
        }
    }

    #[test]
    fn sorts_largest_first() {
        let mut records = vec![
            record("wSN1", 5),
            BalanceRecord::unknown(),
            record("wSN64", 900),
            record("wSN9", 5),
        ];

        sort_by_balance(&mut records);

        let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["wSN64", "wSN1", "wSN9", "Unknown"]);
    }
}
