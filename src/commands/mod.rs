//! CLI commands
//!
//! Each command runs against one [`Session`]: the loaded settings, one
//! endpoint pool per network and the local wallet.

pub mod account;
pub mod bridge;
pub mod wrap;

use crate::chain::{ChainBalances, ChainManager, HttpConnector};
use crate::config::Settings;
use crate::error::BridgeResult;
use crate::resolve::input::{ask_until_valid, parse_index, FieldOutcome};
use crate::resolve::Prompter;
use crate::wallet::Wallet;

/// Everything a command needs, passed explicitly
pub struct Session {
    pub settings: Settings,
    pub chains: ChainManager,
    pub wallet: Wallet,
}

impl Session {
    pub fn open(settings: Settings) -> BridgeResult<Self> {
        let wallet = Wallet::load(&settings.wallet)?;
        let chains = ChainManager::new(&settings, HttpConnector::new());

        Ok(Self {
            settings,
            chains,
            wallet,
        })
    }

    pub fn home_network(&self) -> &str {
        &self.settings.bridge.home_network
    }

    /// Balance reads for the wallet's own account
    pub fn balances(&self) -> ChainBalances<'_> {
        ChainBalances::new(
            &self.chains,
            self.wallet.address(),
            self.settings.bridge.inter_call_delay(),
        )
    }
}

/// Pick a netuid deployed on `network`, by index or by number.
///
/// A pre-supplied netuid is used as is when it is deployed there.
pub(crate) async fn select_netuid<P: Prompter + ?Sized>(
    settings: &Settings,
    prompter: &mut P,
    network: &str,
    given: Option<&str>,
) -> BridgeResult<Option<String>> {
    let netuids: Vec<String> = settings
        .netuid_contracts(network)
        .into_iter()
        .map(|(netuid, _)| netuid)
        .collect();

    if let Some(given) = given {
        if netuids.iter().any(|n| n == given) {
            return Ok(Some(given.to_string()));
        }
        prompter.say(&format!("Netuid {} is not available on {}", given, network));
    }

    if netuids.is_empty() {
        prompter.say(&format!("No subnets are configured on {}", network));
        return Ok(None);
    }

    prompter.say("Please pick a subnet from the following list or use --netuid:");
    for (i, netuid) in netuids.iter().enumerate() {
        prompter.say(&format!("{}: {}", i + 1, netuid));
    }

    let max_attempts = settings.bridge.max_prompt_attempts;
    let picked = ask_until_valid(prompter, "Which subnet?", "netuid", max_attempts, |answer| {
        let answer = answer.trim();
        if let Some(i) = netuids.iter().position(|n| n == answer) {
            return FieldOutcome::Valid(i);
        }
        parse_index(answer, netuids.len())
    })
    .await?;

    Ok(picked.map(|i| netuids[i].clone()))
}
