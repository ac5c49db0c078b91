//! `wrap` / `unwrap`: convert between native TAO and a subnet's wrapped token
//!
//! Both run on the home network. Wrapped amounts are in rao (9 decimals);
//! native balances are in wei and are scaled down before comparing.

use super::{select_netuid, Session};
use crate::chain::contracts::{send_call, WrappedAlpha};
use crate::chain::{BalanceRecord, BalanceSource};
use crate::error::{BridgeError, BridgeResult};
use crate::resolve::input::{ask_until_valid, parse_amount, parse_yes_no, FieldOutcome};
use crate::resolve::Prompter;
use crate::ui;

use ethers::types::{Address, H256, U256};
use std::sync::Arc;
use tracing::info;

/// Decimals of the wrapped tokens and of the wrap contract's amounts
pub const RAO_DECIMALS: u8 = 9;

/// Native wei to rao, rounding down
pub fn native_to_rao(wei: U256) -> U256 {
    wei / U256::exp10(18 - RAO_DECIMALS as usize)
}

/// Wrap native funds into wSN{netuid}. Returns whether anything was wrapped.
pub async fn wrap<P: Prompter + ?Sized>(
    session: &Session,
    prompter: &mut P,
    netuid: Option<&str>,
    amount: Option<&str>,
) -> BridgeResult<bool> {
    let home = session.home_network().to_string();
    let netuid = match select_netuid(&session.settings, prompter, &home, netuid).await? {
        Some(netuid) => netuid,
        None => return Ok(false),
    };
    let contract = session.settings.contract(&netuid, &home)?;
    let pool = session.chains.pool(&home)?;

    let native = session.wallet.native_balance(pool).await?;
    let available = native_to_rao(native);
    ui::section("Wrap");
    ui::field("Balance", format!("{} {}", ui::format_amount(available, RAO_DECIMALS), home));
    if available.is_zero() {
        ui::warning("Nothing to wrap. Send TAO to your EVM address first");
        return Ok(false);
    }

    let amount = match resolve_amount(
        prompter,
        session.settings.bridge.max_prompt_attempts,
        amount,
        available,
        "How much TAO do you want to wrap? (amount or \"all\")",
        false,
    )
    .await?
    {
        Some(amount) => amount,
        None => return Ok(false),
    };

    let question = format!(
        "Wrap {} TAO into wSN{}? (y/n)",
        ui::format_amount(amount, RAO_DECIMALS),
        netuid
    );
    if !confirmed(prompter, &question).await? {
        return Ok(false);
    }

    let client = Arc::new(session.wallet.signer(pool).await?);
    ui::progress("Wrapping...");
    let tx_hash = send_call(WrappedAlpha::new(contract, client).deposit_tao(amount)).await?;
    info!("Wrapped {} rao into netuid {}", amount, netuid);

    report_transaction(session, &home, tx_hash);
    let record = wrapped_balance(session, &home, contract).await?;
    ui::section("New Wrapped Token Balance");
    ui::field(&format!("wSN{}", netuid), ui::format_amount(record.balance, record.decimals));

    Ok(true)
}

/// Unwrap wSN{netuid} back into native TAO
pub async fn unwrap<P: Prompter + ?Sized>(
    session: &Session,
    prompter: &mut P,
    netuid: Option<&str>,
    amount: Option<&str>,
) -> BridgeResult<()> {
    let home = session.home_network().to_string();
    let netuid = match select_netuid(&session.settings, prompter, &home, netuid).await? {
        Some(netuid) => netuid,
        None => return Ok(()),
    };
    let contract = session.settings.contract(&netuid, &home)?;
    let pool = session.chains.pool(&home)?;

    let record = wrapped_balance(session, &home, contract).await?;
    ui::section("Wrapped Token Balance");
    ui::field(&format!("wSN{}", netuid), ui::format_amount(record.balance, record.decimals));
    if record.balance.is_zero() {
        ui::progress("No wrapped tokens to unwrap.");
        return Ok(());
    }

    let amount = match resolve_amount(
        prompter,
        session.settings.bridge.max_prompt_attempts,
        amount,
        record.balance,
        "How much wrapped token do you want to unwrap? (leave blank for max)",
        true,
    )
    .await?
    {
        Some(amount) => amount,
        None => return Ok(()),
    };

    let client = Arc::new(session.wallet.signer(pool).await?);
    ui::progress("Unwrapping...");
    let tx_hash = send_call(WrappedAlpha::new(contract, client).withdraw_tao(amount)).await?;
    info!("Unwrapped {} rao from netuid {}", amount, netuid);

    report_transaction(session, &home, tx_hash);
    let record = wrapped_balance(session, &home, contract).await?;
    ui::section("New Wrapped Token Balance");
    ui::field(&format!("wSN{}", netuid), ui::format_amount(record.balance, record.decimals));

    Ok(())
}

/// Pre-supplied amount if it parses, otherwise ask. Blank means the full
/// balance when `blank_is_max` is set.
async fn resolve_amount<P: Prompter + ?Sized>(
    prompter: &mut P,
    max_attempts: u32,
    given: Option<&str>,
    balance: U256,
    question: &str,
    blank_is_max: bool,
) -> BridgeResult<Option<U256>> {
    let parse = |answer: &str| {
        if blank_is_max && answer.trim().is_empty() {
            return FieldOutcome::Valid(balance);
        }
        parse_amount(answer, balance, RAO_DECIMALS)
    };

    if let Some(given) = given {
        match parse(given) {
            FieldOutcome::Valid(amount) => return Ok(Some(amount)),
            FieldOutcome::Invalid(reason) => prompter.say(&reason),
            FieldOutcome::Aborted => return Ok(None),
        }
    }

    ask_until_valid(prompter, question, "amount", max_attempts, parse).await
}

async fn confirmed<P: Prompter + ?Sized>(prompter: &mut P, question: &str) -> BridgeResult<bool> {
    let answer = prompter.ask(question).await?;
    Ok(answer.as_deref().map(parse_yes_no).unwrap_or(false))
}

async fn wrapped_balance(session: &Session, network: &str, contract: Address) -> BridgeResult<BalanceRecord> {
    session
        .balances()
        .token_balances(network, &[contract])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| BridgeError::Contract(format!("No balance returned for {:?}", contract)))
}

fn report_transaction(session: &Session, network: &str, tx_hash: H256) {
    let hash = format!("{:?}", tx_hash);
    ui::field("Transaction", &hash);
    if let Some(url) = session.settings.explorer_url(network, &hash) {
        ui::field("Explorer", url);
    }
}
