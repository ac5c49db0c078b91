//! Transfer parameter resolution
//!
//! Turns a mix of command-line arguments and interactive answers into a
//! validated [`TransferRequest`]. Each stage either advances to the next one
//! or finishes the resolution; nothing is submitted from here.

use super::input::{ask_until_valid, parse_amount, parse_destination, parse_index, parse_yes_no, FieldOutcome};
use super::prompt::Prompter;
use crate::chain::{BalanceRecord, BalanceSource, NativeFunds};
use crate::config::Settings;
use crate::error::{BridgeError, BridgeResult};
use crate::transfer::{TransferDraft, TransferRequest};
use crate::ui::format_amount;
use crate::workflow::{NextStep, WorkflowToken};

use ethers::types::{Address, U256};
use tracing::{debug, info};

/// Arguments a bridge run starts from; anything missing is asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeArgs {
    pub netuid: Option<String>,
    pub from_chain: Option<String>,
    pub to_chain: Option<String>,
    pub amount: Option<String>,
    pub to: Option<String>,
}

/// How a resolution attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Confirmed by the user, ready for the coordinator
    Ready(TransferRequest),
    /// Another flow has to run first; resume from the token afterwards
    Continue(WorkflowToken),
    Aborted,
}

/// Source and destination chain ids
#[derive(Debug, Clone, PartialEq, Eq)]
struct Route {
    source: String,
    destination: String,
}

/// A wrapped token the sender actually holds on the source chain
#[derive(Debug, Clone, PartialEq, Eq)]
struct Holding {
    netuid: String,
    contract: Address,
    record: BalanceRecord,
}

#[derive(Debug)]
enum Stage {
    SelectSourceChain,
    SelectDestChain { source: String },
    CheckBalances { route: Route },
    SelectToken { route: Route, holdings: Vec<Holding> },
    SelectAmount { route: Route, holding: Holding },
    SelectDestination { route: Route, holding: Holding, amount: U256 },
    Confirm { route: Route, holding: Holding, amount: U256, recipient: Address },
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::SelectSourceChain => "select_source_chain",
            Stage::SelectDestChain { .. } => "select_dest_chain",
            Stage::CheckBalances { .. } => "check_balances",
            Stage::SelectToken { .. } => "select_token",
            Stage::SelectAmount { .. } => "select_amount",
            Stage::SelectDestination { .. } => "select_destination",
            Stage::Confirm { .. } => "confirm",
        }
    }
}

enum Flow {
    Next(Stage),
    Done(Resolution),
}

/// Drives one resolution attempt for one sender
pub struct Resolver<'a, B: ?Sized, P: ?Sized> {
    settings: &'a Settings,
    balances: &'a B,
    prompter: &'a mut P,
    sender: Address,
    allow_wrap: bool,
}

impl<'a, B, P> Resolver<'a, B, P>
where
    B: BalanceSource + ?Sized,
    P: Prompter + ?Sized,
{
    pub fn new(settings: &'a Settings, balances: &'a B, prompter: &'a mut P, sender: Address) -> Self {
        Self {
            settings,
            balances,
            prompter,
            sender,
            allow_wrap: true,
        }
    }

    /// Whether an empty wallet may be sent through the wrap flow first
    pub fn allow_wrap(mut self, allow: bool) -> Self {
        self.allow_wrap = allow;
        self
    }

    pub async fn resolve(&mut self, args: &BridgeArgs) -> BridgeResult<Resolution> {
        let mut stage = Stage::SelectSourceChain;

        loop {
            debug!("Resolver stage: {}", stage.name());
            stage = match self.step(stage, args).await? {
                Flow::Next(next) => next,
                Flow::Done(resolution) => return Ok(resolution),
            };
        }
    }

    async fn step(&mut self, stage: Stage, args: &BridgeArgs) -> BridgeResult<Flow> {
        match stage {
            Stage::SelectSourceChain => self.select_source(args).await,
            Stage::SelectDestChain { source } => self.select_destination_chain(source, args).await,
            Stage::CheckBalances { route } => self.check_balances(route, args).await,
            Stage::SelectToken { route, holdings } => self.select_token(route, holdings, args).await,
            Stage::SelectAmount { route, holding } => self.select_amount(route, holding, args).await,
            Stage::SelectDestination {
                route,
                holding,
                amount,
            } => self.select_recipient(route, holding, amount, args).await,
            Stage::Confirm {
                route,
                holding,
                amount,
                recipient,
            } => self.confirm(route, holding, amount, recipient).await,
        }
    }

    async fn select_source(&mut self, args: &BridgeArgs) -> BridgeResult<Flow> {
        let source = match &args.from_chain {
            Some(name) => self.settings.resolve_network(name)?,
            None => {
                let excluded = args
                    .to_chain
                    .as_deref()
                    .and_then(|name| self.settings.resolve_network(name).ok());
                let options: Vec<String> = self
                    .settings
                    .supported_chains()
                    .into_iter()
                    .filter(|chain| Some(chain) != excluded.as_ref())
                    .collect();

                match self.pick_chain("Which chain are you bridging from?", &options).await? {
                    Some(chain) => chain,
                    None => return Ok(Flow::Done(Resolution::Aborted)),
                }
            }
        };

        self.settings.eid(&source)?;
        Ok(Flow::Next(Stage::SelectDestChain { source }))
    }

    async fn select_destination_chain(&mut self, source: String, args: &BridgeArgs) -> BridgeResult<Flow> {
        let destination = match &args.to_chain {
            Some(name) => self.settings.resolve_network(name)?,
            None => {
                let options: Vec<String> = self
                    .settings
                    .supported_chains()
                    .into_iter()
                    .filter(|chain| *chain != source)
                    .collect();

                match options.as_slice() {
                    [] => {
                        return Err(BridgeError::Config(
                            "No available chains to bridge to".to_string(),
                        ))
                    }
                    [only] => {
                        self.prompter.say(&format!(
                            "Only one destination chain available, selecting {}",
                            only
                        ));
                        only.clone()
                    }
                    _ => match self.pick_chain("Which chain are you bridging to?", &options).await? {
                        Some(chain) => chain,
                        None => return Ok(Flow::Done(Resolution::Aborted)),
                    },
                }
            }
        };

        if destination == source {
            return Err(BridgeError::SameChain(source));
        }
        self.settings.eid(&destination)?;

        Ok(Flow::Next(Stage::CheckBalances {
            route: Route {
                source,
                destination,
            },
        }))
    }

    async fn check_balances(&mut self, route: Route, args: &BridgeArgs) -> BridgeResult<Flow> {
        if let Some(netuid) = &args.netuid {
            self.settings.contract(netuid, &route.source)?;
        }

        let native = self.balances.native_balance(&route.source).await?;
        self.prompter
            .say(&format!("Balance: {} {}", format_amount(native, 18), route.source));
        let funds = NativeFunds::classify(native, U256::from(self.settings.bridge.low_balance_wei));
        if let Some(warning) = funds.warning() {
            self.prompter.say(warning);
        }

        let deployments = self.settings.netuid_contracts(&route.source);
        let contracts: Vec<Address> = deployments.iter().map(|(_, address)| *address).collect();
        let records = self.balances.token_balances(&route.source, &contracts).await?;

        let holdings: Vec<Holding> = deployments
            .into_iter()
            .zip(records)
            .filter(|(_, record)| !record.balance.is_zero())
            .map(|((netuid, contract), record)| Holding {
                netuid,
                contract,
                record,
            })
            .collect();

        if !holdings.is_empty() {
            self.prompter.say("Wrapped token balances:");
            for holding in &holdings {
                self.prompter.say(&format!(
                    "  {:<10} {}",
                    holding.record.symbol,
                    format_amount(holding.record.balance, holding.record.decimals)
                ));
            }
            return Ok(Flow::Next(Stage::SelectToken { route, holdings }));
        }

        self.prompter.say("No wrapped token balances found");
        if !self.allow_wrap {
            return Ok(Flow::Done(Resolution::Aborted));
        }

        let answer = self
            .prompter
            .ask("Would you like to convert TAO to wrapped tokens first? (y/n)")
            .await?;
        if !answer.as_deref().map(parse_yes_no).unwrap_or(false) {
            return Ok(Flow::Done(Resolution::Aborted));
        }

        info!("No balance on {}, continuing through wrap", route.source);
        Ok(Flow::Done(Resolution::Continue(WorkflowToken {
            next: NextStep::Wrap {
                netuid: args.netuid.clone(),
            },
            saved: BridgeArgs {
                netuid: args.netuid.clone(),
                from_chain: Some(route.source),
                to_chain: Some(route.destination),
                amount: args.amount.clone(),
                to: args.to.clone(),
            },
        })))
    }

    async fn select_token(&mut self, route: Route, holdings: Vec<Holding>, args: &BridgeArgs) -> BridgeResult<Flow> {
        if let Some(netuid) = &args.netuid {
            if let Some(holding) = holdings.iter().find(|h| &h.netuid == netuid) {
                return Ok(Flow::Next(Stage::SelectAmount {
                    route,
                    holding: holding.clone(),
                }));
            }
            self.prompter
                .say(&format!("No balance for netuid {} on {}", netuid, route.source));
        }

        for (i, holding) in holdings.iter().enumerate() {
            self.prompter
                .say(&format!("{}: {}", i + 1, holding.record.symbol));
        }
        let max_attempts = self.settings.bridge.max_prompt_attempts;
        let picked = ask_until_valid(&mut *self.prompter, "Which token?", "token", max_attempts, |answer| {
            let answer = answer.trim();
            match holdings
                .iter()
                .position(|h| h.netuid == answer || h.record.symbol.eq_ignore_ascii_case(answer))
            {
                Some(i) => FieldOutcome::Valid(i),
                None => parse_index(answer, holdings.len()),
            }
        })
        .await?;

        match picked {
            Some(i) => Ok(Flow::Next(Stage::SelectAmount {
                route,
                holding: holdings[i].clone(),
            })),
            None => Ok(Flow::Done(Resolution::Aborted)),
        }
    }

    async fn select_amount(&mut self, route: Route, holding: Holding, args: &BridgeArgs) -> BridgeResult<Flow> {
        let balance = holding.record.balance;
        let decimals = holding.record.decimals;

        self.prompter.say(&format!(
            "Available balance: {} {}",
            format_amount(balance, decimals),
            holding.record.symbol
        ));

        if let Some(given) = &args.amount {
            match parse_amount(given, balance, decimals) {
                FieldOutcome::Valid(amount) => {
                    return Ok(Flow::Next(Stage::SelectDestination {
                        route,
                        holding,
                        amount,
                    }))
                }
                FieldOutcome::Invalid(reason) => self.prompter.say(&reason),
                FieldOutcome::Aborted => return Ok(Flow::Done(Resolution::Aborted)),
            }
        }

        let max_attempts = self.settings.bridge.max_prompt_attempts;
        let amount = ask_until_valid(
            &mut *self.prompter,
            "How much do you want to bridge? (amount or \"all\")",
            "amount",
            max_attempts,
            |answer| parse_amount(answer, balance, decimals),
        )
        .await?;

        match amount {
            Some(amount) => Ok(Flow::Next(Stage::SelectDestination {
                route,
                holding,
                amount,
            })),
            None => Ok(Flow::Done(Resolution::Aborted)),
        }
    }

    async fn select_recipient(
        &mut self,
        route: Route,
        holding: Holding,
        amount: U256,
        args: &BridgeArgs,
    ) -> BridgeResult<Flow> {
        let answer = match &args.to {
            Some(to) => to.clone(),
            None => {
                let question = format!("Destination address (blank for {:?}):", self.sender);
                match self.prompter.ask(&question).await? {
                    Some(answer) => answer,
                    None => return Ok(Flow::Done(Resolution::Aborted)),
                }
            }
        };

        let recipient = parse_destination(&answer, self.sender)?;
        Ok(Flow::Next(Stage::Confirm {
            route,
            holding,
            amount,
            recipient,
        }))
    }

    async fn confirm(&mut self, route: Route, holding: Holding, amount: U256, recipient: Address) -> BridgeResult<Flow> {
        let request = TransferRequest::build(
            self.settings,
            TransferDraft {
                source_chain: route.source,
                destination_chain: route.destination,
                token: holding.contract,
                amount,
                recipient,
            },
            holding.record.balance,
        )?;

        self.prompter.say(&format!(
            "Bridging {} {} from {} to {}",
            format_amount(amount, holding.record.decimals),
            holding.record.symbol,
            request.source_chain(),
            request.destination_chain()
        ));
        self.prompter.say(&format!("Recipient: {:?}", request.recipient()));

        let answer = self.prompter.ask("Would you like to bridge tokens? (y/n)").await?;
        if answer.as_deref().map(parse_yes_no).unwrap_or(false) {
            Ok(Flow::Done(Resolution::Ready(request)))
        } else {
            Ok(Flow::Done(Resolution::Aborted))
        }
    }

    /// Menu of chains; accepts the 1-based index or a network name or alias
    async fn pick_chain(&mut self, question: &str, options: &[String]) -> BridgeResult<Option<String>> {
        for (i, chain) in options.iter().enumerate() {
            self.prompter.say(&format!("{}: {}", i + 1, chain));
        }

        let settings = self.settings;
        let max_attempts = settings.bridge.max_prompt_attempts;
        let picked = ask_until_valid(&mut *self.prompter, question, "chain", max_attempts, |answer| {
            if let Ok(chain) = settings.resolve_network(answer) {
                if options.contains(&chain) {
                    return FieldOutcome::Valid(chain);
                }
                return FieldOutcome::Invalid(format!("{} is not available here", chain));
            }
            match parse_index(answer, options.len()) {
                FieldOutcome::Valid(i) => FieldOutcome::Valid(options[i].clone()),
                FieldOutcome::Invalid(reason) => FieldOutcome::Invalid(reason),
                FieldOutcome::Aborted => FieldOutcome::Aborted,
            }
        })
        .await?;

        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::balances::MockBalanceSource;
    use crate::config::tests::{test_settings, TOKEN_A};
    use crate::resolve::prompt::ScriptedPrompter;
    use std::str::FromStr;

    fn sender() -> Address {
        Address::repeat_byte(0x5e)
    }

    fn token_a() -> Address {
        Address::from_str(TOKEN_A).unwrap()
    }

    /// 1000 rao of wSN64 (TOKEN_A), nothing else
    fn funded() -> MockBalanceSource {
        let mut balances = MockBalanceSource::new();
        balances
            .expect_native_balance()
            .returning(|_| Ok(U256::exp10(18)));
        balances.expect_token_balances().returning(|_, contracts| {
            Ok(contracts
                .iter()
                .map(|contract| {
                    if *contract == Address::from_str(TOKEN_A).unwrap() {
                        BalanceRecord {
                            symbol: "wSN64".to_string(),
                            balance: U256::from(1000),
                            decimals: 9,
                        }
                    } else {
                        BalanceRecord::unknown()
                    }
                })
                .collect())
        });
        balances
    }

    fn empty() -> MockBalanceSource {
        let mut balances = MockBalanceSource::new();
        balances
            .expect_native_balance()
            .returning(|_| Ok(U256::zero()));
        balances.expect_token_balances().returning(|_, contracts| {
            Ok(contracts.iter().map(|_| BalanceRecord::unknown()).collect())
        });
        balances
    }

    async fn run(
        settings: &Settings,
        balances: &MockBalanceSource,
        prompter: &mut ScriptedPrompter,
        args: BridgeArgs,
    ) -> BridgeResult<Resolution> {
        Resolver::new(settings, balances, prompter, sender())
            .resolve(&args)
            .await
    }

    fn ready(resolution: Resolution) -> TransferRequest {
        match resolution {
            Resolution::Ready(request) => request,
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn resolves_interactively() {
        let settings = test_settings();
        let balances = funded();
        let mut prompter = ScriptedPrompter::new(["tao", "eth", "1", "all", "", "y"]);

        let request = ready(run(&settings, &balances, &mut prompter, BridgeArgs::default()).await.unwrap());

        assert_eq!(request.source_chain(), "tao");
        assert_eq!(request.destination_chain(), "eth");
        assert_eq!(request.destination_eid(), 30101);
        assert_eq!(request.token(), token_a());
        assert_eq!(request.amount(), U256::from(1000));
        assert_eq!(request.recipient(), sender());
        assert_eq!(prompter.remaining(), 0);
    }

    #[tokio::test]
    async fn pre_supplied_arguments_only_need_confirmation() {
        let settings = test_settings();
        let balances = funded();
        let mut prompter = ScriptedPrompter::new(["yes"]);
        let args = BridgeArgs {
            netuid: Some("64".to_string()),
            from_chain: Some("Bittensor".to_string()),
            to_chain: Some("ethereum".to_string()),
            amount: Some("0.0000005".to_string()),
            to: Some("0x00000000000000000000000000000000000000aa".to_string()),
        };

        let request = ready(run(&settings, &balances, &mut prompter, args).await.unwrap());

        assert_eq!(prompter.asked().len(), 1);
        assert_eq!(request.amount(), U256::from(500));
        assert_eq!(request.recipient(), Address::from_low_u64_be(0xaa));
    }

    #[tokio::test]
    async fn auto_selects_the_only_destination() {
        let settings = Settings::from_toml_str(&format!(
            r#"
            [bridge]
            inter_call_delay_ms = 0
            status_api_url = "http://status.local"
            scan_tx_url = "https://scan.local/tx/{{hash}}"
            [wallet]
            [networks.tao]
            rpc_urls = ["http://tao"]
            [networks.eth]
            rpc_urls = ["http://eth"]
            [eids]
            tao = 30374
            eth = 30101
            [netuids.64]
            tao = "{TOKEN_A}"
            "#
        ))
        .unwrap();
        let balances = funded();
        let mut prompter = ScriptedPrompter::new(["1", "all", "", "y"]);
        let args = BridgeArgs {
            from_chain: Some("tao".to_string()),
            ..Default::default()
        };

        let request = ready(run(&settings, &balances, &mut prompter, args).await.unwrap());

        assert_eq!(request.destination_chain(), "eth");
        assert!(prompter.asked().iter().all(|q| !q.contains("bridging to")));
        assert!(prompter
            .said()
            .iter()
            .any(|line| line.contains("Only one destination chain available")));
    }

    #[tokio::test]
    async fn unbridgeable_destination_fails_fast() {
        let settings = test_settings();
        let balances = MockBalanceSource::new();
        let mut prompter = ScriptedPrompter::new(Vec::<&str>::new());
        let args = BridgeArgs {
            from_chain: Some("tao".to_string()),
            to_chain: Some("base".to_string()),
            ..Default::default()
        };

        let err = run(&settings, &balances, &mut prompter, args).await.unwrap_err();

        assert!(matches!(err, BridgeError::ChainNotBridgeable(chain) if chain == "base"));
    }

    #[tokio::test]
    async fn same_chain_is_rejected() {
        let settings = test_settings();
        let balances = MockBalanceSource::new();
        let mut prompter = ScriptedPrompter::new(Vec::<&str>::new());
        let args = BridgeArgs {
            from_chain: Some("subtensor".to_string()),
            to_chain: Some("tao".to_string()),
            ..Default::default()
        };

        let err = run(&settings, &balances, &mut prompter, args).await.unwrap_err();

        assert!(matches!(err, BridgeError::SameChain(_)));
    }

    #[tokio::test]
    async fn empty_wallet_continues_through_wrap() {
        let settings = test_settings();
        let balances = empty();
        let mut prompter = ScriptedPrompter::new(["y"]);
        let args = BridgeArgs {
            netuid: Some("64".to_string()),
            from_chain: Some("tao".to_string()),
            to_chain: Some("eth".to_string()),
            ..Default::default()
        };

        let resolution = run(&settings, &balances, &mut prompter, args).await.unwrap();

        match resolution {
            Resolution::Continue(token) => {
                assert_eq!(
                    token.next,
                    NextStep::Wrap {
                        netuid: Some("64".to_string())
                    }
                );
                assert_eq!(token.saved.from_chain.as_deref(), Some("tao"));
                assert_eq!(token.saved.to_chain.as_deref(), Some("eth"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(prompter.said().iter().any(|line| line.contains("empty")));
    }

    #[tokio::test]
    async fn declining_wrap_aborts() {
        let settings = test_settings();
        let balances = empty();
        let mut prompter = ScriptedPrompter::new(["n"]);
        let args = BridgeArgs {
            from_chain: Some("tao".to_string()),
            to_chain: Some("eth".to_string()),
            ..Default::default()
        };

        let resolution = run(&settings, &balances, &mut prompter, args).await.unwrap();
        assert_eq!(resolution, Resolution::Aborted);
    }

    #[tokio::test]
    async fn wrap_is_not_offered_twice() {
        let settings = test_settings();
        let balances = empty();
        let mut prompter = ScriptedPrompter::new(["y"]);
        let args = BridgeArgs {
            from_chain: Some("tao".to_string()),
            to_chain: Some("eth".to_string()),
            ..Default::default()
        };

        let resolution = Resolver::new(&settings, &balances, &mut prompter, sender())
            .allow_wrap(false)
            .resolve(&args)
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::Aborted);
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn invalid_supplied_amount_falls_back_to_prompt() {
        let settings = test_settings();
        let balances = funded();
        let mut prompter = ScriptedPrompter::new(["0.000001", "y"]);
        let args = BridgeArgs {
            netuid: Some("64".to_string()),
            from_chain: Some("tao".to_string()),
            to_chain: Some("eth".to_string()),
            amount: Some("5".to_string()),
            to: Some(String::new()),
        };

        let request = ready(run(&settings, &balances, &mut prompter, args).await.unwrap());

        assert_eq!(request.amount(), U256::from(1000));
        assert!(prompter.said().iter().any(|line| line.contains("Insufficient balance")));
    }

    #[tokio::test]
    async fn over_balance_amounts_exhaust_attempts() {
        let settings = test_settings();
        let balances = funded();
        let mut prompter = ScriptedPrompter::new(["1", "2", "3"]);
        let args = BridgeArgs {
            netuid: Some("64".to_string()),
            from_chain: Some("tao".to_string()),
            to_chain: Some("eth".to_string()),
            ..Default::default()
        };

        let err = run(&settings, &balances, &mut prompter, args).await.unwrap_err();

        assert!(matches!(err, BridgeError::InputExhausted { ref field, .. } if field == "amount"));
    }

    #[tokio::test]
    async fn malformed_destination_is_fatal() {
        let settings = test_settings();
        let balances = funded();
        let mut prompter = ScriptedPrompter::new(["all", "0x1234"]);
        let args = BridgeArgs {
            netuid: Some("64".to_string()),
            from_chain: Some("tao".to_string()),
            to_chain: Some("eth".to_string()),
            ..Default::default()
        };

        let err = run(&settings, &balances, &mut prompter, args).await.unwrap_err();

        assert!(matches!(err, BridgeError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn declining_confirmation_aborts() {
        let settings = test_settings();
        let balances = funded();
        let mut prompter = ScriptedPrompter::new(["tao", "eth", "wSN64", "all", "", "n"]);

        let resolution = run(&settings, &balances, &mut prompter, BridgeArgs::default())
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::Aborted);
    }

    #[tokio::test]
    async fn unknown_netuid_on_source_is_a_configuration_error() {
        let settings = test_settings();
        let balances = MockBalanceSource::new();
        let mut prompter = ScriptedPrompter::new(Vec::<&str>::new());
        let args = BridgeArgs {
            netuid: Some("9".to_string()),
            from_chain: Some("eth".to_string()),
            to_chain: Some("tao".to_string()),
            ..Default::default()
        };

        let err = run(&settings, &balances, &mut prompter, args).await.unwrap_err();

        assert!(matches!(err, BridgeError::AssetNotFound { .. }));
    }
}
