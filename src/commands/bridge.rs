//! `bridge`: resolve parameters, execute the transfer, report the outcome

use super::{wrap, Session};
use crate::chain::OftClient;
use crate::error::BridgeResult;
use crate::resolve::{BridgeArgs, Prompter, Resolution, Resolver};
use crate::transfer::{
    Coordinator, CoordinatorConfig, LayerZeroScan, TransferOutcome, TransferRequest, TransferStatus,
};
use crate::ui;
use crate::workflow::{self, WorkflowSteps, WorkflowToken};

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub async fn run<P: Prompter + ?Sized>(session: &Session, prompter: &mut P, args: BridgeArgs) -> BridgeResult<()> {
    let mut steps = LiveSteps { session, prompter };
    workflow::drive(&mut steps, WorkflowToken::bridge(args)).await
}

/// Workflow steps against live chains
struct LiveSteps<'a, P: ?Sized> {
    session: &'a Session,
    prompter: &'a mut P,
}

#[async_trait]
impl<P: Prompter + ?Sized> WorkflowSteps for LiveSteps<'_, P> {
    async fn bridge(&mut self, args: &BridgeArgs, allow_wrap: bool) -> BridgeResult<WorkflowToken> {
        ui::section("Bridge");
        let balances = self.session.balances();
        let resolution = Resolver::new(
            &self.session.settings,
            &balances,
            &mut *self.prompter,
            self.session.wallet.address(),
        )
        .allow_wrap(allow_wrap)
        .resolve(args)
        .await?;

        match resolution {
            Resolution::Ready(request) => {
                execute(self.session, &request).await?;
                Ok(WorkflowToken::done())
            }
            Resolution::Continue(token) => Ok(token),
            Resolution::Aborted => {
                ui::progress("Bridge cancelled");
                Ok(WorkflowToken::done())
            }
        }
    }

    async fn wrap(&mut self, netuid: Option<String>, resume: BridgeArgs) -> BridgeResult<WorkflowToken> {
        let wrapped = wrap::wrap(self.session, &mut *self.prompter, netuid.as_deref(), None).await?;
        if wrapped {
            Ok(WorkflowToken::bridge(resume))
        } else {
            Ok(WorkflowToken::done())
        }
    }
}

async fn execute(session: &Session, request: &TransferRequest) -> BridgeResult<()> {
    let settings = &session.settings;
    let pool = session.chains.pool(request.source_chain())?;
    let client = Arc::new(session.wallet.signer(pool).await?);

    let coordinator = Coordinator::new(
        OftClient::new(request.token(), client),
        LayerZeroScan::new(settings.bridge.status_api_url.clone(), settings.bridge.request_timeout())?,
        CoordinatorConfig::from_settings(settings),
    );

    let outcome = coordinator.execute(request, session.wallet.address()).await?;
    info!(
        "Bridge of {} from {} to {} ended as {:?}",
        request.amount(),
        request.source_chain(),
        request.destination_chain(),
        outcome.status
    );

    report(session, request, &outcome);
    Ok(())
}

fn report(session: &Session, request: &TransferRequest, outcome: &TransferOutcome) {
    ui::section("Bridge Result");
    let hash = format!("{:?}", outcome.transaction_hash);
    ui::field("Transaction", &hash);
    if let Some(url) = session.settings.explorer_url(request.source_chain(), &hash) {
        ui::field("Explorer", url);
    }
    ui::field("LayerZero", &outcome.explorer_url);
    ui::field("Status", outcome.last_reported.as_deref().unwrap_or("no delivery confirmation"));

    match outcome.status {
        TransferStatus::Delivered => ui::progress("Bridged successfully!"),
        TransferStatus::DeliveredAlt => {
            ui::warning("Delivery reported but not finalized. Verify on LayerZero Scan")
        }
        _ => ui::warning(
            "Delivery not confirmed yet. The transfer may still complete, check LayerZero Scan",
        ),
    }
}
