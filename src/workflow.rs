//! Resumable command workflow
//!
//! A flow that needs another flow to run first hands back a token naming the
//! next step and the parameters to resume with. One driver loop executes the
//! tokens, so no flow ever calls another directly.

use crate::error::BridgeResult;
use crate::resolve::BridgeArgs;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Wrap detours allowed in one run
const MAX_DETOURS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Bridge,
    Wrap { netuid: Option<String> },
    Done,
}

/// What to run next and the parameters saved for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowToken {
    pub next: NextStep,
    pub saved: BridgeArgs,
}

impl WorkflowToken {
    pub fn bridge(args: BridgeArgs) -> Self {
        Self {
            next: NextStep::Bridge,
            saved: args,
        }
    }

    pub fn done() -> Self {
        Self {
            next: NextStep::Done,
            saved: BridgeArgs::default(),
        }
    }
}

/// The flows the driver can run
#[async_trait]
pub trait WorkflowSteps: Send {
    /// Resolve and execute a bridge transfer; `allow_wrap` is false once the
    /// wrap detour has been used
    async fn bridge(&mut self, args: &BridgeArgs, allow_wrap: bool) -> BridgeResult<WorkflowToken>;

    /// Wrap native funds, then hand `resume` back to the driver
    async fn wrap(&mut self, netuid: Option<String>, resume: BridgeArgs) -> BridgeResult<WorkflowToken>;
}

/// Run tokens until one says `Done`
pub async fn drive<S: WorkflowSteps + ?Sized>(steps: &mut S, start: WorkflowToken) -> BridgeResult<()> {
    let mut token = start;
    let mut detours = 0u32;

    loop {
        debug!("Workflow step: {:?}", token.next);
        token = match token.next {
            NextStep::Done => return Ok(()),
            NextStep::Bridge => steps.bridge(&token.saved, detours < MAX_DETOURS).await?,
            NextStep::Wrap { netuid } => {
                if detours >= MAX_DETOURS {
                    warn!("Wrap detour already taken, stopping");
                    return Ok(());
                }
                detours += 1;
                steps.wrap(netuid, token.saved).await?
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bridge always finds an empty wallet and asks for a wrap
    #[derive(Default)]
    struct AlwaysEmpty {
        calls: Vec<String>,
    }

    #[async_trait]
    impl WorkflowSteps for AlwaysEmpty {
        async fn bridge(&mut self, args: &BridgeArgs, allow_wrap: bool) -> BridgeResult<WorkflowToken> {
            self.calls.push(format!("bridge(allow_wrap={})", allow_wrap));
            if !allow_wrap {
                return Ok(WorkflowToken::done());
            }
            Ok(WorkflowToken {
                next: NextStep::Wrap {
                    netuid: args.netuid.clone(),
                },
                saved: args.clone(),
            })
        }

        async fn wrap(&mut self, netuid: Option<String>, resume: BridgeArgs) -> BridgeResult<WorkflowToken> {
            self.calls.push(format!("wrap({})", netuid.unwrap_or_default()));
            Ok(WorkflowToken::bridge(resume))
        }
    }

    #[tokio::test]
    async fn resumes_bridge_after_wrap_once() {
        let mut steps = AlwaysEmpty::default();
        let args = BridgeArgs {
            netuid: Some("64".to_string()),
            from_chain: Some("tao".to_string()),
            ..Default::default()
        };

        drive(&mut steps, WorkflowToken::bridge(args)).await.unwrap();

        assert_eq!(
            steps.calls,
            vec!["bridge(allow_wrap=true)", "wrap(64)", "bridge(allow_wrap=false)"]
        );
    }

    #[tokio::test]
    async fn stops_a_second_wrap_request() {
        struct Stubborn(u32);

        #[async_trait]
        impl WorkflowSteps for Stubborn {
            async fn bridge(&mut self, args: &BridgeArgs, _allow_wrap: bool) -> BridgeResult<WorkflowToken> {
                self.0 += 1;
                Ok(WorkflowToken {
                    next: NextStep::Wrap { netuid: None },
                    saved: args.clone(),
                })
            }

            async fn wrap(&mut self, _netuid: Option<String>, resume: BridgeArgs) -> BridgeResult<WorkflowToken> {
                Ok(WorkflowToken::bridge(resume))
            }
        }

        let mut steps = Stubborn(0);
        drive(&mut steps, WorkflowToken::bridge(BridgeArgs::default()))
            .await
            .unwrap();

        assert_eq!(steps.0, 2);
    }

    #[tokio::test]
    async fn wrap_can_start_a_run() {
        let mut steps = AlwaysEmpty::default();

        drive(
            &mut steps,
            WorkflowToken {
                next: NextStep::Wrap {
                    netuid: Some("9".to_string()),
                },
                saved: BridgeArgs::default(),
            },
        )
        .await
        .unwrap();

        assert_eq!(steps.calls, vec!["wrap(9)", "bridge(allow_wrap=false)"]);
    }

    #[test]
    fn done_token_ends_immediately() {
        let mut steps = AlwaysEmpty::default();

        tokio_test::assert_ok!(tokio_test::block_on(drive(&mut steps, WorkflowToken::done())));

        assert!(steps.calls.is_empty());
    }
}
