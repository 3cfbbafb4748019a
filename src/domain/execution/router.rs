//! Execution router - sequences opaque calls to modules as one atomic batch

use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    Batch, CallContext, ExecutionReport, Module, StepOutcome, StepReport, SweptResidual,
};
use crate::domain::ledger::{Ledger, LedgerEvent};
use crate::shared::errors::{ModuleError, RouterError};

/// Clears the in-flight flag when the outermost call returns
struct EntryGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> EntryGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Stateless dispatcher. The module table is fixed at construction.
pub struct Router {
    address: Pubkey,
    modules: HashMap<Pubkey, Arc<dyn Module>>,
    sweep_recipient: Option<Pubkey>,
    entered: AtomicBool,
}

impl Router {
    pub fn new(
        address: Pubkey,
        modules: Vec<Arc<dyn Module>>,
        sweep_recipient: Option<Pubkey>,
    ) -> Self {
        let modules = modules
            .into_iter()
            .map(|module| (module.address(), module))
            .collect();
        Self {
            address,
            modules,
            sweep_recipient,
            entered: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn module(&self, id: &Pubkey) -> Option<&Arc<dyn Module>> {
        self.modules.get(id)
    }

    pub fn module_ids(&self) -> Vec<Pubkey> {
        let mut ids: Vec<_> = self.modules.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Run `batch` on behalf of `caller`, who attaches `attached_value` native units.
    ///
    /// Either every step marked `revert_if_incomplete` succeeds and all effects
    /// commit together, or the ledger is left exactly as it was. Best-effort
    /// steps that fail are discarded individually and their value refunded.
    pub fn execute(
        &self,
        ledger: &mut Ledger,
        caller: Pubkey,
        batch: &Batch,
        attached_value: u64,
    ) -> Result<ExecutionReport, RouterError> {
        let _guard = EntryGuard::enter(&self.entered).ok_or(RouterError::Reentrancy)?;

        let expected = batch.total_value();
        if u128::from(attached_value) != expected {
            return Err(RouterError::ValueMismatch { attached: attached_value, expected });
        }
        let unknown = batch.steps.iter().find(|step| !self.modules.contains_key(&step.module));
        if let Some(step) = unknown {
            return Err(RouterError::UnknownModule(step.module));
        }

        let execution_id = Uuid::new_v4();
        info!(%execution_id, %caller, steps = batch.len(), attached_value, "Executing batch");

        let events_before = ledger.events().len();
        let result = ledger.atomically(|ledger| self.run(ledger, caller, batch, attached_value));

        match result {
            Ok((steps, swept)) => {
                let fills = ledger.events()[events_before..]
                    .iter()
                    .filter_map(|event| match event {
                        LedgerEvent::FillCompleted(fill) => Some(fill.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                info!(%execution_id, fills = fills.len(), swept = swept.len(), "Batch committed");
                Ok(ExecutionReport {
                    execution_id,
                    caller,
                    attached_value,
                    steps,
                    fills,
                    swept,
                })
            }
            Err(err) => {
                warn!(%execution_id, error = %err, "Batch reverted");
                Err(err)
            }
        }
    }

    fn run(
        &self,
        ledger: &mut Ledger,
        caller: Pubkey,
        batch: &Batch,
        attached_value: u64,
    ) -> Result<(Vec<StepReport>, Vec<SweptResidual>), RouterError> {
        ledger.transfer_native(caller, self.address, attached_value)?;

        let mut touched: Vec<Pubkey> = Vec::new();
        let mut reports = Vec::with_capacity(batch.len());

        for (index, step) in batch.steps.iter().enumerate() {
            let module = self
                .modules
                .get(&step.module)
                .ok_or(RouterError::UnknownModule(step.module))?;
            let policy = module.policy(&step.payload);
            if !touched.contains(&step.module) {
                touched.push(step.module);
            }

            debug!(
                index,
                module = module.name(),
                value = step.value,
                selector = %hex::encode(&step.payload[..step.payload.len().min(4)]),
                "Dispatching step"
            );

            let dispatched = ledger.atomically(|ledger| -> Result<(), ModuleError> {
                ledger.transfer_native(self.address, step.module, step.value)?;
                let mut ctx = CallContext {
                    ledger,
                    origin: caller,
                    value: step.value,
                    step: index,
                };
                module.call(&mut ctx, &step.payload)
            });

            let outcome = match dispatched {
                Ok(()) => StepOutcome::Executed,
                Err(source) if policy.revert_if_incomplete => {
                    warn!(index, module = module.name(), error = %source, "Atomic step failed");
                    return Err(RouterError::UnsuccessfulExecution {
                        index,
                        module: step.module,
                        source,
                    });
                }
                Err(source) => {
                    let refund_to = policy.refund_to.unwrap_or(caller);
                    ledger.transfer_native(self.address, refund_to, step.value)?;
                    warn!(
                        index,
                        module = module.name(),
                        error = %source,
                        refunded = step.value,
                        %refund_to,
                        "Best-effort step failed, continuing"
                    );
                    StepOutcome::Skipped {
                        reason: source.to_string(),
                        refunded: step.value,
                        refund_to,
                    }
                }
            };
            reports.push(StepReport { index, module: step.module, outcome });
        }

        let swept = self.sweep_residuals(ledger, caller, &touched)?;
        Ok((reports, swept))
    }

    /// Last-resort check that nothing stays behind in the router or in the
    /// modules the batch touched. Correct modules never trigger it.
    fn sweep_residuals(
        &self,
        ledger: &mut Ledger,
        caller: Pubkey,
        touched: &[Pubkey],
    ) -> Result<Vec<SweptResidual>, RouterError> {
        let recipient = self.sweep_recipient.unwrap_or(caller);
        let mut swept = Vec::new();

        for holder in std::iter::once(&self.address).chain(touched.iter()) {
            if *holder == recipient {
                continue;
            }
            for holding in ledger.holdings(holder) {
                ledger.transfer(*holder, recipient, &holding)?;
                warn!(%holder, %recipient, %holding, "Residual balance swept");
                ledger.emit(LedgerEvent::ResidualSwept { from: *holder, to: recipient, holding });
                swept.push(SweptResidual { from: *holder, to: recipient, holding });
            }
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::Asset;
    use crate::domain::execution::{ExecutionStep, StepPolicy};
    use std::sync::{OnceLock, Weak};

    /// Keeps `keep` of whatever value it receives and optionally fails
    struct Sink {
        address: Pubkey,
        keep: u64,
        fail: bool,
        policy: StepPolicy,
    }

    impl Module for Sink {
        fn address(&self) -> Pubkey {
            self.address
        }

        fn name(&self) -> &str {
            "sink"
        }

        fn policy(&self, _payload: &[u8]) -> StepPolicy {
            self.policy
        }

        fn call(&self, ctx: &mut CallContext<'_>, _payload: &[u8]) -> Result<(), ModuleError> {
            if self.fail {
                return Err(ModuleError::TransferRejected("sink failure".to_string()));
            }
            let refund = ctx.value.saturating_sub(self.keep);
            ctx.ledger.transfer_native(self.address, ctx.origin, refund)?;
            Ok(())
        }
    }

    /// Calls back into the router from inside a step
    struct Reenter {
        address: Pubkey,
        router: OnceLock<Weak<Router>>,
        observed: OnceLock<RouterError>,
    }

    impl Module for Reenter {
        fn address(&self) -> Pubkey {
            self.address
        }

        fn name(&self) -> &str {
            "reenter"
        }

        fn policy(&self, _payload: &[u8]) -> StepPolicy {
            StepPolicy::fatal()
        }

        fn call(&self, ctx: &mut CallContext<'_>, _payload: &[u8]) -> Result<(), ModuleError> {
            let router = self.router.get().and_then(Weak::upgrade).expect("router wired");
            let err = router
                .execute(ctx.ledger, ctx.origin, &Batch::default(), 0)
                .expect_err("nested call must fail");
            let _ = self.observed.set(err);
            Ok(())
        }
    }

    fn sink(keep: u64, fail: bool, policy: StepPolicy) -> Arc<Sink> {
        Arc::new(Sink { address: Pubkey::new_unique(), keep, fail, policy })
    }

    fn step(module: Pubkey, value: u64) -> ExecutionStep {
        ExecutionStep { module, payload: vec![], value }
    }

    #[test]
    fn test_value_mismatch_rejected_before_any_step() {
        let module = sink(0, false, StepPolicy::fatal());
        let router = Router::new(Pubkey::new_unique(), vec![module.clone()], None);
        let mut ledger = Ledger::new(Pubkey::new_unique());
        let caller = Pubkey::new_unique();
        ledger.mint_native(caller, 100).unwrap();

        let batch = Batch::new(vec![step(module.address, 10), step(module.address, 5)]);
        let err = router.execute(&mut ledger, caller, &batch, 14).unwrap_err();

        assert_eq!(err, RouterError::ValueMismatch { attached: 14, expected: 15 });
        assert_eq!(ledger.native_balance(&caller), 100);
    }

    #[test]
    fn test_unknown_module_is_fatal() {
        let router = Router::new(Pubkey::new_unique(), vec![], None);
        let mut ledger = Ledger::new(Pubkey::new_unique());
        let stranger = Pubkey::new_unique();

        let err = router
            .execute(&mut ledger, Pubkey::new_unique(), &Batch::new(vec![step(stranger, 0)]), 0)
            .unwrap_err();
        assert_eq!(err, RouterError::UnknownModule(stranger));
    }

    #[test]
    fn test_atomic_failure_reverts_earlier_steps() {
        let good = sink(3, false, StepPolicy::fatal());
        let bad = sink(0, true, StepPolicy::fatal());
        let router = Router::new(Pubkey::new_unique(), vec![good.clone(), bad.clone()], None);
        let mut ledger = Ledger::new(Pubkey::new_unique());
        let caller = Pubkey::new_unique();
        ledger.mint_native(caller, 20).unwrap();

        let batch = Batch::new(vec![step(good.address, 10), step(bad.address, 0)]);
        let err = router.execute(&mut ledger, caller, &batch, 10).unwrap_err();

        assert!(matches!(err, RouterError::UnsuccessfulExecution { index: 1, .. }));
        assert_eq!(ledger.native_balance(&caller), 20);
        assert_eq!(ledger.native_balance(&good.address), 0);
        assert_eq!(ledger.native_balance(&router.address()), 0);
    }

    #[test]
    fn test_best_effort_failure_refunds_and_continues() {
        let refund_to = Pubkey::new_unique();
        let bad = sink(0, true, StepPolicy::best_effort(refund_to));
        let good = sink(0, false, StepPolicy::fatal());
        let router = Router::new(Pubkey::new_unique(), vec![bad.clone(), good.clone()], None);
        let mut ledger = Ledger::new(Pubkey::new_unique());
        let caller = Pubkey::new_unique();
        ledger.mint_native(caller, 20).unwrap();

        let batch = Batch::new(vec![step(bad.address, 7), step(good.address, 3)]);
        let report = router.execute(&mut ledger, caller, &batch, 10).unwrap();

        assert_eq!(report.executed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(ledger.native_balance(&refund_to), 7);
        assert_eq!(ledger.native_balance(&caller), 13);
        assert!(report.swept.is_empty());
    }

    #[test]
    fn test_residual_is_swept_to_fallback() {
        let leaky = sink(4, false, StepPolicy::fatal());
        let fallback = Pubkey::new_unique();
        let router = Router::new(Pubkey::new_unique(), vec![leaky.clone()], Some(fallback));
        let mut ledger = Ledger::new(Pubkey::new_unique());
        let caller = Pubkey::new_unique();
        ledger.mint_native(caller, 10).unwrap();

        let report = router
            .execute(&mut ledger, caller, &Batch::new(vec![step(leaky.address, 10)]), 10)
            .unwrap();

        assert_eq!(report.swept.len(), 1);
        assert_eq!(report.swept[0].from, leaky.address);
        assert_eq!(report.swept[0].holding.asset, Asset::Native);
        assert_eq!(ledger.native_balance(&fallback), 4);
        assert_eq!(ledger.native_balance(&leaky.address), 0);
        assert!(ledger
            .events()
            .iter()
            .any(|event| matches!(event, LedgerEvent::ResidualSwept { .. })));
    }

    #[test]
    fn test_nested_execute_is_rejected() {
        let reenter = Arc::new(Reenter {
            address: Pubkey::new_unique(),
            router: OnceLock::new(),
            observed: OnceLock::new(),
        });
        let router = Arc::new(Router::new(Pubkey::new_unique(), vec![reenter.clone()], None));
        let _ = reenter.router.set(Arc::downgrade(&router));
        let mut ledger = Ledger::new(Pubkey::new_unique());

        let batch = Batch::new(vec![step(reenter.address, 0)]);
        router.execute(&mut ledger, Pubkey::new_unique(), &batch, 0).unwrap();

        assert_eq!(reenter.observed.get(), Some(&RouterError::Reentrancy));
        // the flag is cleared once the outer call returns
        assert!(router.execute(&mut ledger, Pubkey::new_unique(), &Batch::default(), 0).is_ok());
    }
}
