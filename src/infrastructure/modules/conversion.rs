//! Conversion module - moves value between native and wrapped-native form

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::domain::execution::{decode_payload, CallContext, Module, StepPolicy};
use crate::domain::ledger::Ledger;
use crate::shared::errors::{LedgerError, ModuleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionEntry {
    pub recipient: Pubkey,
    pub amount: u64,
    /// Unwrap before forwarding; otherwise forward the wrapped token as is
    pub to_native: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapEntry {
    pub recipient: Pubkey,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionCall {
    /// Distribute the wrapped balance routed here by an earlier step
    Convert(Vec<ConversionEntry>),
    /// Wrap the step's attached value for the recipients
    Wrap(Vec<WrapEntry>),
}

/// Ends every call holding nothing
pub struct ConversionModule {
    address: Pubkey,
}

impl ConversionModule {
    pub fn new(address: Pubkey) -> Self {
        Self { address }
    }

    fn convert(
        &self,
        ledger: &mut Ledger,
        value: u64,
        entries: &[ConversionEntry],
    ) -> Result<(), ModuleError> {
        if value > 0 {
            return Err(ModuleError::UnexpectedValue(value));
        }
        let wrapped = ledger.wrapped_token();
        let required = sum(entries.iter().map(|entry| entry.amount))?;
        let held = ledger.fungible_balance(&wrapped, &self.address);
        if held < required {
            return Err(ModuleError::InsufficientBalance { required, available: held });
        }
        if held > required {
            return Err(ModuleError::UnaccountedBalance { leftover: held - required });
        }

        for entry in entries {
            if entry.to_native {
                ledger.unwrap(self.address, entry.amount)?;
                ledger.transfer_native(self.address, entry.recipient, entry.amount)?;
            } else {
                ledger.transfer_fungible(wrapped, self.address, entry.recipient, entry.amount)?;
            }
            debug!(
                recipient = %entry.recipient,
                amount = entry.amount,
                to_native = entry.to_native,
                "Converted"
            );
        }
        Ok(())
    }

    fn wrap(
        &self,
        ledger: &mut Ledger,
        value: u64,
        entries: &[WrapEntry],
    ) -> Result<(), ModuleError> {
        let wrapped = ledger.wrapped_token();
        let required = sum(entries.iter().map(|entry| entry.amount))?;
        if value < required {
            return Err(ModuleError::InsufficientBalance { required, available: value });
        }
        if value > required {
            return Err(ModuleError::UnaccountedBalance { leftover: value - required });
        }

        for entry in entries {
            ledger.wrap(self.address, entry.amount)?;
            ledger.transfer_fungible(wrapped, self.address, entry.recipient, entry.amount)?;
            debug!(recipient = %entry.recipient, amount = entry.amount, "Wrapped");
        }
        Ok(())
    }
}

fn sum(mut amounts: impl Iterator<Item = u64>) -> Result<u64, LedgerError> {
    amounts.try_fold(0u64, |acc, amount| acc.checked_add(amount).ok_or(LedgerError::Overflow))
}

impl Module for ConversionModule {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn name(&self) -> &str {
        "conversion"
    }

    /// Conversion failures always abort the batch
    fn policy(&self, _payload: &[u8]) -> StepPolicy {
        StepPolicy::fatal()
    }

    fn call(&self, ctx: &mut CallContext<'_>, payload: &[u8]) -> Result<(), ModuleError> {
        match decode_payload::<ConversionCall>(payload)? {
            ConversionCall::Convert(entries) => self.convert(ctx.ledger, ctx.value, &entries),
            ConversionCall::Wrap(entries) => self.wrap(ctx.ledger, ctx.value, &entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::encode_payload;

    fn run(
        ledger: &mut Ledger,
        module: &ConversionModule,
        call: &ConversionCall,
        value: u64,
    ) -> Result<(), ModuleError> {
        let payload = encode_payload(call).unwrap();
        let mut ctx = CallContext { ledger, origin: Pubkey::new_unique(), value, step: 0 };
        module.call(&mut ctx, &payload)
    }

    /// Ledger where the module already holds `held` wrapped units
    fn funded(held: u64) -> (Ledger, ConversionModule) {
        let mut ledger = Ledger::new(Pubkey::new_unique());
        let module = ConversionModule::new(Pubkey::new_unique());
        ledger.mint_native(module.address(), held).unwrap();
        ledger.wrap(module.address(), held).unwrap();
        (ledger, module)
    }

    #[test]
    fn test_convert_splits_native_and_wrapped() {
        let (mut ledger, module) = funded(300);
        let wrapped = ledger.wrapped_token();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let call = ConversionCall::Convert(vec![
            ConversionEntry { recipient: alice, amount: 200, to_native: true },
            ConversionEntry { recipient: bob, amount: 100, to_native: false },
        ]);

        run(&mut ledger, &module, &call, 0).unwrap();

        assert_eq!(ledger.native_balance(&alice), 200);
        assert_eq!(ledger.fungible_balance(&wrapped, &alice), 0);
        assert_eq!(ledger.fungible_balance(&wrapped, &bob), 100);
        assert!(ledger.holdings(&module.address()).is_empty());
    }

    #[test]
    fn test_convert_requires_exact_balance() {
        let (mut ledger, module) = funded(100);
        let recipient = Pubkey::new_unique();
        let entry = |amount| ConversionEntry { recipient, amount, to_native: true };

        assert_eq!(
            run(&mut ledger, &module, &ConversionCall::Convert(vec![entry(150)]), 0),
            Err(ModuleError::InsufficientBalance { required: 150, available: 100 })
        );
        assert_eq!(
            run(&mut ledger, &module, &ConversionCall::Convert(vec![entry(60)]), 0),
            Err(ModuleError::UnaccountedBalance { leftover: 40 })
        );
    }

    #[test]
    fn test_wrap_consumes_attached_value() {
        let mut ledger = Ledger::new(Pubkey::new_unique());
        let wrapped = ledger.wrapped_token();
        let module = ConversionModule::new(Pubkey::new_unique());
        let recipient = Pubkey::new_unique();
        ledger.mint_native(module.address(), 80).unwrap();

        let call = ConversionCall::Wrap(vec![WrapEntry { recipient, amount: 80 }]);
        run(&mut ledger, &module, &call, 80).unwrap();

        assert_eq!(ledger.fungible_balance(&wrapped, &recipient), 80);
        assert_eq!(ledger.native_balance(&wrapped), 80);
        assert!(ledger.holdings(&module.address()).is_empty());
    }

    #[test]
    fn test_entry_total_overflow() {
        let (mut ledger, module) = funded(10);
        let recipient = Pubkey::new_unique();
        let call = ConversionCall::Wrap(vec![
            WrapEntry { recipient, amount: u64::MAX },
            WrapEntry { recipient, amount: 1 },
        ]);
        assert_eq!(
            run(&mut ledger, &module, &call, 10),
            Err(ModuleError::Ledger(LedgerError::Overflow))
        );
    }

    #[test]
    fn test_policy_is_always_fatal() {
        let module = ConversionModule::new(Pubkey::new_unique());
        assert_eq!(module.policy(&[]), StepPolicy::fatal());
    }
}
