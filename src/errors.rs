//! # Failure conditions
//!
//! Pure accounting code reports failures as `CdpError`. The blueprints turn them into a
//! `Failure` (condition plus the operation it happened in) and raise it as the panic message,
//! which rolls back the whole transaction.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdpError {
    #[error("USELESS_TX")]
    UselessTx,
    #[error("UNDERCOLLATERALIZED")]
    Undercollateralized,
    #[error("INCORRECT_COLLATERALIZATION")]
    IncorrectCollateralization,
    #[error("WRONG_ORACLE_TYPE")]
    WrongOracleType,
    #[error("POSITION_DOES_NOT_EXIST")]
    PositionDoesNotExist,
    #[error("SPAWNED_POSITION")]
    SpawnedPosition,
    #[error("ALREADY_LIQUIDATING")]
    AlreadyLiquidating,
    #[error("TRANSFER_FAILURE")]
    TransferFailure,
    #[error("SAFE_POSITION")]
    SafePosition,
    #[error("NOT_TRIGGERED")]
    NotTriggered,
    #[error("ASSET_DEBT_LIMIT")]
    AssetDebtLimit,
    #[error("REPAYMENT_EXCEEDS_DEBT")]
    RepaymentExceedsDebt,
    #[error("WITHDRAWAL_EXCEEDS_COLLATERAL")]
    WithdrawalExceedsCollateral,
    #[error("ORACLE_PRICE_UNAVAILABLE")]
    OraclePriceUnavailable,
    #[error("NO_LEFTOVERS")]
    NoLeftovers,
    #[error("INVALID_PARAMETERS")]
    InvalidParameters,
}

impl CdpError {
    pub fn during(self, operation: Operation) -> Failure {
        Failure {
            error: self,
            operation,
        }
    }
}

/// Public operation a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Spawn,
    Join,
    Exit,
    RepayAll,
    Trigger,
    Buyout,
    RetrieveLeftovers,
    SetCollateral,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Spawn => "spawn",
            Operation::Join => "join",
            Operation::Exit => "exit",
            Operation::RepayAll => "repay_all_and_withdraw",
            Operation::Trigger => "trigger_liquidation",
            Operation::Buyout => "buyout",
            Operation::RetrieveLeftovers => "retrieve_leftover_collateral",
            Operation::SetCollateral => "set_collateral",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{error} during {operation}")]
pub struct Failure {
    pub error: CdpError,
    pub operation: Operation,
}

/// Aborts the running transaction with the failure as its message.
pub fn abort(failure: Failure) -> ! {
    panic!("{}", failure)
}

pub trait OrAbort<T> {
    fn or_abort(self, operation: Operation) -> T;
}

impl<T> OrAbort<T> for Result<T, CdpError> {
    fn or_abort(self, operation: Operation) -> T {
        self.unwrap_or_else(|error| abort(error.during(operation)))
    }
}

/// Aborts with `error` unless `condition` holds.
pub fn ensure(condition: bool, error: CdpError, operation: Operation) {
    if !condition {
        abort(error.during(operation));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_carries_code_and_operation() {
        let failure = CdpError::UselessTx.during(Operation::Spawn);
        assert_eq!(failure.to_string(), "USELESS_TX during spawn");
    }

    #[test]
    fn ok_results_pass_through() {
        let result: Result<u8, CdpError> = Ok(7);
        assert_eq!(result.or_abort(Operation::Join), 7);
    }

    #[test]
    #[should_panic(expected = "SAFE_POSITION during trigger_liquidation")]
    fn errors_abort_with_context() {
        let result: Result<u8, CdpError> = Err(CdpError::SafePosition);
        result.or_abort(Operation::Trigger);
    }
}
