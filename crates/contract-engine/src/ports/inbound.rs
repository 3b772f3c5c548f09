//! # Driving Ports (API - Inbound)
//!
//! Interface the transaction-processing layer uses to deploy and call
//! contracts. It decides deployment vs. call from the transaction's `to`
//! field and hands over only calldata, sender, value and gas parameters.

use crate::compiler::{AbiEntry, CompileReport};
use crate::domain::entities::{BlockContext, ExecutionResult};
use crate::domain::value_objects::{Address, Bytes, Word, U256};
use crate::errors::ServiceError;
use async_trait::async_trait;

// =============================================================================
// REQUESTS
// =============================================================================

/// Deploy a contract from source.
#[derive(Clone, Debug)]
pub struct DeployRequest {
    /// Deploying account; also the constructor's `msg.sender`.
    pub sender: Address,
    /// Contract source text.
    pub source: String,
    /// Constructor arguments, one word each.
    pub constructor_args: Vec<Word>,
    /// Value attached to the deployment.
    pub value: U256,
    /// Gas budget for the constructor run.
    pub gas_limit: u64,
    /// Gas price of the transaction.
    pub gas_price: U256,
}

impl DeployRequest {
    /// Deployment with no value, zero gas price and the given budget.
    #[must_use]
    pub fn new(sender: Address, source: impl Into<String>, gas_limit: u64) -> Self {
        Self {
            sender,
            source: source.into(),
            constructor_args: Vec::new(),
            value: U256::zero(),
            gas_limit,
            gas_price: U256::zero(),
        }
    }

    /// Sets the constructor arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<Word>) -> Self {
        self.constructor_args = args;
        self
    }

    /// Sets the attached value.
    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Call a deployed contract.
#[derive(Clone, Debug)]
pub struct CallRequest {
    /// Calling account.
    pub sender: Address,
    /// Contract address.
    pub to: Address,
    /// Selector followed by word-encoded arguments.
    pub calldata: Bytes,
    /// Value attached to the call.
    pub value: U256,
    /// Gas budget.
    pub gas_limit: u64,
    /// Gas price of the transaction.
    pub gas_price: U256,
}

impl CallRequest {
    /// Call with no value and zero gas price.
    #[must_use]
    pub fn new(sender: Address, to: Address, calldata: Bytes, gas_limit: u64) -> Self {
        Self {
            sender,
            to,
            calldata,
            value: U256::zero(),
            gas_limit,
            gas_price: U256::zero(),
        }
    }

    /// Sets the attached value.
    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

// =============================================================================
// RECEIPTS
// =============================================================================

/// Outcome of a deployment.
#[derive(Clone, Debug)]
pub struct DeployReceipt {
    /// Address the contract was installed at; `None` if the constructor failed.
    pub contract_address: Option<Address>,
    /// Interface of the compiled contract.
    pub abi: Vec<AbiEntry>,
    /// Constructor execution result.
    pub result: ExecutionResult,
}

/// Outcome of a call.
#[derive(Clone, Debug)]
pub struct CallReceipt {
    /// Called contract.
    pub contract: Address,
    /// Execution result; its state changes are committed iff it succeeded.
    pub result: ExecutionResult,
}

// =============================================================================
// CONTRACT ENGINE API (Primary Driving Port)
// =============================================================================

/// Primary API for contract deployment and execution.
///
/// ## Usage
///
/// ```ignore
/// let receipt = api.deploy(DeployRequest::new(sender, source, 1_000_000), &block).await?;
/// let call = api.call(CallRequest::new(sender, addr, calldata, 100_000), &block).await?;
/// ```
#[async_trait]
pub trait ContractEngineApi: Send + Sync {
    /// Compiles and deploys a contract, then commits its constructor writes.
    ///
    /// A failed constructor is not an error: it is reported in the receipt
    /// with no contract installed.
    ///
    /// # Errors
    ///
    /// `Compile` for invalid source, `GasLimitTooHigh`, `CodeTooLarge`, or
    /// `ContractAlreadyExists` at the derived address.
    async fn deploy(
        &self,
        request: DeployRequest,
        block: &BlockContext,
    ) -> Result<DeployReceipt, ServiceError>;

    /// Executes a call and commits its writes if it succeeds.
    ///
    /// # Errors
    ///
    /// `UnknownContract` or `GasLimitTooHigh`. Execution failures are
    /// reported in the receipt.
    async fn call(
        &self,
        request: CallRequest,
        block: &BlockContext,
    ) -> Result<CallReceipt, ServiceError>;

    /// Executes a call without committing anything (gas estimation, reads).
    ///
    /// # Errors
    ///
    /// Same as [`ContractEngineApi::call`].
    async fn simulate(
        &self,
        request: CallRequest,
        block: &BlockContext,
    ) -> Result<ExecutionResult, ServiceError>;

    /// Compiles source without deploying it.
    fn compile(&self, source: &str) -> CompileReport;
}

// =============================================================================
// TESTS
// =============================================================================
