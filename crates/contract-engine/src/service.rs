//! # Contract Service
//!
//! Async façade over the compiler, the interpreter and a `ContractStore`.
//!
//! - Deployment: compile, run the deployment code with the constructor
//!   arguments as calldata against empty storage, install the returned
//!   runtime code at `keccak(rlp([sender, nonce]))[12..]`, commit the diff.
//! - Call: run the installed code against a snapshot of the target's
//!   committed storage and commit the diff only if the call succeeded.
//! - Simulation: a call whose diff is discarded.
//!
//! Interpreter runs are synchronous and bounded by gas; the service never
//! holds a lock across an `.await`.

use crate::compiler::{self, CompileReport};
use crate::config::ServiceConfig;
use crate::domain::entities::{BlockContext, ExecutionContext, ExecutionResult};
use crate::domain::invariants::{check_all_invariants, InvariantCheckResult};
use crate::domain::services::{compute_contract_address, encode_words, keccak256};
use crate::errors::ServiceError;
use crate::evm::execute_with_config;
use crate::metrics;
use crate::ports::inbound::{
    CallReceipt, CallRequest, ContractEngineApi, DeployReceipt, DeployRequest,
};
use crate::ports::outbound::{ContractStore, DeployedContract, EmptyStorage, StorageView};

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Counters kept by the contract service.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceStats {
    /// Deployments and calls executed (simulations excluded).
    pub transactions_executed: u64,
    /// Executions that halted successfully.
    pub successful_executions: u64,
    /// Executions that reverted or faulted.
    pub failed_executions: u64,
    /// Simulated calls.
    pub simulations: u64,
    /// Contracts installed.
    pub deployments: u64,
    /// Sources rejected by the compiler.
    pub compile_failures: u64,
    /// Requests refused before execution.
    pub rejected_requests: u64,
    /// Gas consumed by executed transactions.
    pub total_gas_used: u64,
    /// Average wall-clock time of an execution in microseconds.
    pub avg_execution_time_us: u64,
}

/// The contract engine service.
pub struct ContractService<L: ContractStore> {
    /// Service configuration.
    config: ServiceConfig,
    /// Ledger holding code and committed storage.
    ledger: Arc<L>,
    /// Service statistics.
    stats: RwLock<ServiceStats>,
}

impl<L: ContractStore> ContractService<L> {
    /// Creates a service that owns its ledger.
    pub fn new(ledger: L, config: ServiceConfig) -> Self {
        Self::with_shared_ledger(Arc::new(ledger), config)
    }

    /// Creates a service over a ledger shared with other components.
    pub fn with_shared_ledger(ledger: Arc<L>, config: ServiceConfig) -> Self {
        Self {
            config,
            ledger,
            stats: RwLock::new(ServiceStats::default()),
        }
    }

    /// The ledger this service commits to.
    #[must_use]
    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Current service statistics.
    #[must_use]
    pub fn stats(&self) -> ServiceStats {
        self.stats.read().clone()
    }

    /// Compiles and deploys a contract.
    ///
    /// # Errors
    ///
    /// See [`ContractEngineApi::deploy`].
    #[instrument(skip(self, request, block), fields(sender = %request.sender))]
    pub async fn deploy_contract(
        &self,
        request: DeployRequest,
        block: &BlockContext,
    ) -> Result<DeployReceipt, ServiceError> {
        let gas_limit = self.gas_limit(request.gas_limit)?;
        let compiled = self.compile_source(&request.source)?;

        let runtime_size = compiled.runtime_bytecode.len();
        if runtime_size > self.config.vm.max_code_size {
            return Err(self.reject(ServiceError::CodeTooLarge {
                size: runtime_size,
                max: self.config.vm.max_code_size,
            }));
        }

        let nonce = self.ledger.next_nonce(request.sender).await;
        let address = compute_contract_address(request.sender, nonce);
        if self.ledger.contract(address).await.is_some() {
            return Err(self.reject(ServiceError::ContractAlreadyExists(address)));
        }

        info!(
            contract = %compiled.name,
            address = %address,
            nonce,
            gas_limit,
            "Deploying contract"
        );

        let context = ExecutionContext::new_transaction(
            request.sender,
            address,
            request.value,
            encode_words(&request.constructor_args),
            request.gas_price,
            block.clone(),
        );
        let result = self.run(compiled.bytecode.as_slice(), &context, gas_limit, &EmptyStorage);
        self.record(&result, false);

        if !result.success {
            return Ok(DeployReceipt {
                contract_address: None,
                abi: compiled.abi,
                result,
            });
        }

        let code = result.return_data.clone();
        self.ledger
            .install(
                address,
                DeployedContract {
                    code_hash: keccak256(code.as_slice()),
                    code,
                    abi: compiled.abi.clone(),
                },
            )
            .await?;
        self.ledger.commit(address, &result.state_changes).await;

        self.stats.write().deployments += 1;
        metrics::record_deployment();
        info!(address = %address, gas_used = result.gas_used, "Contract deployed");

        Ok(DeployReceipt {
            contract_address: Some(address),
            abi: compiled.abi,
            result,
        })
    }

    /// Executes a call and commits its diff on success.
    ///
    /// # Errors
    ///
    /// See [`ContractEngineApi::call`].
    #[instrument(skip(self, request, block), fields(sender = %request.sender, to = %request.to))]
    pub async fn call_contract(
        &self,
        request: CallRequest,
        block: &BlockContext,
    ) -> Result<CallReceipt, ServiceError> {
        let result = self.execute_call(&request, block, false).await?;
        if result.success {
            self.ledger.commit(request.to, &result.state_changes).await;
            debug!(writes = result.state_changes.len(), "Call committed");
        }
        Ok(CallReceipt {
            contract: request.to,
            result,
        })
    }

    /// Executes a call and discards its diff.
    ///
    /// # Errors
    ///
    /// See [`ContractEngineApi::simulate`].
    #[instrument(skip(self, request, block), fields(sender = %request.sender, to = %request.to))]
    pub async fn simulate_call(
        &self,
        request: CallRequest,
        block: &BlockContext,
    ) -> Result<ExecutionResult, ServiceError> {
        self.execute_call(&request, block, true).await
    }

    async fn execute_call(
        &self,
        request: &CallRequest,
        block: &BlockContext,
        simulated: bool,
    ) -> Result<ExecutionResult, ServiceError> {
        let gas_limit = self.gas_limit(request.gas_limit)?;
        let Some(contract) = self.ledger.contract(request.to).await else {
            return Err(self.reject(ServiceError::UnknownContract(request.to)));
        };
        let committed = self.ledger.storage_snapshot(request.to).await;

        let context = ExecutionContext::new_transaction(
            request.sender,
            request.to,
            request.value,
            request.calldata.clone(),
            request.gas_price,
            block.clone(),
        );
        let result = self.run(contract.code.as_slice(), &context, gas_limit, &committed);
        self.record(&result, simulated);
        Ok(result)
    }

    /// Runs one interpreter call and checks the result's invariants.
    fn run<S: StorageView + ?Sized>(
        &self,
        code: &[u8],
        context: &ExecutionContext,
        gas_limit: u64,
        storage: &S,
    ) -> ExecutionResult {
        let started = Instant::now();
        let result = execute_with_config(code, context, gas_limit, storage, &self.config.vm);
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        if let InvariantCheckResult::Invalid(violations) =
            check_all_invariants(context, &result, gas_limit, &self.config.vm)
        {
            for violation in &violations {
                error!(violation = %violation, "Execution invariant violated");
            }
        }

        if self.config.enable_tracing {
            debug!(
                success = result.success,
                halt = ?result.halt,
                gas_used = result.gas_used,
                writes = result.state_changes.len(),
                return_len = result.return_data.len(),
                elapsed_us,
                "Execution summary"
            );
        }

        let mut stats = self.stats.write();
        let samples = stats.transactions_executed + stats.simulations + 1;
        stats.avg_execution_time_us =
            (stats.avg_execution_time_us * (samples - 1) + elapsed_us) / samples;
        result
    }

    fn record(&self, result: &ExecutionResult, simulated: bool) {
        metrics::record_execution(result.error_kind().unwrap_or("Success"), result.gas_used);

        if !result.success {
            warn!(
                error = result.error_kind().unwrap_or_default(),
                gas_used = result.gas_used,
                "Execution failed"
            );
        }

        let mut stats = self.stats.write();
        if simulated {
            stats.simulations += 1;
            return;
        }
        stats.transactions_executed += 1;
        stats.total_gas_used += result.gas_used;
        if result.success {
            stats.successful_executions += 1;
        } else {
            stats.failed_executions += 1;
        }
    }

    /// Resolves the effective gas limit (zero means the configured default).
    fn gas_limit(&self, requested: u64) -> Result<u64, ServiceError> {
        let limit = if requested == 0 {
            self.config.default_gas_limit
        } else {
            requested
        };
        if limit > self.config.max_gas_limit {
            return Err(self.reject(ServiceError::GasLimitTooHigh {
                requested: limit,
                max: self.config.max_gas_limit,
            }));
        }
        Ok(limit)
    }

    fn compile_source(&self, source: &str) -> Result<compiler::CompiledContract, ServiceError> {
        compiler::compile(source).map_err(|err| {
            warn!(error = %err, "Source failed to compile");
            metrics::record_compile_failure(err.kind.as_str());
            self.stats.write().compile_failures += 1;
            ServiceError::from(err)
        })
    }

    fn reject(&self, err: ServiceError) -> ServiceError {
        warn!(error = %err, "Request rejected");
        metrics::record_rejected(err.kind());
        self.stats.write().rejected_requests += 1;
        err
    }
}

// =============================================================================
// ContractEngineApi Implementation
// =============================================================================

#[async_trait]
impl<L: ContractStore> ContractEngineApi for ContractService<L> {
    async fn deploy(
        &self,
        request: DeployRequest,
        block: &BlockContext,
    ) -> Result<DeployReceipt, ServiceError> {
        self.deploy_contract(request, block).await
    }

    async fn call(
        &self,
        request: CallRequest,
        block: &BlockContext,
    ) -> Result<CallReceipt, ServiceError> {
        self.call_contract(request, block).await
    }

    async fn simulate(
        &self,
        request: CallRequest,
        block: &BlockContext,
    ) -> Result<ExecutionResult, ServiceError> {
        self.simulate_call(request, block).await
    }

    fn compile(&self, source: &str) -> CompileReport {
        let result = compiler::compile(source);
        if let Err(err) = &result {
            debug!(error = %err, "Compile request failed");
            metrics::record_compile_failure(err.kind.as_str());
            self.stats.write().compile_failures += 1;
        }
        CompileReport::from(&result)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedger;
    use crate::domain::entities::HaltReason;
    use crate::domain::value_objects::{Address, Bytes, U256};
    use crate::errors::CompileErrorKind;
    use crate::evm::opcodes::Opcode;

    const COUNTER: &str = r"
        contract Counter {
            uint256 count;
            address owner;

            constructor(uint256 start) {
                count = start;
                owner = msg.sender;
            }

            function increment(uint256 by) public {
                require(by > 0);
                count += by;
            }

            function get() public view returns (uint256) {
                return count;
            }
        }
    ";

    fn alice() -> Address {
        Address::new([0xA1; 20])
    }

    fn create_test_service() -> ContractService<InMemoryLedger> {
        ContractService::new(InMemoryLedger::new(), ServiceConfig::default())
    }

    fn calldata(signature: &str, args: &[U256]) -> Bytes {
        crate::domain::services::encode_call(
            crate::compiler::Selector::from_signature(signature).bytes(),
            args,
        )
    }

    async fn deploy_counter(service: &ContractService<InMemoryLedger>, start: u64) -> Address {
        let receipt = service
            .deploy(
                DeployRequest::new(alice(), COUNTER, 1_000_000).with_args(vec![U256::from(start)]),
                &BlockContext::default(),
            )
            .await
            .unwrap();
        assert!(receipt.result.success, "{:?}", receipt.result.error);
        receipt.contract_address.unwrap()
    }

    #[tokio::test]
    async fn test_create_service() {
        let service = create_test_service();
        assert_eq!(service.stats(), ServiceStats::default());
    }

    #[tokio::test]
    async fn test_deploy_installs_and_commits_constructor_writes() {
        let service = create_test_service();
        let address = deploy_counter(&service, 7).await;

        assert_eq!(address, compute_contract_address(alice(), 0));
        let installed = service.ledger().contract(address).await.unwrap();
        assert_eq!(installed.abi.len(), 2);

        let storage = service.ledger().storage_snapshot(address).await;
        assert_eq!(storage.get(U256::zero()), U256::from(7));
        assert_eq!(storage.get(U256::one()), alice().to_word());

        let stats = service.stats();
        assert_eq!(stats.deployments, 1);
        assert_eq!(stats.transactions_executed, 1);
    }

    #[tokio::test]
    async fn test_second_deploy_gets_next_nonce_address() {
        let service = create_test_service();
        let first = deploy_counter(&service, 1).await;
        let second = deploy_counter(&service, 2).await;
        assert_ne!(first, second);
        assert_eq!(second, compute_contract_address(alice(), 1));
    }

    #[tokio::test]
    async fn test_call_commits_only_on_success() {
        let service = create_test_service();
        let address = deploy_counter(&service, 10).await;
        let block = BlockContext::default();

        let ok_data = calldata("increment(uint256)", &[U256::from(5)]);
        let receipt = service
            .call(CallRequest::new(alice(), address, ok_data, 100_000), &block)
            .await
            .unwrap();
        assert!(receipt.result.success);

        // require(by > 0) fails
        let bad_data = calldata("increment(uint256)", &[U256::zero()]);
        let receipt = service
            .call(CallRequest::new(alice(), address, bad_data, 100_000), &block)
            .await
            .unwrap();
        assert_eq!(receipt.result.halt, HaltReason::Reverted);

        let storage = service.ledger().storage_snapshot(address).await;
        assert_eq!(storage.get(U256::zero()), U256::from(15));

        let stats = service.stats();
        assert_eq!(stats.successful_executions, 2); // deploy + increment
        assert_eq!(stats.failed_executions, 1);
    }

    #[tokio::test]
    async fn test_simulate_does_not_commit() {
        let service = create_test_service();
        let address = deploy_counter(&service, 3).await;
        let data = calldata("increment(uint256)", &[U256::one()]);
        let result = service
            .simulate(
                CallRequest::new(alice(), address, data, 100_000),
                &BlockContext::default(),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.state_changes.get(&U256::zero()), Some(&U256::from(4)));
        let storage = service.ledger().storage_snapshot(address).await;
        assert_eq!(storage.get(U256::zero()), U256::from(3));
        assert_eq!(service.stats().simulations, 1);
    }

    #[tokio::test]
    async fn test_view_call_returns_value() {
        let service = create_test_service();
        let address = deploy_counter(&service, 42).await;
        let receipt = service
            .call(
                CallRequest::new(alice(), address, calldata("get()", &[]), 100_000),
                &BlockContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(receipt.result.return_word(), Some(U256::from(42)));
        assert!(receipt.result.state_changes.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_contract_rejected() {
        let service = create_test_service();
        let err = service
            .call(
                CallRequest::new(alice(), Address::new([9u8; 20]), Bytes::new(), 1_000),
                &BlockContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownContract(_)));
        assert_eq!(service.stats().rejected_requests, 1);
    }

    #[tokio::test]
    async fn test_gas_limit_above_cap_rejected() {
        let service = create_test_service();
        let limit = service.config().max_gas_limit + 1;
        let err = service
            .deploy(DeployRequest::new(alice(), COUNTER, limit), &BlockContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::GasLimitTooHigh { .. }));
        assert_eq!(service.ledger().contract_count(), 0);
    }

    #[tokio::test]
    async fn test_compile_error_surfaces() {
        let service = create_test_service();
        let err = service
            .deploy(
                DeployRequest::new(alice(), "contract Broken { uint256 x }", 1_000_000),
                &BlockContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Compile(ref e) if e.kind == CompileErrorKind::Syntax));
        assert_eq!(service.stats().compile_failures, 1);
    }

    #[tokio::test]
    async fn test_failed_constructor_installs_nothing() {
        let service = create_test_service();
        let receipt = service
            .deploy(DeployRequest::new(alice(), COUNTER, 100), &BlockContext::default())
            .await
            .unwrap();

        assert!(!receipt.result.success);
        assert_eq!(receipt.result.halt, HaltReason::OutOfGas);
        assert!(receipt.contract_address.is_none());
        assert_eq!(service.ledger().contract_count(), 0);
        assert!(service
            .ledger()
            .storage_snapshot(compute_contract_address(alice(), 0))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_zero_gas_limit_uses_default() {
        let service = create_test_service();
        let receipt = service
            .deploy(
                DeployRequest::new(alice(), COUNTER, 0).with_args(vec![U256::one()]),
                &BlockContext::default(),
            )
            .await
            .unwrap();
        assert!(receipt.result.success);
    }

    #[tokio::test]
    async fn test_code_too_large_rejected() {
        let mut config = ServiceConfig::default();
        config.vm.max_code_size = 8;
        let service = ContractService::new(InMemoryLedger::new(), config);

        let err = service
            .deploy(DeployRequest::new(alice(), COUNTER, 1_000_000), &BlockContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::CodeTooLarge { max: 8, .. }));
    }

    #[tokio::test]
    async fn test_compile_report_passthrough() {
        let service = create_test_service();
        let ok = service.compile(COUNTER);
        assert!(ok.success);
        assert!(ok.bytecode.starts_with(&format!("{:02x}", Opcode::CALLVALUE.0)));

        let bad = service.compile("contract C { mapping(uint => uint) m; }");
        assert!(!bad.success);
        assert!(bad.error.unwrap().starts_with("CompileUnsupportedFeature"));
    }
}
