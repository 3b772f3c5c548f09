//! # End-to-End Engine Tests
//!
//! Raw bytecode through the interpreter, source through the compiler, and
//! whole transactions through the service and the event handler.
//!
//! ## Test Categories
//!
//! 1. **Interpreter** - Arithmetic, storage staging, gas bound, faults
//! 2. **Compiler** - ABI shape, determinism, constructor initialization
//! 3. **Service** - Deploy, call, rollback of failed calls
//! 4. **Compiled control flow** - Loops, branches, comparisons, division, value
//! 5. **Event boundary** - JSON transactions routed on `to`

use contract_engine::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

// =============================================================================
// TEST HELPERS
// =============================================================================

const TOKEN: &str = r"
    // Minimal owner-mintable supply counter
    contract Token {
        uint256 supply;
        address owner;
        bool paused;

        constructor(uint256 initial) {
            supply = initial;
            owner = msg.sender;
        }

        function totalSupply() public view returns (uint256) {
            return supply;
        }

        function mint(uint256 amount) public {
            require(msg.sender == owner && !paused);
            supply += amount;
        }

        function pause() external {
            require(msg.sender == owner);
            paused = true;
        }
    }
";

const CALC: &str = r"
    contract Calc {
        uint256 total;
        uint256 deposits;

        function sumTo(uint256 n) public returns (uint256) {
            uint256 i = 1;
            uint256 acc = 0;
            while (i <= n) {
                acc += i;
                i++;
            }
            total = acc;
            return acc;
        }

        function larger(uint256 a, uint256 b) public pure returns (uint256) {
            if (a >= b) {
                return a;
            } else {
                return b;
            }
        }

        function le(uint256 a, uint256 b) public pure returns (bool) { return a <= b; }
        function ge(uint256 a, uint256 b) public pure returns (bool) { return a >= b; }
        function sub(uint256 a, uint256 b) public pure returns (uint256) { return a - b; }
        function div(uint256 a, uint256 b) public pure returns (uint256) { return a / b; }
        function rem(uint256 a, uint256 b) public pure returns (uint256) { return a % b; }

        function deposit() public payable {
            deposits += msg.value;
        }

        function deposited() public view returns (uint256) {
            return deposits;
        }
    }
";

fn owner() -> Address {
    Address::new([0xAA; 20])
}

fn stranger() -> Address {
    Address::new([0xBB; 20])
}

fn context(caller: Address, calldata: Bytes) -> ExecutionContext {
    ExecutionContext::new_transaction(
        caller,
        Address::new([0xCC; 20]),
        U256::zero(),
        calldata,
        U256::one(),
        BlockContext::default(),
    )
}

fn run(code: &[u8], gas_limit: u64) -> ExecutionResult {
    execute(code, &context(owner(), Bytes::new()), gas_limit, &EmptyStorage)
}

fn calldata(signature: &str, args: &[U256]) -> Bytes {
    encode_call(Selector::from_signature(signature).bytes(), args)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn service() -> ContractService<InMemoryLedger> {
    init_tracing();
    ContractService::new(InMemoryLedger::new(), ServiceConfig::default())
}

async fn deploy_token(service: &ContractService<InMemoryLedger>, initial: u64) -> Address {
    let receipt = service
        .deploy(
            DeployRequest::new(owner(), TOKEN, 1_000_000).with_args(vec![U256::from(initial)]),
            &BlockContext::default(),
        )
        .await
        .unwrap();
    assert!(receipt.result.success, "constructor failed: {:?}", receipt.result.error);
    receipt.contract_address.unwrap()
}

async fn supply(service: &ContractService<InMemoryLedger>, token: Address) -> U256 {
    let result = service
        .simulate(
            CallRequest::new(stranger(), token, calldata("totalSupply()", &[]), 100_000),
            &BlockContext::default(),
        )
        .await
        .unwrap();
    result.return_word().unwrap()
}

async fn deploy_calc(service: &ContractService<InMemoryLedger>) -> Address {
    let receipt = service
        .deploy(DeployRequest::new(owner(), CALC, 1_000_000), &BlockContext::default())
        .await
        .unwrap();
    assert!(receipt.result.success, "constructor failed: {:?}", receipt.result.error);
    receipt.contract_address.unwrap()
}

async fn call_with_value(
    service: &ContractService<InMemoryLedger>,
    contract: Address,
    signature: &str,
    args: &[u64],
    value: u64,
) -> ExecutionResult {
    let args: Vec<U256> = args.iter().copied().map(U256::from).collect();
    service
        .call(
            CallRequest::new(owner(), contract, calldata(signature, &args), 1_000_000)
                .with_value(U256::from(value)),
            &BlockContext::default(),
        )
        .await
        .unwrap()
        .result
}

async fn call_word(
    service: &ContractService<InMemoryLedger>,
    contract: Address,
    signature: &str,
    args: &[u64],
) -> U256 {
    let result = call_with_value(service, contract, signature, args, 0).await;
    assert!(result.success, "{signature} failed: {:?}", result.error);
    result.return_word().unwrap()
}

// =============================================================================
// INTERPRETER
// =============================================================================

#[test]
fn test_push_push_add_leaves_sum() {
    let code = [0x60, 0x05, 0x60, 0x03, 0x01];
    let ctx = context(owner(), Bytes::new());
    let mut interpreter = Interpreter::new(&code, &ctx, 100, &EmptyStorage);
    let result = interpreter.run();

    assert!(result.success);
    assert!(result.gas_used > 0);
    assert_eq!(interpreter.stack().peek_at(0).unwrap(), U256::from(8));
}

#[test]
fn test_dup_then_add_doubles() {
    let code = [0x60, 0x0a, 0x80, 0x01];
    let ctx = context(owner(), Bytes::new());
    let mut interpreter = Interpreter::new(&code, &ctx, 100, &EmptyStorage);

    assert!(interpreter.run().success);
    assert_eq!(interpreter.stack().as_slice(), &[U256::from(20)]);
}

#[test]
fn test_sstore_is_staged_on_success_only() {
    // PUSH1 42, PUSH0, SSTORE
    let store = [0x60, 0x2a, 0x5f, 0x55];
    let result = run(&store, 100_000);
    assert!(result.success);
    assert_eq!(result.state_changes.get(&U256::zero()), Some(&U256::from(42)));

    // Same write followed by INVALID
    let mut failing = store.to_vec();
    failing.push(0xfe);
    let result = run(&failing, 100_000);
    assert!(!result.success);
    assert!(result.state_changes.is_empty());
}

#[test]
fn test_insufficient_gas_halts_out_of_gas() {
    let result = run(&[0x60, 0x2a, 0x5f, 0x55], 10);

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some("OutOfGas"));
    assert!(result.gas_used <= 10);
    assert!(result.state_changes.is_empty());
}

#[test]
fn test_undefined_opcode_fails_regardless_of_gas() {
    for gas in [1, 1_000, 10_000_000] {
        let result = run(&[0xff], gas);
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some("InvalidOpcode"));
    }
}

#[test]
fn test_caller_is_returned_verbatim() {
    // CALLER, PUSH0, MSTORE, PUSH1 32, PUSH0, RETURN
    let code = [0x33, 0x5f, 0x52, 0x60, 0x20, 0x5f, 0xf3];
    let result = execute(&code, &context(stranger(), Bytes::new()), 1_000, &EmptyStorage);

    assert!(result.success);
    assert_eq!(result.return_word(), Some(stranger().to_word()));
}

#[test]
fn test_committed_storage_visible_through_view() {
    // PUSH0, SLOAD, PUSH0, MSTORE, PUSH1 32, PUSH0, RETURN
    let code = [0x5f, 0x54, 0x5f, 0x52, 0x60, 0x20, 0x5f, 0xf3];
    let committed: AccountStorage = [(U256::zero(), U256::from(99))].into_iter().collect();

    let result = execute(&code, &context(owner(), Bytes::new()), 1_000, &committed);
    assert_eq!(result.return_word(), Some(U256::from(99)));
}

// =============================================================================
// COMPILER
// =============================================================================

#[test]
fn test_abi_has_one_entry_per_public_function() {
    let compiled = compile(TOKEN).unwrap();
    assert_eq!(compiled.abi.len(), 3);

    let names: Vec<_> = compiled.abi.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["totalSupply", "mint", "pause"]);
}

#[test]
fn test_recompiling_is_byte_identical() {
    let first = compile(TOKEN).unwrap();
    let second = compile(TOKEN).unwrap();
    assert_eq!(first.bytecode, second.bytecode);
    assert_eq!(first.runtime_bytecode, second.runtime_bytecode);
    assert_eq!(first.abi, second.abi);
}

#[test]
fn test_constructor_initializes_slot_from_argument() {
    let compiled = compile(
        "contract Init { uint256 a; uint256 b; constructor(uint256 x) { b = x; } }",
    )
    .unwrap();
    let ctx = context(owner(), encode_words(&[U256::from(42)]));
    let result = execute(compiled.bytecode.as_slice(), &ctx, 1_000_000, &EmptyStorage);

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.state_changes.len(), 1);
    assert_eq!(result.state_changes.get(&U256::one()), Some(&U256::from(42)));
    assert_eq!(result.return_data, compiled.runtime_bytecode);
}

#[test]
fn test_compile_errors_are_classified() {
    let cases = [
        ("contract C { uint256 x }", "CompileSyntaxError"),
        (
            "contract C { function f() public pure returns (uint256) { return y; } }",
            "CompileUndeclaredIdentifier",
        ),
        (
            "contract C { function f() public pure returns (bool) { return 1; } }",
            "CompileTypeMismatch",
        ),
        (
            "contract C { function f() public { for (;;) {} } }",
            "CompileUnsupportedFeature",
        ),
        (
            "contract C { uint256 x; function f() public view { x = 1; } }",
            "CompileMutabilityViolation",
        ),
    ];

    for (source, kind) in cases {
        let report = compile_report(source);
        assert!(!report.success, "{source}");
        assert!(report.bytecode.is_empty());
        let error = report.error.unwrap();
        assert!(error.starts_with(kind), "{source}: {error}");
    }
}

// =============================================================================
// SERVICE
// =============================================================================

#[tokio::test]
async fn test_deploy_then_read_initial_supply() {
    let service = service();
    let token = deploy_token(&service, 1_000).await;
    assert_eq!(supply(&service, token).await, U256::from(1_000));
}

#[tokio::test]
async fn test_owner_mint_commits() {
    let service = service();
    let token = deploy_token(&service, 1_000).await;

    let receipt = service
        .call(
            CallRequest::new(owner(), token, calldata("mint(uint256)", &[U256::from(250)]), 100_000),
            &BlockContext::default(),
        )
        .await
        .unwrap();

    assert!(receipt.result.success);
    assert_eq!(supply(&service, token).await, U256::from(1_250));
}

#[tokio::test]
async fn test_reverted_mint_leaves_no_trace() {
    let service = service();
    let token = deploy_token(&service, 1_000).await;

    let receipt = service
        .call(
            CallRequest::new(stranger(), token, calldata("mint(uint256)", &[U256::from(5)]), 100_000),
            &BlockContext::default(),
        )
        .await
        .unwrap();

    assert!(!receipt.result.success);
    assert_eq!(receipt.result.error_kind(), Some("Reverted"));
    assert!(receipt.result.gas_used > 0);
    assert!(receipt.result.state_changes.is_empty());
    assert_eq!(supply(&service, token).await, U256::from(1_000));
}

#[tokio::test]
async fn test_paused_token_rejects_mint() {
    let service = service();
    let token = deploy_token(&service, 1).await;
    let block = BlockContext::default();

    let paused = service
        .call(CallRequest::new(owner(), token, calldata("pause()", &[]), 100_000), &block)
        .await
        .unwrap();
    assert!(paused.result.success);

    let mint = service
        .call(
            CallRequest::new(owner(), token, calldata("mint(uint256)", &[U256::one()]), 100_000),
            &block,
        )
        .await
        .unwrap();
    assert!(!mint.result.success);
}

#[tokio::test]
async fn test_unknown_selector_reverts() {
    let service = service();
    let token = deploy_token(&service, 1).await;

    let receipt = service
        .call(
            CallRequest::new(owner(), token, calldata("burn(uint256)", &[U256::one()]), 100_000),
            &BlockContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(receipt.result.halt, HaltReason::Reverted);
}

#[tokio::test]
async fn test_value_sent_to_nonpayable_function_reverts() {
    let service = service();
    let token = deploy_token(&service, 1).await;

    let receipt = service
        .call(
            CallRequest::new(owner(), token, calldata("totalSupply()", &[]), 100_000)
                .with_value(U256::one()),
            &BlockContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(receipt.result.halt, HaltReason::Reverted);
}

#[tokio::test]
async fn test_out_of_gas_call_charges_and_rolls_back() {
    let service = service();
    let token = deploy_token(&service, 7).await;

    // Enough to dispatch, not enough for SSTORE
    let receipt = service
        .call(
            CallRequest::new(owner(), token, calldata("mint(uint256)", &[U256::one()]), 5_000),
            &BlockContext::default(),
        )
        .await
        .unwrap();

    assert_eq!(receipt.result.error_kind(), Some("OutOfGas"));
    assert!(receipt.result.gas_used <= 5_000);
    assert_eq!(supply(&service, token).await, U256::from(7));
}

#[tokio::test]
async fn test_concurrent_calls_on_disjoint_contracts() {
    let service = Arc::new(service());
    let a = deploy_token(&service, 10).await;
    let b = deploy_token(&service, 20).await;

    let mut handles = Vec::new();
    for (token, amount) in [(a, 1u64), (b, 2u64)] {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .call(
                    CallRequest::new(
                        owner(),
                        token,
                        calldata("mint(uint256)", &[U256::from(amount)]),
                        100_000,
                    ),
                    &BlockContext::default(),
                )
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().result.success);
    }

    assert_eq!(supply(&service, a).await, U256::from(11));
    assert_eq!(supply(&service, b).await, U256::from(22));
}

// =============================================================================
// COMPILED CONTROL FLOW
// =============================================================================

#[tokio::test]
async fn test_while_loop_sums_and_stores() {
    let service = service();
    let calc = deploy_calc(&service).await;

    let result = call_with_value(&service, calc, "sumTo(uint256)", &[4], 0).await;
    assert!(result.success);
    assert_eq!(result.return_word().unwrap(), U256::from(10));
    assert_eq!(result.state_changes.get(&U256::zero()), Some(&U256::from(10)));

    assert_eq!(call_word(&service, calc, "sumTo(uint256)", &[0]).await, U256::zero());
    assert_eq!(call_word(&service, calc, "sumTo(uint256)", &[100]).await, U256::from(5050));
}

#[tokio::test]
async fn test_unbounded_loop_runs_out_of_gas() {
    let service = service();
    let calc = deploy_calc(&service).await;

    let result = call_with_value(&service, calc, "sumTo(uint256)", &[1_000_000], 0).await;
    assert_eq!(result.error_kind(), Some("OutOfGas"));
    assert!(result.gas_used <= 1_000_000);
    assert!(result.state_changes.is_empty());
}

#[tokio::test]
async fn test_if_else_takes_both_branches() {
    let service = service();
    let calc = deploy_calc(&service).await;

    assert_eq!(call_word(&service, calc, "larger(uint256,uint256)", &[9, 4]).await, U256::from(9));
    assert_eq!(call_word(&service, calc, "larger(uint256,uint256)", &[4, 9]).await, U256::from(9));
    assert_eq!(call_word(&service, calc, "larger(uint256,uint256)", &[5, 5]).await, U256::from(5));
}

#[tokio::test]
async fn test_inclusive_comparisons_at_boundary() {
    let service = service();
    let calc = deploy_calc(&service).await;
    let le = "le(uint256,uint256)";
    let ge = "ge(uint256,uint256)";

    assert_eq!(call_word(&service, calc, le, &[3, 3]).await, U256::one());
    assert_eq!(call_word(&service, calc, le, &[2, 3]).await, U256::one());
    assert_eq!(call_word(&service, calc, le, &[4, 3]).await, U256::zero());
    assert_eq!(call_word(&service, calc, ge, &[3, 3]).await, U256::one());
    assert_eq!(call_word(&service, calc, ge, &[4, 3]).await, U256::one());
    assert_eq!(call_word(&service, calc, ge, &[2, 3]).await, U256::zero());
}

#[tokio::test]
async fn test_non_commutative_operators_keep_operand_order() {
    let service = service();
    let calc = deploy_calc(&service).await;

    assert_eq!(call_word(&service, calc, "sub(uint256,uint256)", &[10, 3]).await, U256::from(7));
    assert_eq!(call_word(&service, calc, "div(uint256,uint256)", &[17, 5]).await, U256::from(3));
    assert_eq!(call_word(&service, calc, "rem(uint256,uint256)", &[17, 5]).await, U256::from(2));

    // Division by zero yields zero rather than faulting
    assert_eq!(call_word(&service, calc, "div(uint256,uint256)", &[7, 0]).await, U256::zero());
    assert_eq!(call_word(&service, calc, "rem(uint256,uint256)", &[7, 0]).await, U256::zero());

    // 3 - 10 wraps modulo 2^256
    assert_eq!(
        call_word(&service, calc, "sub(uint256,uint256)", &[3, 10]).await,
        U256::MAX - U256::from(6)
    );
}

#[tokio::test]
async fn test_payable_function_accepts_value() {
    let service = service();
    let calc = deploy_calc(&service).await;

    let first = call_with_value(&service, calc, "deposit()", &[], 3).await;
    assert!(first.success, "{:?}", first.error);
    let second = call_with_value(&service, calc, "deposit()", &[], 4).await;
    assert!(second.success);
    assert_eq!(call_word(&service, calc, "deposited()", &[]).await, U256::from(7));

    // The same value to a non-payable function reverts
    let rejected = call_with_value(&service, calc, "sumTo(uint256)", &[2], 3).await;
    assert_eq!(rejected.halt, HaltReason::Reverted);
}

// =============================================================================
// EVENT BOUNDARY
// =============================================================================

#[tokio::test]
async fn test_transaction_events_deploy_then_call() {
    let service = Arc::new(service());
    let handler = TransactionEventHandler::new(Arc::clone(&service));

    let deploy = TransactionRequestPayload {
        from: owner(),
        to: None,
        value: U256::zero(),
        gas_price: U256::one(),
        gas_limit: 1_000_000,
        data: DeploymentPayload {
            source: TOKEN.to_string(),
            constructor_args: vec![U256::from(500)],
        }
        .encode(),
        block_context: BlockContext::default(),
    };
    let deployed = handler.handle_transaction(Uuid::new_v4(), deploy).await;
    assert!(deployed.success, "{:?}", deployed.error);
    let token = deployed.contract_address.unwrap();
    assert_eq!(deployed.state_changes.get(&U256::zero()), Some(&U256::from(500)));

    let call = TransactionRequestPayload {
        from: owner(),
        to: Some(token),
        value: U256::zero(),
        gas_price: U256::one(),
        gas_limit: 0,
        data: calldata("mint(uint256)", &[U256::from(5)]),
        block_context: BlockContext::default(),
    };
    let id = Uuid::new_v4();
    let minted = handler.handle_transaction(id, call).await;
    assert_eq!(minted.correlation_id, id);
    assert!(minted.success);
    assert_eq!(minted.state_changes.get(&U256::zero()), Some(&U256::from(505)));
    assert_eq!(supply(&service, token).await, U256::from(505));
}

#[tokio::test]
async fn test_response_serializes_machine_readable_error() {
    let handler = TransactionEventHandler::new(Arc::new(service()));
    let request = TransactionRequestPayload {
        from: owner(),
        to: None,
        value: U256::zero(),
        gas_price: U256::one(),
        gas_limit: 1_000_000,
        data: DeploymentPayload {
            source: "contract Bad { string name; }".to_string(),
            constructor_args: Vec::new(),
        }
        .encode(),
        block_context: BlockContext::default(),
    };

    let response = handler.handle_transaction(Uuid::new_v4(), request).await;
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "CompileUnsupportedFeature");
    assert_eq!(json["gas_used"], 0);
}

#[tokio::test]
async fn test_deeply_nested_deployment_is_rejected() {
    let handler = TransactionEventHandler::new(Arc::new(service()));
    let nested = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
    let request = TransactionRequestPayload {
        from: owner(),
        to: None,
        value: U256::zero(),
        gas_price: U256::one(),
        gas_limit: 1_000_000,
        data: DeploymentPayload {
            source: format!(
                "contract T {{ function f() public pure returns (uint256) {{ return {nested}; }} }}"
            ),
            constructor_args: Vec::new(),
        }
        .encode(),
        block_context: BlockContext::default(),
    };

    let response = handler.handle_transaction(Uuid::new_v4(), request).await;
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("CompileUnsupportedFeature"));
}
