//! # Event Handler Adapter
//!
//! Turns inbound transaction events into `ContractEngineApi` calls and
//! builds the response published under the request's correlation id.
//!
//! - `to == None`: deployment; `data` is a JSON `DeploymentPayload`
//! - `to == Some(addr)`: call; `data` is calldata
//! - Requests the engine refuses still get a response, with `gas_used == 0`

use crate::domain::value_objects::Address;
use crate::errors::ServiceError;
use crate::events::{DeploymentPayload, TransactionRequestPayload, TransactionResponsePayload};
use crate::ports::inbound::{CallRequest, ContractEngineApi, DeployRequest};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Inbound message as delivered by the bus.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Topic the message was received on.
    pub topic: String,
    /// Correlation ID for request/response matching.
    pub correlation_id: Uuid,
    /// Raw JSON payload.
    pub payload: Vec<u8>,
}

/// Event handler for transactions addressed to the contract engine.
pub struct TransactionEventHandler<T: ContractEngineApi> {
    api: Arc<T>,
}

impl<T: ContractEngineApi> TransactionEventHandler<T> {
    /// Create a new event handler.
    pub fn new(api: Arc<T>) -> Self {
        Self { api }
    }

    /// Executes a transaction and reports its outcome.
    #[instrument(skip(self, payload), fields(correlation_id = %correlation_id))]
    pub async fn handle_transaction(
        &self,
        correlation_id: Uuid,
        payload: TransactionRequestPayload,
    ) -> TransactionResponsePayload {
        let outcome = match payload.to {
            None => self.deploy(correlation_id, payload).await,
            Some(to) => self.call(correlation_id, to, payload).await,
        };

        match outcome {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Transaction rejected");
                TransactionResponsePayload::rejected(correlation_id, &err)
            }
        }
    }

    /// Decodes a raw bus message and handles it.
    ///
    /// # Errors
    ///
    /// `InvalidPayload` if the message is not a transaction request; the
    /// caller routes such messages to the dead-letter topic.
    pub async fn handle_message(
        &self,
        message: InboundMessage,
    ) -> Result<TransactionResponsePayload, ServiceError> {
        let payload: TransactionRequestPayload = serde_json::from_slice(&message.payload)
            .map_err(|e| ServiceError::InvalidPayload(e.to_string()))?;
        Ok(self.handle_transaction(message.correlation_id, payload).await)
    }

    async fn deploy(
        &self,
        correlation_id: Uuid,
        payload: TransactionRequestPayload,
    ) -> Result<TransactionResponsePayload, ServiceError> {
        let deployment = DeploymentPayload::decode(payload.data.as_slice())?;
        info!(sender = %payload.from, "Handling deployment");

        let request = DeployRequest {
            sender: payload.from,
            source: deployment.source,
            constructor_args: deployment.constructor_args,
            value: payload.value,
            gas_limit: payload.gas_limit,
            gas_price: payload.gas_price,
        };
        let receipt = self.api.deploy(request, &payload.block_context).await?;
        Ok(TransactionResponsePayload::executed(
            correlation_id,
            &receipt.result,
            receipt.contract_address,
        ))
    }

    async fn call(
        &self,
        correlation_id: Uuid,
        to: Address,
        payload: TransactionRequestPayload,
    ) -> Result<TransactionResponsePayload, ServiceError> {
        info!(sender = %payload.from, to = %to, "Handling call");

        let request = CallRequest {
            sender: payload.from,
            to,
            calldata: payload.data,
            value: payload.value,
            gas_limit: payload.gas_limit,
            gas_price: payload.gas_price,
        };
        let receipt = self.api.call(request, &payload.block_context).await?;
        Ok(TransactionResponsePayload::executed(
            correlation_id,
            &receipt.result,
            None,
        ))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileReport;
    use crate::domain::entities::{BlockContext, ExecutionResult, StateChanges};
    use crate::domain::value_objects::{Bytes, U256};
    use crate::errors::VmError;
    use crate::ports::inbound::{CallReceipt, DeployReceipt};
    use parking_lot::Mutex;

    /// Records requests and answers with canned results.
    #[derive(Default)]
    struct MockApi {
        deploys: Mutex<Vec<DeployRequest>>,
        calls: Mutex<Vec<CallRequest>>,
    }

    #[async_trait::async_trait]
    impl ContractEngineApi for MockApi {
        async fn deploy(
            &self,
            request: DeployRequest,
            _block: &BlockContext,
        ) -> Result<DeployReceipt, ServiceError> {
            self.deploys.lock().push(request);
            Ok(DeployReceipt {
                contract_address: Some(Address::new([7u8; 20])),
                abi: Vec::new(),
                result: ExecutionResult::success(StateChanges::new(), Bytes::new(), 21_000),
            })
        }

        async fn call(
            &self,
            request: CallRequest,
            _block: &BlockContext,
        ) -> Result<CallReceipt, ServiceError> {
            if request.to == Address::ZERO {
                return Err(ServiceError::UnknownContract(request.to));
            }
            let contract = request.to;
            self.calls.lock().push(request);
            Ok(CallReceipt {
                contract,
                result: ExecutionResult::failure(VmError::Revert, Bytes::new(), 40),
            })
        }

        async fn simulate(
            &self,
            _request: CallRequest,
            _block: &BlockContext,
        ) -> Result<ExecutionResult, ServiceError> {
            Ok(ExecutionResult::success(StateChanges::new(), Bytes::new(), 0))
        }

        fn compile(&self, source: &str) -> CompileReport {
            CompileReport::from(&crate::compiler::compile(source))
        }
    }

    fn request(to: Option<Address>, data: Bytes) -> TransactionRequestPayload {
        TransactionRequestPayload {
            from: Address::new([1u8; 20]),
            to,
            value: U256::zero(),
            gas_price: U256::from(1),
            gas_limit: 50_000,
            data,
            block_context: BlockContext::default(),
        }
    }

    #[tokio::test]
    async fn test_missing_to_routes_to_deploy() {
        let api = Arc::new(MockApi::default());
        let handler = TransactionEventHandler::new(api.clone());
        let data = DeploymentPayload {
            source: "contract C {}".into(),
            constructor_args: vec![U256::from(5)],
        }
        .encode();

        let id = Uuid::new_v4();
        let response = handler.handle_transaction(id, request(None, data)).await;

        assert!(response.success);
        assert_eq!(response.correlation_id, id);
        assert_eq!(response.contract_address, Some(Address::new([7u8; 20])));

        let deploys = api.deploys.lock();
        assert_eq!(deploys.len(), 1);
        assert_eq!(deploys[0].source, "contract C {}");
        assert_eq!(deploys[0].constructor_args, vec![U256::from(5)]);
        assert!(api.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_present_to_routes_to_call() {
        let api = Arc::new(MockApi::default());
        let handler = TransactionEventHandler::new(api.clone());
        let target = Address::new([2u8; 20]);

        let response = handler
            .handle_transaction(
                Uuid::new_v4(),
                request(Some(target), Bytes::from_slice(&[1, 2, 3, 4])),
            )
            .await;

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Reverted"));
        assert_eq!(response.gas_used, 40);
        assert!(response.contract_address.is_none());

        let calls = api.calls.lock();
        assert_eq!(calls[0].to, target);
        assert_eq!(calls[0].calldata.as_slice(), &[1, 2, 3, 4]);
        assert!(api.deploys.lock().is_empty());
    }

    #[tokio::test]
    async fn test_bad_deployment_payload_is_rejected() {
        let handler = TransactionEventHandler::new(Arc::new(MockApi::default()));
        let response = handler
            .handle_transaction(Uuid::new_v4(), request(None, Bytes::from_slice(&[0x60])))
            .await;

        assert!(!response.success);
        assert_eq!(response.gas_used, 0);
        assert_eq!(response.error.as_deref(), Some("InvalidPayload"));
    }

    #[tokio::test]
    async fn test_service_error_becomes_response() {
        let handler = TransactionEventHandler::new(Arc::new(MockApi::default()));
        let response = handler
            .handle_transaction(Uuid::new_v4(), request(Some(Address::ZERO), Bytes::new()))
            .await;
        assert_eq!(response.error.as_deref(), Some("UnknownContract"));
    }

    #[tokio::test]
    async fn test_handle_message_decodes_json() {
        let handler = TransactionEventHandler::new(Arc::new(MockApi::default()));
        let id = Uuid::new_v4();
        let payload = serde_json::to_vec(&request(Some(Address::new([3u8; 20])), Bytes::new()))
            .unwrap();

        let response = handler
            .handle_message(InboundMessage {
                topic: crate::events::topics::TRANSACTION_REQUEST.to_string(),
                correlation_id: id,
                payload,
            })
            .await
            .unwrap();
        assert_eq!(response.correlation_id, id);

        let err = handler
            .handle_message(InboundMessage {
                topic: crate::events::topics::TRANSACTION_REQUEST.to_string(),
                correlation_id: id,
                payload: b"not json".to_vec(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidPayload");
    }
}
