// =============================================================================
// Execution Engine — routes approved signals to the broker
// =============================================================================
//
// Responsibilities:
//   - Mint a client order id (`symbol-strategy-<8 hex>`) per placement and
//     refuse exact duplicates within the session with status `DUPLICATE`.
//   - Retry once on the venue's transient failure codes
//     {10004, 10006, OFF_QUOTES, REQUOTE}; surface everything else as-is.
//   - Enforce the max-open-positions-per-symbol precondition.

use std::collections::HashMap;

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::broker::BrokerAdapter;
use crate::models::{OrderRequest, OrderResult, Signal};

const RETRYABLE: [&str; 4] = ["10004", "10006", "OFF_QUOTES", "REQUOTE"];

pub struct ExecutionEngine {
    /// client_order_id -> last observed status for this session.
    idempotency: HashMap<String, String>,
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self {
            idempotency: HashMap::new(),
        }
    }

    /// Place the order for a signal at the approved volume.
    pub fn place(
        &mut self,
        adapter: &mut dyn BrokerAdapter,
        signal: &Signal,
        volume: f64,
    ) -> Result<OrderResult> {
        let suffix = Uuid::new_v4().simple().to_string();
        let client_order_id = format!("{}-{}-{}", signal.symbol, signal.strategy, &suffix[..8]);
        if self.idempotency.contains_key(&client_order_id) {
            return Ok(OrderResult {
                success: false,
                broker_order_id: None,
                status: "DUPLICATE".to_string(),
                message: "Duplicate order blocked".to_string(),
            });
        }

        let order = OrderRequest {
            symbol: signal.symbol.clone(),
            side: signal.side,
            order_type: signal.order_type,
            volume,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            client_order_id: client_order_id.clone(),
            time: signal.time,
        };

        let mut result: Option<OrderResult> = None;
        for _ in 0..2 {
            let attempt = adapter.place_order(&order)?;
            let retryable = RETRYABLE.contains(&attempt.status.as_str())
                || RETRYABLE.contains(&attempt.message.to_uppercase().as_str());
            let stop = attempt.success || !retryable;
            result = Some(attempt);
            if stop {
                break;
            }
        }
        let result = result.unwrap_or(OrderResult {
            success: false,
            broker_order_id: None,
            status: "ERROR".to_string(),
            message: "No response".to_string(),
        });

        self.idempotency
            .insert(client_order_id, result.status.clone());
        Ok(result)
    }

    /// True while the symbol has head-room under `max_positions`.
    pub fn can_open(
        &self,
        adapter: &dyn BrokerAdapter,
        symbol: &str,
        max_positions: usize,
    ) -> Result<bool> {
        let open = adapter.get_open_positions(Some(symbol))?;
        Ok(open.len() < max_positions)
    }

    pub fn log_result(&self, signal: &Signal, result: &OrderResult, volume: f64) {
        info!(
            symbol = %signal.symbol,
            strategy = %signal.strategy,
            side = %signal.side,
            volume,
            status = %result.status,
            message = %result.message,
            success = result.success,
            "order_result"
        );
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}
