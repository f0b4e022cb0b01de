//! REST balance ledger client.
//!
//! Wire contract (JSON):
//! - `GET  {base}/accounts/{user}/balance`   → `{ "balance": 12.5 }`, 404 = empty account
//! - `POST {base}/accounts/{user}/debit`     `{ "amount", "reference" }`
//! - `POST {base}/accounts/{user}/credit`    `{ "amount", "reference" }`
//! - `POST {base}/accounts/{user}/reversals` `{ "reference" }`, 404 = nothing to reverse
//!
//! Mutations send the reference as `Idempotency-Key` as well. A 402 or 409
//! on debit means insufficient funds (body may carry `available`). Any other
//! failure is reported as `Unavailable`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::BalanceLedger;
use crate::error::LedgerError;

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Decimal,
}

#[derive(Debug, Default, Deserialize)]
struct InsufficientFundsBody {
    #[serde(default)]
    available: Decimal,
}

#[derive(Debug, Serialize)]
struct MutationBody<'a> {
    amount: Decimal,
    reference: &'a str,
}

#[derive(Debug, Serialize)]
struct ReversalBody<'a> {
    reference: &'a str,
}

pub struct HttpLedger {
    http: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpLedger {
    /// Create a client for the ledger at `base_url`. `timeout` bounds every
    /// request end to end.
    pub fn new(base_url: &str, token: Option<SecretString>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("ARENA/0.1.0 (wager-engine)")
            .build()
            .context("Failed to build HTTP client for balance ledger")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn account_url(&self, user_id: &str, action: &str) -> String {
        format!(
            "{}/accounts/{}/{action}",
            self.base_url,
            urlencoding::encode(user_id)
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response, LedgerError> {
        self.authorize(builder).send().await.map_err(|e| {
            warn!(error = %e, operation = what, "Ledger request failed");
            LedgerError::Unavailable(format!("{what}: {e}"))
        })
    }

    async fn mutate(
        &self,
        user_id: &str,
        action: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<Response, LedgerError> {
        let url = self.account_url(user_id, action);
        debug!(url = %url, %amount, reference, "Ledger mutation");

        let builder = self
            .http
            .post(&url)
            .header("Idempotency-Key", reference)
            .json(&MutationBody { amount, reference });
        self.send(builder, action).await
    }
}

fn unexpected(status: StatusCode, what: &str) -> LedgerError {
    LedgerError::Unavailable(format!("{what}: ledger returned HTTP {status}"))
}

#[async_trait]
impl BalanceLedger for HttpLedger {
    async fn balance(&self, user_id: &str) -> Result<Decimal, LedgerError> {
        let url = self.account_url(user_id, "balance");
        let resp = self.send(self.http.get(&url), "balance").await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(Decimal::ZERO),
            status if status.is_success() => {
                let body: BalanceResponse = resp.json().await.map_err(|e| {
                    LedgerError::Unavailable(format!("balance: malformed response: {e}"))
                })?;
                Ok(body.balance)
            }
            status => Err(unexpected(status, "balance")),
        }
    }

    async fn debit(&self, user_id: &str, amount: Decimal, reference: &str) -> Result<(), LedgerError> {
        let resp = self.mutate(user_id, "debit", amount, reference).await?;

        match resp.status() {
            status if status.is_success() => Ok(()),
            StatusCode::PAYMENT_REQUIRED | StatusCode::CONFLICT => {
                let body: InsufficientFundsBody = resp.json().await.unwrap_or_default();
                Err(LedgerError::InsufficientFunds {
                    user_id: user_id.to_string(),
                    needed: amount,
                    available: body.available,
                })
            }
            status => Err(unexpected(status, "debit")),
        }
    }

    async fn credit(&self, user_id: &str, amount: Decimal, reference: &str) -> Result<(), LedgerError> {
        let resp = self.mutate(user_id, "credit", amount, reference).await?;

        match resp.status() {
            status if status.is_success() => Ok(()),
            status => Err(unexpected(status, "credit")),
        }
    }

    async fn reverse(&self, user_id: &str, reference: &str) -> Result<(), LedgerError> {
        let url = self.account_url(user_id, "reversals");
        let builder = self
            .http
            .post(&url)
            .header("Idempotency-Key", format!("reverse:{reference}"))
            .json(&ReversalBody { reference });
        let resp = self.send(builder, "reverse").await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(unexpected(status, "reverse")),
        }
    }
}
