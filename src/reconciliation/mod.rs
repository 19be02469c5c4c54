//! Bank statement reconciliation against recorded payments

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::LedgerConfig;
use crate::documents::{Payment, PaymentType};
use crate::ledger::finish;
use crate::traits::{AccountingStorage, DocumentStorage, LedgerStorage};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankDirection {
    In,
    Out,
}

impl From<PaymentType> for BankDirection {
    fn from(payment_type: PaymentType) -> Self {
        match payment_type {
            PaymentType::Receive => BankDirection::In,
            PaymentType::Send => BankDirection::Out,
        }
    }
}

/// One line of a bank statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: BigDecimal,
    pub direction: BankDirection,
    pub description: String,
    pub reference: Option<String>,
    pub matched_payment_id: Option<String>,
}

impl BankTransaction {
    pub fn new(
        date: NaiveDate,
        amount: BigDecimal,
        direction: BankDirection,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date,
            amount,
            direction,
            description: description.into(),
            reference: None,
            matched_payment_id: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.matched_payment_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationMatch {
    pub bank_transaction_id: String,
    pub payment_id: String,
    pub amount: BigDecimal,
    /// Absolute distance between statement and payment dates
    pub date_difference_days: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub matches: Vec<ReconciliationMatch>,
    pub unmatched_transactions: Vec<String>,
    pub unmatched_payments: Vec<String>,
}

/// Pairs bank lines with payments of the same amount and direction
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    tolerance_days: i64,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

impl ReconciliationEngine {
    pub fn new(tolerance_days: i64) -> Self {
        Self {
            tolerance_days: tolerance_days.max(0),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.reconciliation_tolerance_days)
    }

    fn distance(&self, transaction: &BankTransaction, payment: &Payment) -> Option<i64> {
        if payment.is_voided
            || transaction.amount != payment.amount
            || transaction.direction != BankDirection::from(payment.payment_type)
        {
            return None;
        }
        let days = (transaction.date - payment.payment_date).num_days().abs();
        (days <= self.tolerance_days).then_some(days)
    }

    /// Match unmatched transactions, earliest first, each to the closest unused payment.
    /// Payments already referenced by a transaction are never matched again.
    pub fn auto_match(
        &self,
        transactions: &mut [BankTransaction],
        payments: &[Payment],
    ) -> ReconciliationResult {
        let mut used: HashSet<String> = transactions
            .iter()
            .filter_map(|t| t.matched_payment_id.clone())
            .collect();

        let mut order: Vec<usize> = (0..transactions.len()).collect();
        order.sort_by(|&a, &b| {
            transactions[a]
                .date
                .cmp(&transactions[b].date)
                .then_with(|| transactions[a].id.cmp(&transactions[b].id))
        });

        let mut result = ReconciliationResult::default();
        for index in order {
            let transaction = &mut transactions[index];
            if transaction.is_matched() {
                continue;
            }

            let best = payments
                .iter()
                .filter(|p| !used.contains(&p.id))
                .filter_map(|p| self.distance(transaction, p).map(|days| (days, p)))
                .min_by(|(da, pa), (db, pb)| {
                    da.cmp(db)
                        .then_with(|| pa.payment_date.cmp(&pb.payment_date))
                        .then_with(|| pa.number.cmp(&pb.number))
                });

            match best {
                Some((days, payment)) => {
                    used.insert(payment.id.clone());
                    transaction.matched_payment_id = Some(payment.id.clone());
                    tracing::debug!(
                        transaction = %transaction.id,
                        payment = %payment.number,
                        "bank line matched"
                    );
                    result.matches.push(ReconciliationMatch {
                        bank_transaction_id: transaction.id.clone(),
                        payment_id: payment.id.clone(),
                        amount: payment.amount.clone(),
                        date_difference_days: days,
                    });
                }
                None => result.unmatched_transactions.push(transaction.id.clone()),
            }
        }

        result.unmatched_payments = payments
            .iter()
            .filter(|p| !p.is_voided && !used.contains(&p.id))
            .map(|p| p.id.clone())
            .collect();
        result
    }

    /// Match a statement against every payment in storage and store its lines.
    /// Payments claimed by previously stored lines are not offered again.
    pub async fn reconcile<S: AccountingStorage>(
        &self,
        storage: &mut S,
        transactions: &mut [BankTransaction],
    ) -> LedgerResult<ReconciliationResult> {
        storage.begin().await?;
        let result = self.reconcile_inner(storage, transactions).await;
        let result = finish(storage, result).await?;
        tracing::info!(
            matched = result.matches.len(),
            unmatched = result.unmatched_transactions.len(),
            "bank reconciliation finished"
        );
        Ok(result)
    }

    async fn reconcile_inner<S: AccountingStorage>(
        &self,
        storage: &mut S,
        transactions: &mut [BankTransaction],
    ) -> LedgerResult<ReconciliationResult> {
        let incoming: HashSet<&str> = transactions.iter().map(|t| t.id.as_str()).collect();
        let claimed: HashSet<String> = storage
            .list_bank_transactions()
            .await?
            .into_iter()
            .filter(|t| !incoming.contains(t.id.as_str()))
            .filter_map(|t| t.matched_payment_id)
            .collect();

        let payments: Vec<Payment> = storage
            .list_payments()
            .await?
            .into_iter()
            .filter(|p| !claimed.contains(&p.id))
            .collect();
        let result = self.auto_match(transactions, &payments);

        for transaction in transactions.iter() {
            storage.save_bank_transaction(transaction).await?;
        }
        Ok(result)
    }

    /// Pair a stored statement line with a stored payment, see [`Self::manual_match`]
    pub async fn match_stored<S: AccountingStorage>(
        &self,
        storage: &mut S,
        transaction_id: &str,
        payment_id: &str,
    ) -> LedgerResult<ReconciliationMatch> {
        storage.begin().await?;
        let result = self.match_stored_inner(storage, transaction_id, payment_id).await;
        finish(storage, result).await
    }

    async fn match_stored_inner<S: AccountingStorage>(
        &self,
        storage: &mut S,
        transaction_id: &str,
        payment_id: &str,
    ) -> LedgerResult<ReconciliationMatch> {
        let mut transaction = storage
            .get_bank_transaction(transaction_id)
            .await?
            .ok_or_else(|| LedgerError::BankTransactionNotFound(transaction_id.to_string()))?;
        let payment = storage
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| LedgerError::PaymentNotFound(payment_id.to_string()))?;

        let stored = storage.list_bank_transactions().await?;
        if stored
            .iter()
            .any(|t| t.id != transaction.id && t.matched_payment_id.as_deref() == Some(payment_id))
        {
            return Err(LedgerError::InvalidTransition(format!(
                "Payment {} is already matched to another bank transaction",
                payment.number
            )));
        }

        let matched = self.manual_match(&mut transaction, &payment)?;
        storage.save_bank_transaction(&transaction).await?;
        Ok(matched)
    }

    /// Pair a transaction with a payment chosen by the user; the date tolerance does not apply
    pub fn manual_match(
        &self,
        transaction: &mut BankTransaction,
        payment: &Payment,
    ) -> LedgerResult<ReconciliationMatch> {
        if transaction.is_matched() {
            return Err(LedgerError::InvalidTransition(format!(
                "Bank transaction {} is already matched",
                transaction.id
            )));
        }
        if payment.is_voided {
            return Err(LedgerError::PaymentAlreadyVoided(payment.number.clone()));
        }
        if transaction.amount != payment.amount
            || transaction.direction != BankDirection::from(payment.payment_type)
        {
            return Err(LedgerError::Validation(format!(
                "Bank transaction {} does not match payment {}",
                transaction.id, payment.number
            )));
        }

        transaction.matched_payment_id = Some(payment.id.clone());
        Ok(ReconciliationMatch {
            bank_transaction_id: transaction.id.clone(),
            payment_id: payment.id.clone(),
            amount: payment.amount.clone(),
            date_difference_days: (transaction.date - payment.payment_date).num_days().abs(),
        })
    }

    pub fn unmatch(&self, transaction: &mut BankTransaction) {
        transaction.matched_payment_id = None;
    }
}
