//! Invoice lifecycle example: draft, post, pay, report

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use pembukuan_core::utils::{init_tracing, LogNotifier, MemoryStorage};
use pembukuan_core::{
    Contact, ContactManager, ContactType, DocumentEngine, DocumentKind, DocumentLine,
    FeatureManager, Ledger, LedgerConfig, NewDocument, NewPayment, PaymentAllocator,
    ReportGenerator, Reports, Scheduler,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    println!("Pembukuan Core - Invoice Lifecycle Example\n");

    let storage = MemoryStorage::new();
    let config = Arc::new(LedgerConfig::default());
    let features: Arc<dyn FeatureManager> = Arc::new(config.features.clone());

    // 1. Chart of accounts
    let mut ledger = Ledger::with_config(storage.clone(), config.clone());
    let chart = ledger.setup_standard_chart_of_accounts().await?;
    println!("Chart of accounts: {} accounts", chart.len());

    // 2. Customer and invoice
    let mut contacts = ContactManager::new(storage.clone());
    let customer = contacts
        .create_contact(Contact::new("PT Surya Terang", ContactType::Customer))
        .await?;

    let mut engine = DocumentEngine::new(
        storage.clone(),
        config.clone(),
        features.clone(),
        Arc::new(LogNotifier),
    );
    let issue_date = NaiveDate::from_ymd_opt(2024, 1, 10).ok_or("invalid date")?;
    let draft = engine
        .create_draft(NewDocument::invoice(
            &customer.id,
            issue_date,
            vec![DocumentLine::new(
                "Pemasangan PLTS atap 3 kWp",
                BigDecimal::from(1),
                BigDecimal::from(45_000_000),
            )],
        ))
        .await?;
    println!(
        "Draft {}: subtotal Rp{}, PPN Rp{}, total Rp{}",
        draft.number, draft.subtotal, draft.tax_amount, draft.total_amount
    );

    let invoice = engine.post(&draft.reference()).await?;
    println!("Posted {} as {:?}, due {}", invoice.number, invoice.status, invoice.due_date);

    // 3. Payments
    let mut payments = PaymentAllocator::new(storage.clone(), config.clone());
    let down_payment = payments
        .apply_payment(
            NewPayment::new(
                invoice.reference(),
                BigDecimal::from(20_000_000),
                NaiveDate::from_ymd_opt(2024, 1, 15).ok_or("invalid date")?,
            )
            .reference("DP 1"),
        )
        .await?;
    println!(
        "Payment {} applied, {} is {:?} with Rp{} outstanding",
        down_payment.payment.number,
        down_payment.document.number,
        down_payment.document.status,
        down_payment.document.outstanding()
    );

    // 4. Daily jobs after the due date
    let mut scheduler = Scheduler::new(storage.clone(), config.clone(), features, Arc::new(LogNotifier));
    let after_due = NaiveDate::from_ymd_opt(2024, 2, 15).ok_or("invalid date")?;
    for report in scheduler.run_daily(after_due).await? {
        println!(
            "Job {}: processed {}, succeeded {}, skipped {}, failed {}",
            report.job,
            report.processed,
            report.succeeded,
            report.skipped,
            report.failures.len()
        );
    }

    // 5. Reports
    let reports = Reports::new(storage, config);
    let aging = reports.aging(DocumentKind::Invoice, after_due).await?;
    for row in &aging.rows {
        println!(
            "Aging {}: {} days past due, Rp{} ({:?})",
            row.number, row.days_past_due, row.outstanding, row.bucket
        );
    }

    let period_start = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid date")?;
    let tax = reports.tax_summary(period_start, after_due).await?;
    println!("PPN keluaran Rp{}, masukan Rp{}, kurang bayar Rp{}", tax.output_tax, tax.input_tax, tax.net_payable);

    let sheet = reports.generate_balance_sheet(after_due).await?;
    println!(
        "Balance sheet: assets Rp{}, liabilities Rp{}, equity Rp{} (balanced: {})",
        sheet.total_assets, sheet.total_liabilities, sheet.total_equity, sheet.is_balanced
    );

    Ok(())
}
