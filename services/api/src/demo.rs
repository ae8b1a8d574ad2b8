use crate::infra::{seeded_reference_data, InMemoryDocumentStore, InMemorySessionRepository};
use chrono::{Days, Local, NaiveDate};
use clap::Args;
use legal_intake::error::AppError;
use legal_intake::workflows::requests::finance::{build_projection, Projection, RatePair};
use legal_intake::workflows::requests::{
    Collection, Contact, Debt, FixedClock, IdentityDocument, IncomeSection, IntakeService,
    IntakeServiceError, IntakeSettings, Location, MoraState, Party, PartyIdentity, PartyRole,
    ProjectionInputs, ProposalSection, RequestId, RequestKind, SectionKey, SectionMutation,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

type DemoService = IntakeService<InMemorySessionRepository, InMemoryDocumentStore>;

const DEMO_SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reference date for mora and date rules (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Files to attach to the request before submitting (repeatable).
    #[arg(long = "attachment")]
    pub(crate) attachments: Vec<PathBuf>,
    /// Write the payment proposal's amortization schedule to this CSV file.
    #[arg(long)]
    pub(crate) export_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ProjectionArgs {
    /// Capital to amortize
    #[arg(long)]
    pub(crate) capital: f64,
    /// Number of monthly installments
    #[arg(long = "term")]
    pub(crate) term_months: u32,
    /// Nominal monthly rate in percent
    #[arg(long, conflicts_with = "effective_annual_rate")]
    pub(crate) monthly_rate: Option<f64>,
    /// Effective annual rate in percent, converted to its monthly equivalent
    #[arg(long = "annual-rate")]
    pub(crate) effective_annual_rate: Option<f64>,
    /// Month of the first installment (YYYY-MM-DD). Defaults to today.
    #[arg(long = "start", value_parser = crate::infra::parse_date)]
    pub(crate) start_date: Option<NaiveDate>,
    /// Day of the month installments fall on, clamped to short months
    #[arg(long, default_value_t = 5)]
    pub(crate) pay_day: u32,
    /// Print a readable table instead of CSV
    #[arg(long)]
    pub(crate) table: bool,
}

pub(crate) fn run_projection(args: ProjectionArgs) -> Result<(), AppError> {
    let ProjectionArgs {
        capital,
        term_months,
        monthly_rate,
        effective_annual_rate,
        start_date,
        pay_day,
        table,
    } = args;

    let rates = RatePair {
        effective_annual: effective_annual_rate,
        monthly: monthly_rate,
    };
    let projection = build_projection(&ProjectionInputs {
        capital: Some(capital),
        term_months: Some(term_months),
        monthly_rate_pct: rates.monthly_rate(),
        start_date: Some(start_date.unwrap_or_else(|| Local::now().date_naive())),
        pay_day: Some(pay_day),
    });

    if projection.is_empty() {
        println!("No schedule: capital, term and a valid rate are all required.");
        return Ok(());
    }

    if table {
        render_projection(&projection, usize::MAX);
    } else {
        print!("{}", projection.to_csv()?);
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        attachments,
        export_csv,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let store = Arc::new(InMemoryDocumentStore::default());
    let service: DemoService = IntakeService::new(
        Arc::new(InMemorySessionRepository::default()),
        store.clone(),
        Arc::new(seeded_reference_data()),
        Arc::new(FixedClock(today)),
        IntakeSettings {
            save_delay: Duration::ZERO,
            ..IntakeSettings::default()
        },
    );

    println!("Insolvency request intake demo (evaluated {today})");
    let session = service.create(RequestKind::Insolvency)?;
    let id = session.id().clone();
    println!("Opened {} {}", session.kind().label(), id);

    fill_and_save(&service, &id, today).await?;

    let session = service.get(&id)?;
    if let Some(assessment) = session.assessment() {
        let totals = &assessment.totals;
        println!("\nDebt assessment");
        println!(
            "  {} debts, capital {:.2}, overdue {:.2} ({:.1}%)",
            totals.debt_count, totals.total_capital, totals.capital_overdue, totals.overdue_share_pct
        );
        println!("  {}", assessment.summary);
    }
    if let Some(capacity) = session.capacity() {
        println!(
            "  Capacity to pay: {:.2} (income {:.2}, expenses {:.2})",
            capacity.displayed, capacity.income, capacity.expenses
        );
        if let Some(warning) = &capacity.warning {
            println!("  Warning: {warning}");
        }
    }
    if let Some(projection) = session.projection() {
        println!("\nPayment proposal");
        render_projection(projection, 3);
        if let Some(path) = export_csv {
            std::fs::write(&path, projection.to_csv()?)?;
            println!("  Schedule exported to {}", path.display());
        }
    }

    for path in &attachments {
        attach_from_path(&service, &id, path)?;
    }
    service.apply(
        &id,
        SectionMutation::SetDrawnSignature {
            image: DEMO_SIGNATURE.to_string(),
        },
    )?;
    report_save(&service, &id, SectionKey::Annexes).await?;

    let receipt = service.submit(&id)?;
    println!(
        "\nSubmitted {} as {} ({:?}): {} file part(s), {} bytes",
        receipt.request_id,
        receipt.document_id.0,
        receipt.action,
        receipt.manifest.file_fields.len(),
        receipt.manifest.total_bytes
    );
    if let Some(payload) = store.document(&receipt.document_id) {
        match serde_json::to_string_pretty(&payload.metadata) {
            Ok(json) => println!("Stored metadata:\n{json}"),
            Err(err) => println!("Stored metadata unavailable: {err}"),
        }
    }

    Ok(())
}

async fn fill_and_save(
    service: &DemoService,
    id: &RequestId,
    today: NaiveDate,
) -> Result<(), IntakeServiceError> {
    println!("\nSections");
    service.apply(id, SectionMutation::ReplaceDebtor { debtor: demo_debtor() })?;
    report_save(service, id, SectionKey::Debtor).await?;

    service.apply(
        id,
        SectionMutation::AppendItem {
            collection: Collection::Facts,
            item: Some(serde_json::json!({
                "description": "Reduced working hours since January left the household unable to keep up with its loans."
            })),
        },
    )?;
    report_save(service, id, SectionKey::Facts).await?;

    for debt in [
        demo_debt("Banco Andino", 6_500_000.0),
        demo_debt("Cooperativa del Valle", 3_200_000.0),
    ] {
        service.apply(
            id,
            SectionMutation::AppendItem {
                collection: Collection::Debts,
                item: serde_json::to_value(&debt).ok(),
            },
        )?;
    }
    service.apply(id, SectionMutation::SetOverdue { index: 1, overdue: true })?;
    if let Some(due_date) = today.checked_sub_days(Days::new(120)) {
        service.apply(id, SectionMutation::SetDueDate { index: 1, due_date })?;
    }
    report_save(service, id, SectionKey::Debts).await?;

    report_save(service, id, SectionKey::Assets).await?;

    let mut income = IncomeSection {
        monthly_income: Some(4_200_000.0),
        ..IncomeSection::default()
    };
    income.expenses.housing = 1_200_000.0;
    income.expenses.food = 900_000.0;
    income.expenses.transport = 300_000.0;
    service.apply(id, SectionMutation::ReplaceIncome { income })?;
    report_save(service, id, SectionKey::Income).await?;

    let proposal = ProposalSection {
        term_months: Some(36),
        start_date: today.checked_add_days(Days::new(30)),
        pay_day: Some(5),
        ..ProposalSection::default()
    };
    service.apply(id, SectionMutation::ReplaceProposal { proposal })?;
    service.apply(id, SectionMutation::SetEffectiveAnnualRate { value: 12.0 })?;
    report_save(service, id, SectionKey::Proposal).await
}

async fn report_save(
    service: &DemoService,
    id: &RequestId,
    section: SectionKey,
) -> Result<(), IntakeServiceError> {
    let (_, outcome) = service.save_section(id, section).await?;
    match outcome.unlocked {
        Some(next) => println!("- {section}: saved, {next} unlocked"),
        None => println!("- {section}: saved"),
    }
    Ok(())
}

fn attach_from_path(service: &DemoService, id: &RequestId, path: &Path) -> Result<(), AppError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let content_type = mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string());

    match service.attach_file(id, &name, content_type, bytes) {
        Ok((_, index)) => println!("  Attached {name} as attachments[{index}]"),
        Err(err) => println!("  Attachment {name} rejected: {err}"),
    }
    Ok(())
}

fn render_projection(projection: &Projection, limit: usize) {
    if let Some(installment) = projection.installment() {
        println!(
            "  {} installments of {:.2} (principal {:.2}, interest {:.2})",
            projection.rows.len(),
            installment,
            projection.total_principal(),
            projection.total_interest()
        );
    }
    println!(
        "  {:>6} {:>12} {:>16} {:>14} {:>14} {:>16}",
        "period", "date", "balance", "principal", "interest", "new balance"
    );
    for row in projection.rows.iter().take(limit) {
        println!(
            "  {:>6} {:>12} {:>16.2} {:>14.2} {:>14.2} {:>16.2}",
            row.period, row.date, row.balance, row.principal, row.interest, row.new_balance
        );
    }
    if projection.rows.len() > limit {
        println!("  ... {} more", projection.rows.len() - limit);
    }
}

fn demo_debtor() -> Party {
    Party {
        role: PartyRole::Applicant,
        identity: PartyIdentity::NaturalPerson {
            first_name: "Lucía".to_string(),
            last_name: "Restrepo".to_string(),
            document_type: IdentityDocument::CitizenshipCard,
            document_number: "43876512".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1984, 3, 12),
        },
        contact: Contact {
            email: "lucia.restrepo@example.com".to_string(),
            phone: "+57 300 555 0199".to_string(),
            address: "Calle 10 # 43-25".to_string(),
            location: Location {
                country: Some("co".to_string()),
                region: Some("ant".to_string()),
                city: Some("med".to_string()),
            },
        },
    }
}

fn demo_debt(creditor: &str, capital: f64) -> Debt {
    Debt {
        creditor: creditor.to_string(),
        creditor_tax_id: Some("890903938-8".to_string()),
        capital,
        current_interest_rate: Some(1.9),
        current_interest: Some(0.0),
        default_interest_rate: Some(2.5),
        default_interest: Some(0.0),
        overdue: false,
        mora: MoraState::default(),
    }
}
