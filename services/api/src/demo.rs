use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use wohngeld_casework::casework::{
    CaseworkService, Client, ClientId, CreateDeadline, DeadlineKind, DraftRequest,
    InMemoryClientStore, InMemoryDeadlineStore, LifecycleConfig, ManifestTemplateEngine,
    ReadinessEvaluator, ReadinessVerdict,
};
use wohngeld_casework::error::AppError;

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// JSON file holding one client record
    #[arg(long)]
    pub(crate) client: PathBuf,
    /// Document type to check against, e.g. WOHNGELD_ERSTANTRAG
    #[arg(long)]
    pub(crate) typ: String,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reference date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Form manifest used for the draft step
    #[arg(long, default_value = "templates/wohngeld-antrag.json")]
    pub(crate) template: PathBuf,
    /// Directory the demo draft is written to
    #[arg(long, default_value = "output")]
    pub(crate) output_dir: PathBuf,
}

pub(crate) fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let client = read_client(&args.client)?;
    let kind: DeadlineKind = args.typ.parse()?;

    let verdict = ReadinessEvaluator::default().evaluate(&client, kind);
    print_verdict(&client, kind, &verdict);

    let json = serde_json::to_string_pretty(&verdict)
        .map_err(|err| AppError::InvalidInput(err.to_string()))?;
    println!("{json}");
    Ok(())
}

pub(crate) fn read_client(path: &Path) -> Result<Client, AppError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|err| {
        AppError::InvalidInput(format!(
            "client record {} is not valid JSON ({err})",
            path.display()
        ))
    })
}

fn print_verdict(client: &Client, kind: DeadlineKind, verdict: &ReadinessVerdict) {
    println!(
        "Vollständigkeit für {} ({}): {}%",
        kind.label(),
        client.full_name(),
        verdict.percent_complete
    );
    if verdict.ready {
        println!("  Alle Pflichtangaben vorhanden");
    } else {
        println!("  Fehlende Pflichtangaben: {}", verdict.missing_fields.join(", "));
    }
    for warning in &verdict.warnings {
        println!("  Hinweis: {warning}");
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let now = noon(today);

    let clients = InMemoryClientStore::with_clients([demo_client(), sparse_client()]);
    let service = CaseworkService::new(
        Arc::new(clients),
        Arc::new(InMemoryDeadlineStore::default()),
        Arc::new(ManifestTemplateEngine::new(&args.template, &args.output_dir)),
        &LifecycleConfig::default(),
    );
    let lifecycle = service.lifecycle();

    println!("Wohngeld casework demo ({})", today.format("%d.%m.%Y"));

    let renewal = lifecycle.create(
        CreateDeadline {
            client_id: ClientId(1),
            kind: DeadlineKind::Renewal,
            due_date: shift(today, 10),
            reminder_date: None,
            description: Some("Weiterbewilligung beantragen".to_string()),
        },
        now,
    )?;
    lifecycle.create(
        CreateDeadline {
            client_id: ClientId(2),
            kind: DeadlineKind::Increase,
            due_date: shift(today, -3),
            reminder_date: None,
            description: Some("Erhöhungsantrag nach Mietanpassung".to_string()),
        },
        now,
    )?;
    lifecycle.create(
        CreateDeadline {
            client_id: ClientId(2),
            kind: DeadlineKind::FirstApplication,
            due_date: shift(today, 40),
            reminder_date: None,
            description: None,
        },
        now,
    )?;

    let report = lifecycle.sweep(now, &AtomicBool::new(false))?;
    println!(
        "\nSweep: {} geprüft, {} Erinnerungen, {} überfällig",
        report.examined, report.reminded, report.overdue
    );

    let summary = service.dashboard().summary(now)?;
    println!("\nDashboard");
    println!("  Aktive Klienten: {}", summary.aktive_klienten);
    println!(
        "  Klienten mit unvollständigen Daten: {}",
        summary.klienten_mit_unvollstaendigen_daten
    );
    println!("  Fristen überfällig: {}", summary.fristen_ueberfaellig);
    println!("  Fällig heute: {}", summary.fristen_faellig_heute);
    println!("  Fällig diese Woche: {}", summary.fristen_faellig_diese_woche);
    println!("  Fällig diesen Monat: {}", summary.fristen_faellig_diesen_monat);
    println!("  Offene Erinnerungen: {}", summary.erinnerungen_offen);

    println!("\nFristen");
    for client in service.clients(true)? {
        for deadline in lifecycle.list_for_client(client.id)? {
            println!(
                "  #{} {} {} fällig {} [{}]",
                deadline.id,
                client.full_name(),
                deadline.kind.label(),
                deadline.due_date.format("%d.%m.%Y"),
                deadline.status
            );
        }
    }

    println!("\nVollständigkeit");
    for client in service.clients(true)? {
        let (kind, verdict) = service.check(client.id, None)?;
        print_verdict(&client, kind, &verdict);
    }

    println!("\nEntwurf");
    match service.drafts().generate_draft(DraftRequest {
        client_id: ClientId(1),
        kind: DeadlineKind::Renewal,
        deadline: Some(renewal.id),
    }) {
        Ok(draft) => println!(
            "  {} ({} von {} Feldern ausgefüllt)",
            draft.output_path, draft.fields_filled, draft.fields_found
        ),
        Err(err) => println!("  Entwurf nicht erstellt: {err}"),
    }

    let outcome = lifecycle.complete(renewal.id, true, now)?;
    println!("\nFrist #{} erledigt", outcome.completed.id);
    match outcome.follow_up {
        Some(next) => println!(
            "  Folgefrist #{} fällig {}, Erinnerung {}",
            next.id,
            next.due_date.format("%d.%m.%Y"),
            next.reminder_date
                .map(|date| date.format("%d.%m.%Y").to_string())
                .unwrap_or_else(|| "-".to_string())
        ),
        None => println!("  Keine Folgefrist angelegt"),
    }

    Ok(())
}

fn noon(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(12, 0, 0).unwrap_or_default()
}

fn shift(date: NaiveDate, days: i64) -> NaiveDate {
    let offset = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(offset)
    } else {
        date.checked_sub_days(offset)
    };
    shifted.unwrap_or(date)
}

fn demo_client() -> Client {
    let mut client = Client::new(ClientId(1), "Beispiel", "Maria");
    client.birth_date = NaiveDate::from_ymd_opt(1958, 11, 2);
    client.nationality = Some("deutsch".to_string());
    client.marital_status = Some("verwitwet".to_string());
    client.employment_status = Some("Rentner".to_string());
    client.street = "Lindenallee".to_string();
    client.house_number = "12a".to_string();
    client.postal_code = "14482".to_string();
    client.city = "Potsdam".to_string();
    client.tenancy = Some("Hauptmieter".to_string());
    client.living_area_sqm = Some(48.0);
    client.total_rent = Some(512.4);
    client.heating_included = Some(true);
    client.hot_water_included = Some(true);
    client.income_type = Some("Altersrente".to_string());
    client.gross_income = Some(1080.0);
    client.income_frequency = Some("monatlich".to_string());
    client.iban = Some("DE89 3704 0044 0532 0130 00".to_string());
    client.account_holder = Some("Maria Beispiel".to_string());
    client.disability_or_care = Some(false);
    client.benefit_number = Some("WG-2024-0815".to_string());
    client
}

fn sparse_client() -> Client {
    let mut client = Client::new(ClientId(2), "Neumann", "Jonas");
    client.street = "Am Kanal".to_string();
    client.house_number = "4".to_string();
    client.postal_code = "14467".to_string();
    client.city = "Potsdam".to_string();
    client
}
