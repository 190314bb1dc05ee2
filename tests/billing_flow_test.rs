use chrono::NaiveDate;

use microbill::billing::{self, InvoicePeriod, InvoiceStatus, ItemCategory};
use microbill::teams::{ClientType, ManipulationEntry, Team};
use microbill::Facility;

fn period() -> InvoicePeriod {
    InvoicePeriod {
        start: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
    }
}

fn cryo_team(client_type: ClientType) -> Team {
    Team {
        name: "Équipe Cryo".to_string(),
        laboratory: "CBI".to_string(),
        client_type,
        microscope_sessions: vec![3, 0, 0],
        manipulations: vec![ManipulationEntry {
            name: "Inclusion".to_string(),
            samples: 2,
            date: None,
            session: None,
        }],
        ..Team::default()
    }
}

#[test]
fn test_internal_team_cost_has_no_vat() {
    let facility = Facility::in_memory();
    facility.teams().add(cryo_team(ClientType::Interne)).unwrap();

    let team = facility.teams().get("équipe cryo").unwrap();
    let cost = billing::calculate_team_cost(&team, &facility.tariffs().config());

    // 3 sessions on the first microscope at 60, plus 2 Inclusion samples at 25.
    assert_eq!(cost.total, 230.0);
    assert_eq!(cost.vat, 0.0);
    assert_eq!(cost.total_with_vat, 230.0);
}

#[test]
fn test_private_team_cost_carries_vat() {
    let facility = Facility::in_memory();
    facility.teams().add(cryo_team(ClientType::Prive)).unwrap();

    let team = facility.teams().get("Équipe Cryo").unwrap();
    let cost = billing::calculate_team_cost(&team, &facility.tariffs().config());

    // 3 sessions at 180, plus 2 samples at 75.
    assert_eq!(cost.total, 690.0);
    assert_eq!(cost.vat, 138.0);
    assert_eq!(cost.total_with_vat, 828.0);
}

#[test]
fn test_invoice_freezes_cost_against_tariff_changes() {
    let facility = Facility::in_memory();
    let team = facility.teams().add(cryo_team(ClientType::Interne)).unwrap();

    let invoice = facility.invoices().create_invoice(&team, period());
    let frozen = invoice.details.total;

    // Repricing after issue must not alter the invoice.
    facility.tariffs().update_tariff(
        ItemCategory::Microscopes,
        "Tecnai 200 KV",
        ClientType::Interne,
        999.0,
    );

    let stored = facility.invoices().get(&invoice.number).unwrap();
    assert_eq!(stored.details.total, frozen);

    let live = billing::calculate_team_cost(&team, &facility.tariffs().config());
    assert!(live.total > frozen);
}

#[test]
fn test_invoice_numbers_are_sequential_within_month() {
    let facility = Facility::in_memory();
    let team = facility.teams().add(cryo_team(ClientType::Interne)).unwrap();

    let first = facility.invoices().create_invoice(&team, period());
    let second = facility.invoices().create_invoice(&team, period());

    let suffix = |number: &str| {
        number
            .rsplit('-')
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap()
    };
    assert!(first.number.starts_with("FAC-"));
    assert_eq!(suffix(&second.number), suffix(&first.number) + 1);
}

#[test]
fn test_invoice_lifecycle_enforces_transitions() {
    let facility = Facility::in_memory();
    let team = facility.teams().add(cryo_team(ClientType::Interne)).unwrap();
    let invoice = facility.invoices().create_invoice(&team, period());
    assert_eq!(invoice.status, InvoiceStatus::Draft);

    let sent = facility.invoices().mark_as_sent(&invoice.number).unwrap();
    assert_eq!(sent.status, InvoiceStatus::Sent);

    let paid = facility.invoices().mark_as_paid(&invoice.number).unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert!(paid.paid_date.is_some());

    // Paid is terminal.
    assert!(facility.invoices().cancel(&invoice.number).is_err());
    assert!(facility.invoices().mark_as_sent(&invoice.number).is_err());
}

#[test]
fn test_aggregate_totals_across_client_types() {
    let facility = Facility::in_memory();
    facility.teams().add(cryo_team(ClientType::Interne)).unwrap();
    facility
        .teams()
        .add(Team {
            name: "BioPharma".to_string(),
            laboratory: "Acme Labs".to_string(),
            client_type: ClientType::Prive,
            microscope_sessions: vec![0, 1, 0],
            ..Team::default()
        })
        .unwrap();

    let teams = facility.teams().list();
    let aggregate = billing::calculate_total(&teams, &facility.tariffs().config());

    // 230 internal without VAT, plus one CM 100 session at 120 with VAT.
    assert_eq!(aggregate.subtotal, 350.0);
    assert_eq!(aggregate.vat, 24.0);
    assert_eq!(aggregate.total, 374.0);

    let interne = &aggregate.by_type[&ClientType::Interne];
    assert_eq!(interne.count, 1);
    assert_eq!(interne.amount, 230.0);
    let prive = &aggregate.by_type[&ClientType::Prive];
    assert_eq!(prive.amount, 144.0);
    assert_eq!(aggregate.by_type[&ClientType::Externe].count, 0);
}

#[test]
fn test_team_rename_keeps_uniqueness_case_insensitive() {
    let facility = Facility::in_memory();
    facility.teams().add(cryo_team(ClientType::Interne)).unwrap();
    facility
        .teams()
        .add(Team {
            name: "Autre".to_string(),
            laboratory: "LBME".to_string(),
            ..Team::default()
        })
        .unwrap();

    let mut renamed = facility.teams().get("Autre").unwrap();
    renamed.name = "ÉQUIPE CRYO".to_string();
    assert!(facility.teams().update("Autre", renamed).is_err());
    assert_eq!(facility.teams().count(), 2);
}
