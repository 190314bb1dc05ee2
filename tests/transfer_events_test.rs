use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use microbill::billing::{self, ItemCategory};
use microbill::teams::{ClientType, ManipulationEntry, Team};
use microbill::transfer::report_to_csv;
use microbill::Facility;

#[test]
fn test_domain_events_flow_through_the_bus() {
    let facility = Facility::in_memory();
    let topics = Arc::new(Mutex::new(Vec::new()));
    let topics_clone = Arc::clone(&topics);
    facility.bus().subscribe_all(move |event| {
        topics_clone.lock().unwrap().push(event.topic.clone());
        Ok(())
    });

    facility
        .teams()
        .add(Team {
            name: "Alpha".to_string(),
            laboratory: "CBI".to_string(),
            ..Team::default()
        })
        .unwrap();
    facility
        .tariffs()
        .add_item(ItemCategory::Services, "Cryo-FIB", None);
    facility.teams().remove("alpha").unwrap();

    let seen = topics.lock().unwrap();
    assert!(seen.contains(&"team:added".to_string()));
    assert!(seen.contains(&"service:add".to_string()));
    assert!(seen.contains(&"team:removed".to_string()));
}

#[test]
fn test_failing_subscriber_does_not_block_others() {
    let facility = Facility::in_memory();
    let hits = Arc::new(AtomicUsize::new(0));
    facility
        .bus()
        .subscribe("team:added", |_| anyhow::bail!("subscriber exploded"));
    let hits_clone = Arc::clone(&hits);
    facility.bus().subscribe("team:added", move |_| {
        hits_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    facility
        .teams()
        .add(Team {
            name: "Alpha".to_string(),
            laboratory: "CBI".to_string(),
            ..Team::default()
        })
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_teams_csv_roundtrip_through_facility() {
    let facility = Facility::in_memory();
    facility
        .teams()
        .add(Team {
            name: "Imagerie, Toulouse".to_string(),
            laboratory: "IPBS".to_string(),
            client_type: ClientType::Prive,
            project_name: Some("Cryo".to_string()),
            microscope_sessions: vec![1, 0, 4],
            ..Team::default()
        })
        .unwrap();

    let csv = facility.teams_csv();
    let parsed = facility.teams_from_csv(&csv).unwrap();

    assert_eq!(parsed.len(), 1);
    let team = &parsed[0];
    assert_eq!(team.name, "Imagerie, Toulouse");
    assert_eq!(team.client_type, ClientType::Prive);
    assert_eq!(team.microscope_sessions, vec![1, 0, 4]);
}

#[test]
fn test_report_csv_lists_items_and_totals() {
    let facility = Facility::in_memory();
    facility
        .teams()
        .add(Team {
            name: "Alpha".to_string(),
            laboratory: "CBI".to_string(),
            client_type: ClientType::Interne,
            microscope_sessions: vec![3],
            manipulations: vec![ManipulationEntry {
                name: "Inclusion".to_string(),
                samples: 2,
                date: None,
                session: None,
            }],
            ..Team::default()
        })
        .unwrap();

    let aggregate = billing::calculate_total(&facility.teams().list(), &facility.tariffs().config());
    let csv = report_to_csv(&aggregate, ',');

    assert!(csv.contains("microscope,Tecnai 200 KV,3,180.00"));
    assert!(csv.contains("service,Inclusion,2,50.00"));
    assert!(csv.contains("total,subtotal,,230.00"));
    assert!(csv.contains("total,total,,230.00"));
}

#[test]
fn test_export_bundle_restores_everything() {
    let source = Facility::in_memory();
    source
        .teams()
        .add(Team {
            name: "Alpha".to_string(),
            laboratory: "CBI".to_string(),
            microscope_sessions: vec![1],
            ..Team::default()
        })
        .unwrap();
    source
        .tariffs()
        .add_item(ItemCategory::Microscopes, "Titan Krios", None);
    source.storage().save("ui_theme", &"dark");

    let backup = source.export_json().unwrap();

    let target = Facility::in_memory();
    target.import(&backup).unwrap();

    assert_eq!(target.teams().count(), 1);
    assert!(target
        .tariffs()
        .config()
        .microscopes
        .iter()
        .any(|name| name == "Titan Krios"));
    let theme: String = target.storage().load("ui_theme", String::new());
    assert_eq!(theme, "dark");
}

#[test]
fn test_import_rejects_unversioned_payload() {
    let facility = Facility::in_memory();
    facility
        .teams()
        .add(Team {
            name: "Alpha".to_string(),
            laboratory: "CBI".to_string(),
            ..Team::default()
        })
        .unwrap();

    let result = facility.import(r#"{"state": {"teams": []}}"#);
    assert!(result.is_err());
    assert_eq!(facility.teams().count(), 1);
}
