// ==========================================
// Equipment import - integration tests
// ==========================================


use fieldops_stock::api::{ApiError, SupplyRequest};
use fieldops_stock::app::AppState;
use fieldops_stock::domain::{EquipmentStatus, Sku};
use fieldops_stock::importer::SkipReason;
use std::io::Write;
use test_helpers::{create_test_db, open_shared, seed_crew, seed_equipment};

fn inventory_csv(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

#[tokio::test]
async fn test_import_then_resupply() {
    let (_db, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    seed_crew(&conn, "C1", "K1 NORTE", "Ana");
    let state = AppState::new(db_path).unwrap();

    let file = inventory_csv(&[
        "SN,equipo,descripcion,ubicacion,f_ingreso",
        "S001,ONT,ONT HUAWEI HG8145,almacen,2024-03-05",
        "S002,,ONT HUAWEI HG8145,,05/03/2024",
        "S003,ONT,,k1 norte,",
        "S004,MESH,,instalado,",
        "S005,ONT,,bodega lima,",
        "S001,ONT,,almacen,",
        "S006,,cable drop,almacen,",
    ]);

    let report = state.import_api.import_equipment(file.path()).await.unwrap();
    assert_eq!(report.total_rows, 7);
    assert_eq!(report.imported, 5);
    assert_eq!(report.invalid_locations, vec!["S005".to_string()]);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.skipped[0].reason, SkipReason::DuplicateInFile);

    let field = state
        .equipment_repo
        .list_by_status(&EquipmentStatus::Campo)
        .unwrap();
    assert_eq!(field.len(), 1);
    assert_eq!(field[0].location, "K1 NORTE");

    // S001, S002, S005 sit in the warehouse; C1 holds S003
    let response = state
        .supply_api
        .compute_resupply(&SupplyRequest::default())
        .await
        .unwrap();
    assert_eq!(response.warehouse.get(Sku::Ont), 3);
    assert_eq!(response.rows[0].current.get(Sku::Ont), 1);
    assert_eq!(response.rows[0].suggested.get(Sku::Ont), 3);

    // second run: everything already stored
    let again = state.import_api.import_equipment(file.path()).await.unwrap();
    assert_eq!(again.imported, 0);
    assert!(again
        .skipped
        .iter()
        .any(|s| s.reason == SkipReason::AlreadyStored));
}

#[tokio::test]
async fn test_excluded_locations_stay_out_of_warehouse_supply() {
    let (_db, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    seed_crew(&conn, "C1", "K1 NORTE", "Ana");
    let state = AppState::new(db_path).unwrap();

    let file = inventory_csv(&[
        "SN,equipo,descripcion,ubicacion,f_ingreso",
        "S1,ONT,,robo,",
        "S2,ONT,,garantía,",
        "S3,ONT,,almacen,",
        "S4,ONT,,almacen,",
    ]);
    let report = state.import_api.import_equipment(file.path()).await.unwrap();
    assert_eq!(report.imported, 4);
    assert!(report.invalid_locations.is_empty());

    let stored = state.equipment_repo.find_by_serial("S2").unwrap().unwrap();
    assert_eq!(stored.status, EquipmentStatus::Almacen);
    assert_eq!(stored.location, "garantía");

    let response = state
        .supply_api
        .compute_resupply(&SupplyRequest::default())
        .await
        .unwrap();
    assert_eq!(response.warehouse.get(Sku::Ont), 2);
    assert_eq!(response.rows[0].suggested.get(Sku::Ont), 2);

    // an operator reports S3 stolen: one unit left to dispatch
    let moved = state.equipment_api.relocate("S3", "Robo").await.unwrap();
    assert_eq!(moved.location, "Robo");
    assert_eq!(moved.status, EquipmentStatus::Almacen);
    let response = state
        .supply_api
        .compute_resupply(&SupplyRequest::default())
        .await
        .unwrap();
    assert_eq!(response.warehouse.get(Sku::Ont), 1);

    // back from warranty and handed to the crew
    let moved = state.equipment_api.relocate("S2", "k1 norte").await.unwrap();
    assert_eq!(moved.status, EquipmentStatus::Campo);
    assert_eq!(moved.location, "K1 NORTE");
    let response = state
        .supply_api
        .compute_resupply(&SupplyRequest::default())
        .await
        .unwrap();
    assert_eq!(response.rows[0].current.get(Sku::Ont), 1);
}

#[tokio::test]
async fn test_relocate_rejects_unknown_targets() {
    let (_db, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path);
    seed_equipment(&conn, "W", Sku::Box, EquipmentStatus::Almacen, "almacen", 1);
    let state = AppState::new(db_path).unwrap();

    let err = state
        .equipment_api
        .relocate("W-BOX-0000", "bodega lima")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    let err = state
        .equipment_api
        .relocate("NOPE", "almacen")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let item = state
        .equipment_api
        .relocate("W-BOX-0000", "pérdida")
        .await
        .unwrap();
    assert_eq!(item.location, "pérdida");
}

#[tokio::test]
async fn test_import_rejects_bad_files() {
    let (_db, db_path) = create_test_db().unwrap();
    let state = AppState::new(db_path).unwrap();

    let err = state
        .import_api
        .import_equipment(std::path::Path::new("/nonexistent/inventario.csv"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ImportError(_)));

    let no_serial = inventory_csv(&["equipo,ubicacion", "ONT,almacen"]);
    let err = state
        .import_api
        .import_equipment(no_serial.path())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ImportError(ref m) if m.contains("sn")));
}
