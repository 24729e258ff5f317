//! Shared catalogs for bridge integration tests

use puppini_catalog::{load_catalog, LoadOptions, MockCatalog, MockTable};
use puppini_core::{Catalog, LogicalType, Row};

/// The bundled retail snowflake fixture
pub const RETAIL_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../demos/retail_catalog.json"
));

pub fn retail_provider() -> MockCatalog {
    MockCatalog::from_json_str(RETAIL_JSON).expect("retail fixture is valid")
}

pub async fn load(provider: &MockCatalog) -> Catalog {
    load_catalog(provider, &LoadOptions::default())
        .await
        .expect("mock catalog loads")
}

/// Employee and Department referencing each other; employee 7 manages
/// department 3 and works in it
pub fn cyclic_provider() -> MockCatalog {
    MockCatalog::from_tables(vec![
        MockTable::new("Employee")
            .column("EmployeeID", LogicalType::Int)
            .column("DepartmentID", LogicalType::Int)
            .column("Salary", LogicalType::Float)
            .primary_key(&["EmployeeID"])
            .foreign_key("fk_employee_department", "DepartmentID", "Department", "DepartmentID")
            .row(
                Row::new()
                    .with("EmployeeID", 7i64)
                    .with("DepartmentID", 3i64)
                    .with("Salary", 5200.0),
            ),
        MockTable::new("Department")
            .column("DepartmentID", LogicalType::Int)
            .column("ManagerID", LogicalType::Int)
            .primary_key(&["DepartmentID"])
            .foreign_key("fk_department_manager", "ManagerID", "Employee", "EmployeeID")
            .row(Row::new().with("DepartmentID", 3i64).with("ManagerID", 7i64)),
    ])
}
