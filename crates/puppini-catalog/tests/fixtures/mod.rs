//! Test fixtures for catalog provider integration tests
//!
//! The retail fixture is a small snowflake schema: one fact table, a store
//! dimension hanging off geography, and a three-level product hierarchy.

use puppini_catalog::{MockCatalog, MockTable};
use puppini_core::{LogicalType, Row};

/// The bundled retail snowflake fixture
pub const RETAIL_JSON: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../demos/retail_catalog.json"
));

/// Provider loaded from the retail fixture
pub fn retail_catalog() -> MockCatalog {
    MockCatalog::from_json_str(RETAIL_JSON).expect("retail fixture is valid")
}

/// Two tables referencing each other
///
/// Represents a cycle:
/// - Employee.DepartmentID -> Department
/// - Department.ManagerID -> Employee
pub fn cyclic_tables() -> Vec<MockTable> {
    vec![
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
    ]
}

/// A table without a primary key
pub fn keyless_table() -> MockTable {
    MockTable::new("audit_log")
        .column("Message", LogicalType::String)
        .column("Elapsed", LogicalType::Float)
        .row(Row::new().with("Message", "rebuild").with("Elapsed", 1.5))
}
