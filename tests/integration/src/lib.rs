//! End-to-end tests for dynamap.
//!
//! Each test compiles complete requests for the sample entities below and
//! checks the resulting wire fragments. Nothing is sent anywhere; the tests
//! run as part of a normal `cargo test`:
//! ```text
//! cargo test -p dynamap-integration
//! ```

use std::collections::BTreeSet;
use std::sync::{LazyLock, Once};

use bytes::Bytes;
use dynamap_core::{Collection, Entity, FieldRegistry, FieldSpec, Path};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A staff member. Managers are employees too.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Employee {
    /// Hash key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Age in years, when known.
    pub age: Option<i32>,
    /// Performance rating.
    pub rating: f32,
    /// Yearly salary.
    pub salary: f64,
    /// Pay grade.
    pub level: u32,
    /// Lifetime badge count.
    pub badges: u64,
    /// Whether the employee is currently active.
    pub active: bool,
    /// Informal names, in preference order.
    pub nicknames: Vec<String>,
    /// Direct manager.
    pub manager: Option<Box<Employee>>,
}

impl Entity for Employee {
    fn registry() -> &'static FieldRegistry<Self> {
        static REGISTRY: LazyLock<FieldRegistry<Employee>> = LazyLock::new(|| {
            FieldRegistry::builder("Employee")
                .field(FieldSpec::key("id"), |e: &Employee| &e.id, |e, v| e.id = v)
                .field(FieldSpec::new("name"), |e: &Employee| &e.name, |e, v| e.name = v)
                .optional(FieldSpec::new("age"), |e: &Employee| e.age.as_ref(), |e, v| e.age = Some(v))
                .field(FieldSpec::new("rating"), |e: &Employee| &e.rating, |e, v| e.rating = v)
                .field(FieldSpec::new("salary"), |e: &Employee| &e.salary, |e, v| e.salary = v)
                .field(FieldSpec::new("level"), |e: &Employee| &e.level, |e, v| e.level = v)
                .field(FieldSpec::new("badges"), |e: &Employee| &e.badges, |e, v| e.badges = v)
                .field(FieldSpec::new("active"), |e: &Employee| &e.active, |e, v| e.active = v)
                .field(
                    FieldSpec::new("nicknames"),
                    |e: &Employee| &e.nicknames,
                    |e, v| e.nicknames = v,
                )
                .entity(
                    FieldSpec::new("manager"),
                    |e: &Employee| e.manager.as_deref(),
                    |e, m| e.manager = Some(Box::new(m)),
                )
                .build()
                .unwrap_or_else(|e| panic!("invalid employee registry: {e}"))
        });
        &REGISTRY
    }
}

/// A department with its staff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Department {
    /// Hash key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Yearly budget in cents.
    pub budget: i64,
    /// Head of the department.
    pub head: Option<Employee>,
    /// All employees.
    pub employees: Vec<Employee>,
    /// Free-form labels.
    pub labels: BTreeSet<String>,
    /// Office floor numbers.
    pub floors: BTreeSet<i64>,
    /// Encoded logo image.
    pub logo: Option<Bytes>,
}

impl Entity for Department {
    fn registry() -> &'static FieldRegistry<Self> {
        static REGISTRY: LazyLock<FieldRegistry<Department>> = LazyLock::new(|| {
            FieldRegistry::builder("Department")
                .field(
                    FieldSpec::key("id").short_code("ID"),
                    |d: &Department| &d.id,
                    |d, v| d.id = v,
                )
                .field(FieldSpec::new("name"), |d: &Department| &d.name, |d, v| d.name = v)
                .field(FieldSpec::new("budget"), |d: &Department| &d.budget, |d, v| d.budget = v)
                .entity(
                    FieldSpec::new("head"),
                    |d: &Department| d.head.as_ref(),
                    |d, e| d.head = Some(e),
                )
                .entity_list(
                    FieldSpec::new("employees"),
                    |d: &Department| d.employees.as_slice(),
                    |d, v| d.employees = v,
                )
                .field(FieldSpec::new("labels"), |d: &Department| &d.labels, |d, v| d.labels = v)
                .field(FieldSpec::new("floors"), |d: &Department| &d.floors, |d, v| d.floors = v)
                .optional(
                    FieldSpec::new("logo"),
                    |d: &Department| d.logo.as_ref(),
                    |d, v| d.logo = Some(v),
                )
                .build()
                .unwrap_or_else(|e| panic!("invalid department registry: {e}"))
        });
        &REGISTRY
    }
}

/// Typed paths into an [`Employee`] document.
#[derive(Debug, Clone)]
pub struct EmployeePath(Path);

impl EmployeePath {
    /// Paths relative to `base`.
    #[must_use]
    pub fn new(base: Path) -> Self {
        Self(base)
    }

    /// `id`
    #[must_use]
    pub fn id(&self) -> Path {
        self.0.field("id")
    }

    /// `name`
    #[must_use]
    pub fn name(&self) -> Path {
        self.0.field("name")
    }

    /// `salary`
    #[must_use]
    pub fn salary(&self) -> Path {
        self.0.field("salary")
    }

    /// `manager`
    #[must_use]
    pub fn manager(&self) -> EmployeePath {
        Self(self.0.field("manager"))
    }

    /// `nicknames`
    #[must_use]
    pub fn nicknames(&self) -> Collection<Path> {
        self.0.collection("nicknames", Path::alias)
    }
}

impl From<EmployeePath> for Path {
    fn from(path: EmployeePath) -> Self {
        path.0
    }
}

impl From<&EmployeePath> for Path {
    fn from(path: &EmployeePath) -> Self {
        path.0.clone()
    }
}

/// Typed paths into a [`Department`] document.
#[derive(Debug, Clone, Copy)]
pub struct DepartmentPath;

impl DepartmentPath {
    /// `head`
    #[must_use]
    pub fn head(self) -> EmployeePath {
        EmployeePath::new(Path::attr("head"))
    }

    /// `employees`
    #[must_use]
    pub fn employees(self) -> Collection<EmployeePath> {
        Path::root().collection("employees", EmployeePath::new)
    }

    /// `name`
    #[must_use]
    pub fn name(self) -> Path {
        Path::attr("name")
    }

    /// `budget`
    #[must_use]
    pub fn budget(self) -> Path {
        Path::attr("budget")
    }

    /// `labels`
    #[must_use]
    pub fn labels(self) -> Path {
        Path::attr("labels")
    }
}

/// A fully populated department used across tests.
#[must_use]
pub fn sample_department() -> Department {
    let obi = Employee {
        id: "E0".to_owned(),
        name: "Obi".to_owned(),
        age: Some(57),
        rating: 4.5,
        salary: 120_000.5,
        level: 9,
        badges: 12,
        active: false,
        ..Employee::default()
    };
    let han = Employee {
        id: "E1".to_owned(),
        name: "Han".to_owned(),
        age: None,
        rating: 3.25,
        salary: 85_000.0,
        level: 4,
        badges: 3,
        active: true,
        nicknames: vec!["solo".to_owned(), "captain".to_owned()],
        manager: Some(Box::new(obi.clone())),
    };
    Department {
        id: "D1".to_owned(),
        name: "Logistics".to_owned(),
        budget: -1_500,
        head: Some(obi),
        employees: vec![han],
        labels: ["core", "ops"].iter().map(|s| (*s).to_owned()).collect(),
        floors: [3, 7].into_iter().collect(),
        logo: Some(Bytes::from_static(b"\x89PNG")),
    }
}

mod test_condition;
mod test_registry;
mod test_request;
mod test_update;
