//! Sample entities shared by the unit tests.

use std::sync::LazyLock;

use crate::registry::{Entity, FieldRegistry, FieldSpec};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Employee {
    pub id: String,
    pub name: String,
    pub age: Option<i64>,
    pub salary: f64,
    pub active: bool,
    pub tags: Vec<String>,
    pub manager: Option<Box<Employee>>,
    pub reports: Vec<Employee>,
}

impl Entity for Employee {
    fn registry() -> &'static FieldRegistry<Self> {
        static REGISTRY: LazyLock<FieldRegistry<Employee>> = LazyLock::new(|| {
            FieldRegistry::builder("Employee")
                .field(FieldSpec::key("id"), |e: &Employee| &e.id, |e, v| e.id = v)
                .field(FieldSpec::new("name"), |e: &Employee| &e.name, |e, v| e.name = v)
                .optional(FieldSpec::new("age"), |e: &Employee| e.age.as_ref(), |e, v| e.age = Some(v))
                .field(FieldSpec::new("salary"), |e: &Employee| &e.salary, |e, v| e.salary = v)
                .field(FieldSpec::new("active"), |e: &Employee| &e.active, |e, v| e.active = v)
                .field(FieldSpec::new("tags"), |e: &Employee| &e.tags, |e, v| e.tags = v)
                .entity(
                    FieldSpec::new("manager"),
                    |e: &Employee| e.manager.as_deref(),
                    |e, m| e.manager = Some(Box::new(m)),
                )
                .entity_list(
                    FieldSpec::new("reports"),
                    |e: &Employee| e.reports.as_slice(),
                    |e, v| e.reports = v,
                )
                .build()
                .expect("valid employee registry")
        });
        &REGISTRY
    }
}
