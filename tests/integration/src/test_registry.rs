//! Registry round trips for nested and recursive entities.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use dynamap_core::{Entity, EntitySchema, FieldShape, MappingError};
    use dynamap_model::{AttributeType, AttributeValue};

    use crate::{Department, Employee, init_tracing, sample_department};

    #[test]
    fn test_should_roundtrip_department() {
        init_tracing();
        let department = sample_department();
        let registry = Department::registry();
        let wire = registry.export(&department).unwrap();
        assert_eq!(registry.transform(&wire).unwrap(), department);
    }

    #[test]
    fn test_should_roundtrip_defaults_and_absent_fields() {
        let registry = Department::registry();
        let empty = Department::default();
        let wire = registry.export(&empty).unwrap();
        assert!(!wire.contains_key("head"));
        assert!(!wire.contains_key("logo"));
        assert_eq!(wire["employees"], AttributeValue::L(Vec::new()));
        assert_eq!(registry.transform(&wire).unwrap(), empty);
    }

    #[test]
    fn test_should_export_wire_shapes() {
        let wire = Department::registry().export(&sample_department()).unwrap();
        assert_eq!(wire["budget"], AttributeValue::number("-1500"));
        assert_eq!(
            wire["floors"],
            AttributeValue::Ns(vec!["3".to_owned(), "7".to_owned()])
        );
        assert_eq!(
            wire["labels"],
            AttributeValue::Ss(vec!["core".to_owned(), "ops".to_owned()])
        );

        let employees = wire["employees"].as_l().unwrap();
        let han = employees[0].as_m().unwrap();
        assert_eq!(han["rating"], AttributeValue::number("3.25"));
        assert!(!han.contains_key("age"));
        let manager = han["manager"].as_m().unwrap();
        assert_eq!(manager["name"], AttributeValue::string("Obi"));
        assert!(!manager.contains_key("manager"));
    }

    #[test]
    fn test_should_decode_from_json_item() {
        let json = r#"{
            "id": {"S": "D9"},
            "name": {"S": "Archive"},
            "budget": {"N": "42"},
            "logo": {"B": "AAE="},
            "legacy_flag": {"BOOL": true},
            "head": {"NULL": true},
            "employees": {"L": [{"M": {"id": {"S": "E9"}, "level": {"N": "2"}}}]}
        }"#;
        let item: HashMap<String, AttributeValue> = serde_json::from_str(json).unwrap();
        let department = Department::registry().transform(&item).unwrap();
        assert_eq!(department.id, "D9");
        assert_eq!(department.budget, 42);
        assert_eq!(department.logo.as_deref(), Some(&b"\x00\x01"[..]));
        assert_eq!(department.head, None);
        assert_eq!(department.employees[0].level, 2);
    }

    #[test]
    fn test_should_report_nested_decoding_failure() {
        let item = HashMap::from([(
            "head".to_owned(),
            AttributeValue::M(HashMap::from([(
                "level".to_owned(),
                AttributeValue::number("-1"),
            )])),
        )]);
        let err = Department::registry().transform(&item).unwrap_err();
        assert!(matches!(err, MappingError::Nested { ref field, .. } if field == "head"));
        assert_eq!(err.to_string(), "field 'head': field 'level': invalid number '-1'");
    }

    #[test]
    fn test_should_name_list_element_with_unencodable_number() {
        let mut department = sample_department();
        department.employees[0].rating = f32::INFINITY;
        let err = Department::registry().export(&department).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field 'employees[0]': field 'rating': invalid number 'inf'"
        );
    }

    #[test]
    fn test_should_export_only_keys() {
        let employee = Employee {
            id: "A1".to_owned(),
            name: "Han".to_owned(),
            ..Employee::default()
        };
        let registry = Employee::registry();
        let keys = registry.export_keys(&employee).unwrap();
        assert_eq!(
            keys,
            HashMap::from([("id".to_owned(), AttributeValue::string("A1"))])
        );
        let full = registry.export(&employee).unwrap();
        assert_eq!(full["id"], AttributeValue::string("A1"));
        assert_eq!(full["name"], AttributeValue::string("Han"));
    }

    #[test]
    fn test_should_expose_recursive_schema() {
        let schema: &dyn EntitySchema = Employee::registry();
        let manager = schema.field("manager").unwrap();
        let FieldShape::Entity(nested) = manager.shape else {
            panic!("manager should be a nested entity");
        };
        assert_eq!(nested().entity_name(), "Employee");
        assert_eq!(
            nested().field("salary").unwrap().shape.wire_type(),
            AttributeType::N
        );
    }
}
