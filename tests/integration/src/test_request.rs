//! Assembled requests and their JSON wire form.

#[cfg(test)]
mod tests {
    use dynamap_core::{
        CompilerConfig, Condition, ExpressionError, Get, Path, Query, Scan, Table, Update,
    };
    use dynamap_model::{AttributeValue, DynamoDBOperation, Request};
    use serde_json::{Value, json};

    use crate::{Department, DepartmentPath, init_tracing, sample_department};

    fn table() -> Table<Department> {
        init_tracing();
        Table::new("departments")
    }

    fn to_value(request: impl Into<Request>) -> anyhow::Result<Value> {
        Ok(serde_json::from_str(&request.into().to_json()?)?)
    }

    #[test]
    fn test_should_serialize_conditional_update() -> anyhow::Result<()> {
        let key = Department {
            id: "D1".to_owned(),
            ..Department::default()
        };
        let update = Update::new()
            .set(DepartmentPath.name(), "Ops")
            .remove(Path::attr("logo"));
        let condition = Condition::exists(Path::attr("id"));
        let input = table().update(&key, &update, Some(&condition))?;

        let request = Request::from(input);
        assert_eq!(request.operation(), DynamoDBOperation::UpdateItem);
        assert_eq!(request.target(), "DynamoDB_20120810.UpdateItem");
        assert_eq!(
            to_value(request)?,
            json!({
                "TableName": "departments",
                "Key": {"id": {"S": "D1"}},
                "UpdateExpression": "SET #A = :B REMOVE #C",
                "ConditionExpression": "attribute_exists(#ID)",
                "ExpressionAttributeNames": {"#A": "name", "#C": "logo", "#ID": "id"},
                "ExpressionAttributeValues": {":B": {"S": "Ops"}}
            })
        );
        Ok(())
    }

    #[test]
    fn test_should_serialize_put_with_full_item() -> anyhow::Result<()> {
        let department = sample_department();
        let input = table().put(&department, None)?;
        let value = to_value(input)?;
        assert_eq!(value["Item"]["logo"], json!({"B": "iVBORw=="}));
        assert_eq!(value["Item"]["floors"], json!({"NS": ["3", "7"]}));
        assert_eq!(
            value["Item"]["employees"]["L"][0]["M"]["manager"]["M"]["name"],
            json!({"S": "Obi"})
        );
        assert!(value.get("ExpressionAttributeNames").is_none());
        assert!(value.get("ConditionExpression").is_none());
        Ok(())
    }

    #[test]
    fn test_should_serialize_query_on_index() -> anyhow::Result<()> {
        let query = Query::new(Condition::eq(DepartmentPath.name(), "Ops"))
            .index("by-name")
            .filter(Condition::between(DepartmentPath.budget(), 0_i64, 1_000_i64))
            .project([Path::attr("id"), DepartmentPath.head().name()])
            .limit(5)
            .descending();
        let input = table().query(&query)?;
        assert_eq!(
            to_value(input)?,
            json!({
                "TableName": "departments",
                "IndexName": "by-name",
                "KeyConditionExpression": "#A = :B",
                "FilterExpression": "#C between :D and :E",
                "ProjectionExpression": "#ID, #F.#A",
                "ExpressionAttributeNames": {
                    "#A": "name", "#C": "budget", "#F": "head", "#ID": "id"
                },
                "ExpressionAttributeValues": {
                    ":B": {"S": "Ops"}, ":D": {"N": "0"}, ":E": {"N": "1000"}
                },
                "ScanIndexForward": false,
                "Limit": 5
            })
        );
        Ok(())
    }

    #[test]
    fn test_should_serialize_scan_and_get() -> anyhow::Result<()> {
        let scan = Scan::new()
            .filter(Condition::contains(DepartmentPath.labels(), "ops"))
            .consistent_read();
        let input = table().scan(&scan)?;
        assert_eq!(input.filter_expression.as_deref(), Some("contains(#A, :B)"));
        assert_eq!(input.consistent_read, Some(true));

        let get = table().get(&sample_department())?;
        assert_eq!(
            to_value(get)?,
            json!({"TableName": "departments", "Key": {"id": {"S": "D1"}}})
        );
        Ok(())
    }

    #[test]
    fn test_should_serialize_consistent_projected_get() -> anyhow::Result<()> {
        let get = Get::new()
            .project([DepartmentPath.employees().at(0).name()])
            .consistent_read();
        let input = table().read(&sample_department(), &get)?;
        assert_eq!(
            to_value(input)?,
            json!({
                "TableName": "departments",
                "Key": {"id": {"S": "D1"}},
                "ConsistentRead": true,
                "ProjectionExpression": "#A[0].#B",
                "ExpressionAttributeNames": {"#A": "employees", "#B": "name"}
            })
        );
        Ok(())
    }

    #[test]
    fn test_should_save_without_touching_keys() -> anyhow::Result<()> {
        let department = Department {
            id: "D2".to_owned(),
            name: "Archive".to_owned(),
            budget: 10,
            ..Department::default()
        };
        let input = table().save(&department, Some(&Condition::not_exists(Path::attr("name"))))?;
        assert_eq!(input.key.len(), 1);
        assert_eq!(
            input.condition_expression.as_deref(),
            Some("attribute_not_exists(#A)")
        );
        let expression = input.update_expression.unwrap_or_default();
        assert!(expression.starts_with("SET #A = :B, #C = :D"));
        assert!(!input.expression_attribute_names.contains_key("#ID"));
        Ok(())
    }

    #[test]
    fn test_should_delete_with_condition() -> anyhow::Result<()> {
        let condition = Condition::le(DepartmentPath.budget(), 0_i64);
        let input = table().delete(&sample_department(), Some(&condition))?;
        assert_eq!(input.condition_expression.as_deref(), Some("#A <= :B"));
        assert_eq!(
            input.expression_attribute_values[":B"],
            AttributeValue::number(0)
        );
        Ok(())
    }

    #[test]
    fn test_should_honor_configured_alphabet() -> anyhow::Result<()> {
        let table = Table::<Department>::with_config(
            "departments",
            CompilerConfig::default().with_alphabet("pq"),
        );
        let update = Update::new()
            .set(DepartmentPath.name(), "a")
            .set(DepartmentPath.budget(), 1_i64);
        let input = table.update(&sample_department(), &update, None)?;
        assert_eq!(
            input.update_expression.as_deref(),
            Some("SET #p = :q, #pp = :pq")
        );
        Ok(())
    }

    #[test]
    fn test_should_fail_before_producing_a_request() {
        let bad = Table::<Department>::with_config("departments", CompilerConfig::default().with_alphabet(""));
        let result = bad.delete(&sample_department(), Some(&Condition::exists(Path::attr("name"))));
        assert!(matches!(result, Err(ExpressionError::Allocation { .. })));

        let unknown = table().scan(&Scan::new().project([Path::attr("floor")]));
        assert_eq!(
            unknown,
            Err(ExpressionError::UnknownField {
                field: "floor".to_owned(),
                entity: "Department".to_owned(),
            })
        );
    }
}
