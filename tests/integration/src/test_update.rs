//! Update compilation with derived statements, deduplication and conditions.

#[cfg(test)]
mod tests {
    use dynamap_core::{
        CompilerConfig, Condition, Entity, ExpressionError, Path, Update, UpdateStatement,
        ValueExpr,
    };
    use dynamap_model::AttributeValue;

    use crate::{Department, DepartmentPath, Employee, init_tracing, sample_department};

    #[test]
    fn test_should_keep_only_last_write_for_a_path() -> anyhow::Result<()> {
        init_tracing();
        let update = Update::new()
            .set(DepartmentPath.name(), "v1")
            .set(DepartmentPath.name(), "v2");
        let compiled =
            update.compile(Department::registry(), None, &CompilerConfig::default())?;
        assert_eq!(compiled.update_expression.as_deref(), Some("SET #A = :C"));
        assert_eq!(
            compiled.values.values().collect::<Vec<_>>(),
            [&AttributeValue::string("v2")]
        );
        Ok(())
    }

    #[test]
    fn test_should_merge_derived_and_explicit_statements() -> anyhow::Result<()> {
        init_tracing();
        let employee = Employee {
            id: "E1".to_owned(),
            name: "Han".to_owned(),
            level: 4,
            ..Employee::default()
        };
        let registry = Employee::registry();
        let update = registry
            .derive_update(&employee)?
            .add(Path::attr("badges"), 1_u64)
            .remove(Path::attr("nicknames"));
        assert!(update.statements().iter().all(|s| s.path().to_string() != "id"));

        let compiled = update.compile(registry, None, &CompilerConfig::default())?;
        let expression = compiled.update_expression.unwrap_or_default();
        assert_eq!(
            expression,
            "SET #A = :B, #C = :D, #E = :F, #G = :H, #K = :L ADD #I :O REMOVE #M"
        );
        assert_eq!(compiled.names.len(), 7);
        assert_eq!(compiled.values.len(), 6);
        Ok(())
    }

    #[test]
    fn test_should_share_namespace_between_update_and_condition() -> anyhow::Result<()> {
        let update = Update::new()
            .set(
                DepartmentPath.budget(),
                ValueExpr::path(DepartmentPath.budget()).minus(250_i64),
            )
            .set_if_empty(DepartmentPath.head().name(), "Vacant");
        let condition = Condition::ge(DepartmentPath.budget(), 250_i64)
            .and_also(Condition::exists(DepartmentPath.head()));
        let compiled = update.compile(
            Department::registry(),
            Some(&condition),
            &CompilerConfig::default(),
        )?;
        assert_eq!(
            compiled.update_expression.as_deref(),
            Some("SET #A = #A - :B, #C.#D = if_not_exists(#C.#D, :E)")
        );
        assert_eq!(
            compiled.condition_expression.as_deref(),
            Some("( #A >= :F ) and ( attribute_exists(#C) )")
        );
        assert_eq!(compiled.names.len(), 3);
        assert_eq!(compiled.values.len(), 3);
        Ok(())
    }

    #[test]
    fn test_should_update_list_elements_and_sets() -> anyhow::Result<()> {
        let employees = DepartmentPath.employees();
        let update = Update::new()
            .set(employees.at(0).salary(), 90_000.0_f64)
            .remove(employees.at(1).id())
            .add(Path::attr("floors"), AttributeValue::Ns(vec!["9".to_owned()]))
            .delete(DepartmentPath.labels(), AttributeValue::Ss(vec!["old".to_owned()]));
        let compiled =
            update.compile(Department::registry(), None, &CompilerConfig::default())?;
        assert_eq!(
            compiled.update_expression.as_deref(),
            Some("SET #A[0].#B = :C ADD #E :F REMOVE #A[1].#D DELETE #G :H")
        );
        Ok(())
    }

    #[test]
    fn test_should_reject_removing_key() {
        let update = Update::new().push(UpdateStatement::Remove {
            path: Path::attr("id"),
        });
        assert_eq!(
            update.compile(Department::registry(), None, &CompilerConfig::default()),
            Err(ExpressionError::KeyUpdate {
                field: "id".to_owned()
            })
        );
    }

    #[test]
    fn test_should_derive_nested_values_as_maps() -> anyhow::Result<()> {
        let department = sample_department();
        let update = Department::registry().derive_update(&department)?;
        let head = update
            .statements()
            .iter()
            .find(|s| s.path().to_string() == "head")
            .ok_or_else(|| anyhow::anyhow!("head statement missing"))?;
        let UpdateStatement::Set {
            value: ValueExpr::Constant(AttributeValue::M(map)),
            overwrite: true,
            ..
        } = head
        else {
            anyhow::bail!("unexpected head statement: {head:?}");
        };
        assert_eq!(map["name"], AttributeValue::string("Obi"));
        Ok(())
    }
}
