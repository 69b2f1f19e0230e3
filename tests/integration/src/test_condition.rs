//! Condition compilation over nested and typed paths.

#[cfg(test)]
mod tests {
    use dynamap_core::{
        CompareOp, CompilerConfig, Condition, Entity, ExpressionContext, ExpressionError, Path,
    };
    use dynamap_model::{AttributeType, AttributeValue};

    use crate::{Department, DepartmentPath, init_tracing};

    fn compile(condition: &Condition) -> Result<dynamap_core::CompiledCondition, ExpressionError> {
        init_tracing();
        condition.compile(Department::registry(), &CompilerConfig::default())
    }

    #[test]
    fn test_should_compile_through_typed_collection_paths() -> anyhow::Result<()> {
        let d = DepartmentPath;
        let condition = Condition::eq(d.employees().at(5).name(), "Han")
            .and_also(Condition::gt(d.employees().at(5).manager().salary(), 1_000.0_f64));
        let compiled = compile(&condition)?;
        assert_eq!(
            compiled.expression,
            "( #A[5].#B = :C ) and ( #A[5].#D.#E > :F )"
        );
        assert_eq!(compiled.names["#A"], "employees");
        assert_eq!(compiled.names["#D"], "manager");
        assert_eq!(compiled.values[":F"], AttributeValue::number("1000"));
        Ok(())
    }

    #[test]
    fn test_should_prefer_registry_short_codes() -> anyhow::Result<()> {
        let condition = Condition::eq(Path::attr("id"), "D1")
            .and_also(Condition::exists(Path::attr("name")));
        let compiled = compile(&condition)?;
        assert_eq!(
            compiled.expression,
            "( #ID = :A ) and ( attribute_exists(#B) )"
        );
        Ok(())
    }

    #[test]
    fn test_should_address_primitive_list_elements() -> anyhow::Result<()> {
        let nickname = DepartmentPath.head().nicknames().at(0);
        let compiled = compile(&Condition::begins_with(nickname, "so"))?;
        assert_eq!(compiled.expression, "begins_with(#A.#B[0], :C)");
        Ok(())
    }

    #[test]
    fn test_should_wrap_group_operands() -> anyhow::Result<()> {
        let x = Condition::exists(Path::attr("name"));
        let y = Condition::compare_to_field(Path::attr("budget"), CompareOp::Ge, Path::attr("budget"));
        assert_eq!(
            compile(&Condition::and([x.clone(), y]))?.expression,
            "( attribute_exists(#A) ) and ( #B >= #B )"
        );
        assert_eq!(compile(&Condition::or([x.clone()]))?.expression, "( attribute_exists(#A) )");
        assert_eq!(compile(&Condition::not(x))?.expression, "NOT (attribute_exists(#A))");
        Ok(())
    }

    #[test]
    fn test_should_type_check_sets_and_binary() {
        let labels = Condition::eq(
            DepartmentPath.labels(),
            AttributeValue::Ss(vec!["ops".to_owned()]),
        );
        assert!(compile(&labels).is_ok());

        let wrong = Condition::eq(DepartmentPath.labels(), "ops");
        assert_eq!(
            compile(&wrong),
            Err(ExpressionError::TypeMismatch {
                path: "labels".to_owned(),
                expected: AttributeType::Ss,
                actual: AttributeType::S,
            })
        );

        let logo = Condition::is_type(Path::attr("logo"), AttributeType::B);
        let compiled = compile(&logo).unwrap();
        assert_eq!(compiled.values[":B"], AttributeValue::string("B"));
    }

    #[test]
    fn test_should_reject_field_below_scalar() {
        let path = DepartmentPath.employees().at(0).manager().id().field("nope");
        assert_eq!(
            compile(&Condition::exists(path)),
            Err(ExpressionError::UnknownField {
                field: "nope".to_owned(),
                entity: "id".to_owned(),
            })
        );
    }

    #[test]
    fn test_should_reject_index_on_map() {
        let path = DepartmentPath.head().manager().id();
        assert!(compile(&Condition::exists(path)).is_ok());

        let indexed = Path::attr("head").index(0).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            compile(&Condition::exists(indexed)),
            Err(ExpressionError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_should_keep_names_stable_across_request_context() -> anyhow::Result<()> {
        let schema = Department::registry();
        let mut ctx = ExpressionContext::new(&CompilerConfig::default().with_alphabet("xyz"));
        let key = Condition::eq(Path::attr("id"), "D1").prepare(&mut ctx, schema)?;
        let filter = Condition::ne(Path::attr("name"), "Old")
            .or_else(Condition::eq(Path::attr("id"), "D2"))
            .prepare(&mut ctx, schema)?;
        assert_eq!(key.serialize(), "#ID = :x");
        assert_eq!(filter.serialize(), "( #y <> :z ) or ( #ID = :xx )");
        assert_eq!(ctx.allocated(), 4);
        Ok(())
    }
}
