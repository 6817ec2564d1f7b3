//! End-to-end propagation tests over hand-built query shapes.

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use shroud_core::{
    AmbiguityMode, AnalysisConfig, CaseSensitivity, ColumnRef, ColumnSchema, CteDef, Derived,
    Dialect, ExprNode, Join, JoinConstraint, JoinKind, QueryNode, SchemaCatalog, Select,
    SelectItem, SensitiveField, SetOp, SetOpKind, Statement, TableRef, TableSchema, Values,
    ViewSchema, With, WithClause,
};
use shroud_lineage::{EvalError, Extractor, NoParser, QueryParser};

const VIEW_SQL: &str = "SELECT ssn AS id FROM users";

/// Parser stub returning prepared shapes for known definitions.
struct MapParser(HashMap<&'static str, Statement>);

impl QueryParser for MapParser {
    fn parse_statement(&self, sql: &str) -> Result<Statement, EvalError> {
        self.0.get(sql).cloned().ok_or_else(|| EvalError::Parse {
            message: format!("unexpected definition: {sql}"),
            span: Default::default(),
        })
    }
}

fn table(name: &str, columns: &[(&str, bool)]) -> TableSchema {
    TableSchema::new(
        name,
        columns
            .iter()
            .map(|(c, s)| ColumnSchema::new(*c, *s))
            .collect(),
    )
}

fn catalog() -> SchemaCatalog {
    SchemaCatalog::new(CaseSensitivity::Insensitive)
        .with_table(
            "shop",
            "public",
            table(
                "users",
                &[("id", false), ("name", false), ("ssn", true), ("email", true)],
            ),
        )
        .with_table("shop", "public", table("t1", &[("id", true), ("name", false)]))
        .with_table("shop", "public", table("t2", &[("secret", true), ("ref", false)]))
        .with_table("shop", "public", table("a", &[("x", true), ("y", false)]))
        .with_table("shop", "public", table("b", &[("x", false), ("z", false)]))
        .with_table(
            "shop",
            "public",
            table(
                "employees",
                &[("id", false), ("manager_id", false), ("salary", true)],
            ),
        )
        .with_view("shop", "public", ViewSchema::new("v", VIEW_SQL))
}

fn parser() -> MapParser {
    let view = select(
        Some(QueryNode::table("users")),
        vec![SelectItem::aliased(col("ssn"), "id")],
    );
    MapParser(HashMap::from([(VIEW_SQL, Statement::Query(view))]))
}

fn col(name: &str) -> ExprNode {
    ExprNode::column(name)
}

fn qcol(table: &str, name: &str) -> ExprNode {
    ExprNode::qualified(table, name)
}

fn select(from: Option<QueryNode>, items: Vec<SelectItem>) -> QueryNode {
    Select::new(from, items).into()
}

fn aliased(name: &str, alias: &str) -> QueryNode {
    TableRef::new(name).alias(alias).into()
}

fn run(query: QueryNode) -> Result<Vec<SensitiveField>, EvalError> {
    let catalog = catalog();
    let parser = parser();
    Extractor::new(&catalog, &parser, Dialect::Postgres)
        .with_current_database("shop")
        .extract(&Statement::Query(query))
}

fn bits(fields: &[SensitiveField]) -> Vec<(&str, bool)> {
    fields
        .iter()
        .map(|f| (f.name.as_str(), f.sensitive))
        .collect()
}

/// `SELECT * FROM users` keeps catalog order and arity.
#[test]
fn test_wildcard_arity() {
    let fields = run(select(Some(QueryNode::table("users")), vec![SelectItem::wildcard()])).unwrap();
    assert_eq!(
        bits(&fields),
        vec![("id", false), ("name", false), ("ssn", true), ("email", true)]
    );
}

#[test]
fn test_qualified_wildcard_selects_one_side() {
    let join = Join::new(
        aliased("users", "u"),
        aliased("t2", "x"),
        JoinKind::Cross,
        JoinConstraint::None,
    );
    let fields = run(select(
        Some(QueryNode::Join(Box::new(join))),
        vec![SelectItem::qualified_wildcard("x")],
    ))
    .unwrap();
    assert_eq!(bits(&fields), vec![("secret", true), ("ref", false)]);
}

#[test]
fn test_unknown_wildcard_qualifier() {
    let err = run(select(
        Some(QueryNode::table("users")),
        vec![SelectItem::qualified_wildcard("nope")],
    ))
    .unwrap_err();
    assert_eq!(err.kind(), "table_not_found");
}

/// `SELECT l.s FROM users u, LATERAL (SELECT u.ssn AS s) l`
#[test]
fn test_lateral_derived_reads_preceding_relations() {
    let body = || select(None, vec![SelectItem::aliased(qcol("u", "ssn"), "s")]);
    let query = |derived: Derived| {
        select(
            Some(QueryNode::Join(Box::new(Join::new(
                aliased("users", "u"),
                QueryNode::Derived(derived),
                JoinKind::Cross,
                JoinConstraint::None,
            )))),
            vec![SelectItem::expr(qcol("l", "s"))],
        )
    };

    let fields = run(query(Derived::new(body(), Some("l")).lateral())).unwrap();
    assert_eq!(bits(&fields), vec![("s", true)]);

    // Without LATERAL the sibling is out of reach and `u.ssn` resolves to nothing.
    let fields = run(query(Derived::new(body(), Some("l")))).unwrap();
    assert_eq!(bits(&fields), vec![("s", false)]);
}

/// `SELECT u, b FROM users u CROSS JOIN b`
#[test]
fn test_bare_relation_name_reads_whole_row() {
    let join = Join::new(
        aliased("users", "u"),
        QueryNode::table("b"),
        JoinKind::Cross,
        JoinConstraint::None,
    );
    let fields = run(select(
        Some(QueryNode::Join(Box::new(join))),
        vec![
            SelectItem::expr(col("u")),
            SelectItem::expr(col("b")),
            SelectItem::aliased(ExprNode::function("to_json", vec![col("u")]), "j"),
        ],
    ))
    .unwrap();
    assert_eq!(bits(&fields), vec![("u", true), ("b", false), ("j", true)]);
}

/// `SELECT * FROM a JOIN b USING (x)`
#[test]
fn test_join_using_merges_column() {
    let join = Join::new(
        QueryNode::table("a"),
        QueryNode::table("b"),
        JoinKind::Inner,
        JoinConstraint::Using(vec!["x".to_string()]),
    );
    let fields = run(select(
        Some(QueryNode::Join(Box::new(join))),
        vec![SelectItem::wildcard()],
    ))
    .unwrap();
    assert_eq!(bits(&fields), vec![("x", true), ("y", false), ("z", false)]);
}

/// `SELECT name FROM t1 UNION SELECT secret FROM t2`
#[test]
fn test_set_operation_ors_positionally() {
    let union = SetOp::new(
        SetOpKind::Union,
        select(Some(QueryNode::table("t1")), vec![SelectItem::expr(col("name"))]),
        select(Some(QueryNode::table("t2")), vec![SelectItem::expr(col("secret"))]),
    );
    let fields = run(union.into()).unwrap();
    assert_eq!(bits(&fields), vec![("name", true)]);
}

/// `SELECT id, name FROM t1 INTERSECT SELECT secret FROM t2`
#[test]
fn test_set_operation_arity_mismatch() {
    let op = SetOp::new(
        SetOpKind::Intersect,
        select(
            Some(QueryNode::table("t1")),
            vec![SelectItem::expr(col("id")), SelectItem::expr(col("name"))],
        ),
        select(Some(QueryNode::table("t2")), vec![SelectItem::expr(col("secret"))]),
    );
    let err = run(op.into()).unwrap_err();
    assert!(matches!(
        err,
        EvalError::ColumnCountMismatch {
            expected: 2,
            found: 1,
            ..
        }
    ));
}

/// ```sql
/// WITH RECURSIVE chain(id, boss, pay) AS (
///     SELECT id, manager_id, 0 FROM employees
///     UNION ALL
///     SELECT e.id, e.manager_id, c.pay + e.salary
///     FROM employees e JOIN chain c ON e.manager_id = c.id
/// )
/// SELECT id, pay FROM chain
/// ```
#[test]
fn test_recursive_cte_reaches_fixpoint() {
    let seed = select(
        Some(QueryNode::table("employees")),
        vec![
            SelectItem::expr(col("id")),
            SelectItem::expr(col("manager_id")),
            SelectItem::expr(ExprNode::Literal),
        ],
    );
    let step = select(
        Some(QueryNode::Join(Box::new(Join::new(
            aliased("employees", "e"),
            aliased("chain", "c"),
            JoinKind::Inner,
            JoinConstraint::On(ExprNode::binary(qcol("e", "manager_id"), qcol("c", "id"))),
        )))),
        vec![
            SelectItem::expr(qcol("e", "id")),
            SelectItem::expr(qcol("e", "manager_id")),
            SelectItem::expr(ExprNode::binary(qcol("c", "pay"), qcol("e", "salary"))),
        ],
    );
    let cte = CteDef::new(
        "chain",
        SetOp::new(SetOpKind::Union, seed, step).into(),
    )
    .columns(&["id", "boss", "pay"])
    .recursive();

    let query = With {
        clause: WithClause {
            recursive: true,
            ctes: vec![cte],
        },
        body: select(
            Some(QueryNode::table("chain")),
            vec![SelectItem::expr(col("id")), SelectItem::expr(col("pay"))],
        ),
    };
    let fields = run(query.into()).unwrap();
    assert_eq!(bits(&fields), vec![("id", false), ("pay", true)]);
}

/// Sensitivity hops one column per pass: `SELECT b, a, b FROM r` moves the
/// bit from `a` to `b` and then from `b` to `c`.
#[test]
fn test_recursive_cte_propagates_over_several_passes() {
    let seed = select(
        Some(QueryNode::table("t2")),
        vec![
            SelectItem::expr(col("secret")),
            SelectItem::expr(ExprNode::Literal),
            SelectItem::expr(ExprNode::Literal),
        ],
    );
    let step = select(
        Some(QueryNode::table("r")),
        vec![
            SelectItem::expr(col("b")),
            SelectItem::expr(col("a")),
            SelectItem::expr(col("b")),
        ],
    );
    let query = With {
        clause: WithClause {
            recursive: true,
            ctes: vec![
                CteDef::new("r", SetOp::new(SetOpKind::Union, seed, step).into())
                    .columns(&["a", "b", "c"])
                    .recursive(),
            ],
        },
        body: select(Some(QueryNode::table("r")), vec![SelectItem::wildcard()]),
    };
    let fields = run(query.into()).unwrap();
    assert_eq!(bits(&fields), vec![("a", true), ("b", true), ("c", true)]);
}

/// Several non-recursive branches fold into one seed before iterating.
#[test]
fn test_recursive_cte_folds_every_seed_branch() {
    let plain = select(Some(QueryNode::table("t1")), vec![SelectItem::expr(col("name"))]);
    let secret = select(Some(QueryNode::table("t2")), vec![SelectItem::expr(col("secret"))]);
    let step = select(Some(QueryNode::table("r")), vec![SelectItem::expr(col("v"))]);
    let body = SetOp::new(
        SetOpKind::Union,
        SetOp::new(SetOpKind::Union, plain.clone(), secret).into(),
        step.clone(),
    );
    let query = With {
        clause: WithClause {
            recursive: true,
            ctes: vec![CteDef::new("r", body.into()).columns(&["v"]).recursive()],
        },
        body: select(Some(QueryNode::table("r")), vec![SelectItem::wildcard()]),
    };
    let fields = run(query.into()).unwrap();
    assert_eq!(bits(&fields), vec![("v", true)]);

    // Seed branches of different widths
    let wide = select(
        Some(QueryNode::table("t1")),
        vec![SelectItem::expr(col("id")), SelectItem::expr(col("name"))],
    );
    let body = SetOp::new(
        SetOpKind::Union,
        SetOp::new(SetOpKind::Union, plain, wide).into(),
        step,
    );
    let query = With {
        clause: WithClause {
            recursive: true,
            ctes: vec![CteDef::new("r", body.into()).columns(&["v"]).recursive()],
        },
        body: select(Some(QueryNode::table("r")), vec![SelectItem::wildcard()]),
    };
    let err = run(query.into()).unwrap_err();
    assert!(matches!(
        err,
        EvalError::ColumnCountMismatch {
            expected: 1,
            found: 2,
            ..
        }
    ));
}

#[test]
fn test_recursive_cte_without_seed_is_unsupported() {
    let step = select(Some(QueryNode::table("r")), vec![SelectItem::wildcard()]);
    let query = With {
        clause: WithClause {
            recursive: true,
            ctes: vec![CteDef::new("r", SetOp::new(SetOpKind::Union, step.clone(), step).into()).recursive()],
        },
        body: select(Some(QueryNode::table("r")), vec![SelectItem::wildcard()]),
    };
    let err = run(query.into()).unwrap_err();
    assert_eq!(err.kind(), "unsupported_construct");
}

#[test]
fn test_recursive_flag_without_self_reference_is_plain() {
    let query = With {
        clause: WithClause {
            recursive: true,
            ctes: vec![
                CteDef::new(
                    "r",
                    select(Some(QueryNode::table("t1")), vec![SelectItem::wildcard()]),
                )
                .recursive(),
            ],
        },
        body: select(Some(QueryNode::table("r")), vec![SelectItem::wildcard()]),
    };
    let fields = run(query.into()).unwrap();
    assert_eq!(bits(&fields), vec![("id", true), ("name", false)]);
}

#[test]
fn test_cte_column_list_arity_mismatch() {
    let query = With {
        clause: WithClause {
            recursive: false,
            ctes: vec![
                CteDef::new(
                    "c",
                    select(Some(QueryNode::table("t1")), vec![SelectItem::wildcard()]),
                )
                .columns(&["only_one"]),
            ],
        },
        body: select(Some(QueryNode::table("c")), vec![SelectItem::wildcard()]),
    };
    let err = run(query.into()).unwrap_err();
    assert!(matches!(err, EvalError::ColumnCountMismatch { expected: 2, found: 1, .. }));
}

/// Later CTEs see earlier ones.
#[test]
fn test_cte_chaining() {
    let query = With {
        clause: WithClause {
            recursive: false,
            ctes: vec![
                CteDef::new(
                    "first",
                    select(Some(QueryNode::table("users")), vec![SelectItem::expr(col("ssn"))]),
                ),
                CteDef::new(
                    "second",
                    select(
                        Some(QueryNode::table("first")),
                        vec![SelectItem::aliased(col("ssn"), "x")],
                    ),
                ),
            ],
        },
        body: select(Some(QueryNode::table("second")), vec![SelectItem::expr(col("x"))]),
    };
    assert_eq!(bits(&run(query.into()).unwrap()), vec![("x", true)]);
}

/// A CTE shadows a catalog table of the same name.
#[test]
fn test_cte_shadows_catalog_table() {
    let query = With {
        clause: WithClause {
            recursive: false,
            ctes: vec![CteDef::new(
                "users",
                select(Some(QueryNode::table("t2")), vec![SelectItem::expr(col("ref"))]),
            )],
        },
        body: select(Some(QueryNode::table("users")), vec![SelectItem::wildcard()]),
    };
    assert_eq!(bits(&run(query.into()).unwrap()), vec![("ref", false)]);
}

/// View `v` is `SELECT ssn AS id FROM users`.
#[test]
fn test_view_transparency() {
    let fields = run(select(Some(QueryNode::table("v")), vec![SelectItem::expr(col("id"))])).unwrap();
    assert_eq!(bits(&fields), vec![("id", true)]);
}

#[test]
fn test_view_needs_parser() {
    let catalog = catalog();
    let err = Extractor::new(&catalog, &NoParser, Dialect::Postgres)
        .extract(&Statement::Query(select(
            Some(QueryNode::table("v")),
            vec![SelectItem::wildcard()],
        )))
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported_construct");
}

#[test]
fn test_expand_view_directly() {
    let catalog = catalog();
    let parser = parser();
    let extractor = Extractor::new(&catalog, &parser, Dialect::Postgres);
    let view = extractor.expand_view(Some("shop"), None, "V").unwrap();
    assert_eq!(view.name, "V");
    assert_eq!(view.columns, vec![ColumnSchema::sensitive("id")]);

    let err = extractor.expand_view(None, None, "missing").unwrap_err();
    assert_eq!(err.kind(), "view_not_found");
}

#[test]
fn test_missing_table() {
    let err = run(select(Some(QueryNode::table("nope")), vec![SelectItem::wildcard()])).unwrap_err();
    assert_eq!(
        err,
        EvalError::TableNotFound {
            database: "shop".to_string(),
            schema: "public".to_string(),
            name: "nope".to_string(),
            span: Default::default(),
        }
    );
}

/// `SELECT (SELECT 1 FROM t2 WHERE t2.secret = t1.id) FROM t1`
#[test]
fn test_correlated_subquery_taints_projection() {
    let inner = Select::new(
        Some(QueryNode::table("t2")),
        vec![SelectItem::expr(ExprNode::Literal)],
    )
    .filter(ExprNode::binary(qcol("t2", "secret"), qcol("t1", "id")));
    let fields = run(select(
        Some(QueryNode::table("t1")),
        vec![SelectItem::expr(ExprNode::subquery(inner))],
    ))
    .unwrap();
    assert_eq!(bits(&fields), vec![("?column?", true)]);
}

/// The same shape over a non-sensitive outer column stays clean.
#[test]
fn test_uncorrelated_subquery_is_clean() {
    let inner = Select::new(
        Some(QueryNode::table("t2")),
        vec![SelectItem::aliased(ExprNode::Literal, "one")],
    )
    .filter(ExprNode::binary(qcol("t2", "ref"), qcol("t1", "name")));
    let fields = run(select(
        Some(QueryNode::table("t1")),
        vec![SelectItem::expr(ExprNode::subquery(inner))],
    ))
    .unwrap();
    assert_eq!(bits(&fields), vec![("one", false)]);
}

/// A correlation two levels deep still reaches the outermost projection.
#[test]
fn test_doubly_nested_correlation() {
    let innermost = Select::new(
        Some(QueryNode::table("b")),
        vec![SelectItem::expr(ExprNode::Literal)],
    )
    .filter(ExprNode::binary(qcol("b", "z"), qcol("t1", "id")));
    let middle = Select::new(
        Some(QueryNode::table("t2")),
        vec![SelectItem::expr(ExprNode::Literal)],
    )
    .filter(ExprNode::exists(innermost));
    let fields = run(select(
        Some(QueryNode::table("t1")),
        vec![
            SelectItem::aliased(ExprNode::subquery(middle), "flag"),
            SelectItem::expr(col("name")),
        ],
    ))
    .unwrap();
    assert_eq!(bits(&fields), vec![("flag", true), ("name", false)]);
}

/// Filters of the top-level block do not taint its output.
#[test]
fn test_top_level_filter_does_not_taint() {
    let query = Select::new(Some(QueryNode::table("t1")), vec![SelectItem::expr(col("name"))])
        .filter(ExprNode::exists(Select::new(
            Some(QueryNode::table("t2")),
            vec![SelectItem::expr(col("secret"))],
        )));
    let fields = run(query.into()).unwrap();
    assert_eq!(bits(&fields), vec![("name", false)]);
}

/// A CTE declared inside a derived table is gone once the derived table is done.
#[test]
fn test_scope_does_not_leak_out_of_derived_table() {
    let inner = Select::new(
        Some(QueryNode::table("hidden")),
        vec![SelectItem::wildcard()],
    )
    .with_ctes(WithClause {
        recursive: false,
        ctes: vec![CteDef::new(
            "hidden",
            select(Some(QueryNode::table("t1")), vec![SelectItem::wildcard()]),
        )],
    });
    let join = Join::new(
        QueryNode::Derived(Derived::new(inner.into(), Some("d"))),
        QueryNode::table("hidden"),
        JoinKind::Cross,
        JoinConstraint::None,
    );
    let err = run(select(
        Some(QueryNode::Join(Box::new(join))),
        vec![SelectItem::wildcard()],
    ))
    .unwrap_err();
    assert!(matches!(err, EvalError::TableNotFound { ref name, .. } if name == "hidden"));
}

/// Outer columns are visible inside a subquery but not after it.
#[test]
fn test_outer_frame_does_not_leak_into_sibling() {
    // SELECT (SELECT secret FROM t2) AS s, secret FROM t1
    let fields = run(select(
        Some(QueryNode::table("t1")),
        vec![
            SelectItem::aliased(
                ExprNode::subquery(Select::new(
                    Some(QueryNode::table("t2")),
                    vec![SelectItem::expr(col("secret"))],
                )),
                "s",
            ),
            SelectItem::expr(col("secret")),
        ],
    ))
    .unwrap();
    // `secret` does not exist in t1, so the second projection resolves to nothing.
    assert_eq!(bits(&fields), vec![("s", true), ("secret", false)]);
}

#[test]
fn test_derived_alias_requalifies_fields() {
    let derived = Derived {
        column_aliases: vec!["k".to_string(), "n".to_string()],
        ..Derived::new(
            select(Some(QueryNode::table("t1")), vec![SelectItem::wildcard()]),
            Some("d"),
        )
    };
    let fields = run(select(
        Some(QueryNode::Derived(derived)),
        vec![SelectItem::expr(qcol("d", "k"))],
    ))
    .unwrap();
    assert_eq!(bits(&fields), vec![("k", true)]);
}

#[test]
fn test_values_columns() {
    let values = Values {
        rows: vec![
            vec![ExprNode::Literal, ExprNode::Literal],
            vec![ExprNode::Literal, ExprNode::Literal],
        ],
        span: Default::default(),
    };
    let fields = run(QueryNode::Values(values)).unwrap();
    assert_eq!(bits(&fields), vec![("column1", false), ("column2", false)]);
}

#[test]
fn test_values_ragged_rows() {
    let values = Values {
        rows: vec![vec![ExprNode::Literal, ExprNode::Literal], vec![ExprNode::Literal]],
        span: Default::default(),
    };
    let err = run(QueryNode::Values(values)).unwrap_err();
    assert_eq!(err.kind(), "column_count_mismatch");
}

#[test]
fn test_unsupported_expression_keeps_operand_taint() {
    let expr = ExprNode::Unsupported {
        construct: "JSON path".to_string(),
        operands: vec![col("email")],
        span: Default::default(),
    };
    let fields = run(select(
        Some(QueryNode::table("users")),
        vec![SelectItem::aliased(expr, "j")],
    ))
    .unwrap();
    assert_eq!(bits(&fields), vec![("j", true)]);
}

#[test]
fn test_case_and_window_propagate() {
    let case = ExprNode::Case {
        operand: None,
        branches: vec![shroud_core::CaseBranch {
            condition: ExprNode::binary(col("ssn"), ExprNode::Literal),
            result: ExprNode::Literal,
        }],
        else_result: None,
    };
    let window = ExprNode::Window {
        function: Box::new(ExprNode::function("row_number", vec![])),
        partition_by: vec![col("email")],
        order_by: vec![],
    };
    let fields = run(select(
        Some(QueryNode::table("users")),
        vec![SelectItem::expr(case), SelectItem::expr(window)],
    ))
    .unwrap();
    assert_eq!(bits(&fields), vec![("case", true), ("row_number", true)]);
}

#[test]
fn test_ambiguity_modes() {
    // SELECT id FROM users CROSS JOIN t1
    let query = select(
        Some(QueryNode::Join(Box::new(Join::new(
            QueryNode::table("users"),
            QueryNode::table("t1"),
            JoinKind::Cross,
            JoinConstraint::None,
        )))),
        vec![SelectItem::expr(col("id"))],
    );
    let catalog = catalog();
    let parser = parser();

    let first = Extractor::new(&catalog, &parser, Dialect::Postgres)
        .extract(&Statement::Query(query.clone()))
        .unwrap();
    assert_eq!(bits(&first), vec![("id", false)]);

    let strict = Extractor::new(&catalog, &parser, Dialect::Postgres)
        .with_config(AnalysisConfig {
            ambiguity: AmbiguityMode::Strict,
            ..AnalysisConfig::default()
        })
        .extract(&Statement::Query(query))
        .unwrap_err();
    assert_eq!(strict.kind(), "ambiguous_column");
}

#[test]
fn test_invalid_qualifiers() {
    let column = ExprNode::Column(ColumnRef {
        database: Some("shop".to_string()),
        table: Some("users".to_string()),
        name: "id".to_string(),
        ..Default::default()
    });
    let err = run(select(Some(QueryNode::table("users")), vec![SelectItem::expr(column)])).unwrap_err();
    assert!(matches!(
        err,
        EvalError::InvalidQualifierCombination {
            qualifier: "database",
            missing: "schema",
            ..
        }
    ));

    let empty = ExprNode::Column(ColumnRef {
        table: Some("users".to_string()),
        ..Default::default()
    });
    let err = run(select(Some(QueryNode::table("users")), vec![SelectItem::expr(empty)])).unwrap_err();
    assert_eq!(err.kind(), "no_object_name_specified");
}

#[test]
fn test_depth_guard() {
    let mut query = select(Some(QueryNode::table("users")), vec![SelectItem::wildcard()]);
    for _ in 0..20 {
        query = select(
            Some(QueryNode::Derived(Derived::new(query, Some("d")))),
            vec![SelectItem::wildcard()],
        );
    }
    let catalog = catalog();
    let parser = parser();
    let err = Extractor::new(&catalog, &parser, Dialect::Postgres)
        .with_config(AnalysisConfig {
            max_depth: 10,
            ..AnalysisConfig::default()
        })
        .extract(&Statement::Query(query.clone()))
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported_construct");

    let fields = Extractor::new(&catalog, &parser, Dialect::Postgres)
        .extract(&Statement::Query(query))
        .unwrap();
    assert_eq!(fields.len(), 4);
}

#[test]
fn test_top_level_statement_kinds() {
    let catalog = catalog();
    let parser = parser();
    let extractor = Extractor::new(&catalog, &parser, Dialect::Postgres);

    assert!(extractor.extract(&Statement::Explain).unwrap().is_empty());
    let err = extractor
        .extract(&Statement::Other {
            kind: "INSERT".to_string(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported_construct");
}

#[test]
fn test_empty_catalog_masks_nothing() {
    let catalog = SchemaCatalog::default();
    let fields = Extractor::new(&catalog, &NoParser, Dialect::MySql)
        .extract(&Statement::Query(select(
            Some(QueryNode::table("anything")),
            vec![SelectItem::wildcard()],
        )))
        .unwrap();
    assert!(fields.is_empty());
}

#[test]
fn test_system_schema_is_skipped() {
    let query = select(
        Some(TableRef::new("pg_class").in_schema("pg_catalog").into()),
        vec![SelectItem::wildcard()],
    );
    assert!(run(query.clone()).unwrap().is_empty());

    let catalog = catalog();
    let err = Extractor::new(&catalog, &NoParser, Dialect::Postgres)
        .with_config(AnalysisConfig {
            skip_system_schemas: false,
            ..AnalysisConfig::default()
        })
        .extract(&Statement::Query(query))
        .unwrap_err();
    assert_eq!(err.kind(), "table_not_found");
}

#[test]
fn test_create_view_renames_columns() {
    let statement = Statement::CreateView(shroud_core::CreateView {
        name: "masked".to_string(),
        columns: vec!["a".to_string(), "b".to_string()],
        query: select(
            Some(QueryNode::table("t2")),
            vec![SelectItem::wildcard()],
        ),
        span: Default::default(),
    });
    let catalog = catalog();
    let fields = Extractor::new(&catalog, &NoParser, Dialect::Postgres)
        .extract(&statement)
        .unwrap();
    assert_eq!(bits(&fields), vec![("a", true), ("b", false)]);
}

#[test]
fn test_idempotence() {
    let query = select(
        Some(QueryNode::table("users")),
        vec![
            SelectItem::expr(ExprNode::function("upper", vec![col("email")])),
            SelectItem::expr(col("id")),
        ],
    );
    let catalog = catalog();
    let parser = parser();
    let extractor = Extractor::new(&catalog, &parser, Dialect::Postgres);
    let statement = Statement::Query(query);
    assert_eq!(
        extractor.extract(&statement).unwrap(),
        extractor.extract(&statement).unwrap()
    );
}

/// One extractor shared by several threads.
#[test]
fn test_concurrent_extraction() {
    let catalog = catalog();
    let parser = parser();
    let extractor = Extractor::new(&catalog, &parser, Dialect::Postgres);
    let statements: Vec<Statement> = ["t1", "t2", "users", "v"]
        .iter()
        .map(|t| Statement::Query(select(Some(QueryNode::table(*t)), vec![SelectItem::wildcard()])))
        .collect();
    let expected: Vec<_> = statements
        .iter()
        .map(|s| extractor.extract(s).unwrap())
        .collect();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let statement = &statements[i % statements.len()];
                let extractor = &extractor;
                s.spawn(move || extractor.extract(statement).unwrap())
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), expected[i % expected.len()]);
        }
    });
}
