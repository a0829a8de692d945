//! Query planner integration tests
//!
//! End-to-end coverage of the optimizer pipeline against real in-memory
//! tables and indexes: index assignment, borrow accounting across the
//! whole plan lifetime, and equivalence of index-driven scans with their
//! unoptimized originals under the residual filter.

use std::collections::HashSet;
use std::sync::Arc;

use kitedb::catalog::{ColumnDef, DataType, TableDef};
use kitedb::executor::{eval, run, Datum, ExecutorError, Row};
use kitedb::index::{IndexRegistry, MemoryIndex};
use kitedb::planner::logical::{
    BinaryOp, ColumnRef, Expr, Literal, LogicalPlan, TableScan,
};
use kitedb::planner::{IndexAssignment, Optimizer};
use kitedb::planner::optimizer::OptimizationRule;
use kitedb::storage::{MemoryDatabase, MemoryTable};

fn commits_def() -> TableDef {
    TableDef::new(
        "commits",
        vec![
            ColumnDef::required("commit_hash", DataType::Text),
            ColumnDef::nullable("commit_author_name", DataType::Text),
            ColumnDef::nullable("commit_time", DataType::BigInt),
        ],
    )
    .indexable()
}

fn author_col() -> Expr {
    Expr::Column(ColumnRef {
        table: "commits".to_string(),
        name: "commit_author_name".to_string(),
        index: 1,
        data_type: DataType::Text,
        nullable: true,
    })
}

fn time_col() -> Expr {
    Expr::Column(ColumnRef {
        table: "commits".to_string(),
        name: "commit_time".to_string(),
        index: 2,
        data_type: DataType::BigInt,
        nullable: true,
    })
}

fn int(v: i64) -> Expr {
    Expr::Literal(Literal::Integer(v))
}

fn string(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.to_string()))
}

const COMMITS: &[(&str, &str, i64)] = &[
    ("c0", "alice", 1000),
    ("c1", "bob", 1200),
    ("c2", "alice", 1500),
    ("c3", "carol", 1500),
    ("c4", "bob", 1800),
    ("c5", "alice", 2100),
];

/// Database plus a registry with an index on commit_time and a composite
/// index on (commit_author_name, commit_time)
fn setup() -> (MemoryDatabase, Arc<IndexRegistry>) {
    let mut table = MemoryTable::new(commits_def());
    let mut time_idx = MemoryIndex::new("main", "commits", "idx_time", &[time_col()]);
    let mut author_time_idx = MemoryIndex::new(
        "main",
        "commits",
        "idx_author_time",
        &[author_col(), time_col()],
    );

    for (hash, author, time) in COMMITS {
        let row = table.push(Row::new(vec![
            Datum::String(hash.to_string()),
            Datum::String(author.to_string()),
            Datum::Int(*time),
        ]));
        time_idx.insert(vec![Datum::Int(*time)], row);
        author_time_idx.insert(
            vec![Datum::String(author.to_string()), Datum::Int(*time)],
            row,
        );
    }

    let mut db = MemoryDatabase::new("main");
    db.add_table(table);

    let registry = Arc::new(IndexRegistry::new());
    registry.register(Arc::new(time_idx)).unwrap();
    registry.register(Arc::new(author_time_idx)).unwrap();

    (db, registry)
}

fn filtered_scan(predicate: Expr) -> LogicalPlan {
    LogicalPlan::Filter {
        input: Box::new(LogicalPlan::Scan(TableScan::from_def(&commits_def()))),
        predicate,
    }
}

/// Pull the wrapped scan's binding and residual predicate out of an
/// optimized `Filter(IndexedScan)` plan
fn wrapped_parts(plan: &LogicalPlan) -> (&kitedb::planner::logical::IndexedScan, &Expr) {
    match plan {
        LogicalPlan::Filter { input, predicate } => match input.as_ref() {
            LogicalPlan::IndexedScan(indexed) => (indexed, predicate),
            other => panic!("expected IndexedScan under the filter, got:\n{}", other),
        },
        other => panic!("expected a residual filter on top, got:\n{}", other),
    }
}

/// Rows an index-driven execution of the wrapped plan would produce: the
/// lookup's row positions filtered by the residual predicate
fn rows_via_lookup(plan: &LogicalPlan, db: &MemoryDatabase) -> Vec<Row> {
    let (indexed, predicate) = wrapped_parts(plan);
    let table = db.table(indexed.name()).unwrap();
    let mut out = Vec::new();
    for position in indexed.binding.lookup.values().unwrap() {
        let row = table.row(position).unwrap().clone();
        if eval(predicate, &row).unwrap().as_bool() == Some(true) {
            out.push(row);
        }
    }
    out
}

fn row_set(rows: &[Row]) -> HashSet<Row> {
    rows.iter().cloned().collect()
}

#[test]
fn test_point_get_is_equivalent_to_full_scan() {
    let (db, registry) = setup();
    let rule = IndexAssignment::new(registry.clone(), "main");

    let predicate = Expr::binary(time_col(), BinaryOp::Eq, int(1500));
    let original = filtered_scan(predicate);
    let expected = run(&original, &db).unwrap();

    let optimized = rule.apply(original).unwrap();

    let (indexed, _) = wrapped_parts(&optimized);
    assert_eq!(indexed.binding.lookup.values().unwrap(), vec![2, 3]);
    assert_eq!(row_set(&rows_via_lookup(&optimized, &db)), row_set(&expected));

    assert_eq!(registry.use_count("main", "idx_time"), Some(1));
    drop(optimized);
    assert_eq!(registry.outstanding_borrows(), 0);
}

#[test]
fn test_range_lookup_equivalence() {
    let (db, registry) = setup();
    let rule = IndexAssignment::new(registry.clone(), "main");

    for op in [BinaryOp::Gt, BinaryOp::GtEq, BinaryOp::Lt, BinaryOp::LtEq] {
        let predicate = Expr::binary(time_col(), op, int(1500));
        let original = filtered_scan(predicate);
        let expected = run(&original, &db).unwrap();

        let optimized = rule.apply(original).unwrap();
        assert_eq!(
            row_set(&rows_via_lookup(&optimized, &db)),
            row_set(&expected),
            "rows diverged for {:?}",
            op
        );
    }
    assert_eq!(registry.outstanding_borrows(), 0);
}

#[test]
fn test_between_lookup_equivalence() {
    let (db, registry) = setup();
    let rule = IndexAssignment::new(registry.clone(), "main");

    let predicate = Expr::Between {
        expr: Box::new(time_col()),
        low: Box::new(int(1200)),
        high: Box::new(int(1800)),
        negated: false,
    };
    let original = filtered_scan(predicate);
    let expected = run(&original, &db).unwrap();
    assert_eq!(expected.len(), 4);

    let optimized = rule.apply(original).unwrap();

    // both interval endpoints are covered by the union of the two
    // half-open ranges
    let (indexed, _) = wrapped_parts(&optimized);
    let positions: HashSet<u64> = indexed.binding.lookup.values().unwrap().into_iter().collect();
    assert_eq!(positions, HashSet::from([1, 2, 3, 4]));
    assert_eq!(row_set(&rows_via_lookup(&optimized, &db)), row_set(&expected));
}

#[test]
fn test_in_lookup_equivalence() {
    let (db, registry) = setup();
    let rule = IndexAssignment::new(registry.clone(), "main");

    let predicate = Expr::In {
        expr: Box::new(time_col()),
        list: Box::new(Expr::Tuple(vec![int(1000), int(1500), int(9999)])),
        negated: false,
    };
    let original = filtered_scan(predicate);
    let expected = run(&original, &db).unwrap();

    let optimized = rule.apply(original).unwrap();
    assert_eq!(row_set(&rows_via_lookup(&optimized, &db)), row_set(&expected));

    let (indexed, _) = wrapped_parts(&optimized);
    assert_eq!(indexed.binding.lookup.values().unwrap(), vec![0, 2, 3]);
}

#[test]
fn test_composite_index_point_get() {
    let (db, registry) = setup();
    let rule = IndexAssignment::new(registry.clone(), "main");

    let predicate = Expr::and(
        Expr::binary(author_col(), BinaryOp::Eq, string("alice")),
        Expr::binary(time_col(), BinaryOp::Eq, int(1500)),
    );
    let original = filtered_scan(predicate);
    let expected = run(&original, &db).unwrap();
    assert_eq!(expected.len(), 1);

    let optimized = rule.apply(original).unwrap();

    let (indexed, _) = wrapped_parts(&optimized);
    assert_eq!(indexed.binding.lookup.values().unwrap(), vec![2]);
    assert_eq!(indexed.binding.indexes.len(), 1);
    assert_eq!(row_set(&rows_via_lookup(&optimized, &db)), row_set(&expected));

    // the composite index carries the borrow, the single-column index
    // was never taken
    assert_eq!(registry.use_count("main", "idx_author_time"), Some(1));
    assert_eq!(registry.use_count("main", "idx_time"), Some(0));
}

#[test]
fn test_and_narrows_monotonically() {
    let (_db, registry) = setup();
    let rule = IndexAssignment::new(registry.clone(), "main");

    let low = Expr::binary(time_col(), BinaryOp::GtEq, int(1200));
    let high = Expr::binary(time_col(), BinaryOp::LtEq, int(1800));

    let wide_rows = |predicate: Expr| {
        let optimized = rule.apply(filtered_scan(predicate)).unwrap();
        let (indexed, _) = wrapped_parts(&optimized);
        indexed
            .binding
            .lookup
            .values()
            .unwrap()
            .into_iter()
            .collect::<HashSet<u64>>()
    };

    let low_set = wide_rows(low.clone());
    let high_set = wide_rows(high.clone());
    let both = wide_rows(Expr::and(low, high));

    // the intersection lookup is never wider than either operand
    assert!(both.is_subset(&low_set));
    assert!(both.is_subset(&high_set));
    assert_eq!(both, low_set.intersection(&high_set).copied().collect());
    assert_eq!(registry.outstanding_borrows(), 0);
}

#[test]
fn test_or_without_index_on_either_branch_degrades() {
    let (db, registry) = setup();
    let rule = IndexAssignment::new(registry.clone(), "main");

    // no index covers commit_hash, so the disjunction cannot narrow
    let hash_col = Expr::Column(ColumnRef {
        table: "commits".to_string(),
        name: "commit_hash".to_string(),
        index: 0,
        data_type: DataType::Text,
        nullable: false,
    });
    let predicate = Expr::or(
        Expr::binary(time_col(), BinaryOp::Eq, int(1500)),
        Expr::binary(hash_col, BinaryOp::Eq, string("c1")),
    );
    let original = filtered_scan(predicate);
    let expected = run(&original, &db).unwrap();

    let optimized = rule.apply(original).unwrap();

    match &optimized {
        LogicalPlan::Filter { input, .. } => {
            assert!(matches!(input.as_ref(), LogicalPlan::Scan(_)));
        }
        other => panic!("expected untouched filter, got:\n{}", other),
    }
    assert_eq!(registry.outstanding_borrows(), 0);

    // the plain plan still answers the query
    assert_eq!(run(&optimized, &db).unwrap().len(), expected.len());
}

#[test]
fn test_optimizer_pipeline_keeps_residual_filter() {
    let (_db, registry) = setup();
    let optimizer = Optimizer::new(registry.clone(), "main");

    let plan = LogicalPlan::Project {
        input: Box::new(filtered_scan(Expr::binary(
            time_col(),
            BinaryOp::Eq,
            int(1500),
        ))),
        expressions: vec![(time_col(), "commit_time".to_string())],
    };

    let optimized = optimizer.optimize(plan).unwrap();

    match &optimized {
        LogicalPlan::Project { input, .. } => {
            let (indexed, predicate) = wrapped_parts(input);
            assert_eq!(indexed.name(), "commits");
            assert_eq!(predicate.to_string(), "(commits.commit_time = 1500)");
        }
        other => panic!("expected Project on top, got:\n{}", other),
    }

    assert_eq!(registry.use_count("main", "idx_time"), Some(1));
    drop(optimized);
    assert_eq!(registry.outstanding_borrows(), 0);
}

#[test]
fn test_optimizer_is_idempotent() {
    let (_db, registry) = setup();
    let optimizer = Optimizer::new(registry.clone(), "main");

    let plan = filtered_scan(Expr::binary(time_col(), BinaryOp::GtEq, int(1200)));

    let once = optimizer.optimize(plan).unwrap();
    let shape = once.to_string();
    let twice = optimizer.optimize(once).unwrap();

    assert_eq!(twice.to_string(), shape);
    assert_eq!(registry.outstanding_borrows(), 1);
    drop(twice);
    assert_eq!(registry.outstanding_borrows(), 0);
}

#[test]
fn test_indexed_scan_placeholder_refuses_to_run() {
    let (db, registry) = setup();
    let rule = IndexAssignment::new(registry, "main");

    let optimized = rule
        .apply(filtered_scan(Expr::binary(time_col(), BinaryOp::Eq, int(1500))))
        .unwrap();

    assert!(matches!(
        run(&optimized, &db),
        Err(ExecutorError::PlaceholderNotExecutable(_))
    ));
}

#[test]
fn test_unresolved_plan_is_untouched() {
    let (_db, registry) = setup();
    let rule = IndexAssignment::new(registry.clone(), "main");

    let plan = LogicalPlan::Filter {
        input: Box::new(LogicalPlan::UnresolvedScan {
            table: "commits".to_string(),
        }),
        predicate: Expr::binary(time_col(), BinaryOp::Eq, int(1500)),
    };
    let before = plan.to_string();

    let result = rule.apply(plan).unwrap();
    assert_eq!(result.to_string(), before);
    assert_eq!(registry.outstanding_borrows(), 0);
}

#[test]
fn test_non_indexable_table_is_not_wrapped() {
    let (_db, registry) = setup();
    let rule = IndexAssignment::new(registry.clone(), "main");

    // same schema and indexes, but the table does not accept lookups
    let mut def = commits_def();
    def.indexable = false;
    let plan = LogicalPlan::Filter {
        input: Box::new(LogicalPlan::Scan(TableScan::from_def(&def))),
        predicate: Expr::binary(time_col(), BinaryOp::Eq, int(1500)),
    };

    let result = rule.apply(plan).unwrap();
    match &result {
        LogicalPlan::Filter { input, .. } => {
            assert!(matches!(input.as_ref(), LogicalPlan::Scan(_)));
        }
        other => panic!("expected plain filter, got:\n{}", other),
    }
    // the borrow taken while matching was released when no scan used it
    assert_eq!(registry.outstanding_borrows(), 0);
}
