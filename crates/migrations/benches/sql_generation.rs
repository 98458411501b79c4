//! SQL Generation Performance Benchmarks
//!
//! Rendering expressions for each dialect, version parsing and plan computation

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use elif_migrations::expressions::{CreateTableExpression, InsertRowExpression};
use elif_migrations::prelude::*;
use elif_migrations::{split_sql_statements, Expression, MigrationPlan};

fn users_table() -> Expression {
    Expression::CreateTable(CreateTableExpression {
        table: "users".to_string(),
        columns: vec![
            ColumnDefinition::id("id"),
            ColumnDefinition::string("email", 255).not_null().unique(),
            ColumnDefinition::boolean("active").not_null().default_value(false),
            ColumnDefinition::datetime("created_at").not_null().default_current_timestamp(),
            ColumnDefinition::integer("team_id").references("teams", "id"),
        ],
        constraints: Vec::new(),
        if_not_exists: false,
    })
}

fn user_rows(count: usize) -> Expression {
    Expression::InsertRow(InsertRowExpression {
        table: "users".to_string(),
        rows: (0..count)
            .map(|i| {
                vec![
                    ("email".to_string(), DatabaseValue::from(format!("user{}@example.com", i))),
                    ("active".to_string(), DatabaseValue::from(i % 2 == 0)),
                ]
            })
            .collect(),
        identity_insert: false,
    })
}

fn bench_render_by_dialect(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_create_table");
    let expression = users_table();

    for dialect in [
        DialectKind::Ansi,
        DialectKind::PostgreSQL,
        DialectKind::SQLite,
        DialectKind::SqlServer,
    ] {
        let syntax = dialect.syntax_provider();
        group.bench_with_input(BenchmarkId::from_parameter(dialect), &expression, |b, expr| {
            b.iter(|| black_box(syntax.render(expr)))
        });
    }

    group.finish();
}

fn bench_render_inserts(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_insert_rows");
    let syntax = DialectKind::PostgreSQL.syntax_provider();

    for count in [1usize, 10, 100] {
        let expression = user_rows(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &expression, |b, expr| {
            b.iter(|| black_box(syntax.render(expr)))
        });
    }

    group.finish();
}

fn bench_versions(c: &mut Criterion) {
    let mut group = c.benchmark_group("semantic_versions");

    group.bench_function("parse_lenient", |b| {
        b.iter(|| black_box(SemVersion::parse(black_box("8.1.3-rc.2+build.77"), false)))
    });

    group.bench_function("compare_by_precedence", |b| {
        let left: SemVersion = "8.1.0-alpha.10".parse().unwrap();
        let right: SemVersion = "8.1.0-alpha.9".parse().unwrap();
        b.iter(|| black_box(left.compare_by_precedence(&right)))
    });

    group.finish();
}

struct Noop;

#[async_trait]
impl Migration for Noop {
    async fn migrate(&self, _ctx: &mut MigrationContext) -> MigrationResult<()> {
        Ok(())
    }
}

fn bench_plan(c: &mut Criterion) {
    let catalog = MigrationCatalog::new((0..200u32).map(|i| {
        MigrationUnit::new(SemVersion::new(i / 10, i % 10, 0), "noop", Noop)
    }))
    .unwrap();
    let current = SemVersion::new(10, 0, 0);

    c.bench_function("compute_plan_200_units", |b| {
        b.iter(|| black_box(MigrationPlan::compute(&catalog, Some(&current))))
    });
}

fn bench_script_splitting(c: &mut Criterion) {
    let script = (0..50)
        .map(|i| format!("INSERT INTO settings (key, value) VALUES ('k{}', 'v;{}');", i, i))
        .collect::<Vec<_>>()
        .join("\n");

    c.bench_function("split_sql_script_50_statements", |b| {
        b.iter(|| black_box(split_sql_statements(&script)))
    });
}

criterion_group!(
    benches,
    bench_render_by_dialect,
    bench_render_inserts,
    bench_versions,
    bench_plan,
    bench_script_splitting
);
criterion_main!(benches);
