use criterion::{Criterion, black_box, criterion_group, criterion_main};
use emstore::catalog;
use emstore::config::PersistenceUnit;
use emstore::entity::{Author, Employee};
use emstore::query::{JoinKind, Order, Param, Select, eq, gt};
use emstore::session::SessionFactory;

fn benchmark_render(c: &mut Criterion) {
    let filtered = Select::from::<Employee>("e")
        .filter(eq("e.name", Param::positional(0)))
        .filter(gt("e.salary", Param::named("salary")))
        .order_by("e.salary", Order::Desc)
        .bind_positional(0, "Yulij")
        .bind("salary", 5000);
    let joined = Select::from::<Author>("a")
        .join(JoinKind::Left, "a.books", "b")
        .filter(eq("b.title", Param::named("title")))
        .distinct()
        .bind("title", "By pen & sword");

    c.bench_function("render_filtered_select", |b| {
        b.iter(|| black_box(filtered.render().unwrap()))
    });
    c.bench_function("render_join_select", |b| {
        b.iter(|| black_box(joined.render().unwrap()))
    });
}

fn benchmark_catalog(c: &mut Criterion) {
    let factory = SessionFactory::build(&PersistenceUnit::in_memory("bench")).unwrap();
    let mut session = factory.open_session().unwrap();
    catalog::seed(&mut session).unwrap();

    c.bench_function("employees_named_earning_over", |b| {
        b.iter(|| black_box(catalog::employees_named_earning_over(&session, "Yulij", 5000).unwrap()))
    });
    c.bench_function("authors_with_title", |b| {
        b.iter(|| black_box(catalog::authors_with_title(&session, "By pen & sword").unwrap()))
    });
    c.bench_function("employee_salaries_native", |b| {
        b.iter(|| black_box(catalog::employee_salaries(&session).unwrap()))
    });
    c.bench_function("employee_page", |b| {
        b.iter(|| black_box(catalog::employee_page(&session, 1, 2).unwrap()))
    });
    c.bench_function("open_session", |b| {
        b.iter(|| black_box(factory.open_session().unwrap().id()))
    });
}

criterion_group!(benches, benchmark_render, benchmark_catalog);
criterion_main!(benches);
