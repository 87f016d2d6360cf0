use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use ledgerprint_templating::{
    ExpressionEvaluator, InterpreterConfig, RenderContext, StandardEvaluator, Template,
    TemplateInterpreter, Value,
};

const INVOICE_TEMPLATE: &str = "\
Invoice @{id} for @{owner.name}
%+ for e in entries:
@{e.description}: @{e.qty} x @{e.price} = @{e.amount}
%+ if e.amount > 100:
  (large item)
%-
%= else:
Total: @{total}
%-
";

fn context(entries: usize) -> RenderContext {
    let mut ctx = RenderContext::new();
    ctx.insert("id", "000042");
    ctx.insert("owner", Value::record().with("name", "ACME Ltd"));
    let rows = (0..entries)
        .map(|i| {
            Value::record()
                .with("description", format!("item {i}"))
                .with("qty", i as i64)
                .with("price", 25i64)
                .with("amount", i as i64 * 25)
        })
        .collect::<Vec<_>>();
    ctx.insert("entries", rows);
    ctx.insert("total", (0..entries as i64).map(|i| i * 25).sum::<i64>());
    ctx
}

fn bench_render_entries(c: &mut Criterion) {
    let interpreter = TemplateInterpreter::new(&InterpreterConfig::default()).unwrap();
    let template = Template::from_text(INVOICE_TEMPLATE);

    let mut group = c.benchmark_group("render_entries");
    for entries in [10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(entries as u64));
        group.bench_with_input(BenchmarkId::new("invoice", entries), &entries, |b, &n| {
            let mut ctx = context(n);
            b.iter(|| {
                let mut out = Vec::with_capacity(n * 64);
                interpreter
                    .render(black_box(&template), &mut ctx, &mut out)
                    .unwrap();
                out
            });
        });
    }
    group.finish();
}

fn bench_expression(c: &mut Criterion) {
    let evaluator = StandardEvaluator::new();
    let ctx = context(10);

    let mut group = c.benchmark_group("expression");
    group.bench_function("field_and_arithmetic", |b| {
        b.iter(|| {
            evaluator
                .evaluate(black_box("entries[3].qty * entries[3].price + 1.5"), &ctx)
                .unwrap()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_render_entries, bench_expression);
criterion_main!(benches);
