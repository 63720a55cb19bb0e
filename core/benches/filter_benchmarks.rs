use bazaar::filters::{filter_and_page, FilterParams, Filters, ListQuery};
use bazaar::models::{Order, OrderStatus, Product, UnitType};
use bazaar::{ContextData, Pipeline, PipelineControl, WorkflowError};
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;
use uuid::Uuid;

fn products(count: usize) -> Vec<Product> {
  (0..count)
    .map(|i| Product {
      id: Uuid::new_v4(),
      name: format!("Product {:05}", count - i),
      description: String::new(),
      price: Decimal::new((i as i64 * 37) % 10_000, 2),
      unit_type: UnitType::Unit,
      stock: Decimal::from(10),
      category_id: Uuid::nil(),
      image_url: None,
    })
    .collect()
}

fn orders(count: usize) -> Vec<Order> {
  let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
  (0..count)
    .map(|i| Order {
      id: Uuid::new_v4(),
      user_id: Uuid::nil(),
      created_at: start + ChronoDuration::hours((i * 7 % (24 * 365)) as i64),
      status: if i % 5 == 0 { OrderStatus::Cancelled } else { OrderStatus::Pending },
      total_value: Decimal::new(i as i64 % 5_000, 2),
      lines: Vec::new(),
    })
    .collect()
}

fn bench_strategy_apply(c: &mut Criterion) {
  let mut group = c.benchmark_group("FilterStrategyApply");
  let filters = Filters::new();
  let name_params = FilterParams {
    name: Some("00".to_string()),
    ..FilterParams::default()
  };
  let date_params = FilterParams {
    from: NaiveDate::from_ymd_opt(2024, 3, 1),
    to: NaiveDate::from_ymd_opt(2024, 6, 30),
    ..FilterParams::default()
  };

  for size in [100usize, 1_000, 10_000] {
    let catalog = products(size);
    let history = orders(size);
    group.throughput(Throughput::Elements(size as u64));

    let name = filters.products.get_strategy("name").unwrap();
    group.bench_with_input(BenchmarkId::new("products_by_name", size), &catalog, |b, items| {
      b.iter(|| black_box(name.apply(items, &name_params)))
    });

    let date = filters.orders.get_strategy("date").unwrap();
    group.bench_with_input(BenchmarkId::new("orders_by_date", size), &history, |b, items| {
      b.iter(|| black_box(date.apply(items, &date_params)))
    });
  }
  group.finish();
}

fn bench_list_query(c: &mut Criterion) {
  let mut group = c.benchmark_group("ListQuery");
  let filters = Filters::new();
  let history = orders(5_000);
  let query = ListQuery {
    filter: Some("Value".to_string()),
    comparator: Some("greater".to_string()),
    value: Some(Decimal::from(20)),
    page: Some(3),
    page_size: Some(50),
    ..ListQuery::default()
  };

  group.bench_function("lookup_filter_and_page", |b| {
    b.iter_batched(
      || history.clone(),
      |items| black_box(filter_and_page(&filters, items, &query).unwrap()),
      criterion::BatchSize::LargeInput,
    )
  });
  group.bench_function("strategy_lookup", |b| {
    b.iter(|| black_box(filters.orders.get_strategy("STATUS").is_ok()))
  });
  group.finish();
}

#[derive(Debug, Default)]
struct Tally {
  steps: u64,
}

fn bench_pipeline_run(c: &mut Criterion) {
  let mut group = c.benchmark_group("PipelineRun");
  let rt = Runtime::new().unwrap();

  for step_count in [1usize, 5, 10] {
    let names: Vec<String> = (0..step_count).map(|i| format!("step_{}", i)).collect();
    let defs: Vec<(&str, bool, Option<bazaar::workflow::SkipCondition<Tally>>)> =
      names.iter().map(|name| (name.as_str(), false, None)).collect();
    let mut pipeline = Pipeline::<Tally, WorkflowError>::new(&defs);
    for name in &names {
      pipeline.on_step(name, |ctx: ContextData<Tally>| async move {
        ctx.write().steps += 1;
        Ok::<_, WorkflowError>(PipelineControl::Continue)
      });
    }
    let pipeline = Arc::new(pipeline);

    group.throughput(Throughput::Elements(step_count as u64));
    group.bench_with_input(BenchmarkId::from_parameter(step_count), &step_count, |b, _| {
      b.to_async(&rt).iter_batched(
        || ContextData::new(Tally::default()),
        |ctx| {
          let pipeline = pipeline.clone();
          async move { pipeline.run(ctx).await.unwrap() }
        },
        criterion::BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

criterion_group!(benches, bench_strategy_apply, bench_list_query, bench_pipeline_run);
criterion_main!(benches);
