use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use segcol::segment::meta::{ColumnMeta, EncodingType};
use segcol::segment_read::column_sink::{ColumnBatch, ColumnSink};
use segcol::segment_read::condition::{CompareOp, ComparisonCondition};
use segcol::segment_read::row_ranges::RowRanges;
use segcol::segment_read::{ColumnIteratorOptions, ColumnReader, ColumnReaderOptions};
use segcol_core::col_type::FieldType;
use segcol_core::datum::Datum;
use std::hint::black_box;

#[path = "../tests/common/mod.rs"]
mod common;

use common::{ColumnSpec, SegmentBuilder};

const ROW_COUNT: usize = 100_000;
const PAGE_ROWS: usize = 4096;
const BATCH_SIZE: usize = 1024;
const NULL_PCTS: [usize; 2] = [0, 20];

struct ScanCase {
    name: String,
    meta: ColumnMeta,
    reader: ColumnReader,
}

fn make_values(field_type: FieldType, null_pct: usize, cardinality: usize) -> Vec<Datum> {
    (0..ROW_COUNT)
        .map(|i| {
            if null_pct > 0 && i % 100 < null_pct {
                return Datum::Null;
            }
            let v = (i * 7919) % cardinality;
            match field_type {
                FieldType::BigInt => Datum::BigInt(v as i64),
                FieldType::Double => Datum::Double(v as f64 / 3.0),
                FieldType::Varchar => Datum::Bytes(format!("value_{v:06}").into_bytes()),
                _ => Datum::Int(v as i32),
            }
        })
        .collect()
}

fn build_case(field_type: FieldType, encoding: EncodingType, null_pct: usize, cardinality: usize) -> ScanCase {
    let mut spec = ColumnSpec::new(field_type)
        .encoding(encoding)
        .page_rows(PAGE_ROWS)
        .with_zone_map()
        .with_bloom_filter();
    if null_pct > 0 {
        spec = spec.nullable();
    }
    let values = make_values(field_type, null_pct, cardinality);
    let mut builder = SegmentBuilder::new();
    let meta = builder.add_column(&spec, &values);
    let reader = ColumnReader::create(
        &ColumnReaderOptions::default(),
        &meta,
        meta.num_rows,
        "bench.dat",
        builder.source(),
    )
    .unwrap();
    let name = format!(
        "{}_{:?}_null{}_card{}",
        field_type.name(),
        encoding,
        null_pct,
        cardinality
    );
    ScanCase { name, meta, reader }
}

fn build_cases() -> Vec<ScanCase> {
    let mut cases = Vec::new();
    for null_pct in NULL_PCTS {
        cases.push(build_case(FieldType::Int, EncodingType::Plain, null_pct, ROW_COUNT));
        cases.push(build_case(FieldType::BigInt, EncodingType::Plain, null_pct, ROW_COUNT));
        cases.push(build_case(FieldType::Double, EncodingType::Plain, null_pct, ROW_COUNT));
        for cardinality in [16, 1000] {
            cases.push(build_case(FieldType::Varchar, EncodingType::Dict, null_pct, cardinality));
        }
    }
    cases
}

fn bench_scan_column(c: &mut Criterion) {
    let cases = build_cases();
    let mut group = c.benchmark_group("scan_column");

    for case in &cases {
        group.throughput(Throughput::Elements(ROW_COUNT as u64));
        group.bench_function(&case.name, |b| {
            b.iter(|| {
                let mut batch = ColumnBatch::for_column(&case.meta).unwrap();
                let mut iter = case.reader.new_iterator(ColumnIteratorOptions::default());
                iter.seek_to_first().unwrap();
                loop {
                    let read = iter.next_batch(BATCH_SIZE, &mut batch).unwrap();
                    if read.rows < BATCH_SIZE {
                        break;
                    }
                    batch.clear();
                }
                black_box(batch.len());
            })
        });
    }

    group.finish();
}

fn bench_prune(c: &mut Criterion) {
    let case = build_case(FieldType::Int, EncodingType::Plain, 0, ROW_COUNT);
    let cond = ComparisonCondition::new(CompareOp::Eq, vec![Datum::Int(4242)]);
    case.reader.load_indexes_if_needed().unwrap();
    let mut group = c.benchmark_group("prune");

    group.bench_function("zone_map", |b| {
        b.iter(|| black_box(case.reader.prune_by_zone_map(black_box(&cond), None).unwrap()))
    });
    let all = RowRanges::create_single(0, ROW_COUNT as u64);
    group.bench_function("bloom_filter", |b| {
        b.iter(|| black_box(case.reader.prune_by_bloom_filter(black_box(&cond), &all).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_scan_column, bench_prune);
criterion_main!(benches);
