use std::hint::black_box;

use bencher::{FORM_BOUNDARY, TestCase, TestFile};
use bytes::Bytes;
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use micro_stream::{BufferedReader, DelimiterPolicy, FnSource};

static LARGE_FORM: TestFile = TestFile::new("large.txt", include_str!("../resources/form/large.txt"));

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::new("fragment_1k", LARGE_FORM, 1024),
        TestCase::new("fragment_16k", LARGE_FORM, 16 * 1024),
        TestCase::new("fragment_odd", LARGE_FORM, 1021),
    ]
}

fn reader(case: &TestCase) -> BufferedReader<FnSource<impl FnMut(usize) -> std::io::Result<Bytes>>> {
    let mut rest = Bytes::from_static(case.file().content().as_bytes());
    let fragment = case.fragment();
    let source = FnSource::new(move |max_size: usize| Ok(rest.split_to(max_size.min(fragment).min(rest.len()))));
    BufferedReader::with_chunk_size(source, None, 8 * 1024)
}

fn benchmark_read_until(criterion: &mut Criterion) {
    let delimiter = format!("\r\n--{FORM_BOUNDARY}");
    let mut group = criterion.benchmark_group("read_until");

    for case in create_test_cases() {
        group.throughput(Throughput::Bytes(case.file().content().len() as u64));
        group.bench_with_input(BenchmarkId::new(case.file_name(), case.name()), &case, |b, case| {
            b.iter_batched_ref(
                || reader(case),
                |reader| loop {
                    let bytes =
                        reader.read_until(delimiter.as_bytes(), None, DelimiterPolicy::Optional).expect("delimiter should be valid");
                    black_box(&bytes);
                    if reader.is_eof() {
                        break;
                    }
                    reader.consume_delimiter(delimiter.as_bytes()).expect("delimiter should follow");
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_readline(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("readline");

    for case in create_test_cases() {
        group.throughput(Throughput::Bytes(case.file().content().len() as u64));
        group.bench_with_input(BenchmarkId::new(case.file_name(), case.name()), &case, |b, case| {
            b.iter_batched_ref(
                || reader(case),
                |reader| {
                    let lines = reader.readlines(None).expect("source should not fail");
                    black_box(lines.len());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(read_until, benchmark_read_until, benchmark_readline);
criterion_main!(read_until);
