use criterion::{Criterion, black_box, criterion_group, criterion_main};

use docbson::builder::DocumentBuilder;
use docbson::builder::basic;
use docbson::document::validate_document;

fn build_flat_document() -> docbson::Document {
    let mut builder = DocumentBuilder::new();
    for i in 0..64 {
        let key = format!("field_{i}");
        builder = builder.key(&key).unwrap().append(i as i64).unwrap();
    }
    builder.finish().unwrap()
}

fn build_nested_document() -> docbson::Document {
    basic::document(|d| {
        d.append("level", 0i32)?;
        d.append_document("child", |c| {
            c.append("level", 1i32)?;
            c.append_array("items", |a| {
                for i in 0..32 {
                    a.push_document(|item| {
                        item.append("index", i)?;
                        item.append("weight", f64::from(i) * 0.5)
                    })?;
                }
                Ok(())
            })
        })
    })
    .unwrap()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("build flat document (64 int64 fields)", |b| {
        b.iter(|| black_box(build_flat_document()))
    });

    c.bench_function("build nested document (32 array items)", |b| {
        b.iter(|| black_box(build_nested_document()))
    });

    let doc = build_nested_document();
    c.bench_function("validate nested document", |b| {
        b.iter(|| validate_document(black_box(doc.as_bytes())))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
