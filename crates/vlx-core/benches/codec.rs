//! Codec benchmarks: text and binary encode/decode, plus linking.
//!
//! Run with: cargo bench -p vlx-core --bench codec

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vlx_core::{export_binary, export_text, import_binary, link, parse_text, StructureRef};

/// A scene with `meshes` meshes, each holding vertex/index arrays, a shader
/// rawtext block, and a `#uid` reference to a shared material.
fn generate_document(meshes: usize) -> String {
    let mut text = String::from("VLX version=100 encoding=ascii\n\n<Scene>\n{\n");
    text.push_str("\tmaterial = <Material> { ID = #mat diffuse = ( 0.8 0.2 0.2 1.0 ) }\n");
    text.push_str("\tmeshes = [\n");
    for i in 0..meshes {
        text.push_str(&format!("\t\t<Mesh>\n\t\t{{\n\t\t\tname = \"mesh{i}\"\n"));
        text.push_str("\t\t\tmaterial = #mat\n\t\t\tvertices = (");
        for v in 0..48 {
            text.push_str(&format!(" {}", (i * 48 + v) as f64 * 0.125));
        }
        text.push_str(" )\n\t\t\tindices = (");
        for v in 0..36 {
            text.push_str(&format!(" {}", v % 16));
        }
        text.push_str(" )\n\t\t\tshader = <Glsl> {<\nvoid main() { gl_FragColor = vec4(1.0); }\n>}\n");
        text.push_str("\t\t}\n");
    }
    text.push_str("\t]\n}\n");
    text
}

fn parsed(text: &str) -> StructureRef {
    parse_text(text).expect("benchmark document must parse")
}

fn bench_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("text");
    for meshes in [10, 100, 1000] {
        let text = generate_document(meshes);
        let root = parsed(&text);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", meshes), &text, |b, text| {
            b.iter(|| parse_text(black_box(text)))
        });
        group.bench_with_input(BenchmarkId::new("export", meshes), &root, |b, root| {
            b.iter(|| export_text(black_box(root)))
        });
    }
    group.finish();
}

fn bench_binary(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary");
    for meshes in [10, 100, 1000] {
        let root = parsed(&generate_document(meshes));
        let bytes = export_binary(&root);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("import", meshes), &bytes, |b, bytes| {
            b.iter(|| import_binary(black_box(bytes)))
        });
        group.bench_with_input(BenchmarkId::new("export", meshes), &root, |b, root| {
            b.iter(|| export_binary(black_box(root)))
        });
    }
    group.finish();
}

fn bench_link(c: &mut Criterion) {
    let text = generate_document(1000);
    c.bench_function("link/1000", |b| {
        b.iter_batched(
            || parsed(&text),
            |root| link(&root),
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_text, bench_binary, bench_link);
criterion_main!(benches);
