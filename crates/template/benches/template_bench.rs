//! Benchmarks for trellis-template.
//!
//! Run with: cargo bench -p trellis-template

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trellis_dom::Node;
use trellis_observable::{
    bind, process_updates, Binding, Model, ModelClass, ObservableArray, Value, ValueExt,
};
use trellis_template::{compile_template, html, repeat_with, RepeatOptions};

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let template = html!("<div class=\"card " { bind(|x, _| x.prop("kind")) } "\">"
        "<h2>" { bind(|x, _| x.prop("title")) } "</h2>"
        "<p title=\"" { bind(|x, _| x.prop("title")) } "\">" { bind(|x, _| x.prop("body")) } "</p>"
        "</div>");
    let html = template.html().to_string();
    let directives = template.directives().to_vec();

    group.bench_function("card", |b| {
        b.iter(|| compile_template(black_box(&html), &directives))
    });
    group.finish();
}

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("view");
    let class = ModelClass::with_properties("Card", None, &["kind", "title", "body"]);
    let card = Model::with_fields(
        &class,
        [("kind", "note"), ("title", "Hello"), ("body", "World")],
    )
    .to_value();
    let template = html!("<div class=\"card " { bind(|x, _| x.prop("kind")) } "\">"
        "<h2>" { bind(|x, _| x.prop("title")) } "</h2>"
        "<p>" { bind(|x, _| x.prop("body")) } "</p>"
        "</div>");

    group.bench_function("create_bind_dispose", |b| {
        let host = Node::element("main");
        b.iter(|| {
            let view = template.render(&card, &host, None).unwrap();
            view.dispose();
        })
    });

    group.bench_function("update_text", |b| {
        let host = Node::element("main");
        let _view = template.render(&card, &host, None).unwrap();
        let mut i = 0i64;
        b.iter(|| {
            i += 1;
            card.set_prop("body", Value::from(i));
            process_updates();
        })
    });
    group.finish();
}

fn bench_repeat(c: &mut Criterion) {
    let mut group = c.benchmark_group("repeat");

    for size in [10usize, 100, 1000] {
        for recycle in [true, false] {
            let id = BenchmarkId::new(if recycle { "rotate_recycle" } else { "rotate" }, size);
            group.bench_with_input(id, &size, |b, &size| {
                let array = ObservableArray::from_vec((0..size).map(Value::from).collect());
                let class = ModelClass::with_properties("List", None, &["items"]);
                let source = Model::with_fields(&class, [("items", array.to_value())]).to_value();
                let item = html!("<li>" { bind(|x, _| x.clone()) } "</li>");
                let list = html!("<ul>" {
                    repeat_with(
                        bind(|x, _| x.prop("items")),
                        Binding::constant(item.to_value()),
                        RepeatOptions { positioning: false, recycle },
                    )
                } "</ul>");
                let host = Node::element("div");
                let _view = list.render(&source, &host, None).unwrap();

                b.iter(|| {
                    if let Some(first) = array.shift() {
                        array.push(first);
                    }
                    process_updates();
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_create, bench_repeat);
criterion_main!(benches);
