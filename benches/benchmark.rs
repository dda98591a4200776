use criterion::{criterion_group, criterion_main, Criterion};
use ppidb::config::{LoaderConfig, StoreConfig};
use ppidb::iterators::BulkLoader;
use ppidb::value::Evidence;
use ppidb::{consensus, Database, Ppi, Protein};
use std::sync::Arc;
use tempfile::tempdir;

fn sequence(i: usize) -> String {
    format!("MGRGK{}", "A".repeat(i + 1))
}

fn benchmark_consensus(c: &mut Criterion) {
    for origins in [1, 5, 25] {
        let origin: Vec<String> = (0..origins)
            .map(|i| if i % 3 == 0 { format!("screen&{}", i) } else { format!("paper_{}", i) })
            .collect();
        let interaction: Vec<Vec<Evidence>> = (0..origins)
            .map(|i| vec![Evidence::Int((i % 2) as i64), Evidence::Token("NC".into())])
            .collect();
        c.bench_function(&format!("consensus_{}_origins", origins), |b| {
            b.iter(|| consensus(&origin, &interaction))
        });
    }
}

fn benchmark_bulk_load(c: &mut Criterion) {
    let temp_dir = tempdir().unwrap();
    let db = Database::open(StoreConfig::new(temp_dir.path())).unwrap();
    let proteins: Vec<Protein> = (0..50).map(|i| Protein::new(&sequence(i)).unwrap()).collect();
    for protein in &proteins {
        db.proteins.persist(protein).unwrap();
    }
    for pair in proteins.windows(2) {
        let mut ppi = Ppi::new(&pair[0], &pair[1]);
        ppi.add_evidence("Gong_2017", vec![Evidence::Int(1)]);
        db.ppis.persist(&ppi).unwrap();
    }

    for workers in [1, 8, 50] {
        let loader =
            BulkLoader::new(&LoaderConfig { workers, batch_size: 16 }, Arc::default()).unwrap();
        c.bench_function(&format!("bulk_load_ppis_{}_workers", workers), |b| {
            b.iter(|| loader.entities(&db.ppis, Vec::new()).unwrap().skip_failures().count())
        });
    }
}

fn benchmark_persist(c: &mut Criterion) {
    let temp_dir = tempdir().unwrap();
    let db = Database::open(StoreConfig::new(temp_dir.path())).unwrap();
    let mut protein = Protein::new(&sequence(10)).unwrap();
    protein.taxon_id = Some(3702);
    c.bench_function("persist_protein", |b| b.iter(|| db.proteins.persist(&protein).unwrap()));
}

criterion_group!(benches, benchmark_consensus, benchmark_bulk_load, benchmark_persist);
criterion_main!(benches);
