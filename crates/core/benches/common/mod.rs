use std::env;
use std::time::Duration;

use criterion::measurement::Measurement;
use criterion::{BenchmarkGroup, Criterion, Throughput};

use marginalia_core::model::{Page, TextFragment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchTier {
    Quick,
    Full,
}

impl BenchTier {
    pub fn from_env() -> Self {
        match env::var("MARGINALIA_BENCH_TIER").as_deref() {
            Ok("full") => Self::Full,
            _ => Self::Quick,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupWeight {
    Light,
    Heavy,
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub tier: BenchTier,
    pub seed: u64,
    pub sample_size_light: usize,
    pub sample_size_heavy: usize,
    pub measurement_light: Duration,
    pub measurement_heavy: Duration,
}

pub type BenchCriterion = Criterion;

pub fn bench_config() -> BenchConfig {
    let tier = BenchTier::from_env();
    let seed = env::var("MARGINALIA_BENCH_SEED")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0xC0FFEE);
    let (sample_size_light, sample_size_heavy, measurement_light, measurement_heavy) = match tier {
        BenchTier::Quick => (20, 12, Duration::from_secs(3), Duration::from_secs(5)),
        BenchTier::Full => (30, 20, Duration::from_secs(5), Duration::from_secs(10)),
    };

    BenchConfig {
        tier,
        seed,
        sample_size_light,
        sample_size_heavy,
        measurement_light,
        measurement_heavy,
    }
}

pub fn configure_group<M: Measurement>(
    group: &mut BenchmarkGroup<'_, M>,
    cfg: &BenchConfig,
    weight: GroupWeight,
) {
    match weight {
        GroupWeight::Light => {
            group.sample_size(cfg.sample_size_light);
            group.measurement_time(cfg.measurement_light);
        }
        GroupWeight::Heavy => {
            group.sample_size(cfg.sample_size_heavy);
            group.measurement_time(cfg.measurement_heavy);
        }
    }
}

pub fn bench_criterion() -> BenchCriterion {
    Criterion::default().configure_from_args()
}

pub fn elements_throughput(n: usize) -> Throughput {
    Throughput::Elements(n as u64)
}

#[derive(Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    pub fn gen_f64(&mut self, min: f64, max: f64) -> f64 {
        let n = self.next_u64() as f64 / u64::MAX as f64;
        min + (max - min) * n
    }
}

/// A letter-sized page of `rows` text lines, `words` per line, with jittered
/// word widths. Every word is unique (`w<row>_<col>`).
pub fn gen_page(seed: u64, index: usize, rows: usize, words: usize) -> Page {
    let mut rng = XorShift64::new(seed ^ index as u64);
    let column = (96.0, 516.0);
    let slot = (column.1 - column.0) / words as f64;
    let mut frags = Vec::with_capacity(rows * words);
    for row in 0..rows {
        let y = 72.0 + row as f64 * 13.0;
        for col in 0..words {
            let x0 = column.0 + col as f64 * slot;
            let x1 = x0 + rng.gen_f64(slot * 0.5, slot * 0.9);
            frags.push(TextFragment::new(
                format!("w{row}_{col}"),
                (x0, y, x1, y + 10.0),
                row as u32,
            ));
        }
    }
    Page::from_fragments(index, 612.0, 792.0, frags)
}
