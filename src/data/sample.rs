use std::collections::BTreeMap;

use super::model::{CellValue, Dataset, DatasetError};

// ---------------------------------------------------------------------------
// Simulated source: a small sales table with planted outliers
// ---------------------------------------------------------------------------

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];

/// Build a deterministic sales-like dataset of `rows` records.
///
/// Columns: `order_id`, `region`, `revenue`, `units`, `discount`, `promoted`.
/// Revenue tracks units with gaussian noise; every 37th row is pushed far
/// off the trend so the default threshold has something to find.
pub fn simulated_dataset(rows: usize, seed: u64) -> Result<Dataset, DatasetError> {
    let mut rng = SimpleRng::new(seed);
    let columns = ["order_id", "region", "revenue", "units", "discount", "promoted"]
        .iter()
        .map(|c| c.to_string())
        .collect();

    let records = (0..rows)
        .map(|i| {
            let units = (rng.gauss(40.0, 8.0)).round().max(1.0);
            let mut revenue = units * 25.0 + rng.gauss(0.0, 60.0);
            let mut discount = (rng.gauss(0.1, 0.03)).clamp(0.0, 0.5);
            if i % 37 == 36 {
                revenue *= 3.5;
                discount = 0.45;
            }
            let region = REGIONS[(rng.next_u64() % REGIONS.len() as u64) as usize];

            let mut cells = BTreeMap::new();
            cells.insert("order_id".to_string(), CellValue::Text(format!("ORD-{:05}", i + 1)));
            cells.insert("region".to_string(), CellValue::Text(region.to_string()));
            cells.insert("revenue".to_string(), CellValue::Number((revenue * 100.0).round() / 100.0));
            cells.insert("units".to_string(), CellValue::Number(units));
            cells.insert("discount".to_string(), CellValue::Number((discount * 1000.0).round() / 1000.0));
            cells.insert("promoted".to_string(), CellValue::Bool(rng.next_f64() < 0.25));
            cells
        })
        .collect();

    Dataset::new("simulated_sales", columns, records)
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}
