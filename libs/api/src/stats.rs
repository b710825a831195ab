use crate::{RawSeries, SevenNumberSummary};

/// Перцентили seven-number summary, в порядке полей `SevenNumberSummary`.
pub const SUMMARY_PERCENTILES: [f64; 7] = [0.02, 0.09, 0.25, 0.50, 0.75, 0.91, 0.98];

/// Empirical quantile с линейной интерполяцией.
///
/// `sorted` должен быть отсортирован по возрастанию. Ранг `p·(n−1)`,
/// значение интерполируется между двумя соседними порядковыми
/// статистиками. `p = 0` / `p = 1` дают ровно первый / последний элемент.
/// Пустой срез → `None`.
pub fn quantile(p: f64, sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let p = p.clamp(0.0, 1.0);
    let rank = p * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

/// Посчитать сводку по raw-серии. `None` для пустой серии.
pub fn summarize(raw: &RawSeries) -> Option<SevenNumberSummary> {
    let mut values: Vec<f64> = raw.values.iter().map(|d| d.value).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let q = |p: f64| quantile(p, &values).unwrap_or(f64::NAN);
    let [p2, p9, p25, p50, p75, p91, p98] = SUMMARY_PERCENTILES.map(q);

    Some(SevenNumberSummary {
        key: raw.key.clone(),
        at: raw.at,
        min: q(0.0),
        max: q(1.0),
        p2,
        p9,
        p25,
        p50,
        p75,
        p91,
        p98,
    })
}
