pub struct Statistics;

impl Statistics {
    pub fn mean<I>(values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sum = 0.0;
        let mut n = 0usize;
        for v in values {
            sum += v;
            n += 1;
        }
        if n == 0 {
            return None;
        }
        Some(sum / n as f64)
    }

    pub fn min_max<I, T>(values: I) -> Option<(T, T)>
    where
        I: IntoIterator<Item = T>,
        T: PartialOrd + Copy,
    {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let mut min = first;
        let mut max = first;
        for v in iter {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        Some((min, max))
    }
}
