/// Mixed-radix indexing of the joint configurations of a subset.
///
/// Position `i` ranges over `0..radices[i]`; the last position varies
/// fastest, so linear indices enumerate states in lexicographic order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedRadix {
    radices: Vec<usize>,
    strides: Vec<usize>,
    len: Option<usize>,
}

impl MixedRadix {
    pub fn new(radices: Vec<usize>) -> Self {
        let mut strides = vec![0; radices.len()];
        let mut acc: Option<usize> = Some(1);
        for i in (0..radices.len()).rev() {
            strides[i] = acc.unwrap_or(0);
            acc = acc.and_then(|a| a.checked_mul(radices[i]));
        }
        Self {
            radices,
            strides,
            len: acc,
        }
    }

    pub fn radices(&self) -> &[usize] {
        &self.radices
    }

    /// Number of joint configurations, or `None` if it does not fit in `usize`.
    pub fn len(&self) -> Option<usize> {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == Some(0)
    }

    pub fn encode(&self, states: &[usize]) -> usize {
        states
            .iter()
            .zip(&self.strides)
            .map(|(&s, &stride)| s * stride)
            .sum()
    }

    pub fn decode_into(&self, mut index: usize, out: &mut [usize]) {
        for (i, &r) in self.radices.iter().enumerate().rev() {
            out[i] = index % r;
            index /= r;
        }
    }

    pub fn decode(&self, index: usize) -> Vec<usize> {
        let mut out = vec![0; self.radices.len()];
        self.decode_into(index, &mut out);
        out
    }

    /// Iterates every joint configuration in lexicographic order.
    pub fn iter(&self) -> Counter<'_> {
        Counter {
            radices: &self.radices,
            current: vec![0; self.radices.len()],
            done: self.radices.iter().any(|&r| r == 0),
        }
    }
}

/// Odometer over a mixed-radix space.
pub struct Counter<'a> {
    radices: &'a [usize],
    current: Vec<usize>,
    done: bool,
}

impl Iterator for Counter<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let out = self.current.clone();
        let mut digit = self.radices.len();
        loop {
            if digit == 0 {
                self.done = true;
                break;
            }
            digit -= 1;
            self.current[digit] += 1;
            if self.current[digit] < self.radices[digit] {
                break;
            }
            self.current[digit] = 0;
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iter_enumerates_lexicographically() {
        let radix = MixedRadix::new(vec![2, 3]);
        let all: Vec<_> = radix.iter().collect();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0], vec![0, 0]);
        assert_eq!(all[1], vec![0, 1]);
        assert_eq!(all[3], vec![1, 0]);
        assert_eq!(all[5], vec![1, 2]);
    }

    #[test]
    fn encode_matches_iteration_order() {
        let radix = MixedRadix::new(vec![3, 2, 4]);
        for (i, states) in radix.iter().enumerate() {
            assert_eq!(radix.encode(&states), i);
            assert_eq!(radix.decode(i), states);
        }
        assert_eq!(radix.len(), Some(24));
    }

    #[test]
    fn empty_radix_list_has_one_configuration() {
        let radix = MixedRadix::new(vec![]);
        assert_eq!(radix.len(), Some(1));
        assert_eq!(radix.iter().collect::<Vec<_>>(), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn zero_radix_yields_nothing() {
        let radix = MixedRadix::new(vec![2, 0]);
        assert!(radix.is_empty());
        assert_eq!(radix.iter().count(), 0);
    }

    #[test]
    fn len_reports_overflow() {
        let radix = MixedRadix::new(vec![usize::MAX, 3]);
        assert_eq!(radix.len(), None);
    }
}
