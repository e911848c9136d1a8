use rand_core::RngCore;
use rand_distr::{Distribution, Standard};

/// Cumulative distribution over labels, used for inverse transform sampling.
///
/// Labels are sorted before accumulation so a table built from the same
/// weights is always the same, whatever the iteration order of the source.
///
/// Labels with a zero weight are left out. A plain "first boundary at least
/// `u`" lookup would resolve a draw of exactly 0.0 to a zero-weight label
/// sorted first; here every boundary lies in (0, 1] and such a draw resolves
/// to the first label that can occur. When the total weight is zero the table
/// is empty and every draw yields `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionTable<L> {
    labels: Vec<L>,
    cumulative: Vec<f64>,
}

impl<L> Default for SelectionTable<L> {
    fn default() -> Self {
        SelectionTable {
            labels: vec![],
            cumulative: vec![],
        }
    }
}

impl<L: Ord> SelectionTable<L> {
    pub fn from_weights(weights: impl IntoIterator<Item = (L, u64)>) -> Self {
        let mut weights: Vec<(L, u64)> = weights.into_iter().filter(|(_, w)| *w > 0).collect();
        weights.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let total: u64 = weights.iter().map(|(_, w)| w).sum();
        if total == 0 {
            return SelectionTable::default();
        }

        let mut labels = Vec::with_capacity(weights.len());
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut running = 0;
        for (label, w) in weights {
            running += w;
            labels.push(label);
            // dividing the running sum keeps the last boundary at exactly 1
            cumulative.push(running as f64 / total as f64);
        }
        SelectionTable { labels, cumulative }
    }
}

impl<L> SelectionTable<L> {
    /// The label of the first boundary that is at least `u`. A draw beyond the
    /// last boundary resolves to the last label.
    pub fn sample(&self, u: f64) -> Option<&L> {
        if self.labels.is_empty() {
            return None;
        }
        let index = self
            .cumulative
            .partition_point(|&c| c < u)
            .min(self.labels.len() - 1);
        self.labels.get(index)
    }

    /// Sample with a uniform draw in [0, 1)
    pub fn draw(&self, rng: &mut impl RngCore) -> Option<&L> {
        let u: f64 = Standard.sample(rng);
        self.sample(u)
    }

    pub fn labels(&self) -> &[L] {
        &self.labels
    }

    pub fn cumulative_probabilities(&self) -> &[f64] {
        &self.cumulative
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
