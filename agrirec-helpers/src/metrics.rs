use std::fmt::Write;

/// Fraction of positions where `y_pred` equals `y_true`. Empty input scores 0.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t == p)
        .count();
    hits as f64 / y_true.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 plus overall accuracy.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
}

impl ClassificationReport {
    pub fn new(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Self {
        let mut tp = vec![0usize; n_classes];
        let mut predicted = vec![0usize; n_classes];
        let mut actual = vec![0usize; n_classes];

        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t < n_classes {
                actual[t] += 1;
            }
            if p < n_classes {
                predicted[p] += 1;
            }
            if t == p && t < n_classes {
                tp[t] += 1;
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        let classes = (0..n_classes)
            .map(|c| {
                let precision = ratio(tp[c], predicted[c]);
                let recall = ratio(tp[c], actual[c]);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics { precision, recall, f1, support: actual[c] }
            })
            .collect();

        Self { classes, accuracy: accuracy(y_true, y_pred) }
    }

    /// Renders a fixed-width table, one row per class name.
    pub fn render<S: AsRef<str>>(&self, names: &[S]) -> String {
        let width = names
            .iter()
            .map(|n| n.as_ref().len())
            .max()
            .unwrap_or(0)
            .max(8);
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        );
        for (i, m) in self.classes.iter().enumerate() {
            let name = names.get(i).map(|n| n.as_ref()).unwrap_or("?");
            let _ = writeln!(
                out,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            );
        }
        let total: usize = self.classes.iter().map(|m| m.support).sum();
        let _ = writeln!(out, "{:>width$} {:>29.2} {:>9}", "accuracy", self.accuracy, total);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_accuracy() {
        assert_abs_diff_eq!(accuracy(&[0, 1, 1, 2], &[0, 1, 0, 2]), 0.75);
        assert_abs_diff_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_report_counts() {
        let y_true = [0, 0, 1, 1];
        let y_pred = [0, 1, 1, 1];
        let report = ClassificationReport::new(&y_true, &y_pred, 2);

        assert_abs_diff_eq!(report.classes[0].precision, 1.0);
        assert_abs_diff_eq!(report.classes[0].recall, 0.5);
        assert_abs_diff_eq!(report.classes[1].precision, 2.0 / 3.0);
        assert_abs_diff_eq!(report.classes[1].recall, 1.0);
        assert_eq!(report.classes[1].support, 2);
        assert_abs_diff_eq!(report.accuracy, 0.75);

        let table = report.render(&["rice", "maize"]);
        assert!(table.contains("rice"));
        assert!(table.contains("accuracy"));
    }
}
