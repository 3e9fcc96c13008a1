//! Column layout for name listings, filled top to bottom then left to right.

/// Spaces between two columns.
const GAP: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct Columns {
    width: usize,
    items: Vec<String>,
}

impl Columns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: impl Into<String>) {
        let item = item.into();
        self.width = self.width.max(item.chars().count());
        self.items.push(item);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Lays the items out for a terminal `term_width` columns wide.
    ///
    /// Every row ends with a newline. When not even two columns fit, one item is printed per row.
    #[must_use]
    pub fn render(&self, term_width: usize) -> String {
        let mut out = String::new();
        if self.items.is_empty() || self.width == 0 {
            return out;
        }
        let cell = self.width + GAP;
        let fit = term_width / cell;
        if fit <= 1 {
            for item in &self.items {
                out.push_str(item);
                out.push('\n');
            }
            return out;
        }
        let count = self.items.len();
        let rows = count.div_ceil(fit);
        // fewer columns may do once the row count is known
        let cols = count.div_ceil(rows);
        for row in 0..rows {
            let mut line = String::new();
            for col in 0..cols {
                let Some(item) = self.items.get(col * rows + row) else {
                    break;
                };
                line.push_str(&format!("{item:<cell$}"));
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

impl<S: Into<String>> FromIterator<S> for Columns {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut columns = Columns::new();
        for item in iter {
            columns.push(item);
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_prints_nothing() {
        assert_eq!(Columns::new().render(80), "");
    }

    #[test]
    fn fills_columns_top_down() {
        let columns: Columns = ["a", "b", "c", "d", "e"].into_iter().collect();
        // cell width 3, 3 columns fit in 10 -> 2 rows, 3 columns
        assert_eq!(columns.render(10), "a  c  e\nb  d\n");
    }

    #[test]
    fn drops_unneeded_columns() {
        let columns: Columns = ["one", "two", "six", "ten"].into_iter().collect();
        // 3 columns fit, 2 rows are needed, which only takes 2 columns
        assert_eq!(columns.render(16), "one  six\ntwo  ten\n");
    }

    #[test]
    fn narrow_terminal_prints_one_per_line() {
        let columns: Columns = ["alpha", "beta"].into_iter().collect();
        assert_eq!(columns.render(12), "alpha\nbeta\n");
    }

    #[test]
    fn wide_terminal_uses_single_row() {
        let columns: Columns = ["x", "yy", "zzz"].into_iter().collect();
        assert_eq!(columns.render(80), "x    yy   zzz\n");
        assert_eq!(columns.len(), 3);
    }
}
