//! Tab-separated tables, rendered in full or truncated to a head.

/// Render mode of a reconciled or plain tabular artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderMode {
    Full,
    Head,
}

impl RenderMode {
    pub const ALL: [RenderMode; 2] = [RenderMode::Full, RenderMode::Head];

    pub fn as_str(self) -> &'static str {
        match self {
            RenderMode::Full => "full",
            RenderMode::Head => "head",
        }
    }
}

/// Header plus string rows. Cells are escaped on render so a value can never
/// break the column or row structure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with empty cells, long rows are
    /// truncated to the header width.
    pub fn push(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header line followed by at most `limit` rows (all rows when `None`).
    pub fn render(&self, limit: Option<usize>) -> String {
        let mut out = String::new();
        push_line(&mut out, &self.columns);
        let take = limit.unwrap_or(self.rows.len());
        for row in self.rows.iter().take(take) {
            push_line(&mut out, row);
        }
        out
    }

    pub fn render_mode(&self, mode: RenderMode, head_limit: usize) -> String {
        match mode {
            RenderMode::Full => self.render(None),
            RenderMode::Head => self.render(Some(head_limit)),
        }
    }
}

fn push_line(out: &mut String, cells: &[String]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push('\t');
        }
        out.push_str(&escape_cell(cell));
    }
    out.push('\n');
}

fn escape_cell(cell: &str) -> String {
    if !cell.contains(['\t', '\n', '\r', '\\']) {
        return cell.to_string();
    }
    let mut escaped = String::with_capacity(cell.len() + 4);
    for ch in cell.chars() {
        match ch {
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\\' => escaped.push_str("\\\\"),
            other => escaped.push(other),
        }
    }
    escaped
}

// ─── Cell formatting ────────────────────────────────────────────────────────

/// Empty cell for a null value.
pub fn opt_cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Fixed-precision float.
pub fn fixed(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}
