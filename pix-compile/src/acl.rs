//! Ordered access-list line accumulation and serialization.
//!
//! The writer collects raw command fragments and renders them with the
//! platform's line discipline: either the classic global form, where every
//! line is prefixed `access-list <name> `, or the named-ACL body form
//! ("ip access-list extended" style), where lines are indented two spaces.
//! Lines starting with `!` are comments and are never prefixed.

/// Accumulates the lines of one access list.
#[derive(Debug)]
pub struct CiscoAcl {
    work_name: String,
    lines: Vec<String>,
    nlines: usize,
    last_rule_label: String,
    /// Named-ACL body mode: indent instead of the `access-list` prefix.
    named_body: bool,
    quote_remarks: bool,
}

impl CiscoAcl {
    pub fn new(work_name: impl Into<String>, named_body: bool, quote_remarks: bool) -> Self {
        CiscoAcl {
            work_name: work_name.into(),
            lines: Vec::new(),
            nlines: 0,
            last_rule_label: String::new(),
            named_body,
            quote_remarks,
        }
    }

    pub fn name(&self) -> &str {
        &self.work_name
    }

    /// Number of lines accumulated so far.
    pub fn line_count(&self) -> usize {
        self.nlines
    }

    /// Append one raw line and return it as it will be rendered.
    pub fn add_line(&mut self, line: impl Into<String>) -> String {
        self.lines.push(line.into());
        self.nlines += 1;
        self.render_last()
    }

    /// Add a remark block for a rule. Consecutive rules sharing a label
    /// produce the block only once: a repeated label emits nothing and
    /// returns the empty string. The label makes one remark line; each
    /// newline-separated line of `comment` makes another, each quoted
    /// independently.
    pub fn add_remark(&mut self, rule_label: &str, comment: &str) -> String {
        if self.last_rule_label == rule_label {
            return String::new();
        }
        let mut output = String::new();
        let label_line = format!(" remark {}", self.quote(rule_label));
        self.lines.push(label_line);
        self.nlines += 1;
        output.push_str(&self.render_last());

        if !comment.is_empty() {
            for line in comment.split('\n') {
                let remark = format!(" remark {}", self.quote(line));
                self.lines.push(remark);
                self.nlines += 1;
                output.push_str(&self.render_last());
            }
        }

        self.last_rule_label = rule_label.to_string();
        output
    }

    /// Serialize every accumulated line with its rendering prefix.
    pub fn print(&self) -> String {
        self.lines.iter().map(|l| self.render(l)).collect()
    }

    fn render_last(&self) -> String {
        self.lines.last().map(|l| self.render(l)).unwrap_or_default()
    }

    fn render(&self, line: &str) -> String {
        if line.starts_with('!') {
            return format!("{line}\n");
        }
        if self.named_body {
            format!("  {line}\n")
        } else {
            format!("access-list {} {line}\n", self.work_name)
        }
    }

    fn quote(&self, line: &str) -> String {
        if self.quote_remarks && line.contains(' ') {
            format!("\"{line}\"")
        } else {
            line.to_string()
        }
    }
}
