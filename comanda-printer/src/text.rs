//! Plain-text ticket layout
//!
//! Widths are counted in characters; the print service maps them onto the
//! printer's code page.

/// Display width of a string in characters
pub fn text_width(s: &str) -> usize {
    s.chars().count()
}

/// Plain-text layout builder for fixed-width paper
///
/// ```
/// use comanda_printer::TicketTextBuilder;
///
/// let mut b = TicketTextBuilder::new(20);
/// b.center("CAJA").dash_sep().line_lr("TOTAL", "$9.000");
/// assert!(b.as_str().ends_with("TOTAL         $9.000\n"));
/// ```
#[derive(Debug, Clone)]
pub struct TicketTextBuilder {
    buf: String,
    width: usize,
}

impl TicketTextBuilder {
    /// Create a new builder with paper width in characters
    pub fn new(width: usize) -> Self {
        Self {
            buf: String::new(),
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    // === Text Output ===

    /// Write raw text
    pub fn write(&mut self, s: &str) -> &mut Self {
        self.buf.push_str(s);
        self
    }

    /// Write text followed by newline
    pub fn write_line(&mut self, s: &str) -> &mut Self {
        self.buf.push_str(s);
        self.buf.push('\n');
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.buf.push('\n');
        self
    }

    /// Write text indented by `indent` spaces, wrapped to the paper width
    pub fn write_wrapped(&mut self, indent: usize, s: &str) -> &mut Self {
        let avail = self.width.saturating_sub(indent).max(1);
        let pad = " ".repeat(indent);
        let mut line = String::new();
        for word in s.split_whitespace() {
            let needed = text_width(&line) + usize::from(!line.is_empty()) + text_width(word);
            if !line.is_empty() && needed > avail {
                self.write_line(&format!("{pad}{line}"));
                line.clear();
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        if !line.is_empty() {
            self.write_line(&format!("{pad}{line}"));
        }
        self
    }

    // === Separators ===

    /// Print a line of '=' characters
    pub fn eq_sep(&mut self) -> &mut Self {
        self.write_line(&"=".repeat(self.width))
    }

    /// Print a line of '-' characters
    pub fn dash_sep(&mut self) -> &mut Self {
        self.write_line(&"-".repeat(self.width))
    }

    // === Layout Helpers ===

    /// Center text within the paper width (no padding on the right)
    pub fn center(&mut self, s: &str) -> &mut Self {
        let w = text_width(s);
        if w >= self.width {
            return self.write_line(s);
        }
        let left = (self.width - w) / 2;
        self.write(&" ".repeat(left));
        self.write_line(s)
    }

    /// Print left and right text on the same line
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let lw = text_width(left);
        let rw = text_width(right);

        if lw + rw >= self.width {
            self.write_line(&format!("{} {}", left, right));
        } else {
            let spaces = self.width - lw - rw;
            self.write(left);
            self.write(&" ".repeat(spaces));
            self.write_line(right);
        }
        self
    }

    /// Centered banner framed by '=' lines
    pub fn banner(&mut self, s: &str) -> &mut Self {
        self.eq_sep().center(s).eq_sep()
    }

    // === Build ===

    /// Finalize and return the accumulated text
    pub fn finalize(self) -> String {
        self.buf
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

impl Default for TicketTextBuilder {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_lr() {
        let mut b = TicketTextBuilder::new(12);
        b.line_lr("Total", "$900");
        assert_eq!(b.as_str(), "Total   $900\n");

        let mut b = TicketTextBuilder::new(8);
        b.line_lr("Subtotal", "$900");
        assert_eq!(b.as_str(), "Subtotal $900\n");
    }

    #[test]
    fn test_center_counts_chars_not_bytes() {
        let mut b = TicketTextBuilder::new(10);
        b.center("Ñandú");
        assert_eq!(b.finalize(), "  Ñandú\n");
    }

    #[test]
    fn test_separators_and_banner() {
        let mut b = TicketTextBuilder::new(4);
        b.dash_sep().banner("AB");
        assert_eq!(b.finalize(), "----\n====\n AB\n====\n");
    }

    #[test]
    fn test_wrapped() {
        let mut b = TicketTextBuilder::new(12);
        b.write_wrapped(2, "sin sal por favor bien cocida");
        assert_eq!(b.finalize(), "  sin sal\n  por favor\n  bien\n  cocida\n");
    }
}
