//! Fixed-width labels for dimension indices.

/// Renders indices of one dimension as zero-padded decimal strings.
///
/// The width is the digit count of the largest value that will be shown,
/// `max_value + origin`, so every label of the dimension lines up. An origin
/// of 1 turns 0-based indices into 1-based labels.
///
/// ```
/// use sb_loader::IndexFormatter;
///
/// let channels = IndexFormatter::new(12, 1);
/// assert_eq!(channels.format(0), "01");
/// assert_eq!(channels.format(11), "12");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFormatter {
    width: usize,
    origin: u32,
}

impl IndexFormatter {
    pub fn new(max_value: u32, origin: u32) -> Self {
        Self {
            width: digit_count(u64::from(max_value) + u64::from(origin)),
            origin,
        }
    }

    /// Formatter for 1-based labels of a dimension with `count` entries.
    pub fn one_based(count: u32) -> Self {
        Self::new(count, 1)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn origin(&self) -> u32 {
        self.origin
    }

    pub fn format(&self, index: u32) -> String {
        let value = u64::from(index) + u64::from(self.origin);
        format!("{:0width$}", value, width = self.width)
    }
}

impl Default for IndexFormatter {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Number of decimal digits in `value`; zero has one digit.
fn digit_count(mut value: u64) -> usize {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}
