//! Download progress reported after every chunk.

/// Snapshot after a chunk has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress<'a> {
    pub name: &'a str,
    /// Part number as sent by the server (advisory).
    pub part: u32,
    pub received: u64,
    pub total: u64,
}

impl Progress<'_> {
    /// Whole percent received, rounded down. An empty file is complete.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        (self.received as u128 * 100 / self.total as u128) as u32
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(received: u64, total: u64) -> Progress<'static> {
        Progress {
            name: "report.txt",
            part: 1,
            received,
            total,
        }
    }

    #[test]
    fn test_percent_floors() {
        assert_eq!(at(1_048_576, 2_500_000).percent(), 41);
        assert_eq!(at(2_097_152, 2_500_000).percent(), 83);
        assert_eq!(at(2_500_000, 2_500_000).percent(), 100);
        assert_eq!(at(1, 3).percent(), 33);
    }

    #[test]
    fn test_empty_is_complete() {
        let p = at(0, 0);
        assert_eq!(p.percent(), 100);
        assert!(p.is_complete());
    }

    #[test]
    fn test_large_sizes_do_not_overflow() {
        assert_eq!(at(u64::MAX / 2, u64::MAX).percent(), 49);
    }
}
