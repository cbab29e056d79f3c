//! Fresh identifiers
//!
//! Every heap entity gets an identifier from a base-36 odometer
//! (`0`..`9`, `a`..`z`). When every digit rolls over the odometer grows a
//! digit instead of wrapping, so identifiers never repeat and order first
//! by length, then digit by digit.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

const RADIX: u8 = 36;

fn digit_char(d: u8) -> char {
    match d {
        0..=9 => (b'0' + d) as char,
        _ => (b'a' + d - 10) as char,
    }
}

fn char_digit(c: char) -> Option<u8> {
    match c {
        '0'..='9' => Some(c as u8 - b'0'),
        'a'..='z' => Some(c as u8 - b'a' + 10),
        _ => None,
    }
}

/// Identifier of a heap object, array, map or set
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FreshId(Rc<str>);

impl FreshId {
    /// Parse a stored identifier; rejects anything the odometer cannot mint
    pub fn parse(text: &str) -> Option<FreshId> {
        if text.is_empty() || (text.len() > 1 && text.starts_with('0')) {
            return None;
        }
        if text.chars().all(|c| char_digit(c).is_some()) {
            Some(FreshId(text.into()))
        } else {
            None
        }
    }

    /// Identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn digits(&self) -> Vec<u8> {
        self.0.chars().filter_map(char_digit).collect()
    }
}

impl Ord for FreshId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.as_bytes().cmp(other.0.as_bytes()))
    }
}

impl PartialOrd for FreshId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FreshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FreshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The identifier odometer of one runtime
#[derive(Debug, Clone)]
pub struct FreshIds {
    /// Next identifier, most significant digit first
    digits: Vec<u8>,
    minted: u64,
}

impl Default for FreshIds {
    fn default() -> Self {
        Self {
            digits: vec![0],
            minted: 0,
        }
    }
}

impl FreshIds {
    /// Odometer starting at `0`
    pub fn new() -> Self {
        Self::default()
    }

    /// Odometer whose next identifier is `n` written in base 36
    pub fn starting_at(mut n: u64) -> Self {
        let mut digits = Vec::new();
        loop {
            digits.push((n % RADIX as u64) as u8);
            n /= RADIX as u64;
            if n == 0 {
                break;
            }
        }
        digits.reverse();
        Self { digits, minted: 0 }
    }

    /// Identifier the next call to [`next`](Self::next) returns
    pub fn peek(&self) -> FreshId {
        FreshId(self.digits.iter().map(|&d| digit_char(d)).collect::<String>().into())
    }

    /// Mint an identifier
    pub fn next(&mut self) -> FreshId {
        let id = self.peek();
        self.increment();
        self.minted += 1;
        id
    }

    /// Number of identifiers minted by this odometer
    pub fn minted(&self) -> u64 {
        self.minted
    }

    /// Make sure `id` is never minted again
    pub fn advance_past(&mut self, id: &FreshId) {
        if *id >= self.peek() {
            self.digits = id.digits();
            self.increment();
        }
    }

    fn increment(&mut self) {
        for digit in self.digits.iter_mut().rev() {
            *digit += 1;
            if *digit < RADIX {
                return;
            }
            *digit = 0;
        }
        self.digits.insert(0, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_in_base_36() {
        let mut ids = FreshIds::new();
        let minted: Vec<String> = (0..12).map(|_| ids.next().to_string()).collect();
        assert_eq!(minted[0], "0");
        assert_eq!(minted[9], "9");
        assert_eq!(minted[10], "a");
        assert_eq!(minted[11], "b");
    }

    #[test]
    fn test_rollover_grows_a_digit() {
        let mut ids = FreshIds::starting_at(36 * 36 - 1);
        let last = ids.next();
        let grown = ids.next();
        assert_eq!(last.as_str(), "zz");
        assert_eq!(grown.as_str(), "100");
        assert!(grown > last);
    }

    #[test]
    fn test_strictly_increasing_past_u32() {
        let mut ids = FreshIds::starting_at(u32::MAX as u64 - 2);
        let mut previous = ids.next();
        for _ in 0..8 {
            let id = ids.next();
            assert!(id > previous, "{} should follow {}", id, previous);
            previous = id;
        }
        assert!(FreshIds::starting_at(1 << 32).peek() > FreshIds::starting_at(u32::MAX as u64).peek());
    }

    #[test]
    fn test_advance_past() {
        let mut ids = FreshIds::new();
        ids.advance_past(&FreshId::parse("z").unwrap());
        assert_eq!(ids.next().as_str(), "10");

        // Older identifiers do not move the odometer back
        ids.advance_past(&FreshId::parse("5").unwrap());
        assert_eq!(ids.next().as_str(), "11");
    }

    #[test]
    fn test_parse_rejects_foreign_text() {
        assert!(FreshId::parse("").is_none());
        assert!(FreshId::parse("0a").is_none());
        assert!(FreshId::parse("A1").is_none());
        assert!(FreshId::parse("x-1").is_none());
        assert!(FreshId::parse("0").is_some());
        assert!(FreshId::parse("k9").is_some());
    }
}
