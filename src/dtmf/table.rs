//! DTMF frequency groups and the keypad symbol table.

/// Row frequencies in Hz.
pub const LOW_GROUP_HZ: [f32; 4] = [697.0, 770.0, 852.0, 941.0];

/// Column frequencies in Hz.
pub const HIGH_GROUP_HZ: [f32; 4] = [1209.0, 1336.0, 1477.0, 1633.0];

/// Keypad layout indexed by `[low][high]`.
pub const KEYPAD: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// Frequency tables and symbol layout used by the detector.
///
/// Kept as data so alternative tables can be substituted without touching
/// the detection code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneTable {
    pub low_hz: [f32; 4],
    pub high_hz: [f32; 4],
    pub symbols: [[char; 4]; 4],
}

/// The standard 16-key DTMF table.
pub const STANDARD: ToneTable = ToneTable {
    low_hz: LOW_GROUP_HZ,
    high_hz: HIGH_GROUP_HZ,
    symbols: KEYPAD,
};

impl ToneTable {
    /// Symbol for a (low, high) index pair.
    pub fn symbol_for(&self, low: usize, high: usize) -> Option<char> {
        self.symbols.get(low)?.get(high).copied()
    }

    /// (low Hz, high Hz) pair for a symbol. Letters are case-insensitive.
    pub fn frequencies_for(&self, symbol: char) -> Option<(f32, f32)> {
        let symbol = symbol.to_ascii_uppercase();
        self.symbols.iter().enumerate().find_map(|(low, row)| {
            row.iter()
                .position(|&s| s == symbol)
                .map(|high| (self.low_hz[low], self.high_hz[high]))
        })
    }

    /// True if `symbol` is on the keypad.
    pub fn contains(&self, symbol: char) -> bool {
        self.frequencies_for(symbol).is_some()
    }
}

impl Default for ToneTable {
    fn default() -> Self {
        STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup_corners() {
        assert_eq!(STANDARD.symbol_for(0, 0), Some('1'));
        assert_eq!(STANDARD.symbol_for(3, 3), Some('D'));
        assert_eq!(STANDARD.symbol_for(1, 1), Some('5'));
        assert_eq!(STANDARD.symbol_for(3, 1), Some('0'));
        assert_eq!(STANDARD.symbol_for(4, 0), None);
    }

    #[test]
    fn test_frequencies_for_every_symbol_round_trips() {
        for (low, row) in KEYPAD.iter().enumerate() {
            for (high, &symbol) in row.iter().enumerate() {
                assert_eq!(
                    STANDARD.frequencies_for(symbol),
                    Some((LOW_GROUP_HZ[low], HIGH_GROUP_HZ[high])),
                    "symbol {symbol}"
                );
            }
        }
    }

    #[test]
    fn test_frequencies_for_lowercase_letter() {
        assert_eq!(STANDARD.frequencies_for('b'), Some((770.0, 1633.0)));
    }

    #[test]
    fn test_unknown_symbol() {
        assert!(!STANDARD.contains('x'));
        assert_eq!(STANDARD.frequencies_for('E'), None);
    }
}
