//! The memory tape and cell arithmetic.
//!
//! Cells are `i64`. Without a [`Modulus`], `+` and `-` wrap at the 64-bit
//! two's-complement boundary; with one, every stored value stays in
//! `0..modulus`.

use std::fmt;

use serde::Deserialize;

/// Default number of cells on the tape.
pub const DEFAULT_MEMORY_SIZE: usize = 100_000;

/// A single tape cell.
pub type Cell = i64;

/// Wraparound width for cell arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u64")]
pub enum Modulus {
    /// 2^8
    U8,
    /// 2^16
    U16,
    /// 2^32
    U32,
}

impl Modulus {
    pub fn value(self) -> Cell {
        match self {
            Modulus::U8 => 1 << 8,
            Modulus::U16 => 1 << 16,
            Modulus::U32 => 1 << 32,
        }
    }
}

/// Rejected modulus value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported modulus {0} (expected 256, 65536 or 4294967296)")]
pub struct InvalidModulus(pub u64);

impl TryFrom<u64> for Modulus {
    type Error = InvalidModulus;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            256 => Ok(Modulus::U8),
            65_536 => Ok(Modulus::U16),
            4_294_967_296 => Ok(Modulus::U32),
            other => Err(InvalidModulus(other)),
        }
    }
}

impl fmt::Display for Modulus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// How a negative cell pointer is resolved when a cell is accessed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PointerMode {
    /// Pointers in `-len..0` address cells counted from the end of the tape.
    #[default]
    Alias,
    /// Any negative pointer is out of range.
    Strict,
}

/// Add `delta` to `value`, honoring the optional modulus.
///
/// The modulo is Euclidean, so the result is never negative when a modulus is set.
pub fn add_cell(value: Cell, delta: Cell, modulus: Option<Modulus>) -> Cell {
    match modulus {
        Some(m) => {
            let m = m.value();
            // Both operands are reduced first so the sum cannot overflow.
            (value.rem_euclid(m) + delta.rem_euclid(m)).rem_euclid(m)
        }
        None => value.wrapping_add(delta),
    }
}

/// Fixed-length array of cells with modulus-aware arithmetic.
#[derive(Debug, Clone)]
pub struct Tape {
    cells: Vec<Cell>,
    modulus: Option<Modulus>,
    pointer_mode: PointerMode,
}

impl Tape {
    pub fn new(len: usize, modulus: Option<Modulus>, pointer_mode: PointerMode) -> Self {
        Self {
            cells: vec![0; len],
            modulus,
            pointer_mode,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn modulus(&self) -> Option<Modulus> {
        self.modulus
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Map a signed pointer to a cell index, or `None` if it is out of range.
    pub fn resolve(&self, ptr: isize) -> Option<usize> {
        let len = self.cells.len();
        if ptr >= 0 {
            let idx = ptr as usize;
            return (idx < len).then_some(idx);
        }
        match self.pointer_mode {
            PointerMode::Strict => None,
            PointerMode::Alias => {
                let back = ptr.unsigned_abs();
                (back <= len).then(|| len - back)
            }
        }
    }

    pub fn get(&self, ptr: isize) -> Option<Cell> {
        self.resolve(ptr).map(|idx| self.cells[idx])
    }

    /// Store `value` at `ptr`, reduced by the modulus if one is set.
    pub fn set(&mut self, ptr: isize, value: Cell) -> Option<()> {
        let idx = self.resolve(ptr)?;
        self.cells[idx] = match self.modulus {
            Some(m) => value.rem_euclid(m.value()),
            None => value,
        };
        Some(())
    }

    /// Add `delta` to the cell at `ptr`; returns the new value.
    pub fn add(&mut self, ptr: isize, delta: Cell) -> Option<Cell> {
        let idx = self.resolve(ptr)?;
        let after = add_cell(self.cells[idx], delta, self.modulus);
        self.cells[idx] = after;
        Some(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulus_accepts_only_powers_named_in_config() {
        assert_eq!(Modulus::try_from(256u64), Ok(Modulus::U8));
        assert_eq!(Modulus::try_from(65_536u64), Ok(Modulus::U16));
        assert_eq!(Modulus::try_from(4_294_967_296u64), Ok(Modulus::U32));
        assert_eq!(Modulus::try_from(128u64), Err(InvalidModulus(128)));
        assert_eq!(Modulus::try_from(0u64), Err(InvalidModulus(0)));
    }

    #[test]
    fn byte_modulus_wraps_both_ways() {
        assert_eq!(add_cell(255, 1, Some(Modulus::U8)), 0);
        assert_eq!(add_cell(0, -1, Some(Modulus::U8)), 255);
        assert_eq!(add_cell(0, -1, Some(Modulus::U16)), 65_535);
        assert_eq!(add_cell(0, -1, Some(Modulus::U32)), 4_294_967_295);
    }

    #[test]
    fn unbounded_goes_negative_and_wraps_at_host_width() {
        assert_eq!(add_cell(0, -1, None), -1);
        assert_eq!(add_cell(i64::MAX, 1, None), i64::MIN);
    }

    #[test]
    fn folded_delta_matches_repeated_steps() {
        let mut stepped = 250;
        for _ in 0..300 {
            stepped = add_cell(stepped, 1, Some(Modulus::U8));
        }
        assert_eq!(add_cell(250, 300, Some(Modulus::U8)), stepped);
    }

    #[test]
    fn alias_mode_maps_negative_pointers_to_the_end() {
        let tape = Tape::new(4, None, PointerMode::Alias);
        assert_eq!(tape.resolve(0), Some(0));
        assert_eq!(tape.resolve(3), Some(3));
        assert_eq!(tape.resolve(4), None);
        assert_eq!(tape.resolve(-1), Some(3));
        assert_eq!(tape.resolve(-4), Some(0));
        assert_eq!(tape.resolve(-5), None);
    }

    #[test]
    fn strict_mode_rejects_negative_pointers() {
        let tape = Tape::new(4, None, PointerMode::Strict);
        assert_eq!(tape.resolve(-1), None);
        assert_eq!(tape.resolve(2), Some(2));
    }

    #[test]
    fn set_reduces_by_modulus() {
        let mut tape = Tape::new(2, Some(Modulus::U8), PointerMode::Alias);
        tape.set(1, 300).unwrap();
        assert_eq!(tape.get(1), Some(44));
        tape.set(0, -1).unwrap();
        assert_eq!(tape.get(0), Some(255));
    }

    #[test]
    fn add_returns_new_value() {
        let mut tape = Tape::new(1, None, PointerMode::Alias);
        assert_eq!(tape.add(0, 5), Some(5));
        assert_eq!(tape.add(0, -7), Some(-2));
        assert_eq!(tape.add(1, 1), None);
    }
}
