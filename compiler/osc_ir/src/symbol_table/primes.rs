//! Capacities for [`SymbolTable`](super::SymbolTable).
//!
//! Double hashing only visits every bucket when the capacity is prime, so
//! table sizes are always taken from this list. Small primes are dense; past
//! 100 the list grows by roughly 25% per step.

pub(super) const PRIMES: &[usize] = &[
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    127, 163, 211, 269, 337, 431, 541, 677, 853, 1069, 1361, 1709, 2137, 2677, 3347, 4201, 5261,
    6577, 8231, 10289, 12889, 16127, 20161, 25219, 31531, 39419, 49277, 61603, 77017, 96281,
    120_371, 150_473, 188_107, 235_159, 293_957, 367_453, 459_317, 574_157, 717_697, 897_133,
    1_121_423, 1_401_791, 1_752_239, 2_190_299, 2_737_937, 3_422_429, 4_278_037, 5_347_553,
    6_684_443, 8_355_563, 10_444_457, 13_055_587, 16_319_519, 20_399_411, 25_499_291,
    31_874_149, 39_842_687, 49_803_361, 62_254_207, 77_817_767, 97_272_239, 121_590_311,
    151_987_889, 189_984_863, 237_481_091, 296_851_369, 371_064_217, 463_830_313, 579_787_991,
    724_735_009, 905_918_777, 1_132_398_479, 1_415_498_113, 1_769_372_713,
];

/// Largest tabulated capacity.
pub(super) const LARGEST: usize = 1_769_372_713;

/// Smallest tabulated prime `>= min`, or `None` past the end of the table.
pub(super) fn prime_at_least(min: usize) -> Option<usize> {
    let idx = PRIMES.partition_point(|&p| p < min);
    PRIMES.get(idx).copied()
}
